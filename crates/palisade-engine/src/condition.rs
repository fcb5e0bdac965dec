//! Condition evaluation.
//!
//! Evaluates a rule's `when` predicates against the resource and request
//! context. Path resolution tries the resource object first, then the
//! surrounding context (`action`, `resourceType`, `principal`,
//! `environment`). An unresolved path is *absent*, never an error; a
//! predicate that cannot be evaluated is false. The compile step already
//! rejected anything structurally invalid, so nothing here can fail loudly.

use palisade_policy::{CompiledCondition, ConditionOp};
use palisade_types::value::json_string_form;

use crate::context::RequestContext;

/// Evaluates the conjunction of a rule's conditions. Empty = vacuously true.
///
/// `context_value` is the pre-built fallback object from
/// [`RequestContext::context_value`]; callers build it once per request.
pub fn evaluate_all(
    conditions: &[CompiledCondition],
    ctx: &RequestContext,
    context_value: &serde_json::Value,
) -> bool {
    conditions
        .iter()
        .all(|condition| evaluate(condition, ctx, context_value))
}

/// Evaluates one condition. Degradation (unresolvable path, stringless
/// value where a string is needed) logs and returns false.
pub fn evaluate(
    condition: &CompiledCondition,
    ctx: &RequestContext,
    context_value: &serde_json::Value,
) -> bool {
    let Some(path) = condition.path.as_ref() else {
        // Malformed path was logged at compile time; never matches.
        return false;
    };

    let resolved = path
        .resolve(&ctx.resource)
        .or_else(|| path.resolve(context_value));

    match condition.op {
        ConditionOp::Exists => resolved.is_some_and(|v| !v.is_null()),
        ConditionOp::Equals => resolved.is_some_and(|v| condition.value.loosely_equals(v)),
        ConditionOp::NotEquals => !resolved.is_some_and(|v| condition.value.loosely_equals(v)),
        ConditionOp::In => resolved.is_some_and(|v| condition.value.contains_json(v)),
        ConditionOp::NotIn => !resolved.is_some_and(|v| condition.value.contains_json(v)),
        ConditionOp::Matches => regex_test(condition, resolved, path),
        ConditionOp::NotMatches => !regex_test(condition, resolved, path),
    }
}

fn regex_test(
    condition: &CompiledCondition,
    resolved: Option<&serde_json::Value>,
    path: &palisade_types::FieldPath,
) -> bool {
    let Some(pattern) = condition.pattern.as_ref() else {
        // Unreachable for documents that went through compile(); treat a
        // missing pattern as a degradation rather than a panic.
        tracing::warn!(path = %path, "matches condition without compiled pattern");
        return false;
    };
    let Some(value) = resolved else {
        return false;
    };
    match json_string_form(value) {
        Some(text) => pattern.is_match(&text),
        None => {
            tracing::debug!(
                path = %path,
                "matches condition resolved to a non-scalar value; treating as non-match"
            );
            false
        }
    }
}
