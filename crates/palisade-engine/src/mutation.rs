//! Field mutation application.
//!
//! Applies a `mutate` rule's field rewrites to the resource before it is
//! persisted. Mutations run in declared order against an owned copy, so a
//! caller that abandons the call observes no partial application.
//!
//! Identity fields (`id`, `resourceType`) are never mutable: attempts are
//! ignored and recorded as warnings on the decision, never errors.

use palisade_policy::{Mutation, MutationOp};
use palisade_types::FieldPath;

/// Result of applying a set of mutations.
#[derive(Debug, Clone)]
pub struct MutationOutcome {
    /// The rewritten resource.
    pub resource: serde_json::Value,
    /// Paths that were actually changed, in application order.
    pub applied: Vec<String>,
    /// Skipped or degraded mutations (identity fields, non-list `add`, ...).
    pub warnings: Vec<String>,
}

/// Applies `mutations` in order to a copy of `resource`.
///
/// Application is idempotent: running the same mutation set against an
/// already-mutated resource yields the same final state (`add` skips values
/// already present in the target list).
pub fn apply_mutations(resource: &serde_json::Value, mutations: &[&Mutation]) -> MutationOutcome {
    let mut outcome = MutationOutcome {
        resource: resource.clone(),
        applied: Vec::new(),
        warnings: Vec::new(),
    };

    for mutation in mutations {
        apply_one(mutation, &mut outcome);
    }

    outcome
}

fn apply_one(mutation: &Mutation, outcome: &mut MutationOutcome) {
    // Paths were validated at compile time; a parse failure here means the
    // mutation bypassed the compiler, so degrade rather than panic.
    let Ok(path) = FieldPath::parse(&mutation.path) else {
        warn(outcome, format!("malformed mutation path '{}'", mutation.path));
        return;
    };

    if is_identity_field(path.root()) {
        warn(
            outcome,
            format!("mutation of identity field '{}' ignored", mutation.path),
        );
        return;
    }

    match mutation.op {
        MutationOp::Set => apply_set(&path, mutation, outcome),
        MutationOp::Remove => apply_remove(&path, mutation, outcome),
        MutationOp::Add => apply_add(&path, mutation, outcome),
    }
}

/// `id` and `resourceType` identify the resource; policy may never rewrite
/// them.
fn is_identity_field(root: &str) -> bool {
    root.eq_ignore_ascii_case("id") || root.eq_ignore_ascii_case("resourcetype")
}

fn apply_set(path: &FieldPath, mutation: &Mutation, outcome: &mut MutationOutcome) {
    let Some(slot) = slot_for(&mut outcome.resource, path) else {
        warn(
            outcome,
            format!(
                "set '{}' skipped: an intermediate value is not an object",
                mutation.path
            ),
        );
        return;
    };
    *slot = mutation.value.to_json();
    outcome.applied.push(mutation.path.clone());
}

fn apply_remove(path: &FieldPath, mutation: &Mutation, outcome: &mut MutationOutcome) {
    let (parents, leaf) = path.segments().split_at(path.segments().len() - 1);
    let mut current = &mut outcome.resource;
    for segment in parents {
        match current.get_mut(segment) {
            Some(next) => current = next,
            // Absent parent: remove is a no-op, not a warning.
            None => return,
        }
    }
    if let Some(object) = current.as_object_mut() {
        if object.remove(&leaf[0]).is_some() {
            outcome.applied.push(mutation.path.clone());
        }
    }
}

fn apply_add(path: &FieldPath, mutation: &Mutation, outcome: &mut MutationOutcome) {
    let Some(slot) = slot_for(&mut outcome.resource, path) else {
        warn(
            outcome,
            format!(
                "add '{}' skipped: an intermediate value is not an object",
                mutation.path
            ),
        );
        return;
    };

    if slot.is_null() {
        *slot = serde_json::Value::Array(Vec::new());
    }
    let Some(list) = slot.as_array_mut() else {
        warn(
            outcome,
            format!("add '{}' skipped: existing value is not a list", mutation.path),
        );
        return;
    };

    // Append is idempotent: a value already present is not appended again.
    if !list.iter().any(|item| mutation.value.loosely_equals(item)) {
        list.push(mutation.value.to_json());
        outcome.applied.push(mutation.path.clone());
    }
}

/// Walks to the slot addressed by `path`, creating intermediate objects as
/// needed. Returns `None` when an existing intermediate value is not an
/// object.
fn slot_for<'a>(
    resource: &'a mut serde_json::Value,
    path: &FieldPath,
) -> Option<&'a mut serde_json::Value> {
    if !resource.is_object() {
        return None;
    }
    let mut current = resource;
    let (parents, leaf) = path.segments().split_at(path.segments().len() - 1);
    for segment in parents {
        let object = current.as_object_mut()?;
        object
            .entry(segment.clone())
            .or_insert_with(|| serde_json::Value::Object(serde_json::Map::new()));
        current = object.get_mut(segment)?;
        if !current.is_object() {
            return None;
        }
    }
    let object = current.as_object_mut()?;
    Some(
        object
            .entry(leaf[0].clone())
            .or_insert(serde_json::Value::Null),
    )
}

fn warn(outcome: &mut MutationOutcome, message: String) {
    tracing::warn!(warning = %message, "mutation degraded");
    outcome.warnings.push(message);
}
