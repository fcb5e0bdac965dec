//! The decision engine.
//!
//! Orchestrates candidate selection, exception suppression, ordering, and
//! conflict resolution into one [`Decision`] per request, applying field
//! mutations when the winning effect calls for them.

use chrono::{DateTime, Utc};
use palisade_policy::{CompiledPolicy, CompiledRule, ConflictStrategy};
use palisade_types::{Effect, EnforcementMode, Severity};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::condition;
use crate::context::RequestContext;
use crate::matcher;
use crate::mutation::{self, MutationOutcome};

// ============================================================================
// Decision
// ============================================================================

/// The engine's verdict for one enforcement call.
///
/// Created per call, consumed by the caller and the audit dispatcher, then
/// discarded. Never part of the policy document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    /// Unique id for correlating the decision with audit records.
    pub request_id: Uuid,
    pub effect: Effect,
    /// Rules that matched, priority order. At most one when the policy
    /// short-circuits.
    pub matched_rule_ids: Vec<String>,
    /// Rules suppressed by an active exception; recorded for audit but
    /// treated as non-matching for effect purposes.
    pub excepted_rule_ids: Vec<String>,
    /// The authoritative rule's message, verbatim, for end-user surfacing.
    pub message: String,
    /// Severity of the authoritative rule; absent for default decisions.
    pub severity: Option<Severity>,
    /// Remediation hint from the authoritative rule, when present.
    pub remediation: Option<String>,
    /// Mutation paths actually applied, in application order.
    pub mutations_applied: Vec<String>,
    /// Degraded operations (identity-field mutations, non-list adds, ...).
    pub warnings: Vec<String>,
    pub timestamp: DateTime<Utc>,
    /// Principal id the request ran as.
    pub principal: String,
    pub resource_type: String,
    /// The resource's `id` field, when it has one.
    pub resource_id: Option<String>,
    /// `enforce` decisions block on deny; `audit` decisions are advisory.
    pub mode: EnforcementMode,
    /// `namespace/name@version` of the deciding document; empty when no
    /// document governed the request.
    pub policy: String,
}

impl Decision {
    /// Whether a caller in enforce mode must abort the governed write.
    pub fn is_blocking(&self) -> bool {
        self.effect == Effect::Deny && self.mode == EnforcementMode::Enforce
    }

    /// A decision carrying the document's default effect (no rule matched).
    fn unmatched(policy: &CompiledPolicy, ctx: &RequestContext, excepted: Vec<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            effect: policy.default_effect,
            matched_rule_ids: Vec::new(),
            excepted_rule_ids: excepted,
            message: String::new(),
            severity: None,
            remediation: None,
            mutations_applied: Vec::new(),
            warnings: Vec::new(),
            timestamp: ctx.timestamp,
            principal: ctx.principal.id.clone(),
            resource_type: ctx.resource_type.clone(),
            resource_id: ctx.resource_id(),
            mode: policy.mode,
            policy: policy.qualified_name(),
        }
    }
}

/// A decision plus the resource as the caller must persist it.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub decision: Decision,
    /// Set when mutations rewrote the resource; `None` means the input
    /// resource is unchanged.
    pub mutated_resource: Option<serde_json::Value>,
}

// ============================================================================
// Evaluation
// ============================================================================

/// Evaluates one request against one compiled policy.
///
/// Pure over `policy` and `ctx`: no locks, no I/O, deterministic for a fixed
/// request. Always returns a decision — evaluation failures degrade to
/// "does not match" rather than aborting.
pub fn evaluate(policy: &CompiledPolicy, ctx: &RequestContext) -> Evaluation {
    let context_value = ctx.context_value();

    let mut excepted: Vec<String> = Vec::new();
    let mut candidates: Vec<&CompiledRule> = Vec::new();

    for rule in policy.candidate_rules(&ctx.resource_type) {
        if !matcher::matches(&rule.match_clause, ctx)
            || !condition::evaluate_all(&rule.when, ctx, &context_value)
        {
            continue;
        }
        if is_excepted(policy, rule, ctx) {
            excepted.push(rule.id.clone());
            continue;
        }
        candidates.push(rule);

        // First match decides under short-circuit; stop evaluating.
        if policy.execution.short_circuit {
            break;
        }
    }

    if candidates.is_empty() {
        tracing::debug!(
            policy = %policy.qualified_name(),
            resource_type = %ctx.resource_type,
            effect = %policy.default_effect,
            "no rule matched; applying default effect"
        );
        return Evaluation {
            decision: Decision::unmatched(policy, ctx, excepted),
            mutated_resource: None,
        };
    }

    let resolution = if policy.execution.short_circuit {
        Resolution::single(candidates[0])
    } else {
        resolve_conflicts(policy.execution.conflict_strategy, &candidates)
    };

    build_decision(policy, ctx, &candidates, excepted, resolution)
}

/// Whether an active exception suppresses `rule` for this request.
///
/// Expired exceptions are inert (but retained in the document for audit
/// history); an exception only applies when its own match clause covers the
/// request.
fn is_excepted(policy: &CompiledPolicy, rule: &CompiledRule, ctx: &RequestContext) -> bool {
    policy.exceptions().iter().any(|exception| {
        exception.rule_ids.iter().any(|id| *id == rule.id)
            && exception.is_active(ctx.timestamp)
            && matcher::matches(&exception.match_clause, ctx)
    })
}

// ============================================================================
// Conflict resolution
// ============================================================================

/// Outcome of combining the candidate set into one effect.
struct Resolution<'a> {
    effect: Effect,
    /// The rule whose message/severity/remediation surface on the decision.
    authoritative: &'a CompiledRule,
    /// Rules whose mutations apply, in priority order.
    mutating: Vec<&'a CompiledRule>,
}

impl<'a> Resolution<'a> {
    /// A single authoritative rule (short-circuit or highest-priority-wins).
    fn single(rule: &'a CompiledRule) -> Self {
        Self {
            effect: rule.effect,
            authoritative: rule,
            mutating: if rule.effect == Effect::Mutate {
                vec![rule]
            } else {
                Vec::new()
            },
        }
    }
}

/// Combines a non-empty candidate set (already priority-ordered) according
/// to the document's conflict strategy.
fn resolve_conflicts<'a>(
    strategy: ConflictStrategy,
    candidates: &[&'a CompiledRule],
) -> Resolution<'a> {
    match strategy {
        ConflictStrategy::HighestPriorityWins => Resolution::single(candidates[0]),
        ConflictStrategy::DenyOverrides => deny_overrides(candidates),
        ConflictStrategy::AllowOverrides => {
            // Any allow wins outright; mutations from lower-precedence
            // candidates do not apply once an allow overrides the set.
            match candidates.iter().find(|rule| rule.effect == Effect::Allow) {
                Some(allow) => Resolution {
                    effect: Effect::Allow,
                    authoritative: allow,
                    mutating: Vec::new(),
                },
                None => deny_overrides(candidates),
            }
        }
    }
}

fn deny_overrides<'a>(candidates: &[&'a CompiledRule]) -> Resolution<'a> {
    // Any deny wins; its message and severity surface.
    if let Some(deny) = candidates.iter().find(|rule| rule.effect == Effect::Deny) {
        return Resolution {
            effect: Effect::Deny,
            authoritative: deny,
            mutating: Vec::new(),
        };
    }

    // No deny: every mutate candidate applies, and the remaining
    // allow/audit candidates resolve by highest priority.
    let mutating: Vec<&CompiledRule> = candidates
        .iter()
        .copied()
        .filter(|rule| rule.effect == Effect::Mutate)
        .collect();
    let leader = candidates
        .iter()
        .copied()
        .find(|rule| rule.effect != Effect::Mutate);

    match leader {
        Some(rule) => Resolution {
            effect: rule.effect,
            authoritative: rule,
            mutating,
        },
        // Only mutate candidates matched.
        None => Resolution {
            effect: Effect::Mutate,
            authoritative: candidates[0],
            mutating,
        },
    }
}

fn build_decision(
    policy: &CompiledPolicy,
    ctx: &RequestContext,
    candidates: &[&CompiledRule],
    excepted: Vec<String>,
    resolution: Resolution<'_>,
) -> Evaluation {
    let mut decision = Decision {
        request_id: Uuid::new_v4(),
        effect: resolution.effect,
        matched_rule_ids: candidates.iter().map(|rule| rule.id.clone()).collect(),
        excepted_rule_ids: excepted,
        message: resolution.authoritative.message.clone(),
        severity: Some(resolution.authoritative.severity),
        remediation: resolution.authoritative.remediation.clone(),
        mutations_applied: Vec::new(),
        warnings: Vec::new(),
        timestamp: ctx.timestamp,
        principal: ctx.principal.id.clone(),
        resource_type: ctx.resource_type.clone(),
        resource_id: ctx.resource_id(),
        mode: policy.mode,
        policy: policy.qualified_name(),
    };

    let mutated_resource = if resolution.mutating.is_empty() {
        None
    } else {
        let mutations: Vec<_> = resolution
            .mutating
            .iter()
            .flat_map(|rule| rule.mutations.iter())
            .collect();
        let MutationOutcome {
            resource,
            applied,
            warnings,
        } = mutation::apply_mutations(&ctx.resource, &mutations);
        decision.mutations_applied = applied;
        decision.warnings = warnings;
        Some(resource)
    };

    Evaluation {
        decision,
        mutated_resource,
    }
}
