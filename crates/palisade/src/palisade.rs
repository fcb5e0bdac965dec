//! The `Palisade` engine handle.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::Utc;
use palisade_audit::AuditDispatcher;
use palisade_engine::{Decision, RequestContext, evaluate};
use palisade_policy::{PolicyDocument, compile};
use palisade_types::{Effect, EnforcementMode};
use uuid::Uuid;

use crate::error::Result;
use crate::registry::{ActivePolicy, PolicyKey, Registry};

/// The caller-facing outcome of one `enforce` call.
#[derive(Debug, Clone)]
pub struct Enforcement {
    pub decision: Decision,
    /// The resource as it must be persisted: rewritten when `mutate` rules
    /// applied, otherwise the input unchanged. Never partially mutated.
    pub resource: serde_json::Value,
}

/// The policy enforcement engine.
///
/// Holds the active compiled documents behind an atomically swapped
/// snapshot. Evaluation takes no locks beyond one snapshot read; document
/// loads swap the whole registry and can never leave a partial state
/// visible.
pub struct Palisade {
    active: RwLock<Arc<Registry>>,
}

impl Palisade {
    /// An engine with no active documents: every request is allowed.
    pub fn new() -> Self {
        Self {
            active: RwLock::new(Arc::new(Registry::default())),
        }
    }

    // ------------------------------------------------------------------
    // Document lifecycle
    // ------------------------------------------------------------------

    /// Compiles and activates `document`, atomically superseding any prior
    /// version with the same `(name, namespace)`.
    ///
    /// Compilation happens before the swap: a rejected document leaves the
    /// previously active version in force and returns the error to the
    /// administrative caller.
    pub fn load_document(&self, document: &PolicyDocument) -> Result<()> {
        let compiled = compile(document)?;
        let dispatcher = AuditDispatcher::from_config(&compiled.audit);
        let key = PolicyKey::new(compiled.namespace(), compiled.name());

        tracing::info!(
            policy = %compiled.qualified_name(),
            rules = compiled.rules().len(),
            mode = %compiled.mode,
            "policy document activated"
        );

        let entry = ActivePolicy {
            policy: Arc::new(compiled),
            dispatcher: Arc::new(dispatcher),
        };

        let mut guard = self
            .active
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(guard.with(key, entry));
        Ok(())
    }

    /// Parses a JSON document and activates it.
    pub fn load_json(&self, raw: &str) -> Result<()> {
        let document: PolicyDocument = serde_json::from_str(raw)?;
        self.load_document(&document)
    }

    /// Parses a YAML document and activates it.
    pub fn load_yaml(&self, raw: &str) -> Result<()> {
        let document: PolicyDocument = serde_yaml::from_str(raw)?;
        self.load_document(&document)
    }

    /// Retires the active document for `(name, namespace)`. Returns whether
    /// one was active.
    pub fn remove_document(&self, name: &str, namespace: &str) -> bool {
        let mut guard = self
            .active
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let (next, removed) = guard.without(&PolicyKey::new(namespace, name));
        if removed {
            *guard = Arc::new(next);
            tracing::info!(name, namespace, "policy document retired");
        }
        removed
    }

    /// The identities of all active documents, `(namespace, name, version)`.
    pub fn active_documents(&self) -> Vec<(String, String, String)> {
        self.snapshot()
            .iter()
            .map(|(key, entry)| {
                (
                    key.namespace.clone(),
                    key.name.clone(),
                    entry.policy.version().to_string(),
                )
            })
            .collect()
    }

    /// The version of the active document for `(name, namespace)`, if any.
    pub fn active_version(&self, name: &str, namespace: &str) -> Option<String> {
        self.snapshot()
            .get(&PolicyKey::new(namespace, name))
            .map(|entry| entry.policy.version().to_string())
    }

    // ------------------------------------------------------------------
    // Enforcement
    // ------------------------------------------------------------------

    /// Evaluates one mutating operation against every active document that
    /// targets it and returns the combined decision plus the resource to
    /// persist.
    ///
    /// Callers must abort the write when `decision.is_blocking()` and must
    /// persist the returned resource (mutations may have rewritten it).
    ///
    /// Documents evaluate in deterministic `(namespace, name)` order; a
    /// blocking deny from any document wins, otherwise the first decision
    /// whose rules matched, otherwise the first default decision. Each
    /// document's decision is audit-dispatched after the evaluation
    /// completes, off the failure path of the governed write.
    pub fn enforce(&self, request: RequestContext) -> Enforcement {
        let snapshot = self.snapshot();
        let mut ctx = request;

        let mut decisions: Vec<Decision> = Vec::new();
        for (_, entry) in snapshot.iter() {
            if !entry
                .policy
                .target
                .covers(&ctx.resource_type, &ctx.environment)
            {
                continue;
            }

            let evaluation = evaluate(&entry.policy, &ctx);
            entry.dispatcher.dispatch(&evaluation.decision);

            // Later documents see the resource as already rewritten; the
            // caller receives the cumulative result.
            if let Some(mutated) = evaluation.mutated_resource {
                ctx.resource = mutated;
            }
            decisions.push(evaluation.decision);
        }

        let decision = combine(decisions).unwrap_or_else(|| ungoverned_decision(&ctx));
        Enforcement {
            decision,
            resource: ctx.resource,
        }
    }

    fn snapshot(&self) -> Arc<Registry> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Default for Palisade {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Palisade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Palisade")
            .field("active_documents", &self.snapshot().len())
            .finish_non_exhaustive()
    }
}

/// Combines per-document decisions: any blocking deny wins, then the first
/// matched decision, then the first default decision.
fn combine(decisions: Vec<Decision>) -> Option<Decision> {
    if decisions.is_empty() {
        return None;
    }
    if let Some(deny) = decisions.iter().find(|d| d.is_blocking()) {
        return Some(deny.clone());
    }
    if let Some(matched) = decisions.iter().find(|d| !d.matched_rule_ids.is_empty()) {
        return Some(matched.clone());
    }
    decisions.into_iter().next()
}

/// The decision for a request no active document governs: allow, empty
/// provenance.
fn ungoverned_decision(ctx: &RequestContext) -> Decision {
    Decision {
        request_id: Uuid::new_v4(),
        effect: Effect::Allow,
        matched_rule_ids: Vec::new(),
        excepted_rule_ids: Vec::new(),
        message: String::new(),
        severity: None,
        remediation: None,
        mutations_applied: Vec::new(),
        warnings: Vec::new(),
        timestamp: Utc::now(),
        principal: ctx.principal.id.clone(),
        resource_type: ctx.resource_type.clone(),
        resource_id: ctx.resource_id(),
        mode: EnforcementMode::Enforce,
        policy: String::new(),
    }
}
