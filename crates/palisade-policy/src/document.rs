//! The policy document schema.
//!
//! Documents are JSON/YAML shaped with camelCase keys:
//!
//! ```yaml
//! apiVersion: governance/v1
//! kind: Policy
//! metadata:
//!   name: restricted-data
//!   namespace: default
//!   version: "3"
//! spec:
//!   mode: enforce
//!   defaultEffect: allow
//!   execution:
//!     shortCircuit: false
//!     conflictStrategy: denyOverrides
//!   rules:
//!     - id: deny-restricted-writes
//!       priority: 10
//!       match:
//!         resource:
//!           type: Risk
//!           labels: { dataClassification: restricted }
//!       effect: deny
//!       severity: high
//!       message: Restricted risks are read-only
//! ```
//!
//! Identity is `(name, namespace, version)`; loading a new version atomically
//! supersedes the prior active version for the same `(name, namespace)`.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use palisade_types::{Effect, EnforcementMode, Severity, Value};
use serde::{Deserialize, Serialize};

// ============================================================================
// Document & Metadata
// ============================================================================

/// A complete, versioned policy document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyDocument {
    /// Schema version of the document format (e.g. `governance/v1`).
    pub api_version: String,
    /// Document kind; always `Policy` for this engine.
    pub kind: String,
    pub metadata: Metadata,
    pub spec: PolicySpec,
}

impl PolicyDocument {
    /// The `(name, namespace, version)` identity of this document.
    pub fn identity(&self) -> (&str, &str, &str) {
        (
            &self.metadata.name,
            &self.metadata.namespace,
            &self.metadata.version,
        )
    }
}

/// Document identity and bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub name: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub version: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

fn default_namespace() -> String {
    "default".to_string()
}

// ============================================================================
// Spec
// ============================================================================

/// The behavioral core of a document: rules, exceptions, and settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicySpec {
    /// `enforce` blocks on deny; `audit` computes decisions advisorily.
    #[serde(default)]
    pub mode: EnforcementMode,
    /// Effect applied when no rule matches. Defaults to `allow`.
    #[serde(default)]
    pub default_effect: Effect,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub target: TargetConfig,
    pub rules: Vec<PolicyRule>,
    #[serde(default)]
    pub exceptions: Vec<PolicyException>,
    #[serde(default)]
    pub audit: AuditConfig,
}

/// Candidate ordering and conflict resolution settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionConfig {
    /// Evaluation order; only `sequential` is defined.
    #[serde(default = "default_order")]
    pub order: String,
    /// When true, the first matching rule decides and evaluation stops.
    #[serde(default)]
    pub short_circuit: bool,
    #[serde(default)]
    pub conflict_strategy: ConflictStrategy,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            order: default_order(),
            short_circuit: false,
            conflict_strategy: ConflictStrategy::default(),
        }
    }
}

fn default_order() -> String {
    "sequential".to_string()
}

/// How multiple simultaneously-matching rules combine into one decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConflictStrategy {
    /// Any matching `deny` wins; `mutate` candidates all apply otherwise.
    DenyOverrides,
    /// Any matching `allow` wins; otherwise deny-overrides among the rest.
    AllowOverrides,
    /// The single highest-priority candidate is authoritative.
    HighestPriorityWins,
}

impl Default for ConflictStrategy {
    fn default() -> Self {
        Self::DenyOverrides
    }
}

/// Which resource types and environments a document governs at all.
/// Empty lists mean "all".
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetConfig {
    #[serde(default)]
    pub resource_types: Vec<String>,
    #[serde(default)]
    pub environments: Vec<String>,
}

impl TargetConfig {
    /// Whether this document governs the given resource type and environment.
    pub fn covers(&self, resource_type: &str, environment: &str) -> bool {
        let type_ok = self.resource_types.is_empty()
            || self.resource_types.iter().any(|t| t == resource_type);
        let env_ok =
            self.environments.is_empty() || self.environments.iter().any(|e| e == environment);
        type_ok && env_ok
    }
}

// ============================================================================
// Rules
// ============================================================================

/// One declarative rule: match clause, conditions, and an effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyRule {
    /// Unique within the document; surfaced in decisions and audit records.
    pub id: String,
    /// Higher priority evaluates first; ties break by declaration order.
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub description: String,
    /// Disabled rules are skipped entirely.
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, rename = "match")]
    pub match_clause: MatchConfig,
    /// Conditions over the resource/context; implicit AND, empty = always.
    #[serde(default)]
    pub when: Vec<Condition>,
    pub effect: Effect,
    /// Returned verbatim to the end user on deny.
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub severity: Severity,
    /// Field rewrites applied when `effect` is `mutate`.
    #[serde(default)]
    pub mutations: Vec<Mutation>,
    /// Optional remediation hint, surfaced alongside `message`.
    #[serde(default)]
    pub remediation: Option<String>,
}

fn default_true() -> bool {
    true
}

/// A rule's match clause. Omitted sub-clauses match everything.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchConfig {
    #[serde(default)]
    pub resource: Option<ResourceMatch>,
    #[serde(default)]
    pub principal: Option<PrincipalMatch>,
    /// `"*"` or exact environment name.
    #[serde(default)]
    pub environment: Option<String>,
}

/// Resource selector within a match clause.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceMatch {
    /// Exact resource type. Omitted (or `"*"`) matches any type.
    #[serde(default, rename = "type")]
    pub resource_type: Option<String>,
    /// `"*"` or exact resource name; no partial globs.
    #[serde(default)]
    pub name: Option<String>,
    /// Every declared label must be present with an equal value; the
    /// resource may carry extra labels.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

/// Principal selector within a match clause.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrincipalMatch {
    /// Exact principal id, when set.
    #[serde(default)]
    pub id: Option<String>,
    /// At least one role must overlap (OR across roles), when non-empty.
    #[serde(default)]
    pub roles: Vec<String>,
}

// ============================================================================
// Conditions
// ============================================================================

/// Predicate operator for a `when` condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConditionOp {
    Exists,
    Equals,
    NotEquals,
    In,
    NotIn,
    Matches,
    NotMatches,
}

/// A single `when` predicate over a dotted field path.
///
/// The path resolves against the resource first, then the request context
/// (`action`, `resourceType`, `principal`, `environment`). An unresolved
/// path is absent, never an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub op: ConditionOp,
    pub path: String,
    #[serde(default)]
    pub value: Value,
}

// ============================================================================
// Mutations
// ============================================================================

/// Field rewrite operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MutationOp {
    /// Write `value` at `path`, creating intermediate objects as needed.
    Set,
    /// Delete the key at `path`; no-op when absent.
    Remove,
    /// Append `value` to the list at `path`, creating it when absent.
    Add,
}

/// One field rewrite, applied in declared order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mutation {
    pub op: MutationOp,
    pub path: String,
    #[serde(default)]
    pub value: Value,
}

// ============================================================================
// Exceptions
// ============================================================================

/// A time-bound override suppressing specific rules for matching requests.
///
/// Expired exceptions are inert but retained for audit history; the engine
/// never deletes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyException {
    pub id: String,
    /// The rules this exception suppresses.
    pub rule_ids: Vec<String>,
    /// Why the exception exists; kept for audit history.
    #[serde(default)]
    pub reason: String,
    /// Active while unset or in the future.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    /// The exception only applies to requests its own match clause covers.
    #[serde(default, rename = "match")]
    pub match_clause: MatchConfig,
}

impl PolicyException {
    /// Whether the exception is active at `now`.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|expires| expires > now)
    }
}

// ============================================================================
// Audit configuration
// ============================================================================

/// Where and whether decisions are audit-logged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditConfig {
    /// Log every decision (default true).
    #[serde(default = "default_true")]
    pub log_decisions: bool,
    /// Retention metadata consumed by the sink/storage layer; the engine
    /// does not enforce it.
    #[serde(default)]
    pub retention_days: u32,
    #[serde(default)]
    pub sinks: Vec<SinkConfig>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            log_decisions: true,
            retention_days: 0,
            sinks: Vec::new(),
        }
    }
}

/// Kind of audit sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    Stdout,
    File,
    Http,
}

/// One configured audit destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SinkConfig {
    #[serde(rename = "type")]
    pub kind: SinkKind,
    /// Append target for `file` sinks.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// POST target for `http` sinks.
    #[serde(default)]
    pub url: Option<String>,
    /// Extra headers sent with `http` deliveries.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn minimal_document_json() -> &'static str {
        r#"{
            "apiVersion": "governance/v1",
            "kind": "Policy",
            "metadata": { "name": "base", "version": "1" },
            "spec": {
                "rules": [
                    { "id": "r1", "effect": "deny", "message": "no" }
                ]
            }
        }"#
    }

    #[test]
    fn test_minimal_document_defaults() {
        let doc: PolicyDocument = serde_json::from_str(minimal_document_json()).unwrap();
        assert_eq!(doc.metadata.namespace, "default");
        assert_eq!(doc.spec.mode, EnforcementMode::Enforce);
        assert_eq!(doc.spec.default_effect, Effect::Allow);
        assert_eq!(
            doc.spec.execution.conflict_strategy,
            ConflictStrategy::DenyOverrides
        );
        assert!(!doc.spec.execution.short_circuit);
        assert!(doc.spec.audit.log_decisions);
        assert!(doc.spec.rules[0].enabled);
        assert_eq!(doc.spec.rules[0].severity, Severity::Low);
        assert_eq!(doc.identity(), ("base", "default", "1"));
    }

    #[test]
    fn test_unknown_effect_rejected_at_parse() {
        let raw = minimal_document_json().replace("\"deny\"", "\"quarantine\"");
        assert!(serde_json::from_str::<PolicyDocument>(&raw).is_err());
    }

    #[test]
    fn test_match_clause_wire_form() {
        let raw = r#"{
            "resource": { "type": "Risk", "name": "*", "labels": { "tier": "gold" } },
            "principal": { "roles": ["Admin", "Owner"] },
            "environment": "production"
        }"#;
        let clause: MatchConfig = serde_json::from_str(raw).unwrap();
        let resource = clause.resource.unwrap();
        assert_eq!(resource.resource_type.as_deref(), Some("Risk"));
        assert_eq!(resource.name.as_deref(), Some("*"));
        assert_eq!(resource.labels.get("tier").map(String::as_str), Some("gold"));
        assert_eq!(clause.principal.unwrap().roles.len(), 2);
    }

    #[test]
    fn test_exception_activity_window() {
        let now = Utc::now();
        let mut exception = PolicyException {
            id: "ex1".to_string(),
            rule_ids: vec!["r1".to_string()],
            reason: "migration".to_string(),
            expires_at: None,
            match_clause: MatchConfig::default(),
        };
        assert!(exception.is_active(now));

        exception.expires_at = Some(now + Duration::hours(1));
        assert!(exception.is_active(now));

        exception.expires_at = Some(now - Duration::hours(1));
        assert!(!exception.is_active(now));
    }

    #[test]
    fn test_target_covers() {
        let target = TargetConfig::default();
        assert!(target.covers("Risk", "production"));

        let target = TargetConfig {
            resource_types: vec!["Risk".to_string(), "Audit".to_string()],
            environments: vec!["production".to_string()],
        };
        assert!(target.covers("Risk", "production"));
        assert!(!target.covers("Vendor", "production"));
        assert!(!target.covers("Risk", "staging"));
    }

    #[test]
    fn test_condition_defaults_to_null_value() {
        let cond: Condition =
            serde_json::from_str(r#"{ "op": "exists", "path": "labels.owner" }"#).unwrap();
        assert_eq!(cond.op, ConditionOp::Exists);
        assert_eq!(cond.value, Value::Null);
    }
}
