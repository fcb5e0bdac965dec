//! The rule compiler.
//!
//! Turns a raw [`PolicyDocument`] into an immutable [`CompiledPolicy`]:
//! validates the document wholesale, parses every field path once, compiles
//! `matches`/`notMatches` patterns, and buckets rules by resource type so a
//! request only touches the rules that could apply to it.
//!
//! Compile time is the structural safety net: everything that can be
//! rejected here is, so the evaluation path degrades instead of failing.

use std::collections::{HashMap, HashSet};

use palisade_types::{Effect, EnforcementMode, FieldPath, Severity, Value};
use regex::Regex;

use crate::document::{
    AuditConfig, ConditionOp, ExecutionConfig, MatchConfig, Mutation, PolicyDocument,
    PolicyException, TargetConfig,
};
use crate::error::{PolicyError, Result};

// ============================================================================
// Compiled forms
// ============================================================================

/// A `when` predicate with its path parsed and pattern pre-compiled.
#[derive(Debug, Clone)]
pub struct CompiledCondition {
    pub op: ConditionOp,
    /// Parsed path; `None` when the raw path was malformed, in which case
    /// the condition never resolves and evaluates false (degradation, not
    /// an error).
    pub path: Option<FieldPath>,
    pub value: Value,
    /// Pre-compiled regex for `matches`/`notMatches`.
    pub pattern: Option<Regex>,
}

/// A rule after validation, ready for evaluation.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub id: String,
    pub priority: i64,
    pub description: String,
    pub enabled: bool,
    pub match_clause: MatchConfig,
    pub when: Vec<CompiledCondition>,
    pub effect: Effect,
    pub message: String,
    pub severity: Severity,
    pub mutations: Vec<Mutation>,
    pub remediation: Option<String>,
    /// Position in the document; breaks priority ties (stable order).
    pub declaration_index: usize,
}

/// An immutable, indexed rule set compiled from one document.
///
/// Never mutated after construction; reloads replace the whole value.
#[derive(Debug)]
pub struct CompiledPolicy {
    name: String,
    namespace: String,
    version: String,
    pub mode: EnforcementMode,
    pub default_effect: Effect,
    pub execution: ExecutionConfig,
    pub target: TargetConfig,
    pub audit: AuditConfig,
    rules: Vec<CompiledRule>,
    /// Rule indices bucketed by exact resource type.
    by_type: HashMap<String, Vec<usize>>,
    /// Rules with no resource-type constraint; consulted for every type.
    untyped: Vec<usize>,
    exceptions: Vec<PolicyException>,
}

impl CompiledPolicy {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// `namespace/name@version`, as recorded on decisions and audit records.
    pub fn qualified_name(&self) -> String {
        format!("{}/{}@{}", self.namespace, self.name, self.version)
    }

    /// All rules in declaration order.
    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    /// All exceptions, including expired ones (retained for audit history).
    pub fn exceptions(&self) -> &[PolicyException] {
        &self.exceptions
    }

    /// Enabled rules that could match `resource_type`, ordered by priority
    /// descending with declaration order breaking ties.
    ///
    /// Cost is O(rules-for-type): only the type bucket and the untyped
    /// bucket are touched.
    pub fn candidate_rules(&self, resource_type: &str) -> Vec<&CompiledRule> {
        let typed = self.by_type.get(resource_type);
        let mut candidates: Vec<&CompiledRule> = typed
            .into_iter()
            .flatten()
            .chain(self.untyped.iter())
            .map(|&idx| &self.rules[idx])
            .filter(|rule| rule.enabled)
            .collect();
        candidates.sort_by_key(|rule| (std::cmp::Reverse(rule.priority), rule.declaration_index));
        candidates
    }
}

// ============================================================================
// Compilation
// ============================================================================

/// Validates `document` and compiles it into an immutable rule set.
///
/// Rejections are all-or-nothing; see [`PolicyError`] for the kinds. The
/// compilation is pure: the same document always produces a
/// decision-equivalent `CompiledPolicy`.
pub fn compile(document: &PolicyDocument) -> Result<CompiledPolicy> {
    validate_identity(document)?;

    let mut seen_ids = HashSet::new();
    let mut rules = Vec::with_capacity(document.spec.rules.len());
    for (index, rule) in document.spec.rules.iter().enumerate() {
        if rule.id.is_empty() {
            return Err(PolicyError::SchemaValidation {
                reason: format!("rule at index {index} has an empty id"),
            });
        }
        if !seen_ids.insert(rule.id.clone()) {
            return Err(PolicyError::DuplicateRuleId {
                id: rule.id.clone(),
            });
        }

        let when = rule
            .when
            .iter()
            .map(|condition| compile_condition(&rule.id, condition))
            .collect::<Result<Vec<_>>>()?;

        for mutation in &rule.mutations {
            FieldPath::parse(&mutation.path).map_err(|source| {
                PolicyError::InvalidMutationPath {
                    rule_id: rule.id.clone(),
                    path: mutation.path.clone(),
                    source,
                }
            })?;
        }

        rules.push(CompiledRule {
            id: rule.id.clone(),
            priority: rule.priority,
            description: rule.description.clone(),
            enabled: rule.enabled,
            match_clause: rule.match_clause.clone(),
            when,
            effect: rule.effect,
            message: rule.message.clone(),
            severity: rule.severity,
            mutations: rule.mutations.clone(),
            remediation: rule.remediation.clone(),
            declaration_index: index,
        });
    }

    validate_exceptions(&document.spec.exceptions, &seen_ids)?;

    let mut by_type: HashMap<String, Vec<usize>> = HashMap::new();
    let mut untyped = Vec::new();
    for (index, rule) in rules.iter().enumerate() {
        match rule
            .match_clause
            .resource
            .as_ref()
            .and_then(|resource| resource.resource_type.as_deref())
        {
            // An explicit "*" type is the same as no type constraint.
            Some(resource_type) if resource_type != "*" => {
                by_type.entry(resource_type.to_string()).or_default().push(index);
            }
            _ => untyped.push(index),
        }
    }

    Ok(CompiledPolicy {
        name: document.metadata.name.clone(),
        namespace: document.metadata.namespace.clone(),
        version: document.metadata.version.clone(),
        mode: document.spec.mode,
        default_effect: document.spec.default_effect,
        execution: document.spec.execution.clone(),
        target: document.spec.target.clone(),
        audit: document.spec.audit.clone(),
        rules,
        by_type,
        untyped,
        exceptions: document.spec.exceptions.clone(),
    })
}

fn validate_identity(document: &PolicyDocument) -> Result<()> {
    if document.metadata.name.is_empty() {
        return Err(PolicyError::SchemaValidation {
            reason: "metadata.name must not be empty".to_string(),
        });
    }
    if document.metadata.version.is_empty() {
        return Err(PolicyError::SchemaValidation {
            reason: "metadata.version must not be empty".to_string(),
        });
    }
    Ok(())
}

fn compile_condition(
    rule_id: &str,
    condition: &crate::document::Condition,
) -> Result<CompiledCondition> {
    // A malformed condition path is a runtime non-match, not a compile
    // rejection; log it once here instead of on every request.
    let path = match FieldPath::parse(&condition.path) {
        Ok(path) => Some(path),
        Err(err) => {
            tracing::warn!(
                rule = %rule_id,
                path = %condition.path,
                error = %err,
                "condition path is malformed; condition will never match"
            );
            None
        }
    };

    let pattern = match condition.op {
        ConditionOp::Matches | ConditionOp::NotMatches => {
            let raw = condition.value.string_form().ok_or_else(|| {
                PolicyError::SchemaValidation {
                    reason: format!(
                        "rule '{rule_id}' uses a non-string pattern for a matches condition"
                    ),
                }
            })?;
            Some(
                Regex::new(&raw).map_err(|source| PolicyError::InvalidPattern {
                    rule_id: rule_id.to_string(),
                    pattern: raw,
                    source,
                })?,
            )
        }
        _ => None,
    };

    Ok(CompiledCondition {
        op: condition.op,
        path,
        value: condition.value.clone(),
        pattern,
    })
}

fn validate_exceptions(
    exceptions: &[PolicyException],
    rule_ids: &HashSet<String>,
) -> Result<()> {
    let mut seen = HashSet::new();
    for exception in exceptions {
        if exception.id.is_empty() {
            return Err(PolicyError::SchemaValidation {
                reason: "exception with an empty id".to_string(),
            });
        }
        if !seen.insert(exception.id.clone()) {
            return Err(PolicyError::SchemaValidation {
                reason: format!("duplicate exception id '{}'", exception.id),
            });
        }
        let unknown: Vec<String> = exception
            .rule_ids
            .iter()
            .filter(|id| !rule_ids.contains(*id))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(PolicyError::UnknownExceptionRuleIds {
                exception_id: exception.id.clone(),
                unknown,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Condition, PolicyRule, PolicySpec, ResourceMatch};
    use crate::document::Metadata;

    fn rule(id: &str, priority: i64, effect: Effect) -> PolicyRule {
        PolicyRule {
            id: id.to_string(),
            priority,
            description: String::new(),
            enabled: true,
            match_clause: MatchConfig::default(),
            when: Vec::new(),
            effect,
            message: String::new(),
            severity: Severity::Low,
            mutations: Vec::new(),
            remediation: None,
        }
    }

    fn document(rules: Vec<PolicyRule>, exceptions: Vec<PolicyException>) -> PolicyDocument {
        PolicyDocument {
            api_version: "governance/v1".to_string(),
            kind: "Policy".to_string(),
            metadata: Metadata {
                name: "test".to_string(),
                namespace: "default".to_string(),
                version: "1".to_string(),
                created_at: None,
                labels: Default::default(),
                annotations: Default::default(),
            },
            spec: PolicySpec {
                mode: EnforcementMode::Enforce,
                default_effect: Effect::Allow,
                execution: ExecutionConfig::default(),
                target: TargetConfig::default(),
                rules,
                exceptions,
                audit: AuditConfig::default(),
            },
        }
    }

    fn typed_rule(id: &str, priority: i64, resource_type: &str) -> PolicyRule {
        let mut r = rule(id, priority, Effect::Deny);
        r.match_clause.resource = Some(ResourceMatch {
            resource_type: Some(resource_type.to_string()),
            name: None,
            labels: Default::default(),
        });
        r
    }

    #[test]
    fn test_duplicate_rule_id_rejected() {
        let doc = document(
            vec![rule("r1", 0, Effect::Allow), rule("r1", 5, Effect::Deny)],
            Vec::new(),
        );
        assert!(matches!(
            compile(&doc),
            Err(PolicyError::DuplicateRuleId { id }) if id == "r1"
        ));
    }

    #[test]
    fn test_unknown_exception_reference_lists_ids() {
        let exception = PolicyException {
            id: "ex1".to_string(),
            rule_ids: vec!["r1".to_string(), "ghost".to_string(), "phantom".to_string()],
            reason: String::new(),
            expires_at: None,
            match_clause: MatchConfig::default(),
        };
        let doc = document(vec![rule("r1", 0, Effect::Deny)], vec![exception]);
        match compile(&doc) {
            Err(PolicyError::UnknownExceptionRuleIds {
                exception_id,
                unknown,
            }) => {
                assert_eq!(exception_id, "ex1");
                assert_eq!(unknown, vec!["ghost".to_string(), "phantom".to_string()]);
            }
            other => panic!("expected UnknownExceptionRuleIds, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_mutation_path_rejected() {
        let mut r = rule("r1", 0, Effect::Mutate);
        r.mutations.push(Mutation {
            op: crate::document::MutationOp::Set,
            path: "labels..owner".to_string(),
            value: Value::String("system".to_string()),
        });
        let doc = document(vec![r], Vec::new());
        assert!(matches!(
            compile(&doc),
            Err(PolicyError::InvalidMutationPath { rule_id, .. }) if rule_id == "r1"
        ));
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let mut r = rule("r1", 0, Effect::Deny);
        r.when.push(Condition {
            op: ConditionOp::Matches,
            path: "status.phase".to_string(),
            value: Value::String("[unclosed".to_string()),
        });
        let doc = document(vec![r], Vec::new());
        assert!(matches!(
            compile(&doc),
            Err(PolicyError::InvalidPattern { rule_id, .. }) if rule_id == "r1"
        ));
    }

    #[test]
    fn test_malformed_condition_path_degrades_instead_of_rejecting() {
        let mut r = rule("r1", 0, Effect::Deny);
        r.when.push(Condition {
            op: ConditionOp::Exists,
            path: String::new(),
            value: Value::Null,
        });
        let compiled = compile(&document(vec![r], Vec::new())).unwrap();
        assert!(compiled.rules()[0].when[0].path.is_none());
    }

    #[test]
    fn test_type_buckets() {
        let doc = document(
            vec![
                typed_rule("risk-low", 1, "Risk"),
                typed_rule("audit-any", 2, "Audit"),
                rule("global", 3, Effect::Audit),
                typed_rule("risk-high", 9, "Risk"),
            ],
            Vec::new(),
        );
        let compiled = compile(&doc).unwrap();

        let risk: Vec<&str> = compiled
            .candidate_rules("Risk")
            .iter()
            .map(|r| r.id.as_str())
            .collect();
        // Priority descending: risk-high (9), global (3), risk-low (1).
        assert_eq!(risk, vec!["risk-high", "global", "risk-low"]);

        let vendor: Vec<&str> = compiled
            .candidate_rules("Vendor")
            .iter()
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(vendor, vec!["global"]);
    }

    #[test]
    fn test_priority_ties_keep_declaration_order() {
        let doc = document(
            vec![
                rule("first", 5, Effect::Allow),
                rule("second", 5, Effect::Deny),
                rule("third", 5, Effect::Audit),
            ],
            Vec::new(),
        );
        let compiled = compile(&doc).unwrap();
        let order: Vec<&str> = compiled
            .candidate_rules("Anything")
            .iter()
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(order, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_disabled_rules_are_not_candidates() {
        let mut r = rule("off", 10, Effect::Deny);
        r.enabled = false;
        let doc = document(vec![r, rule("on", 1, Effect::Allow)], Vec::new());
        let compiled = compile(&doc).unwrap();
        let order: Vec<&str> = compiled
            .candidate_rules("Risk")
            .iter()
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(order, vec!["on"]);
    }

    #[test]
    fn test_wildcard_type_is_untyped() {
        let doc = document(vec![typed_rule("star", 1, "*")], Vec::new());
        let compiled = compile(&doc).unwrap();
        assert_eq!(compiled.candidate_rules("Risk").len(), 1);
        assert_eq!(compiled.candidate_rules("Vendor").len(), 1);
    }

    #[test]
    fn test_compilation_is_deterministic() {
        let doc = document(
            vec![
                typed_rule("a", 3, "Risk"),
                rule("b", 3, Effect::Allow),
                typed_rule("c", 7, "Risk"),
            ],
            Vec::new(),
        );
        let first = compile(&doc).unwrap();
        let second = compile(&doc).unwrap();
        let ids = |p: &CompiledPolicy| {
            p.candidate_rules("Risk")
                .iter()
                .map(|r| r.id.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(ids(&first), ids(&second));
        assert_eq!(first.qualified_name(), second.qualified_name());
    }

    #[test]
    fn test_empty_identity_rejected() {
        let mut doc = document(vec![rule("r1", 0, Effect::Allow)], Vec::new());
        doc.metadata.name = String::new();
        assert!(matches!(
            compile(&doc),
            Err(PolicyError::SchemaValidation { .. })
        ));
    }
}
