//! Match-clause evaluation.
//!
//! Decides whether a rule's (or exception's) `match` clause applies to a
//! request. Matching is deliberately strict and cheap:
//!
//! - resource type: exact equality (`"*"` / omitted matches any)
//! - resource name: `"*"` or exact string equality — no partial globs
//! - resource labels: every declared label must be present with an equal
//!   value; the resource may carry extra labels
//! - principal id: exact equality when set
//! - principal roles: at least one overlapping role when non-empty
//! - environment: `"*"` or exact equality

use palisade_policy::{MatchConfig, PrincipalMatch, ResourceMatch};

use crate::context::RequestContext;

/// Whether `clause` applies to the request. Omitted sub-clauses match
/// everything, so an empty clause matches every request.
pub fn matches(clause: &MatchConfig, ctx: &RequestContext) -> bool {
    resource_matches(clause.resource.as_ref(), ctx)
        && principal_matches(clause.principal.as_ref(), ctx)
        && environment_matches(clause.environment.as_deref(), &ctx.environment)
}

fn resource_matches(clause: Option<&ResourceMatch>, ctx: &RequestContext) -> bool {
    let Some(clause) = clause else {
        return true;
    };

    if let Some(expected) = clause.resource_type.as_deref() {
        if expected != "*" && expected != ctx.resource_type {
            return false;
        }
    }

    if let Some(expected) = clause.name.as_deref() {
        if expected != "*" && ctx.resource_name() != Some(expected) {
            return false;
        }
    }

    // AND across declared labels; extras on the resource are fine.
    clause
        .labels
        .iter()
        .all(|(key, value)| ctx.resource_label(key) == Some(value.as_str()))
}

fn principal_matches(clause: Option<&PrincipalMatch>, ctx: &RequestContext) -> bool {
    let Some(clause) = clause else {
        return true;
    };

    if let Some(expected) = clause.id.as_deref() {
        if expected != ctx.principal.id {
            return false;
        }
    }

    // OR across roles: one overlap is enough.
    clause.roles.is_empty()
        || clause
            .roles
            .iter()
            .any(|role| ctx.principal.roles.iter().any(|held| held == role))
}

fn environment_matches(clause: Option<&str>, environment: &str) -> bool {
    match clause {
        None | Some("*") => true,
        Some(expected) => expected == environment,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Principal;
    use serde_json::json;

    fn ctx() -> RequestContext {
        RequestContext::new(
            "update",
            "Risk",
            json!({
                "name": "vendor-breach",
                "labels": { "dataClassification": "restricted", "team": "grc" }
            }),
            Principal::new("alice").with_role("Analyst").with_role("Owner"),
            "production",
        )
    }

    fn clause(raw: serde_json::Value) -> MatchConfig {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn test_empty_clause_matches_everything() {
        assert!(matches(&MatchConfig::default(), &ctx()));
    }

    #[test]
    fn test_resource_type_exact() {
        assert!(matches(&clause(json!({"resource": {"type": "Risk"}})), &ctx()));
        assert!(!matches(&clause(json!({"resource": {"type": "Audit"}})), &ctx()));
        assert!(matches(&clause(json!({"resource": {"type": "*"}})), &ctx()));
    }

    #[test]
    fn test_resource_name_star_or_exact() {
        assert!(matches(&clause(json!({"resource": {"name": "*"}})), &ctx()));
        assert!(matches(
            &clause(json!({"resource": {"name": "vendor-breach"}})),
            &ctx()
        ));
        // No partial globs.
        assert!(!matches(&clause(json!({"resource": {"name": "vendor-*"}})), &ctx()));
    }

    #[test]
    fn test_labels_are_a_subset_match() {
        assert!(matches(
            &clause(json!({"resource": {"labels": {"dataClassification": "restricted"}}})),
            &ctx()
        ));
        // All declared labels must match.
        assert!(!matches(
            &clause(json!({"resource": {"labels": {
                "dataClassification": "restricted",
                "team": "finance"
            }}})),
            &ctx()
        ));
        // Declared label missing on the resource.
        assert!(!matches(
            &clause(json!({"resource": {"labels": {"region": "eu"}}})),
            &ctx()
        ));
    }

    #[test]
    fn test_principal_id_and_roles() {
        assert!(matches(&clause(json!({"principal": {"id": "alice"}})), &ctx()));
        assert!(!matches(&clause(json!({"principal": {"id": "bob"}})), &ctx()));

        // One overlapping role is enough.
        assert!(matches(
            &clause(json!({"principal": {"roles": ["Admin", "Owner"]}})),
            &ctx()
        ));
        assert!(!matches(
            &clause(json!({"principal": {"roles": ["Admin"]}})),
            &ctx()
        ));
    }

    #[test]
    fn test_environment() {
        assert!(matches(&clause(json!({"environment": "*"})), &ctx()));
        assert!(matches(&clause(json!({"environment": "production"})), &ctx()));
        assert!(!matches(&clause(json!({"environment": "staging"})), &ctx()));
    }

    #[test]
    fn test_resource_without_labels_field() {
        let ctx = RequestContext::new(
            "create",
            "Risk",
            json!({ "name": "bare" }),
            Principal::new("alice"),
            "production",
        );
        assert!(!matches(
            &clause(json!({"resource": {"labels": {"tier": "gold"}}})),
            &ctx
        ));
    }
}
