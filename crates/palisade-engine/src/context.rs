//! Per-request evaluation context.
//!
//! One [`RequestContext`] is built per `enforce` call and discarded with it.
//! The resource is an arbitrary JSON object; the engine never interprets
//! resource-specific semantics, only field values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// The caller on whose behalf the operation runs.
///
/// Populated from the authentication layer at the start of each request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    /// Stable principal id (user, service account).
    pub id: String,
    /// Role names held by the principal.
    #[serde(default)]
    pub roles: Vec<String>,
}

impl Principal {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            roles: Vec::new(),
        }
    }

    /// Adds a role.
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }
}

/// Everything one enforcement call evaluates against.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// The mutating operation being attempted (`create`, `update`, ...).
    pub action: String,
    /// Governed resource type (`Risk`, `Audit`, `Vendor`, ...).
    pub resource_type: String,
    /// The resource about to be persisted, as a JSON object.
    pub resource: serde_json::Value,
    pub principal: Principal,
    /// Deployment environment the operation runs in.
    pub environment: String,
    /// Evaluation instant; drives exception expiry and the decision
    /// timestamp. Defaults to now, injectable for tests.
    pub timestamp: DateTime<Utc>,
}

impl RequestContext {
    pub fn new(
        action: impl Into<String>,
        resource_type: impl Into<String>,
        resource: serde_json::Value,
        principal: Principal,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            action: action.into(),
            resource_type: resource_type.into(),
            resource,
            principal,
            environment: environment.into(),
            timestamp: Utc::now(),
        }
    }

    /// Pins the evaluation instant (exception expiry, decision timestamp).
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// The surrounding context as a JSON object, used as the fallback for
    /// condition paths that do not resolve against the resource.
    pub fn context_value(&self) -> serde_json::Value {
        json!({
            "action": self.action,
            "resourceType": self.resource_type,
            "environment": self.environment,
            "principal": {
                "id": self.principal.id,
                "roles": self.principal.roles,
            },
        })
    }

    /// The resource's `id` field in string form, when present.
    pub fn resource_id(&self) -> Option<String> {
        match self.resource.get("id") {
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(serde_json::Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }

    /// The resource's `name` field, when present.
    pub fn resource_name(&self) -> Option<&str> {
        self.resource.get("name").and_then(serde_json::Value::as_str)
    }

    /// The resource's `labels` map, when present.
    pub fn resource_label(&self, key: &str) -> Option<&str> {
        self.resource
            .get("labels")
            .and_then(|labels| labels.get(key))
            .and_then(serde_json::Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context() -> RequestContext {
        RequestContext::new(
            "update",
            "Risk",
            json!({
                "id": "risk-7",
                "name": "vendor-breach",
                "labels": { "dataClassification": "restricted" }
            }),
            Principal::new("alice").with_role("Analyst"),
            "production",
        )
    }

    #[test]
    fn test_context_value_shape() {
        let ctx = context();
        let value = ctx.context_value();
        assert_eq!(value["action"], json!("update"));
        assert_eq!(value["resourceType"], json!("Risk"));
        assert_eq!(value["principal"]["roles"], json!(["Analyst"]));
        assert_eq!(value["environment"], json!("production"));
    }

    #[test]
    fn test_resource_accessors() {
        let ctx = context();
        assert_eq!(ctx.resource_id().as_deref(), Some("risk-7"));
        assert_eq!(ctx.resource_name(), Some("vendor-breach"));
        assert_eq!(ctx.resource_label("dataClassification"), Some("restricted"));
        assert_eq!(ctx.resource_label("missing"), None);
    }

    #[test]
    fn test_numeric_resource_id() {
        let ctx = RequestContext::new(
            "create",
            "Audit",
            json!({ "id": 42 }),
            Principal::new("svc"),
            "staging",
        );
        assert_eq!(ctx.resource_id().as_deref(), Some("42"));
    }
}
