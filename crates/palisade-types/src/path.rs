//! Dotted field paths.
//!
//! Paths address fields inside a governed resource (`labels.owner`,
//! `status.phase`) or the surrounding request context (`action`,
//! `principal.roles`). They are parsed once at document compile time; the
//! evaluation path only walks pre-split segments.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error produced when parsing a field path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// The path string was empty.
    #[error("field path is empty")]
    Empty,
    /// A dot-separated segment was empty (e.g. `labels..owner`).
    #[error("field path '{path}' contains an empty segment")]
    EmptySegment { path: String },
}

/// A parsed dotted field path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    /// Parses a dotted path. Rejects empty paths and empty segments.
    pub fn parse(path: &str) -> Result<Self, PathError> {
        if path.is_empty() {
            return Err(PathError::Empty);
        }
        let segments: Vec<String> = path.split('.').map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(PathError::EmptySegment {
                path: path.to_string(),
            });
        }
        Ok(Self { segments })
    }

    /// The path segments in order.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The first segment (always present for a parsed path).
    pub fn root(&self) -> &str {
        &self.segments[0]
    }

    /// Resolves this path against a JSON value, walking object keys.
    ///
    /// Returns `None` when any segment is missing or an intermediate value is
    /// not an object. Resolution never fails loudly; an unresolved path is
    /// simply absent.
    pub fn resolve<'a>(&self, value: &'a serde_json::Value) -> Option<&'a serde_json::Value> {
        let mut current = value;
        for segment in &self.segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }
}

impl TryFrom<String> for FieldPath {
    type Error = PathError;

    fn try_from(s: String) -> Result<Self, PathError> {
        Self::parse(&s)
    }
}

impl From<FieldPath> for String {
    fn from(path: FieldPath) -> Self {
        path.to_string()
    }
}

impl std::fmt::Display for FieldPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_rejects_malformed_paths() {
        assert_eq!(FieldPath::parse(""), Err(PathError::Empty));
        assert!(matches!(
            FieldPath::parse("labels..owner"),
            Err(PathError::EmptySegment { .. })
        ));
        assert!(matches!(
            FieldPath::parse(".leading"),
            Err(PathError::EmptySegment { .. })
        ));
    }

    #[test]
    fn test_resolve_nested() {
        let resource = json!({
            "labels": { "dataClassification": "restricted" },
            "status": { "phase": "Open" }
        });
        let path = FieldPath::parse("labels.dataClassification").unwrap();
        assert_eq!(path.resolve(&resource), Some(&json!("restricted")));
    }

    #[test]
    fn test_resolve_absent_is_none() {
        let resource = json!({ "labels": { "owner": "alice" } });
        assert_eq!(
            FieldPath::parse("labels.missing").unwrap().resolve(&resource),
            None
        );
        // Intermediate non-object: absent, not an error.
        assert_eq!(
            FieldPath::parse("labels.owner.x").unwrap().resolve(&resource),
            None
        );
    }

    #[test]
    fn test_display_round_trip() {
        let path = FieldPath::parse("spec.owner.email").unwrap();
        assert_eq!(path.to_string(), "spec.owner.email");
        assert_eq!(path.segments().len(), 3);
        assert_eq!(path.root(), "spec");
    }
}
