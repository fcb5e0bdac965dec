//! # palisade-types: Core types for Palisade
//!
//! Shared vocabulary used across the Palisade policy enforcement engine:
//!
//! - Rule effects ([`Effect`]) and severities ([`Severity`])
//! - Enforcement modes ([`EnforcementMode`])
//! - The closed policy value variant ([`Value`])
//! - Dotted field paths ([`FieldPath`])
//!
//! These types are deliberately small and dependency-light: every other
//! Palisade crate builds on them, and the document schema serializes them
//! directly (camelCase on the wire).

pub mod path;
pub mod value;

use serde::{Deserialize, Serialize};

pub use path::{FieldPath, PathError};
pub use value::Value;

// ============================================================================
// Effect
// ============================================================================

/// The effect a policy rule produces when it matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    /// Permit the operation.
    Allow,
    /// Block the operation (in enforce mode).
    Deny,
    /// Permit the operation but flag it for audit review.
    Audit,
    /// Permit the operation after rewriting resource fields.
    Mutate,
}

impl Default for Effect {
    /// Defaults to `Allow`: an empty or non-matching policy must not block
    /// governed writes.
    fn default() -> Self {
        Self::Allow
    }
}

impl std::fmt::Display for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
            Self::Audit => "audit",
            Self::Mutate => "mutate",
        };
        write!(f, "{s}")
    }
}

// ============================================================================
// Severity
// ============================================================================

/// Severity attached to a rule and surfaced on the decision it produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Default for Severity {
    fn default() -> Self {
        Self::Low
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        };
        write!(f, "{s}")
    }
}

// ============================================================================
// Enforcement Mode
// ============================================================================

/// Whether a policy document blocks operations or merely reports on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnforcementMode {
    /// A `deny` decision blocks the governed write.
    Enforce,
    /// Decisions are advisory; callers must not block on them.
    Audit,
}

impl Default for EnforcementMode {
    fn default() -> Self {
        Self::Enforce
    }
}

impl std::fmt::Display for EnforcementMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Enforce => "enforce",
            Self::Audit => "audit",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effect_wire_form_is_lowercase() {
        assert_eq!(serde_json::to_string(&Effect::Deny).unwrap(), "\"deny\"");
        assert_eq!(
            serde_json::from_str::<Effect>("\"mutate\"").unwrap(),
            Effect::Mutate
        );
    }

    #[test]
    fn test_unknown_effect_is_rejected() {
        assert!(serde_json::from_str::<Effect>("\"block\"").is_err());
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn test_defaults_are_permissive() {
        assert_eq!(Effect::default(), Effect::Allow);
        assert_eq!(EnforcementMode::default(), EnforcementMode::Enforce);
        assert_eq!(Severity::default(), Severity::Low);
    }
}
