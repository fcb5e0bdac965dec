//! Policy compilation error types.

use thiserror::Error;

/// Errors produced while validating and compiling a policy document.
///
/// Every variant rejects the whole document: the engine never activates a
/// partially valid policy, and a failed reload leaves the previous version
/// active.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// The document violates the schema in a way serde cannot catch
    /// (missing identity fields, duplicate exception ids, ...).
    #[error("schema validation failed: {reason}")]
    SchemaValidation { reason: String },

    /// Two rules share an id. Rule ids must be unique within a document.
    #[error("duplicate rule id '{id}'")]
    DuplicateRuleId { id: String },

    /// An exception references rule ids that do not exist in the document.
    #[error("exception '{exception_id}' references unknown rule ids: {}", unknown.join(", "))]
    UnknownExceptionRuleIds {
        exception_id: String,
        unknown: Vec<String>,
    },

    /// A mutation path failed to parse.
    #[error("rule '{rule_id}' has malformed mutation path '{path}': {source}")]
    InvalidMutationPath {
        rule_id: String,
        path: String,
        source: palisade_types::PathError,
    },

    /// A `matches`/`notMatches` condition carries an invalid regular
    /// expression. Patterns are compiled here so the evaluation path never
    /// has to fail.
    #[error("rule '{rule_id}' has invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        rule_id: String,
        pattern: String,
        source: regex::Error,
    },
}

/// Result type for policy compilation.
pub type Result<T> = std::result::Result<T, PolicyError>;
