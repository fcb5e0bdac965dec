//! Top-level error types.

use thiserror::Error;

/// Errors surfaced to the administrative collaborator on document load.
///
/// Per-request evaluation never produces these: `enforce` always returns a
/// decision, so one bad rule cannot break unrelated operations.
#[derive(Debug, Error)]
pub enum PalisadeError {
    /// The document parsed but failed validation; it was rejected wholesale
    /// and any previously active version stays in force.
    #[error(transparent)]
    Policy(#[from] palisade_policy::PolicyError),

    /// The raw document is not valid JSON.
    #[error("malformed JSON policy document: {0}")]
    Json(#[from] serde_json::Error),

    /// The raw document is not valid YAML.
    #[error("malformed YAML policy document: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type for document loading.
pub type Result<T> = std::result::Result<T, PalisadeError>;
