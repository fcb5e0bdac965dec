//! # Palisade
//!
//! Declarative policy enforcement for governed resources.
//!
//! Every mutating operation on a governed resource passes through
//! [`Palisade::enforce`] before persisting. Versioned policy documents
//! declare prioritized rules with match clauses, conditions, and effects
//! (`allow` / `deny` / `audit` / `mutate`), time-bound exceptions, and audit
//! sinks; the engine compiles each document once into an immutable rule set
//! and produces one [`Decision`] per call.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         Palisade                             │
//! │  ┌──────────┐   ┌───────────┐   ┌──────────┐   ┌──────────┐  │
//! │  │ Compiler │ → │  Matcher  │ → │ Decision │ → │  Audit   │  │
//! │  │ (policy) │   │+Conditions│   │  Engine  │   │ Dispatch │  │
//! │  └──────────┘   └───────────┘   └──────────┘   └──────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```
//! use palisade::{Palisade, Principal, RequestContext};
//! use serde_json::json;
//!
//! let engine = Palisade::new();
//! engine.load_yaml(r#"
//! apiVersion: governance/v1
//! kind: Policy
//! metadata: { name: restricted-data, version: "1" }
//! spec:
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
//! "#).unwrap();
//!
//! let outcome = engine.enforce(RequestContext::new(
//!     "update",
//!     "Risk",
//!     json!({ "id": "risk-1", "labels": { "dataClassification": "restricted" } }),
//!     Principal::new("alice"),
//!     "production",
//! ));
//! assert!(outcome.decision.is_blocking());
//! ```
//!
//! # Concurrency
//!
//! Evaluation is a pure function over an immutable compiled rule set; calls
//! may run unboundedly concurrent with no locks on the hot path. Reloading a
//! document is the only shared-state mutation, done by atomically swapping a
//! registry snapshot — readers always observe a complete, consistent set,
//! and a failed compilation leaves the previous version active.

mod error;
mod palisade;
mod registry;

pub use error::{PalisadeError, Result};
pub use palisade::{Enforcement, Palisade};

// Re-export the evaluation surface
pub use palisade_engine::{Decision, Principal, RequestContext};

// Re-export the document model
pub use palisade_policy::{
    AuditConfig, Condition, ConditionOp, ConflictStrategy, ExecutionConfig, MatchConfig, Metadata,
    Mutation, MutationOp, PolicyDocument, PolicyError, PolicyException, PolicyRule, PolicySpec,
    SinkConfig, SinkKind, TargetConfig,
};

// Re-export core vocabulary
pub use palisade_types::{Effect, EnforcementMode, FieldPath, Severity, Value};

// Re-export audit verification for consumers of emitted records
pub use palisade_audit::{AuditRecord, ChainError, verify_chain};
