//! # palisade-policy: Policy documents and the rule compiler
//!
//! A [`PolicyDocument`] is the declarative, versioned unit of policy:
//! prioritized rules with match clauses, conditions, and effects, plus
//! time-bound exceptions, execution settings, and audit configuration.
//! Documents are authored and stored externally (JSON/YAML shaped) and
//! handed to [`compile`], which validates the whole document and produces an
//! immutable, type-indexed [`CompiledPolicy`].
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────┐
//! │  PolicyDocument (raw)        │
//! │  rules / exceptions / config │
//! └─────────────┬────────────────┘
//!               │ compile()
//!               ▼
//! ┌──────────────────────────────┐
//! │  CompiledPolicy (immutable)  │
//! │  ├─ rule id uniqueness       │
//! │  ├─ exception refs resolved  │
//! │  ├─ paths parsed, regexes    │
//! │  │  pre-compiled             │
//! │  └─ rules bucketed by type   │
//! └──────────────────────────────┘
//! ```
//!
//! Validation is all-or-nothing: any schema violation rejects the document
//! wholesale so a broken policy can never partially activate. Compilation is
//! pure and deterministic — compiling the same document twice yields
//! decision-equivalent rule sets.

pub mod compiler;
pub mod document;
pub mod error;

pub use compiler::{CompiledCondition, CompiledPolicy, CompiledRule, compile};
pub use document::{
    AuditConfig, Condition, ConditionOp, ConflictStrategy, ExecutionConfig, MatchConfig, Metadata,
    Mutation, MutationOp, PolicyDocument, PolicyException, PolicyRule, PolicySpec, PrincipalMatch,
    ResourceMatch, SinkConfig, SinkKind, TargetConfig,
};
pub use error::{PolicyError, Result};
