//! # palisade-engine: Decision evaluation for Palisade
//!
//! Evaluates one enforcement request against one compiled policy:
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  RequestContext                              │
//! │  (action, resource, principal, environment)  │
//! └─────────────────┬────────────────────────────┘
//!                   │
//!                   ▼
//! ┌──────────────────────────────────────────────┐
//! │  Decision Engine                             │
//! │  ├─ Match clauses (matcher)                  │
//! │  ├─ When predicates (condition)              │
//! │  ├─ Exception suppression                    │
//! │  ├─ Conflict resolution                      │
//! │  └─ Field mutations (mutation)               │
//! └─────────────────┬────────────────────────────┘
//!                   │
//!                   ▼
//! ┌──────────────────────────────────────────────┐
//! │  Decision (+ possibly rewritten resource)    │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Evaluation is a pure function over an immutable [`CompiledPolicy`] and a
//! per-call [`RequestContext`]: no locks, no shared mutable state, safe for
//! unbounded concurrent invocation. Per-request failures never escape as
//! errors — a bad path or condition degrades to "does not match" and
//! [`evaluate`] always returns a [`Decision`].
//!
//! [`CompiledPolicy`]: palisade_policy::CompiledPolicy

pub mod condition;
pub mod context;
pub mod decision;
pub mod matcher;
pub mod mutation;

pub use context::{Principal, RequestContext};
pub use decision::{Decision, Evaluation, evaluate};
pub use mutation::{MutationOutcome, apply_mutations};
