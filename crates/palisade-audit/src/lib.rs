//! # palisade-audit: Decision audit dispatch
//!
//! Delivers every [`Decision`] to the sinks a policy document configures,
//! without ever adding failure risk to the governed operation:
//!
//! - `stdout` / `file` — synchronous, best-effort; local failures are logged
//!   and never propagated to the caller.
//! - `http` — fire-and-forget on a dedicated worker thread with bounded
//!   retry (3 attempts, exponential backoff); exhausted deliveries are
//!   dropped and counted.
//!
//! Records are serialized canonically (object keys sorted) so audit output
//! is reproducible across runs, and every record carries a position in a
//! SHA-256 hash chain, making the emitted log tamper-evident: altering any
//! record breaks verification of every later one.
//!
//! [`Decision`]: palisade_engine::Decision

pub mod chain;
pub mod dispatcher;
pub mod record;
pub mod sink;

pub use chain::{ChainError, verify_chain};
pub use dispatcher::AuditDispatcher;
pub use record::AuditRecord;
pub use sink::{DecisionSink, FileSink, HttpSink, SinkError, StdoutSink};
