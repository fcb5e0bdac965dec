//! The audit dispatcher.
//!
//! Owns the sinks a policy document configures and the hash chain over
//! everything it emits. Dispatch never fails the caller: sink errors are
//! logged and counted, nothing propagates.

use std::sync::Mutex;

use palisade_engine::Decision;
use palisade_policy::{AuditConfig, SinkKind};

use crate::chain::ChainState;
use crate::sink::{DecisionSink, FileSink, HttpSink, StdoutSink};

/// Serializes decisions into chained records and fans them out to sinks.
pub struct AuditDispatcher {
    log_decisions: bool,
    retention_days: u32,
    sinks: Vec<Box<dyn DecisionSink>>,
    /// Chain sequencing is the only shared state; it is touched after the
    /// decision is already complete, off the pure evaluation path.
    chain: Mutex<ChainState>,
}

impl AuditDispatcher {
    /// Builds a dispatcher from a document's audit configuration.
    ///
    /// Misconfigured sinks (a `file` sink without a path, an `http` sink
    /// without a URL) are skipped with a warning rather than rejected: audit
    /// configuration must never block policy activation.
    pub fn from_config(config: &AuditConfig) -> Self {
        let mut sinks: Vec<Box<dyn DecisionSink>> = Vec::new();
        for sink in &config.sinks {
            match sink.kind {
                SinkKind::Stdout => sinks.push(Box::new(StdoutSink)),
                SinkKind::File => match sink.path.as_ref() {
                    Some(path) => sinks.push(Box::new(FileSink::new(path))),
                    None => {
                        tracing::warn!("file audit sink without a path; skipping");
                    }
                },
                SinkKind::Http => match sink.url.as_ref() {
                    Some(url) => sinks.push(Box::new(HttpSink::new(url, &sink.headers))),
                    None => {
                        tracing::warn!("http audit sink without a url; skipping");
                    }
                },
            }
        }

        Self {
            log_decisions: config.log_decisions,
            retention_days: config.retention_days,
            sinks,
            chain: Mutex::new(ChainState::new()),
        }
    }

    /// A dispatcher that logs nothing (for documents with auditing off).
    pub fn disabled() -> Self {
        Self {
            log_decisions: false,
            retention_days: 0,
            sinks: Vec::new(),
            chain: Mutex::new(ChainState::new()),
        }
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Records one decision to every configured sink, independently.
    ///
    /// Best-effort by contract: a sink failure is logged and the remaining
    /// sinks still receive the record. The caller's write path is never
    /// affected.
    pub fn dispatch(&self, decision: &Decision) {
        if !self.log_decisions {
            return;
        }

        let record = {
            let mut chain = self
                .chain
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            chain.append(decision, self.retention_days)
        };

        for sink in &self.sinks {
            if let Err(err) = sink.deliver(&record) {
                tracing::warn!(
                    sink = sink.name(),
                    request_id = %decision.request_id,
                    error = %err,
                    "audit sink delivery failed"
                );
            }
        }
    }
}

impl std::fmt::Debug for AuditDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditDispatcher")
            .field("log_decisions", &self.log_decisions)
            .field("retention_days", &self.retention_days)
            .field("sinks", &self.sinks.len())
            .finish_non_exhaustive()
    }
}
