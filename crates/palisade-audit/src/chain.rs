//! The audit hash chain.
//!
//! Every emitted record hashes over its predecessor, so a verifier holding
//! a slice of records can prove none were altered, reordered, or dropped
//! from the middle. The chain covers the canonical (key-sorted) decision
//! serialization; mutating any field of any record breaks every later hash.

use palisade_engine::Decision;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::record::{AuditRecord, canonical_json};

/// Hex form of 32 zero bytes; the `prev_hash` of a chain's first record.
pub const GENESIS_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// Errors found while verifying a chain slice.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    /// A record's hash does not cover its contents.
    #[error("record at sequence {sequence} has a hash mismatch")]
    HashMismatch { sequence: u64 },
    /// A record's `prev_hash` does not equal its predecessor's hash.
    #[error("record at sequence {sequence} does not chain to its predecessor")]
    BrokenLink { sequence: u64 },
    /// Sequence numbers are not consecutive.
    #[error("expected sequence {expected}, found {found}")]
    SequenceGap { expected: u64, found: u64 },
}

/// Mutable head of a dispatcher's chain.
#[derive(Debug, Clone)]
pub struct ChainState {
    next_sequence: u64,
    head: String,
}

impl ChainState {
    pub fn new() -> Self {
        Self {
            next_sequence: 0,
            head: GENESIS_HASH.to_string(),
        }
    }

    /// Links `decision` into the chain, advancing the head.
    pub fn append(&mut self, decision: &Decision, retention_days: u32) -> AuditRecord {
        let sequence = self.next_sequence;
        let prev_hash = self.head.clone();
        let record_hash = hash_record(&prev_hash, sequence, decision);

        self.next_sequence += 1;
        self.head = record_hash.clone();

        AuditRecord {
            sequence,
            prev_hash,
            record_hash,
            retention_days,
            decision: decision.clone(),
        }
    }
}

impl Default for ChainState {
    fn default() -> Self {
        Self::new()
    }
}

/// Hashes one record's position: SHA-256 over the previous hash, the
/// sequence number, and the canonical decision serialization.
fn hash_record(prev_hash: &str, sequence: u64, decision: &Decision) -> String {
    let canonical = serde_json::to_value(decision)
        .map(|value| canonical_json(&value))
        .unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(prev_hash.as_bytes());
    hasher.update(sequence.to_be_bytes());
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

/// Verifies a contiguous slice of records.
///
/// The slice may start mid-chain; the first record's `prev_hash` is taken
/// on trust, every later link is checked.
pub fn verify_chain(records: &[AuditRecord]) -> Result<(), ChainError> {
    for (index, record) in records.iter().enumerate() {
        let expected = hash_record(&record.prev_hash, record.sequence, &record.decision);
        if expected != record.record_hash {
            return Err(ChainError::HashMismatch {
                sequence: record.sequence,
            });
        }
        if index > 0 {
            let prev = &records[index - 1];
            let expected_sequence = prev.sequence + 1;
            if record.sequence != expected_sequence {
                return Err(ChainError::SequenceGap {
                    expected: expected_sequence,
                    found: record.sequence,
                });
            }
            if record.prev_hash != prev.record_hash {
                return Err(ChainError::BrokenLink {
                    sequence: record.sequence,
                });
            }
        }
    }
    Ok(())
}
