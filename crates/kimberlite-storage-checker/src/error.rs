//! Error types the verifier facade can actually return.
//!
//! Spec.md ยง7 splits failures into two classes: genuine cross-replica
//! storage divergence (recoverable information the replica runtime acts
//! on) and internal invariant violations (bugs in the verifier or its
//! collaborators, never expected in a correct system). Only the first
//! class is a typed [`VerifierError`]; the second class is a Rust
//! `panic!`/`assert!`, matching `kimberlite-vsr`'s and `kimberlite-sim`'s
//! own convention of asserting rather than propagating a `Result` for
//! "the simulator is in a corrupt state".

use thiserror::Error;

use crate::checkpoint::AreaMismatch;

/// The single recoverable error this crate ever returns: two replicas
/// disagree on the checksum of at least one area for the same event.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VerifierError {
    #[error(
        "storage divergence at checkpoint op {op}: {} area(s) disagree",
        mismatches.len()
    )]
    CheckpointMismatch { op: u64, mismatches: Vec<AreaMismatch> },

    #[error(
        "storage divergence at compaction half-measure {half_measure}: expected {expected:#034x}, got {actual:#034x}"
    )]
    CompactionMismatch {
        half_measure: u64,
        expected: u128,
        actual: u128,
    },
}
