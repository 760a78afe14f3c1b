//! The facade the replica runtime drives: two entry points, one per event
//! class (spec.md ยง4.5, ยง4.6).

use tracing::{error, warn};

use crate::areas::{checksum_client_replies, checksum_grid, checksum_trailer};
use crate::checkpoint::{CheckpointLog, CheckpointRecord};
use crate::compaction::CompactionLog;
use crate::error::VerifierError;
use crate::free_set::FreeSet;
use crate::interfaces::{CheckpointArea, StorageView, WorkingSuperblock};

/// Construction-time knobs for a [`Verifier`] (spec.md ยง6 carries no
/// config surface beyond this; there is deliberately no CLI/env/file
/// layer -- see `DESIGN.md`).
#[derive(Debug, Clone, Copy)]
pub struct VerifierConfig {
    /// Upper bound on grid block addresses, used to size the reused
    /// free-set bitmap once at construction.
    pub grid_blocks_max: u64,
}

impl VerifierConfig {
    /// A config sized for the test doubles in `sim.rs` / `tests/`.
    #[must_use]
    pub fn testing() -> Self {
        Self {
            grid_blocks_max: 4096,
        }
    }
}

impl Default for VerifierConfig {
    fn default() -> Self {
        // A production grid is sized in the hundreds of millions of
        // blocks; callers embedding this crate into a real replica runtime
        // are expected to override this with the runtime's own configured
        // grid size rather than rely on the default.
        Self {
            grid_blocks_max: 1 << 20,
        }
    }
}

/// Whether a manifest-log observation should be trusted (spec.md ยง4.5's
/// manifest pre-acquisition caveat, resolved as policy (b): retire the
/// half-measure check entirely while the manifest log is mid-compaction).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestLogStatus {
    Idle,
    MidCompaction,
}

/// Deterministic cross-replica storage verifier.
///
/// One instance is shared by every replica in a simulation (spec.md ยง5);
/// replicas report their own storage observations at two events --
/// compaction half-measure boundaries and checkpoints -- and the verifier
/// compares them against whichever replica reported first.
pub struct Verifier {
    checkpoint_log: CheckpointLog,
    compaction_log: CompactionLog,
    free_set: FreeSet,
}

impl Verifier {
    #[must_use]
    pub fn new(config: VerifierConfig) -> Self {
        Self {
            checkpoint_log: CheckpointLog::new(),
            compaction_log: CompactionLog::new(),
            free_set: FreeSet::new(config.grid_blocks_max),
        }
    }

    /// Reports one replica's grid snapshot at a compaction half-measure
    /// boundary (spec.md ยง4.5).
    ///
    /// `half_measure` is the boundary's position in the replica's
    /// compaction schedule -- every replica following the same
    /// deterministic schedule reaches the same half-measure index at the
    /// same logical point, making it a valid cross-replica comparison key
    /// even though replicas call this independently rather than in
    /// lockstep.
    ///
    /// Returns `Ok(())` if this replica's grid checksum matches every
    /// other replica that has already reported this half-measure, or is
    /// the first to report it. Skips the check entirely (without error)
    /// when `manifest_log` is mid-compaction, since an in-flight manifest
    /// compaction can make two correct replicas' grids diverge
    /// transiently (spec.md ยง4.5 caveat).
    pub fn on_compaction_half_measure<S: StorageView, B: WorkingSuperblock>(
        &mut self,
        half_measure: u64,
        manifest_log: ManifestLogStatus,
        storage: &S,
        superblock: &B,
    ) -> Result<(), VerifierError> {
        if manifest_log == ManifestLogStatus::MidCompaction {
            return Ok(());
        }

        let result = checksum_grid(storage, superblock, &mut self.free_set);
        assert_eq!(
            result.blocks_missing, 0,
            "half-measure {half_measure}: {} acquired grid block(s) missing from storage",
            result.blocks_missing
        );

        if let Some((expected, actual)) = self
            .compaction_log
            .record_or_compare(half_measure, result.checksum)
        {
            warn!(
                half_measure,
                expected = format!("{expected:#034x}"),
                actual = format!("{actual:#034x}"),
                "storage divergence detected at compaction half-measure"
            );
            return Err(VerifierError::CompactionMismatch {
                half_measure,
                expected,
                actual,
            });
        }
        Ok(())
    }

    /// Reports one replica's full storage observation at a checkpoint
    /// (spec.md ยง4.6).
    ///
    /// The checkpoint `op` is read from the superblock's own
    /// `commit_min()`. A replica that is mid-sync (`sync_op_max() != 0`)
    /// contributes only the three superblock trailer areas when `op` is
    /// already present in the log -- comparison against an established
    /// reference is still meaningful for those three areas. But if `op` is
    /// *absent*, a syncing replica has no deterministic claim on any area,
    /// including the trailers: they may legitimately differ from whatever a
    /// later, non-syncing replica will observe. Such a replica does nothing
    /// at all rather than seed the reference record (spec.md ยง4.6).
    pub fn on_checkpoint<S: StorageView, B: WorkingSuperblock>(
        &mut self,
        storage: &S,
        superblock: &B,
    ) -> Result<(), VerifierError> {
        let op = superblock.commit_min();

        if superblock.sync_op_max() != 0 && !self.checkpoint_log.contains(op) {
            return Ok(());
        }

        let mut observation = CheckpointRecord::new();

        observation.set(
            CheckpointArea::SuperblockManifest,
            checksum_trailer(storage, superblock, CheckpointArea::SuperblockManifest),
        );
        observation.set(
            CheckpointArea::SuperblockFreeSet,
            checksum_trailer(storage, superblock, CheckpointArea::SuperblockFreeSet),
        );
        observation.set(
            CheckpointArea::SuperblockClientSessions,
            checksum_trailer(storage, superblock, CheckpointArea::SuperblockClientSessions),
        );

        if superblock.sync_op_max() == 0 {
            observation.set(
                CheckpointArea::ClientReplies,
                checksum_client_replies(storage, superblock),
            );
            let grid = checksum_grid(storage, superblock, &mut self.free_set);
            if grid.blocks_missing != 0 {
                error!(
                    op,
                    blocks_missing = grid.blocks_missing,
                    "acquired grid block(s) missing from storage at checkpoint"
                );
                panic!("checkpoint op {op}: {} acquired grid block(s) missing from storage", grid.blocks_missing);
            }
            observation.set(CheckpointArea::Grid, grid.checksum);
        }

        let mismatches = self.checkpoint_log.record_or_compare(op, &observation);
        if mismatches.is_empty() {
            Ok(())
        } else {
            for mismatch in &mismatches {
                warn!(
                    op,
                    area = %mismatch.area,
                    expected = format!("{:#034x}", mismatch.expected),
                    actual = format!("{:#034x}", mismatch.actual),
                    "storage divergence detected at checkpoint"
                );
            }
            Err(VerifierError::CheckpointMismatch { op, mismatches })
        }
    }
}
