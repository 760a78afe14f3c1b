//! Per-operation checkpoint records and the first-writer-wins oracle that
//! compares them across replicas.

use std::collections::HashMap;

use crate::interfaces::CheckpointArea;

/// One replica's observed checksums for a single checkpoint `op`, one slot
/// per [`CheckpointArea`].
///
/// `client_replies` and `grid` are only populated when the observing
/// replica is not mid-sync (spec.md ยง4.6: `sync_op_max == 0`); a replica
/// that is mid-sync contributes the three superblock-trailer areas only,
/// leaving the remaining two `None` rather than a placeholder zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckpointRecord {
    manifest: Option<u128>,
    free_set: Option<u128>,
    client_sessions: Option<u128>,
    client_replies: Option<u128>,
    grid: Option<u128>,
}

impl CheckpointRecord {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, area: CheckpointArea) -> Option<u128> {
        match area {
            CheckpointArea::SuperblockManifest => self.manifest,
            CheckpointArea::SuperblockFreeSet => self.free_set,
            CheckpointArea::SuperblockClientSessions => self.client_sessions,
            CheckpointArea::ClientReplies => self.client_replies,
            CheckpointArea::Grid => self.grid,
        }
    }

    pub fn set(&mut self, area: CheckpointArea, checksum: u128) {
        let slot = match area {
            CheckpointArea::SuperblockManifest => &mut self.manifest,
            CheckpointArea::SuperblockFreeSet => &mut self.free_set,
            CheckpointArea::SuperblockClientSessions => &mut self.client_sessions,
            CheckpointArea::ClientReplies => &mut self.client_replies,
            CheckpointArea::Grid => &mut self.grid,
        };
        *slot = Some(checksum);
    }
}

/// A single area where two replicas' recorded checksums for the same `op`
/// disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AreaMismatch {
    pub area: CheckpointArea,
    pub expected: u128,
    pub actual: u128,
}

/// First-writer-wins oracle keyed by checkpoint `op`.
///
/// The first replica to report a checksum for a given `(op, area)` pair
/// establishes the expected value; every subsequent report for that pair
/// is compared against it rather than overwriting it (spec.md ยง4.6:
/// "whichever replica observes a given op first defines truth for it").
#[derive(Debug, Default)]
pub struct CheckpointLog {
    records: HashMap<u64, CheckpointRecord>,
}

impl CheckpointLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `op` already has a recorded reference entry, of any
    /// completeness.
    ///
    /// A mid-sync replica that is first to reach an `op` has no
    /// deterministic claim on *any* area, including the three superblock
    /// trailers (spec.md ยง4.6) -- callers use this to decide whether to
    /// skip `record_or_compare` entirely rather than letting a syncing
    /// observation seed the reference record.
    #[must_use]
    pub fn contains(&self, op: u64) -> bool {
        self.records.contains_key(&op)
    }

    /// Compares `observation` against whatever has already been recorded
    /// for `op`, recording any area not yet seen. Returns every area where
    /// the newly observed checksum disagrees with the previously recorded
    /// one; an empty vector means the observation is fully consistent with
    /// prior replicas (or is the first to report `op` at all).
    pub fn record_or_compare(&mut self, op: u64, observation: &CheckpointRecord) -> Vec<AreaMismatch> {
        let existing = self.records.entry(op).or_default();
        let mut mismatches = Vec::new();
        for area in CheckpointArea::ALL {
            let Some(observed) = observation.get(area) else {
                continue;
            };
            match existing.get(area) {
                Some(expected) if expected != observed => {
                    mismatches.push(AreaMismatch {
                        area,
                        expected,
                        actual: observed,
                    });
                }
                Some(_) => {}
                None => existing.set(area, observed),
            }
        }
        mismatches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(values: &[(CheckpointArea, u128)]) -> CheckpointRecord {
        let mut record = CheckpointRecord::new();
        for &(area, checksum) in values {
            record.set(area, checksum);
        }
        record
    }

    #[test]
    fn first_observation_always_matches() {
        let mut log = CheckpointLog::new();
        let observation = record(&[(CheckpointArea::Grid, 42)]);
        assert!(log.record_or_compare(7, &observation).is_empty());
    }

    #[test]
    fn second_matching_observation_is_clean() {
        let mut log = CheckpointLog::new();
        let observation = record(&[(CheckpointArea::Grid, 42)]);
        log.record_or_compare(7, &observation);
        assert!(log.record_or_compare(7, &observation).is_empty());
    }

    #[test]
    fn diverging_observation_is_reported() {
        let mut log = CheckpointLog::new();
        log.record_or_compare(7, &record(&[(CheckpointArea::Grid, 42)]));
        let mismatches = log.record_or_compare(7, &record(&[(CheckpointArea::Grid, 43)]));
        assert_eq!(
            mismatches,
            vec![AreaMismatch {
                area: CheckpointArea::Grid,
                expected: 42,
                actual: 43,
            }]
        );
    }

    #[test]
    fn mid_sync_replica_contributes_only_trailer_areas() {
        let mut log = CheckpointLog::new();
        let full = record(&[
            (CheckpointArea::SuperblockManifest, 1),
            (CheckpointArea::ClientReplies, 2),
            (CheckpointArea::Grid, 3),
        ]);
        log.record_or_compare(9, &full);

        let partial = record(&[(CheckpointArea::SuperblockManifest, 1)]);
        assert!(log.record_or_compare(9, &partial).is_empty());
    }

    #[test]
    fn contains_reflects_whether_an_op_has_been_recorded() {
        let mut log = CheckpointLog::new();
        assert!(!log.contains(7));
        log.record_or_compare(7, &record(&[(CheckpointArea::Grid, 42)]));
        assert!(log.contains(7));
        assert!(!log.contains(8));
    }

    #[test]
    fn independent_ops_do_not_interfere() {
        let mut log = CheckpointLog::new();
        log.record_or_compare(1, &record(&[(CheckpointArea::Grid, 5)]));
        assert!(log
            .record_or_compare(2, &record(&[(CheckpointArea::Grid, 6)]))
            .is_empty());
    }
}
