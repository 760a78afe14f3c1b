//! In-memory test doubles for [`crate::interfaces::StorageView`] and
//! friends, modeled on `kimberlite-sim`'s `SimStorage`: plain `HashMap`-
//! backed fakes with fluent builder methods, no latency or fault
//! injection of their own (that belongs to the simulator driving the
//! replica under test, not to this crate's tests).
//!
//! Gated behind the `sim` feature so production consumers of this crate
//! never pull in a fake storage engine.

use std::collections::HashMap;

use crate::interfaces::{CheckpointArea, ClientSessionsTable, Header, StorageView, WorkingSuperblock};

/// An in-memory storage image: grid blocks, redundant trailer copies, and
/// client-reply slots, addressed exactly as the real storage engine would.
#[derive(Debug, Default, Clone)]
pub struct FakeStorageView {
    grid_blocks: HashMap<u64, Vec<u8>>,
    trailer_copies: HashMap<(CheckpointArea, u8), Vec<u8>>,
    client_reply_slots: HashMap<usize, Vec<u8>>,
}

impl FakeStorageView {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_grid_block(mut self, address: u64, bytes: Vec<u8>) -> Self {
        self.grid_blocks.insert(address, bytes);
        self
    }

    #[must_use]
    pub fn with_trailer_copy(mut self, area: CheckpointArea, copy: u8, bytes: Vec<u8>) -> Self {
        self.trailer_copies.insert((area, copy), bytes);
        self
    }

    /// Writes the same bytes to every copy `0..copies`, the common case of
    /// a replica that has not corrupted any of its redundant trailers.
    #[must_use]
    pub fn with_trailer(mut self, area: CheckpointArea, copies: u8, bytes: Vec<u8>) -> Self {
        for copy in 0..copies {
            self.trailer_copies.insert((area, copy), bytes.clone());
        }
        self
    }

    #[must_use]
    pub fn with_client_reply_slot(mut self, slot: usize, bytes: Vec<u8>) -> Self {
        self.client_reply_slots.insert(slot, bytes);
        self
    }
}

impl StorageView for FakeStorageView {
    fn grid_block(&self, address: u64) -> Option<&[u8]> {
        self.grid_blocks.get(&address).map(Vec::as_slice)
    }

    fn trailer_copy(&self, area: CheckpointArea, copy: u8) -> &[u8] {
        self.trailer_copies
            .get(&(area, copy))
            .unwrap_or_else(|| panic!("no trailer copy {copy} of area {area} set up in FakeStorageView"))
    }

    fn client_reply_slot(&self, slot: usize) -> &[u8] {
        self.client_reply_slots
            .get(&slot)
            .unwrap_or_else(|| panic!("no client reply slot {slot} set up in FakeStorageView"))
    }
}

/// An in-memory client-sessions table.
#[derive(Debug, Default, Clone)]
pub struct FakeClientSessionsTable {
    slots: Vec<(u64, Option<Header>)>,
}

impl FakeClientSessionsTable {
    #[must_use]
    pub fn new(slot_count: usize) -> Self {
        Self {
            slots: vec![(0, None); slot_count],
        }
    }

    #[must_use]
    pub fn with_session(mut self, slot: usize, session_id: u64, reply_header: Header) -> Self {
        self.slots[slot] = (session_id, Some(reply_header));
        self
    }
}

impl ClientSessionsTable for FakeClientSessionsTable {
    fn slot_count(&self) -> usize {
        self.slots.len()
    }

    fn session_id(&self, slot: usize) -> u64 {
        self.slots[slot].0
    }

    fn reply_header(&self, slot: usize) -> Header {
        self.slots[slot]
            .1
            .unwrap_or_else(|| panic!("slot {slot} has no reply header but was asked for one"))
    }
}

/// An in-memory working superblock.
#[derive(Debug, Clone)]
pub struct FakeSuperblock {
    commit_min: u64,
    sync_op_max: u64,
    superblock_copies: u8,
    trailer_sizes: HashMap<CheckpointArea, u32>,
    trailer_checksums: HashMap<CheckpointArea, u128>,
    client_sessions: FakeClientSessionsTable,
}

impl FakeSuperblock {
    #[must_use]
    pub fn new(client_sessions: FakeClientSessionsTable) -> Self {
        Self {
            commit_min: 0,
            sync_op_max: 0,
            superblock_copies: 1,
            trailer_sizes: HashMap::new(),
            trailer_checksums: HashMap::new(),
            client_sessions,
        }
    }

    #[must_use]
    pub fn with_commit_min(mut self, commit_min: u64) -> Self {
        self.commit_min = commit_min;
        self
    }

    #[must_use]
    pub fn with_sync_op_max(mut self, sync_op_max: u64) -> Self {
        self.sync_op_max = sync_op_max;
        self
    }

    #[must_use]
    pub fn with_superblock_copies(mut self, copies: u8) -> Self {
        self.superblock_copies = copies;
        self
    }

    #[must_use]
    pub fn with_trailer(mut self, area: CheckpointArea, size: u32, checksum: u128) -> Self {
        self.trailer_sizes.insert(area, size);
        self.trailer_checksums.insert(area, checksum);
        self
    }
}

impl WorkingSuperblock for FakeSuperblock {
    fn commit_min(&self) -> u64 {
        self.commit_min
    }

    fn sync_op_max(&self) -> u64 {
        self.sync_op_max
    }

    fn trailer_size(&self, area: CheckpointArea) -> u32 {
        self.trailer_sizes
            .get(&area)
            .copied()
            .unwrap_or_else(|| panic!("no trailer size set up for area {area}"))
    }

    fn trailer_checksum(&self, area: CheckpointArea) -> u128 {
        self.trailer_checksums
            .get(&area)
            .copied()
            .unwrap_or_else(|| panic!("no trailer checksum set up for area {area}"))
    }

    fn free_set_size(&self) -> u32 {
        self.trailer_size(CheckpointArea::SuperblockFreeSet)
    }

    fn free_set_checksum(&self) -> u128 {
        self.trailer_checksum(CheckpointArea::SuperblockFreeSet)
    }

    fn superblock_copies(&self) -> u8 {
        self.superblock_copies
    }

    fn client_sessions(&self) -> &dyn ClientSessionsTable {
        &self.client_sessions
    }
}
