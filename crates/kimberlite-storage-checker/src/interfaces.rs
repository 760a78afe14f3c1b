//! External collaborators the verifier consumes but does not implement.
//!
//! In the real system these traits are implemented by the simulated block
//! device, the superblock parser, and the LSM schema module (spec.md ยง6 /
//! SPEC_FULL.md ยง6). None of those are this crate's concern; the verifier
//! only needs a narrow read-only view onto them. Production call sites pass
//! thin adapters over the real types; tests pass the `sim` feature's fakes
//! (see `sim.rs`).

/// Read-only access to simulated block storage.
///
/// Mirrors `kimberlite-sim`'s `SimStorage` read path, minus the latency and
/// fault-injection machinery that module needs for its own purposes -- the
/// verifier only ever reads committed, already-fsynced bytes.
pub trait StorageView {
    /// Resolves an acquired grid block to its on-device bytes.
    ///
    /// Returns `None` if the address is not mapped -- this is never an error
    /// by itself; the caller counts misses and asserts only if any remain
    /// acquired-but-unmapped once every bit has been visited (spec.md ยง4.2
    /// step 4).
    fn grid_block(&self, address: u64) -> Option<&[u8]>;

    /// Resolves one of the redundant on-device copies of a superblock
    /// trailer area.
    fn trailer_copy(&self, area: CheckpointArea, copy: u8) -> &[u8];

    /// Resolves a client-session slot to its reply-zone byte range.
    fn client_reply_slot(&self, slot: usize) -> &[u8];
}

/// The currently-installed superblock record (spec.md ยง6).
pub trait WorkingSuperblock {
    /// The checkpoint operation number (`vsr_state.commit_min`).
    fn commit_min(&self) -> u64;

    /// Nonzero iff this replica is mid-sync (`vsr_state.sync_op_max`).
    fn sync_op_max(&self) -> u64;

    /// Declared byte length of a trailer area (same for every redundant
    /// copy).
    fn trailer_size(&self, area: CheckpointArea) -> u32;

    /// The trailer's declared 128-bit checksum, as computed when the
    /// trailer was last written.
    fn trailer_checksum(&self, area: CheckpointArea) -> u128;

    /// Declared byte length of the free-set trailer specifically --
    /// equivalent to `trailer_size(CheckpointArea::SuperblockFreeSet)` but
    /// kept as its own accessor to mirror the superblock module's own
    /// naming (`free_set_size`).
    fn free_set_size(&self) -> u32;

    /// The free-set trailer's declared checksum -- equivalent to
    /// `trailer_checksum(CheckpointArea::SuperblockFreeSet)`.
    fn free_set_checksum(&self) -> u128;

    /// Number of redundant on-disk copies of every trailer area.
    fn superblock_copies(&self) -> u8;

    /// The client-sessions table backing `client_replies` checksumming.
    fn client_sessions(&self) -> &dyn ClientSessionsTable;
}

/// The client-sessions table consulted by the `client_replies` checksummer.
pub trait ClientSessionsTable {
    /// Total number of fixed slots in the table.
    fn slot_count(&self) -> usize;

    /// The client (session) identifier occupying a slot, or 0 if vacant.
    fn session_id(&self, slot: usize) -> u64;

    /// The reply header cached for a slot. Only meaningful when
    /// `session_id(slot) != 0`.
    fn reply_header(&self, slot: usize) -> Header;
}

/// The five checksummed checkpoint areas (spec.md ยง3). A closed,
/// exhaustive set -- adding a sixth area is a matter of extending
/// [`CheckpointArea::ALL`] and this enum, with every match downstream
/// either exhaustive (and so forced to handle it) or using `get`/`set`
/// helpers that need no change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckpointArea {
    SuperblockManifest,
    SuperblockFreeSet,
    SuperblockClientSessions,
    ClientReplies,
    Grid,
}

impl CheckpointArea {
    /// All five areas, in a stable, arbitrary order used for iteration and
    /// logging.
    pub const ALL: [CheckpointArea; 5] = [
        CheckpointArea::SuperblockManifest,
        CheckpointArea::SuperblockFreeSet,
        CheckpointArea::SuperblockClientSessions,
        CheckpointArea::ClientReplies,
        CheckpointArea::Grid,
    ];

    /// Whether this area is one of the three superblock trailers (as
    /// opposed to `client_replies` or `grid`, which are computed over the
    /// wider storage image rather than a trailer).
    pub const fn is_trailer(self) -> bool {
        matches!(
            self,
            CheckpointArea::SuperblockManifest
                | CheckpointArea::SuperblockFreeSet
                | CheckpointArea::SuperblockClientSessions
        )
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            CheckpointArea::SuperblockManifest => "superblock_manifest",
            CheckpointArea::SuperblockFreeSet => "superblock_free_set",
            CheckpointArea::SuperblockClientSessions => "superblock_client_sessions",
            CheckpointArea::ClientReplies => "client_replies",
            CheckpointArea::Grid => "grid",
        }
    }
}

impl std::fmt::Display for CheckpointArea {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire command tag for a decoded block/reply header.
///
/// The schema module's real command set is much larger; the verifier only
/// ever needs to distinguish "reply" headers in the client-sessions table
/// from everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Reply,
    Other(u8),
}

/// A decoded block or reply header (spec.md ยง6: `header_from_block`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// The operation number this header claims -- for grid blocks, must
    /// equal the block's acquired address (spec.md ยง4.2 step 4).
    pub op: u64,
    /// The logically-stored size in bytes: header plus payload, excluding
    /// any sector-alignment padding.
    pub size: u32,
    pub command: Command,
}

/// Size in bytes of a header with no payload (spec.md ยง4.4: "the
/// header-only size").
pub const HEADER_SIZE: u32 = 128;

/// Decodes a block (or client-reply slot) header from its leading bytes.
///
/// Layout: 8-byte little-endian `op`, 4-byte little-endian `size`, 1-byte
/// command tag, zero-padded to [`HEADER_SIZE`]. This is the verifier's own
/// minimal stand-in for the schema module's real header codec (spec.md ยง6);
/// production call sites decode through the real schema module instead.
pub fn header_from_block(view: &[u8]) -> Header {
    assert!(
        view.len() >= HEADER_SIZE as usize,
        "block view shorter than header size: {} < {HEADER_SIZE}",
        view.len()
    );
    let op = u64::from_le_bytes(view[0..8].try_into().expect("8 bytes"));
    let size = u32::from_le_bytes(view[8..12].try_into().expect("4 bytes"));
    let command = match view[12] {
        1 => Command::Reply,
        other => Command::Other(other),
    };
    Header { op, size, command }
}
