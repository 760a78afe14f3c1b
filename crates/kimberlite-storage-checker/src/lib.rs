//! Deterministic cross-replica storage verifier.
//!
//! Given two replicas that processed the same sequence of operations, this
//! crate proves (or disproves) that their on-disk images are byte-for-byte
//! identical at two points in a replica's lifecycle: compaction
//! half-measure boundaries and checkpoints. It never writes to storage and
//! never participates in consensus -- it is strictly an oracle that a
//! simulation harness consults after the fact.
//!
//! Rather than a single opaque hash of "all of storage", the verifier
//! breaks the image into five checksummed areas (the superblock's three
//! trailers, the client-replies zone, and the grid) so that a divergence
//! report names which area disagreed instead of just "somewhere".
//!
//! ```
//! use kimberlite_storage_checker::{Verifier, VerifierConfig};
//!
//! let mut verifier = Verifier::new(VerifierConfig::testing());
//! // A real caller reports observations through `on_compaction_half_measure`
//! // and `on_checkpoint`, passing its own `StorageView`/`WorkingSuperblock`
//! // implementations; see the crate's integration tests (built with the
//! // `sim` feature) for worked examples against the in-memory fakes.
//! let _ = verifier;
//! ```

mod areas;
mod checkpoint;
mod checksum;
mod compaction;
mod error;
mod free_set;
mod interfaces;
mod verifier;

#[cfg(feature = "sim")]
pub mod sim;

pub use checkpoint::{AreaMismatch, CheckpointRecord};
pub use checksum::ChecksumStream;
pub use error::VerifierError;
pub use free_set::{FreeSet, FreeSetDecodeError};
pub use interfaces::{header_from_block, CheckpointArea, ClientSessionsTable, Command, Header, StorageView, WorkingSuperblock, HEADER_SIZE};
pub use verifier::{ManifestLogStatus, Verifier, VerifierConfig};
