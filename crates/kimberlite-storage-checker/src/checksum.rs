//! Incremental, order-sensitive 128-bit checksum accumulator.
//!
//! Every area checksummer in this crate builds its digest through a
//! `ChecksumStream` rather than hashing a pre-assembled buffer, so that
//! streaming callers (the grid checksummer walks one block at a time) never
//! need to materialize the full area in memory.

/// Accumulates bytes into a single 128-bit digest.
///
/// Backed by BLAKE3 -- the workspace's standard content hash (see
/// `kimberlite-crypto`'s `verified::blake3` module) -- truncated to its low
/// 128 bits. Every call to [`ChecksumStream::add`] mixes in the length of
/// the slice ahead of its bytes, so `add(a); add(b)` and
/// `add(concat(a, b))` diverge whenever the a/b boundary is ambiguous (the
/// classic hash-extension pitfall of concatenating variable-length fields
/// without a delimiter).
#[derive(Clone)]
pub struct ChecksumStream {
    hasher: blake3::Hasher,
}

impl ChecksumStream {
    /// Starts a fresh, empty stream.
    #[must_use]
    pub fn new() -> Self {
        Self {
            hasher: blake3::Hasher::new(),
        }
    }

    /// Feeds one more field into the stream.
    ///
    /// Order-sensitive: calling `add` with the same bytes in a different
    /// order produces a different final checksum.
    pub fn add(&mut self, bytes: &[u8]) {
        self.hasher.update(&(bytes.len() as u64).to_le_bytes());
        self.hasher.update(bytes);
    }

    /// Returns the checksum of everything added so far without consuming
    /// the stream -- callers may keep adding and re-checksum, though no
    /// area checksummer in this crate currently does.
    #[must_use]
    pub fn checksum(&self) -> u128 {
        let hash = self.hasher.finalize();
        let bytes: [u8; 16] = hash.as_bytes()[0..16]
            .try_into()
            .expect("blake3 output is at least 16 bytes");
        u128::from_le_bytes(bytes)
    }
}

impl Default for ChecksumStream {
    fn default() -> Self {
        Self::new()
    }
}

/// Computes the 128-bit digest of a single byte slice in one shot.
///
/// Used by the `client_replies` checksummer, which folds the per-slot
/// digest of unrelated slots together with XOR rather than concatenating
/// them through a single stream (spec.md ยง4.4: order of slots must not
/// matter).
#[must_use]
pub fn hash128(bytes: &[u8]) -> u128 {
    let mut stream = ChecksumStream::new();
    stream.add(bytes);
    stream.checksum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_stream_is_deterministic() {
        assert_eq!(ChecksumStream::new().checksum(), ChecksumStream::new().checksum());
    }

    #[test]
    fn order_matters() {
        let mut ab = ChecksumStream::new();
        ab.add(b"alpha");
        ab.add(b"beta");

        let mut ba = ChecksumStream::new();
        ba.add(b"beta");
        ba.add(b"alpha");

        assert_ne!(ab.checksum(), ba.checksum());
    }

    #[test]
    fn length_prefix_disambiguates_concatenation() {
        // "ab","c" vs "a","bc": same concatenated bytes, different split.
        let mut split_after_two = ChecksumStream::new();
        split_after_two.add(b"ab");
        split_after_two.add(b"c");

        let mut split_after_one = ChecksumStream::new();
        split_after_one.add(b"a");
        split_after_one.add(b"bc");

        assert_ne!(split_after_two.checksum(), split_after_one.checksum());
    }

    #[test]
    fn repeated_checksum_calls_are_stable() {
        let mut stream = ChecksumStream::new();
        stream.add(b"payload");
        let first = stream.checksum();
        let second = stream.checksum();
        assert_eq!(first, second);
    }

    #[test]
    fn hash128_matches_single_add_stream() {
        let mut stream = ChecksumStream::new();
        stream.add(b"slot-bytes");
        assert_eq!(hash128(b"slot-bytes"), stream.checksum());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn checksum_is_a_pure_function_of_additions(
                a in proptest::collection::vec(any::<u8>(), 0..64),
                b in proptest::collection::vec(any::<u8>(), 0..64),
            ) {
                let mut first = ChecksumStream::new();
                first.add(&a);
                first.add(&b);

                let mut second = ChecksumStream::new();
                second.add(&a);
                second.add(&b);

                prop_assert_eq!(first.checksum(), second.checksum());
            }
        }
    }
}
