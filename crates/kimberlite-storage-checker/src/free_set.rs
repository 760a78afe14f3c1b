//! Reconstructs the acquired-block bitmap from a serialized free-set
//! trailer buffer.
//!
//! Kept as a reused, reset-in-place buffer rather than allocated fresh per
//! event (spec.md ยง5: no per-event allocation), mirroring the buffer
//! discipline `kimberlite-sim`'s `SimStorage` uses for its own scratch
//! space.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FreeSetDecodeError {
    #[error(
        "free-set trailer encodes {encoded_bits} bits, exceeding capacity {capacity_bits}"
    )]
    CapacityExceeded {
        encoded_bits: u64,
        capacity_bits: u64,
    },
    #[error("free-set trailer length {len} is not a multiple of 8 bytes")]
    Misaligned { len: usize },
}

/// A bitmap over grid block addresses `1..=capacity_bits`, where bit `i`
/// set means block address `i + 1` is acquired.
pub struct FreeSet {
    words: Vec<u64>,
    capacity_bits: u64,
}

impl FreeSet {
    /// Allocates a bitmap wide enough to cover `capacity_bits` addresses.
    #[must_use]
    pub fn new(capacity_bits: u64) -> Self {
        let word_count = capacity_bits.div_ceil(64) as usize;
        Self {
            words: vec![0u64; word_count],
            capacity_bits,
        }
    }

    /// Zeroes every word without shrinking the backing buffer, so the next
    /// `decode` reuses the same allocation.
    pub fn reset(&mut self) {
        self.words.iter_mut().for_each(|word| *word = 0);
    }

    /// Decodes a packed little-endian bitmap from a trailer buffer.
    ///
    /// `bytes` must be a multiple of 8 (one `u64` word at a time) and must
    /// not encode any bit beyond `capacity_bits`. Any bits already set from
    /// a prior decode are assumed cleared by [`FreeSet::reset`] before this
    /// call; `decode` does not reset on its own so callers can decode
    /// incrementally if a future trailer format requires it.
    pub fn decode(&mut self, bytes: &[u8]) -> Result<(), FreeSetDecodeError> {
        if bytes.len() % 8 != 0 {
            return Err(FreeSetDecodeError::Misaligned { len: bytes.len() });
        }
        let encoded_bits = (bytes.len() as u64) * 8;
        if encoded_bits > self.words.len() as u64 * 64 {
            return Err(FreeSetDecodeError::CapacityExceeded {
                encoded_bits,
                capacity_bits: self.capacity_bits,
            });
        }
        for (word, chunk) in self.words.iter_mut().zip(bytes.chunks_exact(8)) {
            *word = u64::from_le_bytes(chunk.try_into().expect("8-byte chunk"));
        }
        // Any trailing bits beyond capacity_bits but within the last word
        // must be zero -- the trailer is not allowed to mark addresses past
        // the configured grid size as acquired.
        let trailing_mask = self.trailing_mask();
        if let Some(last) = self.words.last() {
            if last & trailing_mask != 0 {
                return Err(FreeSetDecodeError::CapacityExceeded {
                    encoded_bits,
                    capacity_bits: self.capacity_bits,
                });
            }
        }
        Ok(())
    }

    fn trailing_mask(&self) -> u64 {
        let used_bits = self.capacity_bits % 64;
        if used_bits == 0 {
            0
        } else {
            !0u64 << used_bits
        }
    }

    /// Iterates the set bit indices in ascending order (spec.md ยง4.2:
    /// "visits acquired addresses in ascending order").
    pub fn iter_set_bits(&self) -> impl Iterator<Item = u64> + '_ {
        self.words.iter().enumerate().flat_map(|(word_idx, word)| {
            let base = (word_idx as u64) * 64;
            BitIter { word: *word, base }
        })
    }
}

struct BitIter {
    word: u64,
    base: u64,
}

impl Iterator for BitIter {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        if self.word == 0 {
            return None;
        }
        let bit = self.word.trailing_zeros() as u64;
        self.word &= self.word - 1; // clear lowest set bit
        Some(self.base + bit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_set_bits_ascending() {
        let mut set = FreeSet::new(128);
        let mut bytes = [0u8; 16];
        bytes[0] = 0b0000_0101; // bits 0 and 2
        bytes[9] = 0b0000_0001; // bit 64 + 8
        set.decode(&bytes).unwrap();
        assert_eq!(set.iter_set_bits().collect::<Vec<_>>(), vec![0, 2, 72]);
    }

    #[test]
    fn reset_clears_without_reallocating() {
        let mut set = FreeSet::new(64);
        set.decode(&[0xFF; 8]).unwrap();
        assert_eq!(set.iter_set_bits().count(), 8);
        set.reset();
        assert_eq!(set.iter_set_bits().count(), 0);
        assert_eq!(set.words.len(), 1);
    }

    #[test]
    fn rejects_misaligned_length() {
        let mut set = FreeSet::new(64);
        assert_eq!(
            set.decode(&[0u8; 3]),
            Err(FreeSetDecodeError::Misaligned { len: 3 })
        );
    }

    #[test]
    fn rejects_bits_past_capacity() {
        let mut set = FreeSet::new(4);
        let mut bytes = [0u8; 8];
        bytes[0] = 0b0001_0000; // bit 4, one past the 4-bit capacity
        assert!(matches!(
            set.decode(&bytes),
            Err(FreeSetDecodeError::CapacityExceeded { .. })
        ));
    }

    #[test]
    fn empty_bitmap_yields_no_bits() {
        let mut set = FreeSet::new(256);
        set.decode(&[]).unwrap();
        assert_eq!(set.iter_set_bits().count(), 0);
    }
}
