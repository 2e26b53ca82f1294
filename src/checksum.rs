//! Rolling and strong block checksums
//!
//! The fast hash is the rolling checksum from the rsync thesis attributed
//! to Paul Mackerras. It digests a window of exactly `block_size` bytes
//! and supports O(1) updates as the window slides one byte at a time. The
//! strong hash is BLAKE3 over an explicit byte range and confirms matches
//! the fast hash merely admits.

/// Modulus of the rolling checksum components
pub const CHECKSUM_MODULUS: u32 = 1 << 17;

/// Width of the serialized rolling digest in bytes
pub const FAST_DIGEST_SIZE: usize = 4;

/// Width of the strong digest in bytes
pub const STRONG_DIGEST_SIZE: usize = 32;

/// Rolling window checksum.
///
/// The window lives in a ring buffer of `block_size` bytes, overwritten in
/// place as new bytes arrive; the byte about to leave the window is what
/// makes the O(1) update well-defined. A freshly created checksum starts
/// from a zeroed window, so the first `block_size` updates roll the input
/// over zeros.
///
/// The expected way to use it:
/// 1. create it with [`RollingChecksum::new`] (or over an initial block
///    with [`RollingChecksum::from_block`]),
/// 2. feed bytes with [`RollingChecksum::update`],
/// 3. read the digest with [`RollingChecksum::digest`] or
///    [`RollingChecksum::sum`].
#[derive(Debug, Clone)]
pub struct RollingChecksum {
    block_size: usize,
    digest: u32,
    window: Vec<u8>,
    index: usize,
}

impl RollingChecksum {
    /// Create a checksum with an empty (zeroed) window.
    ///
    /// Panics when `block_size` is zero.
    pub fn new(block_size: usize) -> Self {
        assert!(block_size > 0, "rolling checksum block size must be positive");
        Self {
            block_size,
            digest: 0,
            window: vec![0; block_size],
            index: 0,
        }
    }

    /// Initialize the digest over an initial block in O(len).
    ///
    /// The block length becomes the window size. Panics when the block is
    /// empty.
    pub fn from_block(block: &[u8]) -> Self {
        assert!(
            !block.is_empty(),
            "cannot initialize rolling checksum over an empty block"
        );
        let mut checksum = Self::new(block.len());
        checksum.update(block);
        checksum
    }

    /// The window size this checksum was created with
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Roll every byte of `data` through the window, O(1) per byte.
    ///
    /// Variable names follow the notation of the rsync paper: `a_k` is the
    /// byte leaving the window, `r1` the plain sum, `r2` the weighted sum.
    pub fn update(&mut self, data: &[u8]) {
        let mut r1 = self.digest & 0xffff;
        let mut r2 = self.digest >> 16;
        let len = self.block_size as u32;

        for &byte in data {
            let ak = u32::from(self.window[self.index]);
            r1 = r1
                .wrapping_sub(ak)
                .wrapping_add(u32::from(byte))
                % CHECKSUM_MODULUS;
            r2 = r2
                .wrapping_sub(len.wrapping_mul(ak))
                .wrapping_add(r1)
                % CHECKSUM_MODULUS;
            self.window[self.index] = byte;
            self.index = (self.index + 1) % self.block_size;
        }

        self.digest = (r1 & 0xffff) | (r2 << 16);
    }

    /// Current digest value
    pub fn digest(&self) -> u32 {
        self.digest
    }

    /// Big-endian encoding of the current digest
    pub fn sum(&self) -> [u8; FAST_DIGEST_SIZE] {
        self.digest.to_be_bytes()
    }

    /// Clear the digest and the window back to the initial state
    pub fn reset(&mut self) {
        self.digest = 0;
        self.window.fill(0);
        self.index = 0;
    }
}

/// Fast digest of a standalone chunk: a fresh window of `block_size`
/// zeroed bytes with the chunk rolled in. This is the digest the rolling
/// checksum converges to after `chunk.len()` updates from a reset, which
/// is what makes fresh block hashes and rolled window hashes comparable.
pub fn fast_digest(block_size: usize, chunk: &[u8]) -> [u8; FAST_DIGEST_SIZE] {
    let mut checksum = RollingChecksum::new(block_size);
    checksum.update(chunk);
    checksum.sum()
}

/// Strong digest over an explicit byte range
pub fn strong_digest(data: &[u8]) -> [u8; STRONG_DIGEST_SIZE] {
    *blake3::hash(data).as_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roll_matches_in_the_middle() {
        let data = b"0123";
        // start this checksum in the middle and leave it as is
        let fixed = RollingChecksum::from_block(&data[2..4]);
        // start this checksum in the beginning and roll it to the middle
        let mut rolling = RollingChecksum::from_block(&data[0..2]);
        rolling.update(&data[2..3]);
        rolling.update(&data[3..4]);
        assert_eq!(fixed.digest(), rolling.digest());
    }

    #[test]
    fn test_roll_matches_overlapping() {
        let data = b"01234";
        let fixed = RollingChecksum::from_block(&data[2..5]);
        let mut rolling = RollingChecksum::from_block(&data[0..3]);
        rolling.update(&data[3..4]);
        rolling.update(&data[4..5]);
        assert_eq!(fixed.digest(), rolling.digest());
    }

    #[test]
    fn test_roll_matches_update_both_multiple_calls() {
        let data = b"01234";
        // initialize at different positions and roll both until they meet
        let mut rolling1 = RollingChecksum::from_block(&data[2..4]);
        let mut rolling2 = RollingChecksum::from_block(&data[0..2]);
        rolling1.update(&data[4..5]);
        rolling2.update(&data[2..3]);
        rolling2.update(&data[3..4]);
        rolling2.update(&data[4..5]);
        assert_eq!(rolling1.digest(), rolling2.digest());
    }

    #[test]
    fn test_roll_matches_update_both_one_call() {
        let data = b"01234";
        let mut rolling1 = RollingChecksum::from_block(&data[2..4]);
        let mut rolling2 = RollingChecksum::from_block(&data[0..2]);
        rolling1.update(&data[4..5]);
        rolling2.update(&data[2..5]);
        assert_eq!(rolling1.digest(), rolling2.digest());
    }

    #[test]
    fn test_roll_equivalence_long_input() {
        // rolling from the start of the input must converge to the digest
        // of a checksum initialized directly on the final window
        let data: Vec<u8> = (0..=255u8).cycle().take(1024).collect();
        for block_size in [4usize, 16, 64, 100] {
            let mut rolling = RollingChecksum::from_block(&data[0..block_size]);
            rolling.update(&data[block_size..]);
            let fixed = RollingChecksum::from_block(&data[data.len() - block_size..]);
            assert_eq!(rolling.digest(), fixed.digest(), "block size {block_size}");
        }
    }

    #[test]
    fn test_fresh_digest_matches_reset_then_update() {
        let chunk = b"abcdef";
        let mut checksum = RollingChecksum::new(8);
        checksum.update(b"unrelated bytes first");
        checksum.reset();
        checksum.update(chunk);
        assert_eq!(checksum.sum(), fast_digest(8, chunk));
    }

    #[test]
    fn test_sum_is_big_endian_digest() {
        let checksum = RollingChecksum::from_block(b"abcd");
        assert_eq!(checksum.sum(), checksum.digest().to_be_bytes());
    }

    #[test]
    fn test_different_content_different_digest() {
        let a = fast_digest(4, b"abcd");
        let b = fast_digest(4, b"abce");
        assert_ne!(a, b);
    }

    #[test]
    #[should_panic(expected = "empty block")]
    fn test_empty_initial_block_panics() {
        let _ = RollingChecksum::from_block(b"");
    }

    #[test]
    #[should_panic(expected = "block size must be positive")]
    fn test_zero_block_size_panics() {
        let _ = RollingChecksum::new(0);
    }

    #[test]
    fn test_strong_digest_is_stable() {
        assert_eq!(strong_digest(b"abcd"), strong_digest(b"abcd"));
        assert_ne!(strong_digest(b"abcd"), strong_digest(b"abce"));
    }
}
