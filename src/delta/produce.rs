//! The delta scanner
//!
//! The block producer runs on the client. It walks a file one byte at a
//! time, keeping a rolling checksum of the bytes since the last emission,
//! and asks two caches whether the current window is content the server
//! already has: the fast cache admits candidates cheaply, the strong cache
//! confirms them. Confirmed windows become hash references; everything
//! else is emitted as literal content.
//!
//! Emitted content is also inserted back into both caches, so a byte
//! sequence is shipped at most once per cycle: later occurrences, in the
//! same file or in any file scanned with the same caches, turn into hash
//! references.

use crate::cache::BlockCache;
use crate::checksum::{fast_digest, strong_digest, RollingChecksum};
use crate::types::{Block, HashedBlock};
use std::io::{BufReader, Read};

/// Client-side scanner emitting a mixed stream of hash references and
/// literal content blocks.
#[derive(Debug)]
pub struct BlockProducer {
    block_size: usize,
    rolling: RollingChecksum,
    /// Bytes consumed from the reader so far
    offset: usize,
    /// Offset of the last emission; backward-looking windows never cross it
    cutoff: usize,
    /// Pending literal bytes that have not been emitted yet
    content: Vec<u8>,
}

impl BlockProducer {
    pub fn new(block_size: usize) -> Self {
        Self {
            block_size,
            rolling: RollingChecksum::new(block_size),
            offset: 0,
            cutoff: 0,
            content: Vec::with_capacity(block_size),
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Clear all per-file state
    pub fn reset(&mut self) {
        self.rolling.reset();
        self.offset = 0;
        self.cutoff = 0;
        self.content.clear();
    }

    /// Scan the reader and return the ordered block stream describing it.
    ///
    /// The emitted sizes sum to the input length and offsets are
    /// contiguous from zero. Every hash reference points at an entry of
    /// `strong_cache` with identical bytes; every content block failed the
    /// cache lookups at the time it was emitted.
    ///
    /// The producer is total: a reader error terminates the scan and the
    /// pending state is flushed as if the input had ended.
    pub fn scan<R: Read>(
        &mut self,
        reader: R,
        fast_cache: &mut BlockCache,
        strong_cache: &mut BlockCache,
    ) -> Vec<Block> {
        self.reset();
        let mut reader = BufReader::new(reader);
        let mut blocks = Vec::new();
        let mut byte = [0u8; 1];

        loop {
            self.try_emit_hash(&mut blocks, fast_cache, strong_cache);
            match reader.read(&mut byte) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    self.rolling.update(&byte);
                    self.content.push(byte[0]);
                    self.offset += 1;
                }
            }
        }

        self.try_emit_hash(&mut blocks, fast_cache, strong_cache);
        self.flush_content(&mut blocks, fast_cache, strong_cache);
        blocks
    }

    /// How far back from the current position a window may reach. This is
    /// the block size, clamped by the start of the input and by the
    /// cutoff: once a hash is emitted, no later match may overlap it.
    fn window_len(&self) -> usize {
        let left_barrier = self.cutoff.max(self.offset.saturating_sub(self.block_size));
        self.offset - left_barrier
    }

    /// Try to emit a hash reference for the current window. On success the
    /// literal prefix before the window is flushed first, the cutoff moves
    /// to the current offset, and the rolling state is cleared.
    fn try_emit_hash(
        &mut self,
        blocks: &mut Vec<Block>,
        fast_cache: &mut BlockCache,
        strong_cache: &mut BlockCache,
    ) -> bool {
        let window = self.window_len();
        if window == 0 {
            return false;
        }
        let Some(found) = self.find_match(window, fast_cache, strong_cache) else {
            return false;
        };

        // Flush the literal bytes that precede the matched window.
        let prefix_len = self.content.len() - window;
        if prefix_len > 0 {
            let prefix_offset = self.offset - self.content.len();
            let prefix = self.content[..prefix_len].to_vec();
            self.emit_content(blocks, prefix_offset, prefix, fast_cache, strong_cache);
        }

        blocks.push(Block::hashed(
            self.offset as u64 - found.size,
            found.size,
            found.hash_sum,
        ));
        self.cutoff = self.offset;
        self.content.clear();
        self.rolling.reset();
        true
    }

    /// Two-tier lookup of the current window: the fast cache admits, the
    /// strong digest of the window confirms.
    fn find_match(
        &self,
        window: usize,
        fast_cache: &BlockCache,
        strong_cache: &BlockCache,
    ) -> Option<HashedBlock> {
        fast_cache.get(&self.rolling.sum())?;

        let tail = &self.content[self.content.len() - window..];
        let strong = strong_digest(tail);
        match strong_cache.get(&strong)? {
            Block::Hashed(hashed) => Some(hashed.clone()),
            // A content entry can only appear here if the caller seeded the
            // strong cache with payloads; reference it by the digest we
            // just computed.
            Block::Content(content) => Some(HashedBlock {
                offset: content.offset,
                size: content.size,
                hash_sum: strong.to_vec().into(),
            }),
        }
    }

    /// Emit a literal block and index it in both caches so the same bytes
    /// are never shipped twice within a cycle.
    fn emit_content(
        &mut self,
        blocks: &mut Vec<Block>,
        offset: usize,
        content: Vec<u8>,
        fast_cache: &mut BlockCache,
        strong_cache: &mut BlockCache,
    ) {
        let offset = offset as u64;
        let size = content.len() as u64;
        let fast = fast_digest(self.block_size, &content);
        let strong = strong_digest(&content);

        fast_cache.insert(
            fast.to_vec(),
            Block::hashed(offset, size, fast.to_vec()),
        );
        strong_cache.insert(
            strong.to_vec(),
            Block::hashed(offset, size, strong.to_vec()),
        );
        blocks.push(Block::content(offset, content));
    }

    /// Flush whatever literal bytes remain at end of input
    fn flush_content(
        &mut self,
        blocks: &mut Vec<Block>,
        fast_cache: &mut BlockCache,
        strong_cache: &mut BlockCache,
    ) {
        if self.content.is_empty() {
            return;
        }
        let offset = self.offset - self.content.len();
        let content = std::mem::take(&mut self.content);
        self.emit_content(blocks, offset, content, fast_cache, strong_cache);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::{fast_digest, strong_digest};

    /// Seed both caches the way a server manifest for `value` would
    fn seed(fast_cache: &mut BlockCache, strong_cache: &mut BlockCache, offset: u64, value: &[u8]) {
        let block_size = 4;
        let fast = fast_digest(block_size, value);
        let strong = strong_digest(value);
        let size = value.len() as u64;
        fast_cache.insert(fast.to_vec(), Block::hashed(offset, size, fast.to_vec()));
        strong_cache.insert(strong.to_vec(), Block::hashed(offset, size, strong.to_vec()));
    }

    fn scan_with_empty_caches(block_size: usize, input: &[u8]) -> Vec<Block> {
        let mut producer = BlockProducer::new(block_size);
        let mut fast_cache = BlockCache::new();
        let mut strong_cache = BlockCache::new();
        producer.scan(input, &mut fast_cache, &mut strong_cache)
    }

    #[test]
    fn test_empty_input_emits_nothing() {
        assert!(scan_with_empty_caches(4, b"").is_empty());
    }

    #[test]
    fn test_emit_one_byte_of_content() {
        let blocks = scan_with_empty_caches(1, b"a");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].as_content().unwrap().content.as_ref(), b"a");
    }

    #[test]
    fn test_emit_several_bytes_as_one_content_block() {
        let blocks = scan_with_empty_caches(1, b"abc");
        assert_eq!(blocks.len(), 1);
        let content = blocks[0].as_content().unwrap();
        assert_eq!(content.size, 3);
        assert_eq!(content.content.as_ref(), b"abc");
    }

    #[test]
    fn test_no_match_flushes_whole_input() {
        let blocks = scan_with_empty_caches(4, b"abcdefgh");
        assert_eq!(blocks.len(), 1);
        let content = blocks[0].as_content().unwrap();
        assert_eq!(content.offset, 0);
        assert_eq!(content.size, 8);
        assert_eq!(content.content.as_ref(), b"abcdefgh");
    }

    #[test]
    fn test_emit_one_hashed() {
        let mut fast_cache = BlockCache::new();
        let mut strong_cache = BlockCache::new();
        // the server offset (100) differs from the client offset; only the
        // size must carry over
        seed(&mut fast_cache, &mut strong_cache, 100, b"abcd");

        let mut producer = BlockProducer::new(4);
        let blocks = producer.scan(&b"abcd"[..], &mut fast_cache, &mut strong_cache);

        assert_eq!(blocks.len(), 1);
        let hashed = blocks[0].as_hashed().unwrap();
        assert_eq!(hashed.hash_sum.as_ref(), strong_digest(b"abcd"));
        assert_eq!(hashed.offset, 0);
        assert_eq!(hashed.size, 4);
    }

    #[test]
    fn test_emit_two_hashed_same_size() {
        let mut fast_cache = BlockCache::new();
        let mut strong_cache = BlockCache::new();
        seed(&mut fast_cache, &mut strong_cache, 100, b"abcd");
        seed(&mut fast_cache, &mut strong_cache, 200, b"1234");

        let mut producer = BlockProducer::new(4);
        let blocks = producer.scan(&b"abcd1234"[..], &mut fast_cache, &mut strong_cache);

        assert_eq!(blocks.len(), 2);
        let first = blocks[0].as_hashed().unwrap();
        let second = blocks[1].as_hashed().unwrap();
        assert_eq!(first.hash_sum.as_ref(), strong_digest(b"abcd"));
        assert_eq!(first.offset, 0);
        assert_eq!(first.size, 4);
        assert_eq!(second.hash_sum.as_ref(), strong_digest(b"1234"));
        assert_eq!(second.offset, 4);
        assert_eq!(second.size, 4);
    }

    #[test]
    fn test_emit_two_hashed_second_is_smaller() {
        let mut fast_cache = BlockCache::new();
        let mut strong_cache = BlockCache::new();
        seed(&mut fast_cache, &mut strong_cache, 100, b"abcd");
        seed(&mut fast_cache, &mut strong_cache, 200, b"123");

        let mut producer = BlockProducer::new(4);
        let blocks = producer.scan(&b"abcd123"[..], &mut fast_cache, &mut strong_cache);

        assert_eq!(blocks.len(), 2);
        let first = blocks[0].as_hashed().unwrap();
        let second = blocks[1].as_hashed().unwrap();
        assert_eq!(first.offset, 0);
        assert_eq!(first.size, 4);
        assert_eq!(second.hash_sum.as_ref(), strong_digest(b"123"));
        assert_eq!(second.offset, 4);
        assert_eq!(second.size, 3);
    }

    #[test]
    fn test_hash_then_trailing_content() {
        let mut fast_cache = BlockCache::new();
        let mut strong_cache = BlockCache::new();
        seed(&mut fast_cache, &mut strong_cache, 0, b"abcd");

        let mut producer = BlockProducer::new(4);
        let blocks = producer.scan(&b"abcd123"[..], &mut fast_cache, &mut strong_cache);

        assert_eq!(blocks.len(), 2);
        let hashed = blocks[0].as_hashed().unwrap();
        assert_eq!(hashed.offset, 0);
        assert_eq!(hashed.size, 4);
        let content = blocks[1].as_content().unwrap();
        assert_eq!(content.offset, 4);
        assert_eq!(content.content.as_ref(), b"123");
    }

    #[test]
    fn test_content_prefix_before_match() {
        let mut fast_cache = BlockCache::new();
        let mut strong_cache = BlockCache::new();
        seed(&mut fast_cache, &mut strong_cache, 0, b"abcd");

        let mut producer = BlockProducer::new(4);
        let blocks = producer.scan(&b"123abcd"[..], &mut fast_cache, &mut strong_cache);

        assert_eq!(blocks.len(), 2);
        let content = blocks[0].as_content().unwrap();
        assert_eq!(content.offset, 0);
        assert_eq!(content.content.as_ref(), b"123");
        let hashed = blocks[1].as_hashed().unwrap();
        assert_eq!(hashed.offset, 3);
        assert_eq!(hashed.size, 4);
        assert_eq!(hashed.hash_sum.as_ref(), strong_digest(b"abcd"));
    }

    #[test]
    fn test_offsets_partition_the_input() {
        let mut fast_cache = BlockCache::new();
        let mut strong_cache = BlockCache::new();
        seed(&mut fast_cache, &mut strong_cache, 0, b"aaaa");
        seed(&mut fast_cache, &mut strong_cache, 4, b"1234");

        let mut producer = BlockProducer::new(4);
        let input = b"XXXXaaaa1234";
        let blocks = producer.scan(&input[..], &mut fast_cache, &mut strong_cache);

        let mut offset = 0u64;
        for block in &blocks {
            assert_eq!(block.offset(), offset);
            offset += block.size();
        }
        assert_eq!(offset, input.len() as u64);
    }

    #[test]
    fn test_content_reuse_within_one_scan() {
        // "1234" is shipped once; the second occurrence, made visible by
        // the first hash emission, is referenced
        let mut fast_cache = BlockCache::new();
        let mut strong_cache = BlockCache::new();
        seed(&mut fast_cache, &mut strong_cache, 0, b"abcd");

        let mut producer = BlockProducer::new(4);
        let blocks = producer.scan(&b"1234abcd1234"[..], &mut fast_cache, &mut strong_cache);

        assert_eq!(blocks.len(), 3);
        assert!(blocks[0].is_content());
        assert!(blocks[1].is_hashed());
        let reused = blocks[2].as_hashed().unwrap();
        assert_eq!(reused.hash_sum.as_ref(), strong_digest(b"1234"));
        assert_eq!(reused.offset, 8);
        assert_eq!(reused.size, 4);
    }

    #[test]
    fn test_content_reuse_across_scans_with_shared_caches() {
        let mut fast_cache = BlockCache::new();
        let mut strong_cache = BlockCache::new();
        let mut producer = BlockProducer::new(4);

        let first = producer.scan(&b"1234"[..], &mut fast_cache, &mut strong_cache);
        assert_eq!(first.len(), 1);
        assert!(first[0].is_content());

        let second = producer.scan(&b"12341234"[..], &mut fast_cache, &mut strong_cache);
        assert_eq!(second.len(), 2);
        assert!(second.iter().all(Block::is_hashed));
    }

    #[test]
    fn test_reader_error_flushes_pending_state() {
        struct Failing<'a> {
            data: &'a [u8],
        }
        impl Read for Failing<'_> {
            fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
                if self.data.is_empty() {
                    return Err(std::io::Error::new(std::io::ErrorKind::Other, "broken"));
                }
                buf[0] = self.data[0];
                self.data = &self.data[1..];
                Ok(1)
            }
        }

        let mut producer = BlockProducer::new(4);
        let mut fast_cache = BlockCache::new();
        let mut strong_cache = BlockCache::new();
        let blocks = producer.scan(
            Failing { data: b"ab" },
            &mut fast_cache,
            &mut strong_cache,
        );
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].as_content().unwrap().content.as_ref(), b"ab");
    }
}
