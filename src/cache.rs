//! Block cache: digest to block mapping, last writer wins
//!
//! Two logical caches exist per side. The fast cache maps rolling digests
//! to hashed blocks and acts as the admission filter during a scan; the
//! strong cache maps strong digests to hashed blocks (server-known
//! content) or content blocks (reusable payloads on the server). Entries
//! are never evicted.

use crate::types::Block;
use std::collections::HashMap;

/// Digest to block mapping with last-writer-wins semantics
#[derive(Debug, Default)]
pub struct BlockCache {
    blocks: HashMap<Vec<u8>, Block>,
}

impl BlockCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Look up a block by digest
    pub fn get(&self, digest: &[u8]) -> Option<&Block> {
        self.blocks.get(digest)
    }

    pub fn contains(&self, digest: &[u8]) -> bool {
        self.blocks.contains_key(digest)
    }

    /// Insert a block under a digest, replacing any previous entry
    pub fn insert(&mut self, digest: impl Into<Vec<u8>>, block: Block) {
        self.blocks.insert(digest.into(), block);
    }

    /// Index hashed blocks under their own hash sums. Content blocks in
    /// the input are ignored.
    pub fn add_hashes(&mut self, blocks: &[Block]) {
        for block in blocks {
            if let Block::Hashed(hashed) = block {
                self.blocks
                    .insert(hashed.hash_sum.to_vec(), block.clone());
            }
        }
    }

    /// Map the strong digests of `hashed` to the aligned payloads in
    /// `contents`, making hash references dereferenceable. The two lists
    /// are index-aligned, as produced by the hash generator.
    pub fn add_contents(&mut self, hashed: &[Block], contents: &[Block]) {
        debug_assert_eq!(hashed.len(), contents.len());
        for (hash, content) in hashed.iter().zip(contents) {
            if let Block::Hashed(hashed) = hash {
                self.blocks
                    .insert(hashed.hash_sum.to_vec(), content.clone());
            }
        }
    }
}
