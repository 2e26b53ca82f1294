//! Per-file block signatures
//!
//! The hash generator runs on the server. It cuts a file into
//! non-overlapping blocks of the configured size and produces three
//! index-aligned sequences: fast hashes, strong hashes, and the content
//! blocks themselves. The hashes travel to the client in the manifest;
//! the content blocks stay behind in the server's content cache so that
//! hash references in a later push can be dereferenced.

use crate::checksum::{strong_digest, RollingChecksum};
use crate::error::{Error, Result};
use crate::types::Block;
use std::io::Read;

/// The aligned output of scanning one file
#[derive(Debug, Default)]
pub struct FileSignature {
    /// Rolling digests, one hashed block per input block
    pub fast_hashes: Vec<Block>,
    /// Strong digests, index-aligned with `fast_hashes`
    pub strong_hashes: Vec<Block>,
    /// The block payloads, index-aligned with both hash lists
    pub content_blocks: Vec<Block>,
}

impl FileSignature {
    /// Number of blocks in the signature
    pub fn len(&self) -> usize {
        self.strong_hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strong_hashes.is_empty()
    }
}

/// Scans a reader and emits aligned (fast, strong, content) triples per
/// block. Reusable across files via [`HashGenerator::reset`].
#[derive(Debug)]
pub struct HashGenerator {
    block_size: usize,
    rolling: RollingChecksum,
}

impl HashGenerator {
    pub fn new(block_size: usize) -> Self {
        Self {
            block_size,
            rolling: RollingChecksum::new(block_size),
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Restore cleared hasher state so the generator can scan another file
    pub fn reset(&mut self) {
        self.rolling.reset();
    }

    /// Consume the reader in chunks of up to the block size. Each chunk is
    /// hashed from a freshly reset hasher (not rolled); the final chunk
    /// may be shorter. Empty input yields an empty signature.
    pub fn scan<R: Read>(&mut self, mut reader: R) -> Result<FileSignature> {
        let mut signature = FileSignature::default();
        let mut chunk = vec![0u8; self.block_size];
        let mut offset = 0u64;

        loop {
            let n = read_full(&mut reader, &mut chunk)
                .map_err(|e| Error::io("reading block for hashing", e))?;
            if n == 0 {
                break;
            }
            let chunk = &chunk[..n];

            self.rolling.reset();
            self.rolling.update(chunk);
            signature
                .fast_hashes
                .push(Block::hashed(offset, n as u64, self.rolling.sum().to_vec()));
            signature.strong_hashes.push(Block::hashed(
                offset,
                n as u64,
                strong_digest(chunk).to_vec(),
            ));
            signature
                .content_blocks
                .push(Block::content(offset, chunk.to_vec()));

            offset += n as u64;
            if n < self.block_size {
                break;
            }
        }

        Ok(signature)
    }
}

/// Read until the buffer is full or the reader is exhausted, so a block is
/// short only at end of input regardless of how the reader chunks its
/// data.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
