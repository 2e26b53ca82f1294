//! Rebuilding file content from a block stream
//!
//! The reconstructor runs on the server. Content blocks are written out
//! as-is and indexed in the strong cache, because the client never sends
//! the same bytes twice: later occurrences arrive as hash references.
//! Hash references are dereferenced through the same cache, which the
//! manifest pass populated with the server's current content.

use crate::cache::BlockCache;
use crate::checksum::strong_digest;
use crate::error::{Error, Result};
use crate::types::Block;
use std::io::Write;

/// Apply an ordered block stream to a writer, using and updating the
/// strong cache. Returns the total number of bytes written, which equals
/// the reconstructed file size.
///
/// The blocks may arrive unsorted; they are ordered by offset first. Any
/// gap or overlap in the resulting sequence, and any hash reference that
/// does not resolve to cached content of the right size, is a protocol
/// violation: the operation fails and no safe partial outcome is defined.
pub fn reconstruct<W: Write>(
    blocks: &[Block],
    writer: &mut W,
    strong_cache: &mut BlockCache,
) -> Result<u64> {
    let mut blocks = blocks.to_vec();
    blocks.sort_by_key(Block::offset);

    let mut offset = 0u64;
    for block in blocks {
        if block.offset() != offset {
            return Err(Error::protocol(format!(
                "block offset {} does not match write position {}",
                block.offset(),
                offset
            )));
        }

        match block {
            Block::Content(content) => {
                writer
                    .write_all(&content.content)
                    .map_err(|e| Error::io("writing content block", e))?;
                offset += content.size;

                let digest = strong_digest(&content.content);
                strong_cache.insert(digest.to_vec(), Block::Content(content));
            }
            Block::Hashed(hashed) => {
                let cached = strong_cache.get(&hashed.hash_sum).ok_or_else(|| {
                    Error::protocol(format!(
                        "no cached content for hash reference {} at offset {}",
                        hex::encode(&hashed.hash_sum),
                        offset
                    ))
                })?;
                let Block::Content(content) = cached else {
                    return Err(Error::protocol(format!(
                        "cache entry for hash reference {} holds no content",
                        hex::encode(&hashed.hash_sum)
                    )));
                };
                if content.content.len() as u64 != hashed.size {
                    return Err(Error::protocol(format!(
                        "cached content length {} does not match referenced size {}",
                        content.content.len(),
                        hashed.size
                    )));
                }
                writer
                    .write_all(&content.content)
                    .map_err(|e| Error::io("writing referenced block", e))?;
                offset += hashed.size;
            }
        }
    }

    Ok(offset)
}
