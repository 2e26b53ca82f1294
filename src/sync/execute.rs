//! Applying adjustment commands to a filesystem
//!
//! Commands run in stream order and the first failure stops the run with
//! prior effects left visible. File rewrites go through a scratch path
//! next to the destination and land with one atomic rename, so a failed
//! reconstruction never corrupts the file it was meant to replace.

use crate::cache::BlockCache;
use crate::delta::reconstruct;
use crate::error::Result;
use crate::types::{AdjustmentCommand, Block};
use crate::vfs::VirtualFilesystem;

/// Suffix of the scratch file a rewrite streams into before the rename
const SCRATCH_SUFFIX: &str = ".tmp";

/// Execute an ordered command list against a filesystem, dereferencing
/// hash references through `content_cache`. Returns the total bytes
/// written by rewrites.
pub fn apply_commands<F: VirtualFilesystem>(
    commands: &[AdjustmentCommand],
    fs: &F,
    content_cache: &mut BlockCache,
) -> Result<u64> {
    let mut bytes_written = 0u64;

    for command in commands {
        match command {
            AdjustmentCommand::RemoveFile { filename } => {
                // A recursive removal earlier in the stream may already
                // have taken this path with its parent.
                if !fs.is_path(filename) {
                    tracing::debug!(file = %filename, "path already removed");
                    continue;
                }
                fs.delete(filename)?;
            }
            AdjustmentCommand::MkDir { filename } => {
                fs.mkdir(filename)?;
            }
            AdjustmentCommand::ApplyBlocksToFile { filename, blocks } => {
                bytes_written += apply_blocks(fs, filename, blocks, content_cache)?;
            }
        }
    }

    Ok(bytes_written)
}

/// Rewrite one file: reconstruct into a scratch path, then atomically
/// rename it over the destination. On any failure the scratch file is
/// cleaned up best-effort and the destination is untouched.
fn apply_blocks<F: VirtualFilesystem>(
    fs: &F,
    filename: &str,
    blocks: &[Block],
    content_cache: &mut BlockCache,
) -> Result<u64> {
    let scratch = format!("{filename}{SCRATCH_SUFFIX}");

    let written = write_scratch(fs, &scratch, blocks, content_cache);
    let written = match written {
        Ok(n) => n,
        Err(e) => {
            let _ = fs.delete(&scratch);
            return Err(e);
        }
    };

    if let Err(e) = fs.rename(&scratch, filename) {
        let _ = fs.delete(&scratch);
        return Err(e);
    }

    tracing::debug!(file = %filename, bytes = written, "applied block stream");
    Ok(written)
}

fn write_scratch<F: VirtualFilesystem>(
    fs: &F,
    scratch: &str,
    blocks: &[Block],
    content_cache: &mut BlockCache,
) -> Result<u64> {
    let mut writer = fs.open_write(scratch)?;
    let written = reconstruct(blocks, &mut writer, content_cache)?;
    writer
        .flush()
        .map_err(|e| crate::error::Error::io("flushing scratch file", e))?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::strong_digest;
    use crate::vfs::MemoryFilesystem;
    use std::io::Write;

    fn write_file(fs: &MemoryFilesystem, filename: &str, content: &[u8]) {
        let mut w = fs.open_write(filename).unwrap();
        w.write_all(content).unwrap();
    }

    #[test]
    fn test_apply_rewrites_file_atomically() {
        let fs = MemoryFilesystem::new();
        write_file(&fs, "a", b"old");
        let mut cache = BlockCache::new();

        let commands = vec![AdjustmentCommand::ApplyBlocksToFile {
            filename: "a".into(),
            blocks: vec![Block::content(0, &b"new content"[..])],
        }];
        let written = apply_commands(&commands, &fs, &mut cache).unwrap();

        assert_eq!(written, 11);
        assert_eq!(fs.content_of("a").unwrap(), b"new content");
        assert!(!fs.is_path("a.tmp"));
    }

    #[test]
    fn test_apply_dereferences_cached_content() {
        let fs = MemoryFilesystem::new();
        let mut cache = BlockCache::new();
        let digest = strong_digest(b"abcd");
        cache.insert(digest.to_vec(), Block::content(0, &b"abcd"[..]));

        let commands = vec![AdjustmentCommand::ApplyBlocksToFile {
            filename: "a".into(),
            blocks: vec![
                Block::content(0, &b"1234"[..]),
                Block::hashed(4, 4, digest.to_vec()),
            ],
        }];
        apply_commands(&commands, &fs, &mut cache).unwrap();
        assert_eq!(fs.content_of("a").unwrap(), b"1234abcd");
    }

    #[test]
    fn test_remove_and_mkdir() {
        let fs = MemoryFilesystem::new();
        write_file(&fs, "gone", b"x");
        let mut cache = BlockCache::new();

        let commands = vec![
            AdjustmentCommand::RemoveFile {
                filename: "gone".into(),
            },
            AdjustmentCommand::MkDir {
                filename: "fresh".into(),
            },
        ];
        apply_commands(&commands, &fs, &mut cache).unwrap();

        assert!(!fs.is_path("gone"));
        assert!(fs.is_dir("fresh"));
    }

    #[test]
    fn test_remove_after_recursive_parent_removal_is_skipped() {
        let fs = MemoryFilesystem::new();
        fs.mkdir("a").unwrap();
        write_file(&fs, "a/1", b"1");
        let mut cache = BlockCache::new();

        // the stream a comparator emits when a directory turns into a
        // file: the children were listed before the parent was removed
        let commands = vec![
            AdjustmentCommand::RemoveFile {
                filename: "a".into(),
            },
            AdjustmentCommand::ApplyBlocksToFile {
                filename: "a".into(),
                blocks: vec![Block::content(0, &b"now a file"[..])],
            },
            AdjustmentCommand::RemoveFile {
                filename: "a/1".into(),
            },
        ];
        apply_commands(&commands, &fs, &mut cache).unwrap();
        assert_eq!(fs.content_of("a").unwrap(), b"now a file");
    }

    #[test]
    fn test_mkdir_on_existing_path_fails() {
        let fs = MemoryFilesystem::new();
        fs.mkdir("d").unwrap();
        let mut cache = BlockCache::new();

        let commands = vec![AdjustmentCommand::MkDir {
            filename: "d".into(),
        }];
        assert!(apply_commands(&commands, &fs, &mut cache).is_err());
    }

    #[test]
    fn test_failed_reconstruction_leaves_destination_untouched() {
        let fs = MemoryFilesystem::new();
        write_file(&fs, "a", b"pre-command content");
        let mut cache = BlockCache::new();

        let commands = vec![AdjustmentCommand::ApplyBlocksToFile {
            filename: "a".into(),
            // unknown hash reference: the reconstruction must fail
            blocks: vec![Block::hashed(0, 4, b"nope".to_vec())],
        }];
        let err = apply_commands(&commands, &fs, &mut cache).unwrap_err();
        assert!(err.is_protocol());
        assert_eq!(fs.content_of("a").unwrap(), b"pre-command content");
        assert!(!fs.is_path("a.tmp"));
    }

    #[test]
    fn test_first_failure_stops_with_prior_effects_visible() {
        let fs = MemoryFilesystem::new();
        write_file(&fs, "a", b"x");
        fs.mkdir("existing").unwrap();
        let mut cache = BlockCache::new();

        let commands = vec![
            AdjustmentCommand::RemoveFile {
                filename: "a".into(),
            },
            AdjustmentCommand::MkDir {
                filename: "existing".into(),
            },
            AdjustmentCommand::MkDir {
                filename: "never".into(),
            },
        ];
        assert!(apply_commands(&commands, &fs, &mut cache).is_err());
        // the remove went through, the command after the failure did not
        assert!(!fs.is_path("a"));
        assert!(!fs.is_path("never"));
    }

    #[test]
    fn test_empty_block_stream_creates_empty_file() {
        let fs = MemoryFilesystem::new();
        let mut cache = BlockCache::new();

        let commands = vec![AdjustmentCommand::ApplyBlocksToFile {
            filename: "empty".into(),
            blocks: Vec::new(),
        }];
        let written = apply_commands(&commands, &fs, &mut cache).unwrap();
        assert_eq!(written, 0);
        assert_eq!(fs.content_of("empty").unwrap(), b"");
    }
}
