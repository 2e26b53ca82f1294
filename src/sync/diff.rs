//! Diff computation between the client tree and the server manifest
//!
//! A two-pointer merge over the two name-sorted listings decides, per
//! entry, between delete, mkdir, and a block-stream rewrite. Both caches
//! are seeded from the entire manifest and shared across every file
//! scanned in the cycle, so content that exists anywhere on the server,
//! or was already emitted for an earlier file, is referenced instead of
//! shipped.

use crate::cache::BlockCache;
use crate::delta::BlockProducer;
use crate::types::{AdjustmentCommand, HashedFile, VirtualFile};

/// Compare sorted client files against the sorted server manifest and
/// return the ordered command list that makes the server tree match.
///
/// Removal always precedes creation when a name changes kind, so a
/// replacement never leaves a stale entry behind. File-to-file pairs
/// always emit a rewrite command; a stream of pure hash references
/// rewrites the file to identical bytes.
pub fn compare_trees(
    mut client_files: Vec<VirtualFile>,
    server_files: &[HashedFile],
    block_size: usize,
) -> Vec<AdjustmentCommand> {
    let mut comparison = Comparison::seeded(server_files, block_size);
    let (mut i, mut j) = (0, 0);

    while i < client_files.len() && j < server_files.len() {
        let client = &client_files[i];
        let server = &server_files[j];
        match client.filename.as_str().cmp(server.filename.as_str()) {
            std::cmp::Ordering::Less => {
                // new client entry, add it
                comparison.add_client_entry(&mut client_files[i]);
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                // entry gone from the client, remove it
                comparison.remove(&server.filename);
                j += 1;
            }
            std::cmp::Ordering::Equal => {
                comparison.reconcile(&mut client_files[i], &server_files[j]);
                i += 1;
                j += 1;
            }
        }
    }

    while i < client_files.len() {
        comparison.add_client_entry(&mut client_files[i]);
        i += 1;
    }

    while j < server_files.len() {
        comparison.remove(&server_files[j].filename);
        j += 1;
    }

    comparison.commands
}

/// Working state of one comparison: the shared caches, the producer that
/// scans client files against them, and the commands emitted so far.
struct Comparison {
    producer: BlockProducer,
    fast_cache: BlockCache,
    strong_cache: BlockCache,
    commands: Vec<AdjustmentCommand>,
}

impl Comparison {
    fn seeded(server_files: &[HashedFile], block_size: usize) -> Self {
        let mut fast_cache = BlockCache::new();
        let mut strong_cache = BlockCache::new();
        for file in server_files {
            fast_cache.add_hashes(&file.fast_hashes);
            strong_cache.add_hashes(&file.strong_hashes);
        }
        Self {
            producer: BlockProducer::new(block_size),
            fast_cache,
            strong_cache,
            commands: Vec::new(),
        }
    }

    fn remove(&mut self, filename: &str) {
        self.commands.push(AdjustmentCommand::RemoveFile {
            filename: filename.to_string(),
        });
    }

    /// Scan a client file and emit its rewrite command
    fn add_client_file(&mut self, file: &mut VirtualFile) {
        tracing::debug!(file = %file.filename, "scanning file");
        let blocks = match file.reader.take() {
            Some(reader) => {
                self.producer
                    .scan(reader, &mut self.fast_cache, &mut self.strong_cache)
            }
            None => Vec::new(),
        };
        self.commands.push(AdjustmentCommand::ApplyBlocksToFile {
            filename: file.filename.clone(),
            blocks,
        });
    }

    /// A client entry with no server counterpart
    fn add_client_entry(&mut self, file: &mut VirtualFile) {
        if file.is_dir {
            self.commands.push(AdjustmentCommand::MkDir {
                filename: file.filename.clone(),
            });
        } else {
            self.add_client_file(file);
        }
    }

    /// Same name on both sides; the kinds may still differ
    fn reconcile(&mut self, client: &mut VirtualFile, server: &HashedFile) {
        match (client.is_dir, server.is_dir) {
            // both directories, nothing changed
            (true, true) => {}
            // server directory gives way to a client file
            (false, true) => {
                self.remove(&server.filename);
                self.add_client_file(client);
            }
            // server file gives way to a client directory
            (true, false) => {
                self.remove(&server.filename);
                self.commands.push(AdjustmentCommand::MkDir {
                    filename: client.filename.clone(),
                });
            }
            // both files, rewrite from the scan
            (false, false) => self.add_client_file(client),
        }
    }
}
