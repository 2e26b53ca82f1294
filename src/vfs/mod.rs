//! Virtual filesystem abstraction
//!
//! Both sides of the sync operate through this trait rather than touching
//! the disk directly, so the whole engine can be exercised against the
//! in-memory implementation. Paths are relative, slash-separated names
//! below an implementation-defined root.

pub mod local;
pub mod memory;

pub use local::LocalFilesystem;
pub use memory::MemoryFilesystem;

use crate::cache::BlockCache;
use crate::error::{Error, Result};
use crate::signature::HashGenerator;
use crate::types::{HashedFile, VirtualFile};
use std::io::{Read, Write};

/// A byte reader for one file
pub type FileReader = Box<dyn Read + Send>;

/// A byte writer for one file
pub type FileWriter = Box<dyn Write + Send>;

/// Operations the sync engine needs from a file tree
pub trait VirtualFilesystem {
    /// All paths below the root, sorted ascending, excluding the root
    /// itself
    fn list_all(&self) -> Result<Vec<String>>;

    /// Does the path exist (file or directory)?
    fn is_path(&self, filename: &str) -> bool;

    /// Does the path exist and name a directory?
    fn is_dir(&self, filename: &str) -> bool;

    /// Open a file for reading. Fails on missing paths and directories.
    fn open_read(&self, filename: &str) -> Result<FileReader>;

    /// Open a file for writing, creating parents as needed and truncating
    /// existing content. Fails when the path names a directory.
    fn open_write(&self, filename: &str) -> Result<FileWriter>;

    /// Create a directory; parents are created implicitly. Fails when the
    /// path already exists.
    fn mkdir(&self, filename: &str) -> Result<()>;

    /// Atomically move a file over a destination. Fails when the source is
    /// missing or the destination is a directory.
    fn rename(&self, source: &str, dest: &str) -> Result<()>;

    /// Delete a path, recursively for directories. Fails when the path
    /// does not exist.
    fn delete(&self, filename: &str) -> Result<()>;
}

/// List a client tree: every entry sorted by name, files carrying an open
/// reader for the producer to consume.
pub fn list_client_files<F: VirtualFilesystem>(fs: &F) -> Result<Vec<VirtualFile>> {
    let filenames = fs.list_all()?;
    let mut files = Vec::with_capacity(filenames.len());

    for filename in filenames {
        if fs.is_dir(&filename) {
            files.push(VirtualFile::dir(filename));
        } else {
            let reader = fs
                .open_read(&filename)
                .map_err(|e| Error::filesystem(&filename, format!("cannot open file: {e}")))?;
            files.push(VirtualFile::file(filename, reader));
        }
    }

    Ok(files)
}

/// List a server tree as manifest entries: every file hashed block by
/// block with a generator reset in between, the resulting content blocks
/// fed into the server's content cache so later hash references resolve.
pub fn list_server_files<F: VirtualFilesystem>(
    fs: &F,
    generator: &mut HashGenerator,
    content_cache: &mut BlockCache,
) -> Result<Vec<HashedFile>> {
    let filenames = fs.list_all()?;
    let mut files = Vec::with_capacity(filenames.len());

    for filename in filenames {
        if fs.is_dir(&filename) {
            files.push(HashedFile::dir(filename));
        } else {
            let reader = fs
                .open_read(&filename)
                .map_err(|e| Error::filesystem(&filename, format!("cannot open file: {e}")))?;
            generator.reset();
            let signature = generator.scan(reader)?;
            content_cache.add_contents(&signature.strong_hashes, &signature.content_blocks);
            files.push(HashedFile::file(
                filename,
                signature.fast_hashes,
                signature.strong_hashes,
            ));
        }
    }

    Ok(files)
}
