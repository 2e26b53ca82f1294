//! In-memory filesystem
//!
//! Backs the engine's tests and simulations. The tree is a flat sorted
//! map from relative name to entry; directories are entries without
//! content. Clones share the same storage, which is what lets a test hold
//! on to a handle while the sync engine mutates the tree.

use super::{FileReader, FileWriter, VirtualFilesystem};
use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::io::{Cursor, Write};
use std::sync::{Arc, Mutex};

/// A directory entry: `None` marks a directory, `Some` holds file bytes
type Entry = Option<Vec<u8>>;

/// Shared in-memory file tree
#[derive(Debug, Clone, Default)]
pub struct MemoryFilesystem {
    storage: Arc<Mutex<BTreeMap<String, Entry>>>,
}

impl MemoryFilesystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// File content by name, for assertions in tests. `None` when the
    /// path is missing or a directory.
    pub fn content_of(&self, filename: &str) -> Option<Vec<u8>> {
        self.storage
            .lock()
            .expect("memory filesystem lock poisoned")
            .get(filename)
            .and_then(|entry| entry.clone())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Entry>> {
        self.storage
            .lock()
            .expect("memory filesystem lock poisoned")
    }
}

impl VirtualFilesystem for MemoryFilesystem {
    fn list_all(&self) -> Result<Vec<String>> {
        Ok(self.lock().keys().cloned().collect())
    }

    fn is_path(&self, filename: &str) -> bool {
        self.lock().contains_key(filename)
    }

    fn is_dir(&self, filename: &str) -> bool {
        matches!(self.lock().get(filename), Some(None))
    }

    fn open_read(&self, filename: &str) -> Result<FileReader> {
        match self.lock().get(filename) {
            None => Err(Error::filesystem(filename, "file does not exist")),
            Some(None) => Err(Error::filesystem(filename, "file is a directory")),
            Some(Some(content)) => Ok(Box::new(Cursor::new(content.clone()))),
        }
    }

    fn open_write(&self, filename: &str) -> Result<FileWriter> {
        let mut storage = self.lock();
        if let Some(None) = storage.get(filename) {
            return Err(Error::filesystem(filename, "file is a directory"));
        }
        // The entry appears (truncated) as soon as the writer is opened;
        // written bytes land on flush or drop.
        storage.insert(filename.to_string(), Some(Vec::new()));
        Ok(Box::new(MemoryWriter {
            storage: Arc::clone(&self.storage),
            filename: filename.to_string(),
            buffer: Vec::new(),
        }))
    }

    fn mkdir(&self, filename: &str) -> Result<()> {
        let mut storage = self.lock();
        if storage.contains_key(filename) {
            return Err(Error::filesystem(filename, "file already exists"));
        }
        storage.insert(filename.to_string(), None);
        Ok(())
    }

    fn rename(&self, source: &str, dest: &str) -> Result<()> {
        let mut storage = self.lock();
        if !storage.contains_key(source) {
            return Err(Error::filesystem(source, "source file does not exist"));
        }
        if let Some(None) = storage.get(dest) {
            return Err(Error::filesystem(dest, "destination is a directory"));
        }
        let entry = storage.remove(source).expect("source checked above");
        storage.insert(dest.to_string(), entry);
        Ok(())
    }

    fn delete(&self, filename: &str) -> Result<()> {
        let mut storage = self.lock();
        match storage.remove(filename) {
            None => Err(Error::filesystem(filename, "file does not exist")),
            Some(Some(_)) => Ok(()),
            Some(None) => {
                // directories take their subtree with them
                let prefix = format!("{filename}/");
                storage.retain(|name, _| !name.starts_with(&prefix));
                Ok(())
            }
        }
    }
}

/// Writer that commits its buffer into the shared tree on flush or drop
struct MemoryWriter {
    storage: Arc<Mutex<BTreeMap<String, Entry>>>,
    filename: String,
    buffer: Vec<u8>,
}

impl MemoryWriter {
    fn commit(&mut self) {
        self.storage
            .lock()
            .expect("memory filesystem lock poisoned")
            .insert(self.filename.clone(), Some(self.buffer.clone()));
    }
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.commit();
        Ok(())
    }
}

impl Drop for MemoryWriter {
    fn drop(&mut self) {
        self.commit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn write_file(fs: &MemoryFilesystem, filename: &str, content: &[u8]) {
        let mut w = fs.open_write(filename).unwrap();
        w.write_all(content).unwrap();
    }

    #[test]
    fn test_write_read_roundtrip() {
        let fs = MemoryFilesystem::new();
        write_file(&fs, "a", b"abc");

        let mut reader = fs.open_read("a").unwrap();
        let mut content = Vec::new();
        reader.read_to_end(&mut content).unwrap();
        assert_eq!(content, b"abc");
    }

    #[test]
    fn test_open_write_truncates() {
        let fs = MemoryFilesystem::new();
        write_file(&fs, "a", b"long content");
        write_file(&fs, "a", b"s");
        assert_eq!(fs.content_of("a").unwrap(), b"s");
    }

    #[test]
    fn test_read_missing_and_directory() {
        let fs = MemoryFilesystem::new();
        fs.mkdir("dir").unwrap();
        assert!(fs.open_read("missing").is_err());
        assert!(fs.open_read("dir").is_err());
    }

    #[test]
    fn test_mkdir_existing_fails() {
        let fs = MemoryFilesystem::new();
        fs.mkdir("dir").unwrap();
        assert!(fs.mkdir("dir").is_err());
        write_file(&fs, "file", b"x");
        assert!(fs.mkdir("file").is_err());
    }

    #[test]
    fn test_write_into_directory_fails() {
        let fs = MemoryFilesystem::new();
        fs.mkdir("dir").unwrap();
        assert!(fs.open_write("dir").is_err());
    }

    #[test]
    fn test_rename_semantics() {
        let fs = MemoryFilesystem::new();
        write_file(&fs, "d", b"abc");
        write_file(&fs, "x", b"abc");
        write_file(&fs, "y", b"123");
        fs.mkdir("dir").unwrap();

        // missing source
        assert!(fs.rename("a", "b").is_err());
        // directory destination
        assert!(fs.rename("y", "dir").is_err());
        // over an existing file and to a fresh name
        fs.rename("x", "d").unwrap();
        fs.rename("d", "b").unwrap();

        assert_eq!(fs.content_of("b").unwrap(), b"abc");
        assert!(!fs.is_path("x"));
        assert!(!fs.is_path("d"));
    }

    #[test]
    fn test_delete_file_and_missing() {
        let fs = MemoryFilesystem::new();
        write_file(&fs, "b", b"abc");
        fs.delete("b").unwrap();
        assert!(fs.delete("b").is_err());
        assert!(fs.delete("a").is_err());
    }

    #[test]
    fn test_delete_directory_is_recursive() {
        let fs = MemoryFilesystem::new();
        fs.mkdir("a").unwrap();
        write_file(&fs, "a/1", b"1");
        write_file(&fs, "a/2", b"2");
        write_file(&fs, "ab", b"kept");

        fs.delete("a").unwrap();
        assert_eq!(fs.list_all().unwrap(), vec!["ab".to_string()]);
    }

    #[test]
    fn test_list_all_is_sorted() {
        let fs = MemoryFilesystem::new();
        write_file(&fs, "z", b"1");
        fs.mkdir("a").unwrap();
        write_file(&fs, "m", b"2");
        assert_eq!(
            fs.list_all().unwrap(),
            vec!["a".to_string(), "m".to_string(), "z".to_string()]
        );
    }

    #[test]
    fn test_clones_share_storage() {
        let fs = MemoryFilesystem::new();
        let clone = fs.clone();
        write_file(&fs, "a", b"abc");
        assert_eq!(clone.content_of("a").unwrap(), b"abc");
    }
}
