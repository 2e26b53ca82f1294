//! On-disk filesystem rooted at a prefix
//!
//! All names are relative, slash-separated paths below the root the
//! filesystem was created with. Rename maps to `std::fs::rename`, which
//! gives the atomic rename-over-existing the command applier relies on.

use super::{FileReader, FileWriter, VirtualFilesystem};
use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// A real directory tree below a root path
#[derive(Debug, Clone)]
pub struct LocalFilesystem {
    root: PathBuf,
}

impl LocalFilesystem {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, filename: &str) -> PathBuf {
        self.root.join(filename)
    }

    fn relative(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        let mut name = String::new();
        for component in relative.components() {
            if !name.is_empty() {
                name.push('/');
            }
            name.push_str(&component.as_os_str().to_string_lossy());
        }
        name
    }
}

impl VirtualFilesystem for LocalFilesystem {
    fn list_all(&self) -> Result<Vec<String>> {
        let mut filenames = Vec::new();

        for entry in jwalk::WalkDir::new(&self.root)
            .skip_hidden(false)
            .follow_links(false)
        {
            let entry = entry.map_err(|e| {
                Error::filesystem(self.root.display().to_string(), format!("walk failed: {e}"))
            })?;
            let name = self.relative(&entry.path());
            if name.is_empty() {
                continue; // the root itself
            }
            filenames.push(name);
        }

        filenames.sort();
        Ok(filenames)
    }

    fn is_path(&self, filename: &str) -> bool {
        self.resolve(filename).exists()
    }

    fn is_dir(&self, filename: &str) -> bool {
        self.resolve(filename).is_dir()
    }

    fn open_read(&self, filename: &str) -> Result<FileReader> {
        let path = self.resolve(filename);
        if path.is_dir() {
            return Err(Error::filesystem(filename, "file is a directory"));
        }
        let file = fs::File::open(&path)
            .map_err(|e| Error::io(format!("opening {filename} for reading"), e))?;
        Ok(Box::new(file))
    }

    fn open_write(&self, filename: &str) -> Result<FileWriter> {
        let path = self.resolve(filename);
        if path.is_dir() {
            return Err(Error::filesystem(filename, "file is a directory"));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::io(format!("creating parents of {filename}"), e))?;
        }
        let file = fs::File::create(&path)
            .map_err(|e| Error::io(format!("opening {filename} for writing"), e))?;
        Ok(Box::new(file))
    }

    fn mkdir(&self, filename: &str) -> Result<()> {
        let path = self.resolve(filename);
        if path.exists() {
            return Err(Error::filesystem(filename, "file already exists"));
        }
        fs::create_dir_all(&path).map_err(|e| Error::io(format!("creating {filename}"), e))
    }

    fn rename(&self, source: &str, dest: &str) -> Result<()> {
        let source_path = self.resolve(source);
        if !source_path.exists() {
            return Err(Error::filesystem(source, "source file does not exist"));
        }
        let dest_path = self.resolve(dest);
        if dest_path.is_dir() {
            return Err(Error::filesystem(dest, "destination is a directory"));
        }
        fs::rename(&source_path, &dest_path)
            .map_err(|e| Error::io(format!("moving {source} to {dest}"), e))
    }

    fn delete(&self, filename: &str) -> Result<()> {
        let path = self.resolve(filename);
        if !path.exists() {
            return Err(Error::filesystem(filename, "file does not exist"));
        }
        if path.is_dir() {
            fs::remove_dir_all(&path).map_err(|e| Error::io(format!("removing {filename}"), e))
        } else {
            fs::remove_file(&path).map_err(|e| Error::io(format!("removing {filename}"), e))
        }
    }
}
