//! Core domain types for driftsync

use bytes::Bytes;
use std::fmt;
use std::io::Read;

/// A block of file data: either literal content or a reference to content
/// the other side already knows by its strong hash.
///
/// Offsets are local to the side that produced the block. A client offset
/// and a server offset for the same bytes will usually differ and must
/// never be compared across sides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// Reference to previously known content
    Hashed(HashedBlock),
    /// Literal data
    Content(ContentBlock),
}

/// A reference to a block of content by its hash
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashedBlock {
    /// Offset of the block in the file it was observed in
    pub offset: u64,
    /// Size of the referenced content (may be smaller than the block size
    /// at the end of a file)
    pub size: u64,
    /// Digest identifying the content
    pub hash_sum: Bytes,
}

/// A block of literal file content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentBlock {
    /// Offset of the block in the file it was read from
    pub offset: u64,
    /// Length of `content`
    pub size: u64,
    /// The bytes themselves
    pub content: Bytes,
}

impl Block {
    /// Create a hashed block
    pub fn hashed(offset: u64, size: u64, hash_sum: impl Into<Bytes>) -> Self {
        Block::Hashed(HashedBlock {
            offset,
            size,
            hash_sum: hash_sum.into(),
        })
    }

    /// Create a content block; the size is the content length
    pub fn content(offset: u64, content: impl Into<Bytes>) -> Self {
        let content = content.into();
        Block::Content(ContentBlock {
            offset,
            size: content.len() as u64,
            content,
        })
    }

    /// Offset of the block in its source file
    pub fn offset(&self) -> u64 {
        match self {
            Block::Hashed(b) => b.offset,
            Block::Content(b) => b.offset,
        }
    }

    /// Size of the block in bytes
    pub fn size(&self) -> u64 {
        match self {
            Block::Hashed(b) => b.size,
            Block::Content(b) => b.size,
        }
    }

    /// Is this a hash reference?
    pub fn is_hashed(&self) -> bool {
        matches!(self, Block::Hashed(_))
    }

    /// Is this literal content?
    pub fn is_content(&self) -> bool {
        matches!(self, Block::Content(_))
    }

    pub fn as_hashed(&self) -> Option<&HashedBlock> {
        match self {
            Block::Hashed(b) => Some(b),
            Block::Content(_) => None,
        }
    }

    pub fn as_content(&self) -> Option<&ContentBlock> {
        match self {
            Block::Content(b) => Some(b),
            Block::Hashed(_) => None,
        }
    }
}

/// Server-side representation of a file: its name and the aligned fast and
/// strong hashes of its content, partitioned into blocks of the configured
/// block size (the last block may be shorter).
///
/// Both hash lists are empty when the entry is a directory; otherwise they
/// have equal length and are index-aligned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashedFile {
    pub filename: String,
    pub is_dir: bool,
    pub fast_hashes: Vec<Block>,
    pub strong_hashes: Vec<Block>,
}

impl HashedFile {
    /// Manifest entry for a directory
    pub fn dir(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            is_dir: true,
            fast_hashes: Vec::new(),
            strong_hashes: Vec::new(),
        }
    }

    /// Manifest entry for a regular file
    pub fn file(
        filename: impl Into<String>,
        fast_hashes: Vec<Block>,
        strong_hashes: Vec<Block>,
    ) -> Self {
        Self {
            filename: filename.into(),
            is_dir: false,
            fast_hashes,
            strong_hashes,
        }
    }
}

/// Client-side representation of a file. The reader is `None` for
/// directories and is consumed when the file is scanned.
pub struct VirtualFile {
    pub filename: String,
    pub is_dir: bool,
    pub reader: Option<Box<dyn Read + Send>>,
}

impl VirtualFile {
    /// Entry for a directory
    pub fn dir(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            is_dir: true,
            reader: None,
        }
    }

    /// Entry for a regular file with its content reader
    pub fn file(filename: impl Into<String>, reader: Box<dyn Read + Send>) -> Self {
        Self {
            filename: filename.into(),
            is_dir: false,
            reader: Some(reader),
        }
    }
}

impl fmt::Debug for VirtualFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualFile")
            .field("filename", &self.filename)
            .field("is_dir", &self.is_dir)
            .field("reader", &self.reader.as_ref().map(|_| ".."))
            .finish()
    }
}

/// An instruction for the server to bring one entry of its tree in line
/// with the client's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdjustmentCommand {
    /// Delete the path (recursively for directories)
    RemoveFile { filename: String },
    /// Create the directory
    MkDir { filename: String },
    /// Rewrite the file from the ordered block stream; blocks cover
    /// `[0, file_size)` exactly, with no gaps or overlaps
    ApplyBlocksToFile {
        filename: String,
        blocks: Vec<Block>,
    },
}

impl AdjustmentCommand {
    /// The path this command acts on
    pub fn filename(&self) -> &str {
        match self {
            AdjustmentCommand::RemoveFile { filename }
            | AdjustmentCommand::MkDir { filename }
            | AdjustmentCommand::ApplyBlocksToFile { filename, .. } => filename,
        }
    }
}

/// Per-cycle accounting reported by the client after each sync cycle
#[derive(Debug, Clone, Copy, Default)]
pub struct CycleStats {
    /// Total commands sent
    pub commands: u64,
    /// `RemoveFile` commands
    pub removes: u64,
    /// `MkDir` commands
    pub mkdirs: u64,
    /// `ApplyBlocksToFile` commands
    pub applies: u64,
    /// Hash references sent (bytes the server already had)
    pub hashed_blocks: u64,
    /// Literal blocks sent
    pub content_blocks: u64,
    /// Bytes shipped as literal content
    pub literal_bytes: u64,
    /// Bytes referenced instead of shipped
    pub reused_bytes: u64,
    /// Bytes the server reported writing while applying
    pub applied_bytes: u64,
}

impl CycleStats {
    /// Account for one outgoing command
    pub fn record(&mut self, command: &AdjustmentCommand) {
        self.commands += 1;
        match command {
            AdjustmentCommand::RemoveFile { .. } => self.removes += 1,
            AdjustmentCommand::MkDir { .. } => self.mkdirs += 1,
            AdjustmentCommand::ApplyBlocksToFile { blocks, .. } => {
                self.applies += 1;
                for block in blocks {
                    match block {
                        Block::Hashed(b) => {
                            self.hashed_blocks += 1;
                            self.reused_bytes += b.size;
                        }
                        Block::Content(b) => {
                            self.content_blocks += 1;
                            self.literal_bytes += b.size;
                        }
                    }
                }
            }
        }
    }

    /// Share of the rewritten bytes that did not travel over the wire
    pub fn savings_percent(&self) -> f64 {
        let total = self.literal_bytes + self.reused_bytes;
        if total == 0 {
            0.0
        } else {
            (self.reused_bytes as f64 / total as f64) * 100.0
        }
    }
}
