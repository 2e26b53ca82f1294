//! Transport-facing message shapes
//!
//! Wire messages are kind-tagged structs in which exactly one of the
//! payload fields is meaningful; the conversions into domain types
//! validate that shape and reject anything malformed as a protocol
//! error. Frames carry these types bincode-encoded, but any framing that
//! round-trips the fields would interoperate.

use crate::error::{Error, Result};
use crate::types::{AdjustmentCommand, Block, HashedFile};
use serde::{Deserialize, Serialize};

/// Discriminator of a wire block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WireBlockKind {
    Hashed,
    Content,
}

/// A block as it travels: one of `hash_sum`/`content` is filled per kind,
/// the other stays empty
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireBlock {
    pub kind: WireBlockKind,
    pub offset: u64,
    pub size: u64,
    pub hash_sum: Vec<u8>,
    pub content: Vec<u8>,
}

/// A manifest entry as it travels
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireHashedFile {
    pub filename: String,
    pub is_dir: bool,
    pub fast_hashes: Vec<WireBlock>,
    pub strong_hashes: Vec<WireBlock>,
}

/// Discriminator of a wire command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WireCommandKind {
    RemoveFile,
    MkDir,
    ApplyBlocksToFile,
}

/// An adjustment command as it travels; `blocks` is empty except for
/// `ApplyBlocksToFile`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireCommand {
    pub kind: WireCommandKind,
    pub filename: String,
    pub blocks: Vec<WireBlock>,
}

impl From<&Block> for WireBlock {
    fn from(block: &Block) -> Self {
        match block {
            Block::Hashed(hashed) => WireBlock {
                kind: WireBlockKind::Hashed,
                offset: hashed.offset,
                size: hashed.size,
                hash_sum: hashed.hash_sum.to_vec(),
                content: Vec::new(),
            },
            Block::Content(content) => WireBlock {
                kind: WireBlockKind::Content,
                offset: content.offset,
                size: content.size,
                hash_sum: Vec::new(),
                content: content.content.to_vec(),
            },
        }
    }
}

impl TryFrom<WireBlock> for Block {
    type Error = Error;

    fn try_from(block: WireBlock) -> Result<Self> {
        match block.kind {
            WireBlockKind::Hashed => {
                if block.hash_sum.is_empty() {
                    return Err(Error::protocol("hashed wire block without a hash sum"));
                }
                Ok(Block::hashed(block.offset, block.size, block.hash_sum))
            }
            WireBlockKind::Content => {
                if block.content.len() as u64 != block.size {
                    return Err(Error::protocol(format!(
                        "content wire block length {} does not match size {}",
                        block.content.len(),
                        block.size
                    )));
                }
                Ok(Block::content(block.offset, block.content))
            }
        }
    }
}

impl From<&HashedFile> for WireHashedFile {
    fn from(file: &HashedFile) -> Self {
        WireHashedFile {
            filename: file.filename.clone(),
            is_dir: file.is_dir,
            fast_hashes: file.fast_hashes.iter().map(WireBlock::from).collect(),
            strong_hashes: file.strong_hashes.iter().map(WireBlock::from).collect(),
        }
    }
}

impl TryFrom<WireHashedFile> for HashedFile {
    type Error = Error;

    fn try_from(file: WireHashedFile) -> Result<Self> {
        if file.fast_hashes.len() != file.strong_hashes.len() {
            return Err(Error::protocol(format!(
                "manifest entry {} has {} fast hashes but {} strong hashes",
                file.filename,
                file.fast_hashes.len(),
                file.strong_hashes.len()
            )));
        }
        let convert_hashes = |blocks: Vec<WireBlock>| -> Result<Vec<Block>> {
            blocks
                .into_iter()
                .map(|block| {
                    if block.kind != WireBlockKind::Hashed {
                        return Err(Error::protocol("manifest hash list carries content"));
                    }
                    Block::try_from(block)
                })
                .collect()
        };
        Ok(HashedFile {
            filename: file.filename,
            is_dir: file.is_dir,
            fast_hashes: convert_hashes(file.fast_hashes)?,
            strong_hashes: convert_hashes(file.strong_hashes)?,
        })
    }
}

impl From<&AdjustmentCommand> for WireCommand {
    fn from(command: &AdjustmentCommand) -> Self {
        match command {
            AdjustmentCommand::RemoveFile { filename } => WireCommand {
                kind: WireCommandKind::RemoveFile,
                filename: filename.clone(),
                blocks: Vec::new(),
            },
            AdjustmentCommand::MkDir { filename } => WireCommand {
                kind: WireCommandKind::MkDir,
                filename: filename.clone(),
                blocks: Vec::new(),
            },
            AdjustmentCommand::ApplyBlocksToFile { filename, blocks } => WireCommand {
                kind: WireCommandKind::ApplyBlocksToFile,
                filename: filename.clone(),
                blocks: blocks.iter().map(WireBlock::from).collect(),
            },
        }
    }
}

impl TryFrom<WireCommand> for AdjustmentCommand {
    type Error = Error;

    fn try_from(command: WireCommand) -> Result<Self> {
        match command.kind {
            WireCommandKind::RemoveFile | WireCommandKind::MkDir => {
                if !command.blocks.is_empty() {
                    return Err(Error::protocol(format!(
                        "command for {} carries unexpected blocks",
                        command.filename
                    )));
                }
                Ok(match command.kind {
                    WireCommandKind::RemoveFile => AdjustmentCommand::RemoveFile {
                        filename: command.filename,
                    },
                    _ => AdjustmentCommand::MkDir {
                        filename: command.filename,
                    },
                })
            }
            WireCommandKind::ApplyBlocksToFile => {
                let blocks = command
                    .blocks
                    .into_iter()
                    .map(Block::try_from)
                    .collect::<Result<Vec<_>>>()?;
                Ok(AdjustmentCommand::ApplyBlocksToFile {
                    filename: command.filename,
                    blocks,
                })
            }
        }
    }
}
