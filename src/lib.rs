//! driftsync - block-level directory synchronization
//!
//! driftsync keeps a server-held directory tree identical to a
//! client-held one while transferring only the byte ranges the server
//! does not already have. The server advertises per-file block hashes,
//! the client scans its files against them with a two-tier
//! rolling/strong check, and pushes a compact stream of literal bytes
//! and block references that the server applies atomically per file.

pub mod cache;
pub mod checksum;
pub mod cli;
pub mod config;
pub mod delta;
pub mod error;
pub mod service;
pub mod signature;
pub mod sync;
pub mod types;
pub mod vfs;
pub mod watch;
pub mod wire;

pub use config::Config;
pub use error::{Error, Result};
pub use types::*;
