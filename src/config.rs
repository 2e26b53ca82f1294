//! Runtime configuration for driftsync

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default block size for hashing and scanning (64 KiB)
pub const DEFAULT_BLOCK_SIZE: usize = 64 * 1024;

/// Default address both binaries fall back to
pub const DEFAULT_ADDRESS: &str = "127.0.0.1:20000";

/// Environment variable overriding the listen/dial address
pub const ADDRESS_ENV: &str = "DRIFTSYNC_ADDR";

/// Default debounce window for watch mode in milliseconds
pub const DEFAULT_DEBOUNCE_MS: u64 = 200;

/// Shared configuration of the client and server binaries
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Alignment at which the server hashes its files and the client
    /// scans; both sides of a deployment must agree
    pub block_size: usize,

    /// Address the server listens on and the client dials
    pub address: String,

    /// Debounce window for the filesystem watcher in milliseconds
    pub debounce_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            address: DEFAULT_ADDRESS.to_string(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
        }
    }
}

impl Config {
    /// Defaults with the address taken from `DRIFTSYNC_ADDR` when set
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(address) = std::env::var(ADDRESS_ENV) {
            if !address.is_empty() {
                config.address = address;
            }
        }
        config
    }

    /// The watcher debounce window as a duration
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Reject configurations the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(Error::config("block size must be positive"));
        }
        if self.address.is_empty() {
            return Err(Error::config("address must not be empty"));
        }
        Ok(())
    }
}
