//! CLI argument parsing for the driftsync binaries

use crate::config::{Config, DEFAULT_BLOCK_SIZE, DEFAULT_DEBOUNCE_MS};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Mirror a local directory onto a driftsync server
#[derive(Parser, Debug)]
#[command(name = "driftsync-client")]
#[command(version, about, long_about = None)]
pub struct ClientArgs {
    /// Directory to mirror to the server
    pub target_dir: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Output logs as JSON
    #[arg(long)]
    pub json: bool,

    /// Block size in bytes for delta scanning
    #[arg(long, default_value_t = DEFAULT_BLOCK_SIZE)]
    pub block_size: usize,

    /// Keep watching the directory and sync on every change
    #[arg(short, long)]
    pub watch: bool,

    /// Debounce window for watch mode in milliseconds
    #[arg(long, default_value_t = DEFAULT_DEBOUNCE_MS)]
    pub debounce: u64,
}

impl ClientArgs {
    pub fn to_config(&self) -> Config {
        let mut config = Config::from_env();
        config.block_size = self.block_size;
        config.debounce_ms = self.debounce;
        config
    }
}

/// Serve a directory as the target of driftsync clients
#[derive(Parser, Debug)]
#[command(name = "driftsync-server")]
#[command(version, about, long_about = None)]
pub struct ServerArgs {
    /// Directory to keep in sync with the client
    pub target_dir: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Output logs as JSON
    #[arg(long)]
    pub json: bool,

    /// Block size in bytes for manifest hashing
    #[arg(long, default_value_t = DEFAULT_BLOCK_SIZE)]
    pub block_size: usize,
}

impl ServerArgs {
    pub fn to_config(&self) -> Config {
        let mut config = Config::from_env();
        config.block_size = self.block_size;
        config
    }
}

/// Initialize tracing for a binary
pub fn init_tracing(verbose: u8, json: bool) {
    let filter = match verbose {
        0 => EnvFilter::new("driftsync=info"),
        1 => EnvFilter::new("driftsync=debug"),
        2 => EnvFilter::new("driftsync=trace"),
        _ => EnvFilter::new("trace"),
    };

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_args_parse() {
        let args =
            ClientArgs::parse_from(["driftsync-client", "some/dir", "-v", "--block-size", "4096"]);
        assert_eq!(args.target_dir, PathBuf::from("some/dir"));
        assert_eq!(args.verbose, 1);
        assert_eq!(args.block_size, 4096);
        assert!(!args.watch);
    }

    #[test]
    fn test_server_args_defaults() {
        let args = ServerArgs::parse_from(["driftsync-server", "dir"]);
        assert_eq!(args.block_size, DEFAULT_BLOCK_SIZE);
        assert_eq!(args.verbose, 0);
    }

    #[test]
    fn test_watch_flags() {
        let args = ClientArgs::parse_from(["driftsync-client", "dir", "--watch", "--debounce", "50"]);
        assert!(args.watch);
        assert_eq!(args.debounce, 50);
        assert_eq!(args.to_config().debounce_ms, 50);
    }
}
