//! Error types for driftsync

use thiserror::Error;

/// Result type alias for driftsync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for driftsync
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors (reading, writing, walking trees)
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Virtual filesystem contract violations (missing paths, type clashes)
    #[error("filesystem error: {path}: {message}")]
    Filesystem { path: String, message: String },

    /// Block stream inconsistencies (offset gaps, unknown hash references,
    /// malformed wire data)
    #[error("protocol error: {message}")]
    Protocol { message: String },

    /// Transport failures (dial, framing, unexpected stream end, remote
    /// failure reported by the peer)
    #[error("transport error: {message}")]
    Transport { message: String },

    /// Frame encode/decode failures
    #[error("codec error: {message}")]
    Codec { message: String },

    /// Configuration errors
    #[error("configuration error: {message}")]
    Config { message: String },

    /// Watcher setup or event delivery failures
    #[error("watch error: {message}")]
    Watch { message: String },
}

impl Error {
    /// Create an I/O error with context
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Create a filesystem error for a path
    pub fn filesystem(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Filesystem {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a protocol error
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Create a transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create a codec error
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a watcher error
    pub fn watch(message: impl Into<String>) -> Self {
        Self::Watch {
            message: message.into(),
        }
    }

    /// Check if this error is a protocol violation (fatal for the current
    /// command, never retried)
    pub fn is_protocol(&self) -> bool {
        matches!(self, Error::Protocol { .. })
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Self::Codec {
            message: err.to_string(),
        }
    }
}
