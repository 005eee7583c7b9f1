// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Error types for the motion-capture library.

use std::fmt;

/// Result type alias for motion-capture operations.
pub type Result<T> = std::result::Result<T, MocapError>;

/// Main error type for the motion-capture library.
#[derive(Debug)]
pub enum MocapError {
    /// Wrapped `std::io::Error`.
    Io(std::io::Error),
    /// A recorded frame file (or calibration file) deviated from the known layouts.
    Parse(String),
    /// Error reported by a live data-stream client.
    Provider(String),
    /// Invalid configuration provided (e.g. a recording folder that is not a directory).
    Config(String),
}

impl fmt::Display for MocapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "IO error: {err}"),
            Self::Parse(msg) => write!(f, "Parse error: {msg}"),
            Self::Provider(msg) => write!(f, "Provider error: {msg}"),
            Self::Config(msg) => write!(f, "Config error: {msg}"),
        }
    }
}

impl std::error::Error for MocapError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for MocapError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}
