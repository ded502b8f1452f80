use std::{io, path::PathBuf};
use thiserror::Error;

/// Failures talking to the serial device.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("failed to open {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },
    #[error("write to {port} failed: {source}")]
    Write {
        port: String,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Error)]
pub enum SessionError {
    /// Nothing to stream; the session stays idle.
    #[error("no object selected")]
    NoTarget,
    #[error("scale factor {channel} is {value}; factors must be finite and >= 0")]
    InvalidScale { channel: usize, value: f64 },
    #[error("failed to spawn streaming worker: {0}")]
    Spawn(#[source] io::Error),
    #[error(transparent)]
    Link(#[from] LinkError),
}

impl SessionError {
    // recoverable conditions the control surface shows as a warning, not a failure
    pub fn is_warning(&self) -> bool {
        matches!(self, SessionError::NoTarget)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}
