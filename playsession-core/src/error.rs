//! Error handling shared across the gameplay session core.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by [`crate::fs`]'s atomic save/load helpers.
#[derive(Error, Debug)]
#[must_use]
pub enum FsError {
    #[error("invalid path: {0:?}")]
    InvalidPath(PathBuf),
    #[error("{context}: {source}")]
    Io {
        context: String,
        source: std::io::Error,
    },
}

impl FsError {
    pub fn io(source: std::io::Error, context: impl Into<String>) -> Self {
        Self::Io { context: context.into(), source }
    }
}

/// Error kinds consumed by the gameplay session core (spec §7).
#[derive(Error, Debug)]
#[must_use]
pub enum Error {
    /// Save-stater rejected the serialize/deserialize request.
    #[error("failed to serialize state: {0}")]
    SerializeFailure(String),
    #[error("failed to deserialize state: {0}")]
    DeserializeFailure(String),
    /// Load from a slot that has no file on disk.
    #[error("no save in slot {0}")]
    SlotEmpty(u8),
    /// Atomic disk write failed.
    #[error(transparent)]
    DiskWriteFailure(#[from] FsError),
    /// Rumble CHT file failed to parse.
    #[error("failed to parse rumble file: {0}")]
    CHTParseError(String),
}
