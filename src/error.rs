//! Error types shared by every stage of the installer pipeline.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// The pipeline stage an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Locate,
    Copy,
    Validate,
    Unpack,
    Workspace,
    Other,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Locate => "locate",
            Phase::Copy => "copy",
            Phase::Validate => "validate",
            Phase::Unpack => "unpack",
            Phase::Workspace => "workspace",
            Phase::Other => "install",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// No location strategy found an embedded container.
    #[error("no embedded archive found in '{path}'")]
    NotFound { path: PathBuf },

    #[error("invalid byte range: offset {offset} + size {size} exceeds {available} available bytes")]
    InvalidRange {
        offset: u64,
        size: u64,
        available: u64,
    },

    #[error("I/O error on '{path}'")]
    IoAt {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Copied bytes do not form a sound container.
    #[error("integrity check failed for '{path}': {reason}")]
    IntegrityMismatch { path: PathBuf, reason: String },

    #[error("invalid container: {0}")]
    InvalidContainer(String),

    #[error("unsupported compression method: {0}")]
    UnsupportedCompression(u16),

    #[error("failed to extract '{path}': {reason}")]
    Extraction { path: PathBuf, reason: String },

    /// Scratch storage could not be created or removed.
    #[error("scratch workspace '{path}' unavailable")]
    Workspace {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unexpected error: {0}")]
    Unexpected(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn io_at(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::IoAt {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn workspace(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Workspace {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidContainer(reason.into())
    }

    pub(crate) fn extraction(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Extraction {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Stage this error is attributed to when no better context is known.
    pub fn phase(&self) -> Phase {
        match self {
            Error::NotFound { .. } => Phase::Locate,
            Error::InvalidRange { .. } | Error::IoAt { .. } | Error::Io(_) => Phase::Copy,
            Error::IntegrityMismatch { .. } | Error::InvalidContainer(_) => Phase::Validate,
            Error::UnsupportedCompression(_) | Error::Extraction { .. } => Phase::Unpack,
            Error::Workspace { .. } => Phase::Workspace,
            Error::Unexpected(_) => Phase::Other,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
