//! Error types for staging, decoding, encoding and archiving.

use crate::formats::OutputFormat;
use shared_utils::ErrorCategory;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StageError {
    #[error("No HEIC/HEIF files among {candidates} candidate(s)")]
    EmptyBatch { candidates: usize },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The decoder cannot produce this target; the next attempt may work.
    #[error("Cannot decode for {target} output: {reason}")]
    Unsupported { target: OutputFormat, reason: String },

    /// The input itself is broken; no other attempt will help.
    #[error("Malformed input: {0}")]
    Malformed(String),

    /// The decoder could not be loaded at all.
    #[error("Decoder unavailable: {0}")]
    Unavailable(String),
}

impl DecodeError {
    pub fn is_recoverable(&self) -> bool {
        matches!(self, DecodeError::Unsupported { .. })
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            DecodeError::Unsupported { .. } => ErrorCategory::Recoverable,
            DecodeError::Malformed(_) => ErrorCategory::Optional,
            DecodeError::Unavailable(_) => ErrorCategory::Fatal,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("Pixel buffer has {actual} bytes, expected {expected} for {width}x{height}")]
    InvalidBuffer {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error("{format} encoding failed: {reason}")]
    Failed { format: OutputFormat, reason: String },
}

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Nothing to archive: no successful conversions")]
    NoSuccesses,

    #[error("Duplicate archive member: {0}")]
    DuplicateName(String),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error(transparent)]
    Stage(#[from] StageError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error("Batch {generation} was replaced before it started")]
    StaleBatch { generation: u64 },

    #[error("Batch {generation} has already been run")]
    AlreadyRun { generation: u64 },

    #[error("Failed to build worker pool: {0}")]
    WorkerPool(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConvertError>;
