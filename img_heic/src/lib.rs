//! Batch HEIC/HEIF conversion to JPEG, with PNG fallback and zip output.

pub mod activity_log;
pub mod archive;
pub mod config;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod formats;
pub mod handles;
pub mod observer;
pub mod orchestrator;
pub mod outcome;
pub mod staging;
pub mod state;

#[cfg(feature = "libheif")]
pub mod heif;

mod orchestrator_tests;

pub use activity_log::{ActivityLog, LogEntry, Severity};
pub use archive::{archive, ArchiveWriter, NamedBuffer, ZipArchiveWriter};
pub use config::{ConcurrencyPolicy, ConvertConfig, ExtensionPolicy};
pub use decoder::{
    default_decoder, DecodeAttempt, Decoded, FallbackDecoder, HeicDecoder, PixelBuffer,
    PixelLayout, SniffingDecoder, TargetedDecoder, UnavailableDecoder,
};
pub use encoder::{ImageEncoder, PixelEncoder};
pub use error::{ArchiveError, ConvertError, DecodeError, EncodeError, Result, StageError};
pub use formats::{sniff_container, ContainerKind, OutputFormat};
pub use handles::{HandleRegistry, ResultHandle};
pub use observer::{BatchEvent, BatchObserver, ChannelObserver};
pub use orchestrator::Orchestrator;
pub use outcome::{BatchReport, ConversionOutcome, Failure, FailureReason, OutcomeSummary, Success};
pub use staging::{stage, InputFile, StagedBatch, StagedFile};
pub use state::{BatchSnapshot, BatchStatus};

#[cfg(feature = "libheif")]
pub use heif::LibheifDecoder;
