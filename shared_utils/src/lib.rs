//! Shared Utilities for the img_heic tools
//!
//! This crate provides common functionality used by the conversion crates:
//! - Logging bootstrap (tracing + rolling log file)
//! - Batch result counters and file collection
//! - Summary reporting
//! - Progress bar
//! - Error categories
//! - Extension helpers

pub mod batch;
pub mod common_utils;
pub mod error_handler;
pub mod logging;
pub mod progress;
pub mod report;
pub mod unified_progress;

pub use batch::*;
pub use error_handler::{handle_error, install_panic_handler, report_error, ErrorAction, ErrorCategory};
pub use progress::{format_bytes, format_duration};
pub use report::*;
pub use unified_progress::UnifiedProgressBar;
