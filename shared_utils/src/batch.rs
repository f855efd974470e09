//! Batch Processing Module
//!
//! Provides utilities for batch file collection and outcome counting.

use serde::Serialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub fn collect_files(dir: &Path, extensions: &[&str], recursive: bool) -> Vec<PathBuf> {
    let walker = if recursive {
        WalkDir::new(dir).follow_links(true)
    } else {
        WalkDir::new(dir).max_depth(1)
    };

    let mut files: Vec<PathBuf> = walker
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| crate::common_utils::has_extension(e.path(), extensions))
        .map(|e| e.path().to_path_buf())
        .collect();
    // walkdir order is filesystem dependent
    files.sort();
    files
}

/// Expand a mixed list of files and directories into a flat file list.
///
/// Files are kept as given (filtering is the caller's job); directories are
/// walked and only entries with one of `extensions` are returned.
pub fn collect_inputs(inputs: &[PathBuf], extensions: &[&str], recursive: bool) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            files.extend(collect_files(input, extensions, recursive));
        } else {
            files.push(input.clone());
        }
    }
    files
}

pub const HEIC_EXTENSIONS: &[&str] = &["heic", "heif"];

#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub errors: Vec<(String, String)>,
}

impl BatchResult {
    pub fn new() -> Self {
        Self {
            total: 0,
            succeeded: 0,
            failed: 0,
            skipped: 0,
            errors: Vec::new(),
        }
    }

    pub fn success(&mut self) {
        self.total += 1;
        self.succeeded += 1;
    }

    pub fn fail(&mut self, name: impl Into<String>, error: impl Into<String>) {
        self.total += 1;
        self.failed += 1;
        self.errors.push((name.into(), error.into()));
    }

    pub fn skip(&mut self) {
        self.total += 1;
        self.skipped += 1;
    }

    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            (self.succeeded as f64 / self.total as f64) * 100.0
        }
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

impl Default for BatchResult {
    fn default() -> Self {
        Self::new()
    }
}
