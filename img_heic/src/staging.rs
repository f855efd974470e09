//! Staging: filter, cap and name candidate files before a run.

use crate::config::ExtensionPolicy;
use crate::error::StageError;
use crate::formats::OutputFormat;
use shared_utils::common_utils::name_stem;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

/// A selected file: its name and raw bytes. Immutable once created.
#[derive(Debug, Clone)]
pub struct InputFile {
    name: String,
    bytes: Arc<[u8]>,
}

impl InputFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        let bytes: Vec<u8> = bytes.into();
        Self {
            name: name.into(),
            bytes: Arc::from(bytes),
        }
    }

    /// Read a file from disk, keeping only its file name.
    pub fn read(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(name, bytes))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// An input file accepted into a batch.
#[derive(Debug, Clone)]
pub struct StagedFile {
    /// Position in the staged list (input order).
    pub index: usize,
    /// Output name without extension, unique within the batch.
    pub output_stem: String,
    pub file: InputFile,
}

impl StagedFile {
    pub fn name(&self) -> &str {
        self.file.name()
    }

    pub fn output_name(&self, format: OutputFormat) -> String {
        format!("{}.{}", self.output_stem, format.extension())
    }
}

#[derive(Debug, Clone)]
pub struct StagedBatch {
    pub(crate) generation: u64,
    files: Vec<StagedFile>,
    dropped_by_filter: usize,
    dropped_by_cap: usize,
}

impl StagedBatch {
    /// Batch id assigned by the orchestrator; 0 for a batch staged standalone.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn files(&self) -> &[StagedFile] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.file.size()).sum()
    }

    /// Candidates rejected by the extension filter.
    pub fn dropped_by_filter(&self) -> usize {
        self.dropped_by_filter
    }

    /// Matching candidates beyond the batch cap.
    pub fn dropped_by_cap(&self) -> usize {
        self.dropped_by_cap
    }
}

/// Filter `candidates` by extension, keep the first `max_batch` matches and
/// assign each a batch-unique output stem.
pub fn stage(
    candidates: Vec<InputFile>,
    policy: ExtensionPolicy,
    max_batch: usize,
) -> Result<StagedBatch, StageError> {
    let total = candidates.len();
    let matching: Vec<InputFile> = candidates
        .into_iter()
        .filter(|f| policy.accepts(f.name()))
        .collect();

    if matching.is_empty() || max_batch == 0 {
        return Err(StageError::EmptyBatch { candidates: total });
    }

    let dropped_by_filter = total - matching.len();
    let dropped_by_cap = matching.len().saturating_sub(max_batch);

    let mut taken = HashSet::new();
    let files = matching
        .into_iter()
        .take(max_batch)
        .enumerate()
        .map(|(index, file)| StagedFile {
            index,
            output_stem: unique_stem(file.name(), &mut taken),
            file,
        })
        .collect();

    Ok(StagedBatch {
        generation: 0,
        files,
        dropped_by_filter,
        dropped_by_cap,
    })
}

/// `IMG_1`, then `IMG_1 (2)`, `IMG_1 (3)`... compared case-insensitively.
fn unique_stem(name: &str, taken: &mut HashSet<String>) -> String {
    let stem = match name_stem(name) {
        "" => "image",
        s => s,
    };

    let mut candidate = stem.to_string();
    let mut n = 2;
    while !taken.insert(candidate.to_lowercase()) {
        candidate = format!("{} ({})", stem, n);
        n += 1;
    }
    candidate
}
