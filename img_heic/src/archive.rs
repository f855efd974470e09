//! Zip archive of conversion results

use crate::error::ArchiveError;
use crate::outcome::Success;
use std::collections::HashSet;
use std::io::{Cursor, Write};
use std::sync::Arc;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// One archive member.
#[derive(Debug, Clone)]
pub struct NamedBuffer {
    pub name: String,
    pub bytes: Arc<[u8]>,
}

impl From<&Success> for NamedBuffer {
    fn from(s: &Success) -> Self {
        Self {
            name: s.output_name.clone(),
            bytes: Arc::clone(&s.bytes),
        }
    }
}

pub trait ArchiveWriter: Send + Sync {
    /// Write `entries` in the given order and return the archive bytes.
    fn write(&self, entries: &[NamedBuffer]) -> Result<Vec<u8>, ArchiveError>;
}

#[derive(Debug, Clone, Copy)]
pub struct ZipArchiveWriter {
    method: CompressionMethod,
}

impl Default for ZipArchiveWriter {
    /// JPEG and PNG are already compressed, so entries are stored as-is.
    fn default() -> Self {
        Self {
            method: CompressionMethod::Stored,
        }
    }
}

impl ZipArchiveWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deflated() -> Self {
        Self {
            method: CompressionMethod::Deflated,
        }
    }
}

impl ArchiveWriter for ZipArchiveWriter {
    fn write(&self, entries: &[NamedBuffer]) -> Result<Vec<u8>, ArchiveError> {
        let options = SimpleFileOptions::default().compression_method(self.method);
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for entry in entries {
            zip.start_file(entry.name.as_str(), options)?;
            zip.write_all(&entry.bytes)?;
        }
        Ok(zip.finish()?.into_inner())
    }
}

/// Bundle `successes` into one archive, members sorted by output name.
pub fn archive(successes: &[&Success], writer: &dyn ArchiveWriter) -> Result<Vec<u8>, ArchiveError> {
    if successes.is_empty() {
        return Err(ArchiveError::NoSuccesses);
    }

    let mut entries: Vec<NamedBuffer> = successes.iter().map(|s| NamedBuffer::from(*s)).collect();
    entries.sort_by(|a, b| a.name.cmp(&b.name));

    let mut seen = HashSet::new();
    for entry in &entries {
        if !seen.insert(entry.name.to_lowercase()) {
            return Err(ArchiveError::DuplicateName(entry.name.clone()));
        }
    }

    let bytes = writer.write(&entries)?;
    debug!(members = entries.len(), bytes = bytes.len(), "archive written");
    Ok(bytes)
}
