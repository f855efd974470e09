//! Conversion configuration

use crate::formats::OutputFormat;
use serde::{Deserialize, Serialize};

/// Files beyond this count are dropped at staging time.
pub const DEFAULT_MAX_BATCH: usize = 100;
pub const DEFAULT_WORKERS: usize = 3;
pub const DEFAULT_QUALITY: f32 = 0.92;
pub const DEFAULT_LOG_CAPACITY: usize = 100;
/// Upper bound on decode attempts per file, fallbacks included.
pub const MAX_DECODE_ATTEMPTS: usize = 2;
/// Overrides the default worker count of the pooled policy.
pub const WORKERS_ENV: &str = "IMG_HEIC_WORKERS";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtensionPolicy {
    #[default]
    HeicAndHeif,
    HeicOnly,
}

impl ExtensionPolicy {
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            ExtensionPolicy::HeicAndHeif => shared_utils::HEIC_EXTENSIONS,
            ExtensionPolicy::HeicOnly => &["heic"],
        }
    }

    pub fn accepts(self, name: &str) -> bool {
        shared_utils::common_utils::name_has_extension(name, self.extensions())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ConcurrencyPolicy {
    /// File i+1 starts only after file i is recorded.
    Sequential,
    /// A fixed number of workers claim files from a shared queue.
    Pooled { workers: usize },
}

impl Default for ConcurrencyPolicy {
    fn default() -> Self {
        ConcurrencyPolicy::Pooled {
            workers: DEFAULT_WORKERS,
        }
    }
}

impl ConcurrencyPolicy {
    pub fn workers(self) -> usize {
        match self {
            ConcurrencyPolicy::Sequential => 1,
            ConcurrencyPolicy::Pooled { workers } => workers.max(1),
        }
    }

    /// Pooled policy with the worker count from `IMG_HEIC_WORKERS`, if set and valid.
    pub fn from_env() -> Self {
        Self::from_env_value(std::env::var(WORKERS_ENV).ok().as_deref())
    }

    fn from_env_value(value: Option<&str>) -> Self {
        match value.and_then(|v| v.trim().parse::<usize>().ok()) {
            Some(0) | None => Self::default(),
            Some(1) => ConcurrencyPolicy::Sequential,
            Some(workers) => ConcurrencyPolicy::Pooled { workers },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvertConfig {
    pub extensions: ExtensionPolicy,
    pub max_batch: usize,
    pub concurrency: ConcurrencyPolicy,
    /// Preferred output; PNG is still used when the decoder falls back.
    pub output_format: OutputFormat,
    /// Encoder quality in 0..=1 (JPEG only).
    pub quality: f32,
    pub log_capacity: usize,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            extensions: ExtensionPolicy::default(),
            max_batch: DEFAULT_MAX_BATCH,
            concurrency: ConcurrencyPolicy::default(),
            output_format: OutputFormat::Jpeg,
            quality: DEFAULT_QUALITY,
            log_capacity: DEFAULT_LOG_CAPACITY,
        }
    }
}

impl ConvertConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_extensions(mut self, policy: ExtensionPolicy) -> Self {
        self.extensions = policy;
        self
    }

    pub fn with_max_batch(mut self, max: usize) -> Self {
        self.max_batch = max;
        self
    }

    pub fn with_concurrency(mut self, policy: ConcurrencyPolicy) -> Self {
        self.concurrency = policy;
        self
    }

    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    pub fn with_quality(mut self, quality: f32) -> Self {
        self.quality = if quality.is_nan() {
            DEFAULT_QUALITY
        } else {
            quality.clamp(0.0, 1.0)
        };
        self
    }

    pub fn with_log_capacity(mut self, capacity: usize) -> Self {
        self.log_capacity = capacity.max(1);
        self
    }
}
