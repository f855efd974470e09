//! Batch Conversion Orchestrator
//!
//! Owns the staged batch, drives every file through the decode/encode
//! collaborators and keeps the batch state, the activity log and the
//! observers in step.
//!
//! All state mutation happens under one lock. Events are emitted while
//! that lock is held, so observers see completed-counts and progress in
//! the order they were recorded.
//!
//! Every staged batch gets a new generation. Outcomes from a run whose
//! generation is no longer current are discarded, which is how staging a
//! new batch abandons one that is still in flight.

use crate::activity_log::{ActivityLog, LogEntry, Severity};
use crate::archive::{self, ArchiveWriter};
use crate::config::{ConcurrencyPolicy, ConvertConfig};
use crate::decoder::{Decoded, HeicDecoder};
use crate::encoder::PixelEncoder;
use crate::error::{ConvertError, DecodeError, Result, StageError};
use crate::observer::{BatchEvent, BatchObserver, ChannelObserver};
use crate::outcome::{BatchReport, ConversionOutcome, Failure, FailureReason, Success};
use crate::staging::{self, InputFile, StagedBatch, StagedFile};
use crate::state::{BatchSnapshot, BatchState, BatchStatus, Recorded};
use rayon::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, RwLock};
use std::time::Instant;
use tracing::{debug, info, warn};

struct Inner {
    state: BatchState,
    log: ActivityLog,
}

pub struct Orchestrator {
    config: ConvertConfig,
    inner: Mutex<Inner>,
    next_generation: AtomicU64,
    observers: RwLock<Vec<Arc<dyn BatchObserver>>>,
}

/// Per-run context shared by all workers.
struct RunContext<'a> {
    generation: u64,
    decoder: &'a dyn HeicDecoder,
    encoder: &'a dyn PixelEncoder,
    abort: OnceLock<String>,
    accepted: Mutex<Vec<ConversionOutcome>>,
}

impl Orchestrator {
    pub fn new(config: ConvertConfig) -> Self {
        let log = ActivityLog::new(config.log_capacity);
        Self {
            config,
            inner: Mutex::new(Inner {
                state: BatchState::default(),
                log,
            }),
            next_generation: AtomicU64::new(0),
            observers: RwLock::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &ConvertConfig {
        &self.config
    }

    /// Observers are called under the state lock and must not call back in.
    pub fn add_observer(&self, observer: Arc<dyn BatchObserver>) {
        self.observers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(observer);
    }

    pub fn subscribe(&self) -> Receiver<BatchEvent> {
        let (observer, rx) = ChannelObserver::new();
        self.add_observer(Arc::new(observer));
        rx
    }

    /// Filter, cap and name `candidates` into a new batch.
    ///
    /// On success the previous batch is replaced and any run still working
    /// on it is abandoned. On `EmptyBatch` the previous state is kept.
    pub fn stage(&self, candidates: Vec<InputFile>) -> std::result::Result<StagedBatch, StageError> {
        let staged = staging::stage(candidates, self.config.extensions, self.config.max_batch);

        let mut inner = self.lock();
        let mut batch = match staged {
            Ok(batch) => batch,
            Err(e) => {
                self.log(&mut inner, Severity::Error, e.to_string());
                return Err(e);
            }
        };

        batch.generation = self.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
        if inner.state.status() == BatchStatus::Running {
            warn!(
                old = inner.state.generation(),
                new = batch.generation,
                "abandoning in-flight batch"
            );
        }
        inner.state.staged(&batch);

        let mut message = format!("Staged {} file(s)", batch.len());
        if batch.dropped_by_cap() > 0 {
            message.push_str(&format!(
                ", {} over the limit of {} dropped",
                batch.dropped_by_cap(),
                self.config.max_batch
            ));
        }
        if batch.dropped_by_filter() > 0 {
            message.push_str(&format!(", {} non-HEIC ignored", batch.dropped_by_filter()));
        }
        self.log(&mut inner, Severity::Info, message);
        self.emit(&BatchEvent::Staged(inner.state.snapshot()));

        Ok(batch)
    }

    /// Convert every file of `batch` exactly once.
    ///
    /// `batch` must be the most recently staged one and not yet run.
    pub fn run(
        &self,
        batch: &StagedBatch,
        decoder: &dyn HeicDecoder,
        encoder: &dyn PixelEncoder,
    ) -> Result<BatchReport> {
        let pool = match self.config.concurrency {
            ConcurrencyPolicy::Sequential => None,
            ConcurrencyPolicy::Pooled { .. } => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(self.config.concurrency.workers())
                    .build()
                    .map_err(|e| ConvertError::WorkerPool(e.to_string()))?,
            ),
        };

        {
            let mut inner = self.lock();
            if inner.state.generation() != batch.generation() {
                return Err(ConvertError::StaleBatch {
                    generation: batch.generation(),
                });
            }
            if inner.state.has_run() {
                return Err(ConvertError::AlreadyRun {
                    generation: batch.generation(),
                });
            }
            inner.state.start();
            let message = format!(
                "Converting {} file(s) ({})",
                batch.len(),
                match self.config.concurrency {
                    ConcurrencyPolicy::Sequential => "sequential".to_string(),
                    ConcurrencyPolicy::Pooled { .. } =>
                        format!("{} workers", self.config.concurrency.workers()),
                }
            );
            self.log(&mut inner, Severity::Info, message);
        }

        let ctx = RunContext {
            generation: batch.generation(),
            decoder,
            encoder,
            abort: OnceLock::new(),
            accepted: Mutex::new(Vec::with_capacity(batch.len())),
        };

        let start = Instant::now();
        match &pool {
            None => {
                for file in batch.files() {
                    self.process(file, &ctx);
                }
            }
            Some(pool) => pool.install(|| {
                batch.files().par_iter().for_each(|file| self.process(file, &ctx));
            }),
        }

        let abandoned = !self.is_current(ctx.generation);
        let outcomes = ctx.accepted.into_inner().unwrap_or_else(|e| e.into_inner());
        let report = BatchReport {
            generation: ctx.generation,
            outcomes,
            aborted: ctx.abort.into_inner(),
            abandoned,
        };

        let summary = report.summary();
        info!(
            generation = report.generation,
            succeeded = summary.succeeded,
            failed = summary.failed,
            abandoned,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "run finished"
        );
        Ok(report)
    }

    fn process(&self, file: &StagedFile, ctx: &RunContext<'_>) {
        if let Some(cause) = ctx.abort.get() {
            let outcome = failure(file, FailureReason::NotAttempted(cause.clone()));
            self.record(ctx, outcome);
            return;
        }

        {
            let mut inner = self.lock();
            if inner.state.generation() != ctx.generation {
                debug!(file = file.name(), "skipping file of abandoned batch");
                return;
            }
            self.log(&mut inner, Severity::Process, format!("Converting {}", file.name()));
        }

        let outcome = self.convert(file, ctx);
        self.record(ctx, outcome);
    }

    fn convert(&self, file: &StagedFile, ctx: &RunContext<'_>) -> ConversionOutcome {
        let decoded = match ctx.decoder.decode(file.file.bytes()) {
            Ok(decoded) => decoded,
            Err(e) => {
                debug!(file = file.name(), category = %e.category(), error = %e, "decode failed");
                if let DecodeError::Unavailable(cause) = &e {
                    if ctx.abort.set(cause.clone()).is_ok() {
                        let mut inner = self.lock();
                        self.log(
                            &mut inner,
                            Severity::Error,
                            format!("Decoder unavailable, remaining files skipped: {}", cause),
                        );
                    }
                }
                return failure(file, FailureReason::Decode(e.to_string()));
            }
        };

        let (format, bytes) = match decoded {
            Decoded::Encoded { format, bytes } => (format, bytes),
            Decoded::Pixels { buffer, target } => {
                match ctx.encoder.encode(&buffer, target, self.config.quality) {
                    Ok(bytes) => (target, bytes),
                    Err(e) => return failure(file, FailureReason::Encode(e.to_string())),
                }
            }
        };

        ConversionOutcome::Success(Success {
            input_name: file.name().to_string(),
            input_index: file.index,
            output_name: file.output_name(format),
            format,
            size: bytes.len() as u64,
            bytes: Arc::from(bytes),
        })
    }

    fn record(&self, ctx: &RunContext<'_>, outcome: ConversionOutcome) {
        let mut inner = self.lock();
        let (completed, progress) = match inner.state.file_completed(ctx.generation, outcome.clone()) {
            Recorded::Accepted {
                completed,
                progress,
            } => (completed, progress),
            Recorded::Stale => {
                debug!(file = outcome.input_name(), "discarding outcome of abandoned batch");
                return;
            }
            Recorded::Duplicate => {
                warn!(file = outcome.input_name(), "outcome already recorded, ignoring");
                return;
            }
        };

        let message = match &outcome {
            ConversionOutcome::Success(s) => (
                Severity::Success,
                format!("{} → {}", s.input_name, s.output_name),
            ),
            ConversionOutcome::Failure(f) => (Severity::Error, format!("{}: {}", f.input_name, f.reason)),
        };
        self.log(&mut inner, message.0, message.1);

        self.emit(&BatchEvent::Outcome {
            generation: ctx.generation,
            outcome: outcome.clone(),
        });
        self.emit(&BatchEvent::Progress {
            generation: ctx.generation,
            completed,
            total: inner.state.total(),
            percent: progress,
        });

        ctx.accepted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(outcome);

        if inner.state.status() == BatchStatus::Finished {
            let snapshot = inner.state.snapshot();
            self.log(
                &mut inner,
                Severity::Info,
                format!(
                    "Finished: {} succeeded, {} failed",
                    snapshot.succeeded, snapshot.failed
                ),
            );
            self.emit(&BatchEvent::Finished(snapshot));
        }
    }

    /// Bundle the current batch's successes into one archive.
    pub fn archive(&self, writer: &dyn ArchiveWriter) -> Result<Vec<u8>> {
        let successes: Vec<Success> = self
            .lock()
            .state
            .outcomes()
            .iter()
            .filter_map(ConversionOutcome::as_success)
            .cloned()
            .collect();
        let refs: Vec<&Success> = successes.iter().collect();

        let result = archive::archive(&refs, writer);
        let mut inner = self.lock();
        match &result {
            Ok(bytes) => self.log(
                &mut inner,
                Severity::Success,
                format!("Archive ready: {} file(s), {} bytes", refs.len(), bytes.len()),
            ),
            Err(e) => self.log(&mut inner, Severity::Error, format!("Archive failed: {}", e)),
        }
        result.map_err(ConvertError::from)
    }

    pub fn snapshot(&self) -> BatchSnapshot {
        self.lock().state.snapshot()
    }

    /// Outcomes of the current batch, in completion order.
    pub fn outcomes(&self) -> Vec<ConversionOutcome> {
        self.lock().state.outcomes().to_vec()
    }

    pub fn log_entries(&self) -> Vec<LogEntry> {
        self.lock().log.entries().cloned().collect()
    }

    /// Drop the current batch and abandon any run still in flight.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.state = BatchState::default();
        self.log(&mut inner, Severity::Info, "Batch cleared");
    }

    fn is_current(&self, generation: u64) -> bool {
        self.lock().state.generation() == generation
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn log(&self, inner: &mut Inner, severity: Severity, message: impl Into<String>) {
        let entry = inner.log.push(severity, message);
        self.emit(&BatchEvent::Log(entry));
    }

    fn emit(&self, event: &BatchEvent) {
        let observers = self.observers.read().unwrap_or_else(|e| e.into_inner());
        for observer in observers.iter() {
            observer.on_event(event);
        }
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new(ConvertConfig::default())
    }
}

fn failure(file: &StagedFile, reason: FailureReason) -> ConversionOutcome {
    ConversionOutcome::Failure(Failure {
        input_name: file.name().to_string(),
        input_index: file.index,
        reason,
    })
}
