//! Batch state transitions
//!
//! `BatchState` is only ever mutated by the orchestrator while it holds its
//! state lock. Readers get a [`BatchSnapshot`].

use crate::outcome::{ConversionOutcome, OutcomeSummary};
use crate::staging::StagedBatch;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    #[default]
    Idle,
    Running,
    Finished,
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchStatus::Idle => write!(f, "idle"),
            BatchStatus::Running => write!(f, "running"),
            BatchStatus::Finished => write!(f, "finished"),
        }
    }
}

/// Integer percent of `completed` over `total`, rounded half up.
pub fn progress_percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    ((completed.min(total) as f64 / total as f64) * 100.0).round() as u8
}

#[derive(Debug, Default)]
pub struct BatchState {
    generation: u64,
    total: usize,
    recorded: Vec<bool>,
    outcomes: Vec<ConversionOutcome>,
    completed: usize,
    status: BatchStatus,
    run_started: bool,
}

/// What `file_completed` did with an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recorded {
    /// Accepted; carries the new progress percent.
    Accepted { completed: usize, progress: u8 },
    /// Belongs to an older generation.
    Stale,
    /// The file already has an outcome.
    Duplicate,
}

impl BatchState {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn status(&self) -> BatchStatus {
        self.status
    }

    pub fn outcomes(&self) -> &[ConversionOutcome] {
        &self.outcomes
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn has_run(&self) -> bool {
        self.run_started
    }

    /// Replace everything with a freshly staged batch.
    pub fn staged(&mut self, batch: &StagedBatch) {
        *self = BatchState {
            generation: batch.generation(),
            total: batch.len(),
            recorded: vec![false; batch.len()],
            ..BatchState::default()
        };
    }

    pub fn start(&mut self) {
        self.run_started = true;
        self.status = if self.total == 0 {
            BatchStatus::Finished
        } else {
            BatchStatus::Running
        };
    }

    /// Record one outcome of `generation`; each input index is accepted once.
    pub fn file_completed(&mut self, generation: u64, outcome: ConversionOutcome) -> Recorded {
        if generation != self.generation || !self.run_started {
            return Recorded::Stale;
        }
        let index = outcome.input_index();
        match self.recorded.get_mut(index) {
            Some(seen) if !*seen => *seen = true,
            _ => return Recorded::Duplicate,
        }

        self.outcomes.push(outcome);
        self.completed += 1;
        if self.completed == self.total {
            self.status = BatchStatus::Finished;
        }
        Recorded::Accepted {
            completed: self.completed,
            progress: progress_percent(self.completed, self.total),
        }
    }

    pub fn snapshot(&self) -> BatchSnapshot {
        let summary = OutcomeSummary::from_outcomes(&self.outcomes);
        BatchSnapshot {
            generation: self.generation,
            status: self.status,
            total: self.total,
            completed: self.completed,
            succeeded: summary.succeeded,
            failed: summary.failed,
            progress: progress_percent(self.completed, self.total),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct BatchSnapshot {
    pub generation: u64,
    pub status: BatchStatus,
    pub total: usize,
    pub completed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub progress: u8,
}
