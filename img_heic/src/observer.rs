//! Notifications for the presentation layer.
//!
//! Observers are called while the orchestrator holds its state lock, so
//! they see progress in order. They must not call back into the
//! orchestrator.

use crate::activity_log::LogEntry;
use crate::outcome::ConversionOutcome;
use crate::state::BatchSnapshot;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Mutex;

#[derive(Debug, Clone)]
pub enum BatchEvent {
    Staged(BatchSnapshot),
    Progress { generation: u64, completed: usize, total: usize, percent: u8 },
    Outcome { generation: u64, outcome: ConversionOutcome },
    Log(LogEntry),
    Finished(BatchSnapshot),
}

pub trait BatchObserver: Send + Sync {
    fn on_event(&self, event: &BatchEvent);
}

impl<F> BatchObserver for F
where
    F: Fn(&BatchEvent) + Send + Sync,
{
    fn on_event(&self, event: &BatchEvent) {
        self(event)
    }
}

/// Forwards events into a channel. Sends to a dropped receiver are ignored.
pub struct ChannelObserver {
    tx: Mutex<Sender<BatchEvent>>,
}

impl ChannelObserver {
    pub fn new() -> (Self, Receiver<BatchEvent>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx: Mutex::new(tx) }, rx)
    }
}

impl BatchObserver for ChannelObserver {
    fn on_event(&self, event: &BatchEvent) {
        let tx = self.tx.lock().unwrap_or_else(|e| e.into_inner());
        let _ = tx.send(event.clone());
    }
}
