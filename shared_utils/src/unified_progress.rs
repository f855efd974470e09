//! Batch progress bar built on indicatif.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub mod templates {
    pub const BATCH: &str = "{spinner:.green} {prefix:.cyan.bold} ▕{bar:35.green/black}▏ {percent:>3}% • {pos}/{len} • ⏱️ {elapsed_precise} • {msg}";
    pub const PROGRESS_CHARS: &str = "█▓░";
    pub const SPINNER_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";
}

pub struct UnifiedProgressBar {
    pub bar: ProgressBar,
    is_finished: AtomicBool,
}

impl UnifiedProgressBar {
    /// A bar drawn on stderr, or a hidden one when `quiet` is set.
    pub fn new(total: u64, message: &str, quiet: bool) -> Arc<Self> {
        let bar = ProgressBar::new(total);
        if quiet {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        } else {
            let style = ProgressStyle::default_bar()
                .template(templates::BATCH)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars(templates::PROGRESS_CHARS)
                .tick_chars(templates::SPINNER_CHARS);
            bar.set_style(style);
            bar.set_prefix(message.to_string());
            bar.set_draw_target(ProgressDrawTarget::stderr_with_hz(20));
        }
        Arc::new(Self {
            bar,
            is_finished: AtomicBool::new(false),
        })
    }

    pub fn inc(&self) {
        self.bar.inc(1);
    }
    pub fn set_position(&self, pos: u64) {
        self.bar.set_position(pos);
    }
    pub fn position(&self) -> u64 {
        self.bar.position()
    }
    pub fn set_message(&self, msg: impl Into<String>) {
        self.bar.set_message(msg.into());
    }
    pub fn println(&self, msg: &str) {
        self.bar.suspend(|| eprintln!("{}", msg));
    }

    pub fn is_finished(&self) -> bool {
        self.is_finished.load(Ordering::Relaxed)
    }

    pub fn finish_with_message(&self, msg: &str) {
        if self.is_finished.swap(true, Ordering::Relaxed) {
            return;
        }
        self.bar.finish_with_message(msg.to_string());
    }
}
