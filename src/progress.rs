// src/progress.rs

//! Progress reporting during closure rewrites
//!
//! The `ProgressTracker` trait decouples the engine's `(done, total, path)`
//! callback from how progress is shown: `CliProgress` draws an indicatif
//! bar, `LogProgress` writes tracing lines for non-interactive runs, and
//! `SilentProgress` is the no-op for scripted use.

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Sink for rewrite progress updates
pub trait ProgressTracker: Send + Sync {
    /// Called once per node with the position, total, and current path.
    fn update(&self, done: usize, total: usize, path: &str);

    /// Called when the run finishes (successfully or not).
    fn finish(&self, message: &str);
}

/// No-op tracker
#[derive(Debug, Default)]
pub struct SilentProgress;

impl ProgressTracker for SilentProgress {
    fn update(&self, _done: usize, _total: usize, _path: &str) {}
    fn finish(&self, _message: &str) {}
}

/// Tracker that logs each step through tracing
#[derive(Debug, Default)]
pub struct LogProgress {
    last: AtomicU64,
}

impl LogProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressTracker for LogProgress {
    fn update(&self, done: usize, total: usize, path: &str) {
        self.last.store(done as u64, Ordering::Relaxed);
        info!("rewriting {}/{}: {}", done, total, path);
    }

    fn finish(&self, message: &str) {
        info!("{}", message);
    }
}

/// Tracker that draws a progress bar on the terminal
pub struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    pub fn new(operation: &str) -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{msg} ({pos}/{len}) [{bar:40.green/dim}] {percent}%")
                .expect("Invalid progress bar template")
                .progress_chars("##-"),
        );
        bar.set_message(operation.to_string());
        Self { bar }
    }
}

impl ProgressTracker for CliProgress {
    fn update(&self, done: usize, total: usize, path: &str) {
        self.bar.set_length(total as u64);
        self.bar.set_position(done as u64);
        if let Some(name) = path.rsplit('/').next() {
            self.bar.set_message(name.to_string());
        }
    }

    fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}
