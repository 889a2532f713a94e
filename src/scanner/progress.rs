//! Progress reporting.
//!
//! A run ticks once per document it works on. Ticks are delivered in order,
//! `done` going `1, 2, ..., n`, even when documents are processed in parallel.

use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::sync::Mutex;

use crate::scanner::RunStatus;

pub trait ProgressSink: Send + Sync {
    /// `done` documents of at most `total` have been processed.
    fn tick(&self, done: usize, total: usize);

    fn finish(&self, _status: &RunStatus) {}
}

/// Discards progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn tick(&self, _done: usize, _total: usize) {}
}

/// Records every tick. Meant for tests.
#[derive(Debug, Default)]
pub struct CountingProgress {
    ticks: Mutex<Vec<usize>>,
    finished: Mutex<Option<RunStatus>>,
}

impl CountingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ticks(&self) -> Vec<usize> {
        self.ticks.lock().map(|t| t.clone()).unwrap_or_default()
    }

    pub fn finished(&self) -> Option<RunStatus> {
        self.finished.lock().ok().and_then(|f| f.clone())
    }
}

impl ProgressSink for CountingProgress {
    fn tick(&self, done: usize, _total: usize) {
        if let Ok(mut ticks) = self.ticks.lock() {
            ticks.push(done);
        }
    }

    fn finish(&self, status: &RunStatus) {
        if let Ok(mut finished) = self.finished.lock() {
            *finished = Some(status.clone());
        }
    }
}

/// Drives an `indicatif` progress bar.
pub struct IndicatifProgress {
    bar: ProgressBar,
}

impl IndicatifProgress {
    pub fn new(bar: ProgressBar) -> Self {
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files processed ({eta}) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        Self { bar }
    }

    pub fn bar(&self) -> &ProgressBar {
        &self.bar
    }
}

impl ProgressSink for IndicatifProgress {
    fn tick(&self, done: usize, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_position(done as u64);
    }

    fn finish(&self, status: &RunStatus) {
        self.bar.finish_with_message(status.to_string());
    }
}

/// Prints one `HEART: <n>` line per tick, for a supervising scheduler.
pub struct HeartbeatProgress<W: Write + Send> {
    out: Mutex<W>,
}

impl<W: Write + Send> HeartbeatProgress<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<W: Write + Send> ProgressSink for HeartbeatProgress<W> {
    fn tick(&self, done: usize, _total: usize) {
        if let Ok(mut out) = self.out.lock() {
            let _ = writeln!(out, "HEART: {}", done);
            let _ = out.flush();
        }
    }
}
