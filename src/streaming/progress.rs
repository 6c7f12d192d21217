//! Line-count progress reporting.

use crate::config::PROGRESS_INTERVAL;
use log::info;

/// Emits an `info!` record every `interval` lines.
#[derive(Debug, Clone)]
pub struct Progress {
    label: &'static str,
    interval: usize,
    lines: usize,
}

impl Progress {
    pub fn new(label: &'static str) -> Self {
        Self::with_interval(label, PROGRESS_INTERVAL)
    }

    pub fn with_interval(label: &'static str, interval: usize) -> Self {
        Self {
            label,
            interval: interval.max(1),
            lines: 0,
        }
    }

    /// Count one line, reporting when the interval is reached.
    #[inline]
    pub fn tick(&mut self) {
        self.lines += 1;
        if self.lines % self.interval == 0 {
            info!("{}: processed {} lines", self.label, self.lines);
        }
    }

    pub fn lines(&self) -> usize {
        self.lines
    }
}
