//! Progress reporting for grid runs.
//!
//! Progress is measured in sampling steps so skipped cells can be
//! accounted for without rendering.

use std::cell::Cell;

/// Receives run progress. The runner calls these in order:
/// `begin`, then `job_started`/`advance` per job, then `finish`.
pub trait ProgressReporter {
    fn begin(&self, total_jobs: usize, total_steps: u64);

    /// Job `index` (0-based) of `total` is about to run.
    fn job_started(&self, index: usize, total: usize, position_code: &str);

    /// `steps` more sampling steps are accounted for.
    fn advance(&self, steps: u64);

    fn finish(&self);
}

/// Percentage of `done` over `total`, clamped to 0.0–100.0.
pub fn progress_percent(done: u64, total: u64) -> f64 {
    if total == 0 {
        return 100.0;
    }
    ((done as f64 / total as f64) * 100.0).clamp(0.0, 100.0)
}

/// Default reporter writing progress to `tracing`.
#[derive(Debug, Default)]
pub struct TracingProgress {
    total_steps: Cell<u64>,
    done_steps: Cell<u64>,
}

impl TracingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn done_steps(&self) -> u64 {
        self.done_steps.get()
    }
}

impl ProgressReporter for TracingProgress {
    fn begin(&self, total_jobs: usize, total_steps: u64) {
        self.total_steps.set(total_steps);
        self.done_steps.set(0);
        tracing::info!(total_jobs, total_steps, "Starting generation of variants");
    }

    fn job_started(&self, index: usize, total: usize, position_code: &str) {
        tracing::info!(
            cell = %position_code,
            "Generating variant #{} out of {}",
            index + 1,
            total
        );
    }

    fn advance(&self, steps: u64) {
        let done = self.done_steps.get().saturating_add(steps);
        self.done_steps.set(done);
        tracing::debug!(
            done,
            total = self.total_steps.get(),
            percent = progress_percent(done, self.total_steps.get()),
            "Progress"
        );
    }

    fn finish(&self) {
        tracing::info!(
            done = self.done_steps.get(),
            total = self.total_steps.get(),
            "Grid finished"
        );
    }
}
