//! Counters and outcome of a single scraper run
//!
//! Everything here is reported in the final summary line of a run.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcome {
    Running,
    Completed,
    Aborted { reason: String },
    Interrupted,
}

impl RunOutcome {
    /// Process exit code for this outcome
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Running | RunOutcome::Completed => 0,
            RunOutcome::Aborted { .. } => 1,
            RunOutcome::Interrupted => 130,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunMetrics {
    pub scraper: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Successful `open`/`advance` steps
    pub navigation_steps: u64,
    pub pages_visited: u64,
    pub pages_skipped: u64,
    /// Advances that exhausted their retries and were tried again
    pub advance_failures: u64,
    pub retries: u64,
    pub records_written: u64,
    pub records_dropped: u64,
    pub duplicates_skipped: u64,
    pub dates_unparsed: u64,
    pub artifacts: Vec<PathBuf>,
    pub outcome: RunOutcome,
}

impl RunMetrics {
    pub fn new(scraper: &str) -> Self {
        Self {
            scraper: scraper.to_string(),
            started_at: Utc::now(),
            finished_at: None,
            navigation_steps: 0,
            pages_visited: 0,
            pages_skipped: 0,
            advance_failures: 0,
            retries: 0,
            records_written: 0,
            records_dropped: 0,
            duplicates_skipped: 0,
            dates_unparsed: 0,
            artifacts: Vec::new(),
            outcome: RunOutcome::Running,
        }
    }

    pub fn finish(&mut self, outcome: RunOutcome) {
        self.finished_at = Some(Utc::now());
        self.outcome = outcome;
    }

    pub fn elapsed_secs(&self) -> i64 {
        let end = self.finished_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_seconds()
    }

    pub fn log_summary(&self) {
        let line = format!(
            "{}: {} records written, {} dropped (no id), {} duplicates, {} with unparsed dates; \
             {} pages visited, {} skipped, {} failed advances, {} retries, \
             {} diagnostic artifacts in {}s",
            self.scraper,
            self.records_written,
            self.records_dropped,
            self.duplicates_skipped,
            self.dates_unparsed,
            self.pages_visited,
            self.pages_skipped,
            self.advance_failures,
            self.retries,
            self.artifacts.len(),
            self.elapsed_secs()
        );
        match &self.outcome {
            RunOutcome::Aborted { reason } => log::error!("{} (aborted: {})", line, reason),
            RunOutcome::Interrupted => log::warn!("{} (interrupted)", line),
            _ => log::info!("{}", line),
        }
    }
}
