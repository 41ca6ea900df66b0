//! Bounded retry of transient failures and the diagnostics captured when
//! retries run out.

use crate::browser::Driver;
use crate::config::DiagnosticsConfig;
use crate::error::ScrapeError;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::sleep;

/// What a run does with a page once its retries are exhausted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop the whole run with a failure
    Abort,
    /// Log the page as skipped and carry on
    Skip,
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub on_exhausted: FailurePolicy,
}

impl RetryPolicy {
    /// Start counting attempts of `operation` on page `page`
    pub fn attempts(&self, operation: &'static str, page: usize) -> Attempts {
        Attempts {
            policy: self.clone(),
            operation,
            page,
            failures: 0,
        }
    }

    /// Exponential backoff with +/-25% jitter, capped at `max_delay`
    pub fn delay_for(&self, retry: usize) -> Duration {
        let base_delay = self.initial_delay.as_millis() as u64;
        let max_delay = self.max_delay.as_millis() as u64;

        let delay_ms = base_delay
            .saturating_mul(2u64.saturating_pow(retry as u32))
            .min(max_delay);

        let mut rng = rand::thread_rng();
        let jitter = rng.gen_range(0.75..=1.25);
        Duration::from_millis((delay_ms as f64 * jitter) as u64)
    }
}

/// Attempt counter for one operation on one page
#[derive(Debug)]
pub struct Attempts {
    policy: RetryPolicy,
    operation: &'static str,
    page: usize,
    failures: usize,
}

impl Attempts {
    /// Record a failed attempt. Returns `Ok` after the backoff delay when the
    /// caller should try again; otherwise the error to surface, wrapped in
    /// [`ScrapeError::RetryExhausted`] when it was transient.
    pub async fn retry_after(&mut self, err: ScrapeError) -> Result<(), ScrapeError> {
        if !err.is_transient() {
            return Err(err);
        }

        self.failures += 1;
        if self.failures >= self.policy.max_attempts {
            return Err(ScrapeError::RetryExhausted {
                operation: self.operation,
                page: self.page,
                attempts: self.failures,
                last: Box::new(err),
            });
        }

        let delay = self.policy.delay_for(self.failures - 1);
        log::warn!(
            "{} on page {} failed, attempt {}/{}: {} (retrying in {}ms)",
            self.operation,
            self.page,
            self.failures,
            self.policy.max_attempts,
            err,
            delay.as_millis()
        );
        sleep(delay).await;
        Ok(())
    }

    /// Retries performed so far
    pub fn retries(&self) -> usize {
        self.failures
    }
}

/// Writes screenshots (and the page HTML when known) for pages that could
/// not be recovered
#[derive(Debug, Clone)]
pub struct Diagnostics {
    enabled: bool,
    dir: PathBuf,
    scraper: &'static str,
    run_id: String,
}

impl Diagnostics {
    pub fn new(config: &DiagnosticsConfig, scraper: &'static str, started_at: DateTime<Utc>) -> Self {
        Self {
            enabled: config.enabled,
            dir: config.dir.clone(),
            scraper,
            run_id: started_at.format("%Y%m%dT%H%M%S").to_string(),
        }
    }

    /// `<dir>/<scraper>-<run id>-p<page>-<timestamp>.png`
    pub fn artifact_path(&self, page: usize, at: DateTime<Utc>) -> PathBuf {
        self.dir.join(format!(
            "{}-{}-p{:04}-{}.png",
            self.scraper,
            self.run_id,
            page,
            at.format("%Y%m%dT%H%M%S%3f")
        ))
    }

    /// Capture the current page state. Failures here are logged and
    /// swallowed; the screenshot path is returned when one was written.
    pub async fn capture(
        &self,
        driver: &mut dyn Driver,
        page: usize,
        html: Option<&str>,
    ) -> Option<PathBuf> {
        if !self.enabled {
            return None;
        }
        if let Err(e) = std::fs::create_dir_all(&self.dir) {
            log::error!("Cannot create diagnostics dir {}: {}", self.dir.display(), e);
            return None;
        }

        let path = self.artifact_path(page, Utc::now());

        if let Some(html) = html {
            let html_path = path.with_extension("html");
            if let Err(e) = std::fs::write(&html_path, html) {
                log::warn!("Failed to save {}: {}", html_path.display(), e);
            }
        }

        match driver.screenshot(&path).await {
            Ok(()) => {
                log::error!(
                    "Diagnostic screenshot for page {} of {} saved to {}",
                    page,
                    driver.current_url(),
                    path.display()
                );
                Some(path)
            }
            Err(e) => {
                log::error!("Could not capture screenshot for page {}: {}", page, e);
                None
            }
        }
    }
}
