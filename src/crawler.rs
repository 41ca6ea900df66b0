//! Drives one listing from its first page to its last: render, extract,
//! write, paginate, with bounded retries around each browser step.

use crate::browser::Driver;
use crate::error::ScrapeError;
use crate::metrics::{RunMetrics, RunOutcome};
use crate::models::Record;
use crate::navigator::{ListingPage, Navigator};
use crate::retry::{Diagnostics, FailurePolicy, RetryPolicy};
use crate::sources::Extractor;
use crate::writer::{CsvSink, WriteOutcome};
use serde::Serialize;

/// Where the crawler is in handling the current page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PageState {
    Idle,
    Loading,
    Rendered,
    Extracting,
    Written,
    Failed,
    Retrying,
    Paginating,
    Done,
    Skipped,
    Aborted,
}

pub struct Crawler<D: Driver, E: Extractor> {
    navigator: Navigator<D>,
    extractor: E,
    sink: CsvSink<E::Record>,
    policy: RetryPolicy,
    diagnostics: Diagnostics,
    max_consecutive_skips: usize,
    metrics: RunMetrics,
    state: PageState,
}

impl<D: Driver, E: Extractor> Crawler<D, E> {
    pub fn new(
        navigator: Navigator<D>,
        extractor: E,
        sink: CsvSink<E::Record>,
        policy: RetryPolicy,
        diagnostics: Diagnostics,
    ) -> Self {
        let max_consecutive_skips = navigator.config().max_consecutive_skips.max(1);
        let metrics = RunMetrics::new(extractor.name());
        Self {
            navigator,
            extractor,
            sink,
            policy,
            diagnostics,
            max_consecutive_skips,
            metrics,
            state: PageState::Idle,
        }
    }

    pub fn metrics(&self) -> &RunMetrics {
        &self.metrics
    }

    pub fn state(&self) -> PageState {
        self.state
    }

    pub fn navigator(&self) -> &Navigator<D> {
        &self.navigator
    }

    /// Crawl the whole listing. Output is flushed and the run outcome
    /// recorded however the crawl ends.
    pub async fn run(&mut self) -> Result<(), ScrapeError> {
        log::info!(
            "{}: starting at {} (policy {:?})",
            self.extractor.name(),
            self.navigator.config().url,
            self.policy.on_exhausted
        );

        let result = self.crawl().await;

        if let Err(e) = self.sink.checkpoint() {
            log::error!("Failed to flush {}: {}", self.sink.path().display(), e);
        }

        match &result {
            Ok(()) => {
                self.state = PageState::Done;
                self.metrics.finish(RunOutcome::Completed);
            }
            Err(e) => {
                self.state = PageState::Aborted;
                self.metrics.finish(RunOutcome::Aborted {
                    reason: e.to_string(),
                });
            }
        }
        result
    }

    /// Record that the run was cancelled from outside, keeping what was
    /// already written
    pub fn interrupt(&mut self) {
        log::warn!("{}: interrupted on {:?}", self.extractor.name(), self.state);
        if let Err(e) = self.sink.checkpoint() {
            log::error!("Failed to flush {}: {}", self.sink.path().display(), e);
        }
        self.state = PageState::Aborted;
        self.metrics.finish(RunOutcome::Interrupted);
    }

    async fn crawl(&mut self) -> Result<(), ScrapeError> {
        let url = self.navigator.config().url.clone();

        let mut page = match self.open_with_retry(&url).await {
            Ok(page) => page,
            Err(e) => {
                // nothing to skip to without a first page
                self.fail(1, &e).await;
                return Err(e);
            }
        };
        self.metrics.navigation_steps += 1;

        let mut failed_advances = 0;
        loop {
            self.metrics.pages_visited += 1;
            self.state = PageState::Rendered;

            match self.extract_with_retry(&mut page).await {
                Ok(records) => self.write_page(&page, &records)?,
                Err(e) => {
                    self.on_exhausted(page.index, e).await?;
                    log::warn!("Skipping page {}", page.index);
                    self.state = PageState::Skipped;
                    self.metrics.pages_skipped += 1;
                }
            }

            if !self.navigator.has_next(&page) {
                log::info!("Page {} is the last page", page.index);
                return Ok(());
            }

            self.state = PageState::Paginating;
            loop {
                match self.advance_with_retry(&page).await {
                    Ok(next) => {
                        self.metrics.navigation_steps += 1;
                        failed_advances = 0;
                        page = next;
                        break;
                    }
                    Err(e) => {
                        self.on_exhausted(page.index + 1, e).await?;
                        self.metrics.advance_failures += 1;
                        failed_advances += 1;
                        if failed_advances >= self.max_consecutive_skips {
                            log::warn!(
                                "Could not move past page {} after {} failed advances, stopping",
                                page.index,
                                failed_advances
                            );
                            return Ok(());
                        }
                        log::warn!("Could not advance past page {}, retrying advance", page.index);
                    }
                }
            }
        }
    }

    async fn open_with_retry(&mut self, url: &str) -> Result<ListingPage, ScrapeError> {
        let mut attempts = self.policy.attempts("open", 1);
        loop {
            self.state = PageState::Loading;
            match self.navigator.open(url).await {
                Ok(page) => return Ok(page),
                Err(e) => {
                    self.state = PageState::Failed;
                    attempts.retry_after(e).await?;
                    self.state = PageState::Retrying;
                    self.metrics.retries += 1;
                }
            }
        }
    }

    /// Extract `page`, re-reading it from the browser before each retry
    async fn extract_with_retry(
        &mut self,
        page: &mut ListingPage,
    ) -> Result<Vec<E::Record>, ScrapeError> {
        let mut attempts = self.policy.attempts("extract", page.index);
        let mut reload = false;
        loop {
            self.state = PageState::Extracting;
            match self.extract_once(page, reload).await {
                Ok(records) => return Ok(records),
                Err(e) => {
                    self.state = PageState::Failed;
                    attempts.retry_after(e).await?;
                    self.state = PageState::Retrying;
                    self.metrics.retries += 1;
                    reload = true;
                }
            }
        }
    }

    async fn extract_once(
        &mut self,
        page: &mut ListingPage,
        reload: bool,
    ) -> Result<Vec<E::Record>, ScrapeError> {
        if reload {
            *page = self.navigator.reload(page).await?;
        }
        self.extractor
            .extract(self.navigator.driver_mut(), page)
            .await
    }

    async fn advance_with_retry(&mut self, page: &ListingPage) -> Result<ListingPage, ScrapeError> {
        let mut attempts = self.policy.attempts("advance", page.index + 1);
        loop {
            self.state = PageState::Paginating;
            match self.navigator.advance(page).await {
                Ok(next) => return Ok(next),
                Err(e) => {
                    self.state = PageState::Failed;
                    attempts.retry_after(e).await?;
                    self.state = PageState::Retrying;
                    self.metrics.retries += 1;
                }
            }
        }
    }

    fn write_page(&mut self, page: &ListingPage, records: &[E::Record]) -> Result<(), ScrapeError> {
        let mut written = 0;
        for record in records {
            match self.sink.write(record)? {
                WriteOutcome::Written => {
                    written += 1;
                    self.metrics.records_written += 1;
                    if record.date_unparsed() {
                        self.metrics.dates_unparsed += 1;
                    }
                }
                WriteOutcome::Duplicate => self.metrics.duplicates_skipped += 1,
                // the extractor already logged the row
                WriteOutcome::MissingId => self.metrics.records_dropped += 1,
            }
        }
        self.sink.checkpoint()?;
        self.state = PageState::Written;
        log::info!(
            "Page {}: {} of {} records written to {}",
            page.index,
            written,
            records.len(),
            self.sink.path().display()
        );
        Ok(())
    }

    /// Capture the failure and apply the policy. `Ok` means the caller may
    /// carry on and counts what was given up. Errors that were never retried
    /// are returned as they are.
    async fn on_exhausted(&mut self, page: usize, err: ScrapeError) -> Result<(), ScrapeError> {
        if !matches!(err, ScrapeError::RetryExhausted { .. }) {
            return Err(err);
        }
        self.fail(page, &err).await;

        match self.policy.on_exhausted {
            FailurePolicy::Abort => Err(err),
            FailurePolicy::Skip => Ok(()),
        }
    }

    /// Log the failure and save whatever the browser is showing
    async fn fail(&mut self, page: usize, err: &ScrapeError) {
        self.state = PageState::Failed;
        log::error!("{}: page {} failed: {}", self.extractor.name(), page, err);

        let driver = self.navigator.driver_mut();
        let html = driver.content().await.ok();
        if let Some(path) = self.diagnostics.capture(driver, page, html.as_deref()).await {
            self.metrics.artifacts.push(path);
        }
    }
}
