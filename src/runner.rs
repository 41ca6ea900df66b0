//! Wiring for the two command-line scrapers.

use crate::browser::{BrowserManager, Driver, TabDriver};
use crate::config::{Config, ListingConfig};
use crate::crawler::Crawler;
use crate::error::ScrapeError;
use crate::metrics::RunOutcome;
use crate::navigator::Navigator;
use crate::retry::Diagnostics;
use crate::sources::notams::NotamExtractor;
use crate::sources::tenders::TenderExtractor;
use crate::sources::Extractor;
use crate::writer::CsvSink;
use chrono::Utc;
use std::future::Future;
use std::time::Duration;

enum Finished {
    Run(Result<(), ScrapeError>),
    Shutdown,
}

/// Scrape the NOTAM listing, returning the process exit code
pub async fn run_notams(config: Config) -> i32 {
    let settle = Duration::from_millis(config.notams.detail_settle_ms);
    let extractor = match NotamExtractor::new(config.notams.clone()) {
        Ok(e) => e,
        Err(e) => return setup_failed("notams", e),
    };
    let driver = match launch(&config) {
        Ok(d) => d.with_detail_settle(settle),
        Err(e) => return setup_failed("notams", e),
    };
    run_listing(&config, &config.notams.listing, driver, extractor).await
}

/// Scrape the tender listing, returning the process exit code
pub async fn run_tenders(config: Config) -> i32 {
    let extractor = match TenderExtractor::new(config.tenders.clone()) {
        Ok(e) => e,
        Err(e) => return setup_failed("tenders", e),
    };
    let driver = match launch(&config) {
        Ok(d) => d,
        Err(e) => return setup_failed("tenders", e),
    };
    run_listing(&config, &config.tenders.listing, driver, extractor).await
}

fn launch(config: &Config) -> Result<TabDriver, ScrapeError> {
    let manager = BrowserManager::new(config.browser.clone())?;
    Ok(TabDriver::new(&manager)?)
}

async fn run_listing<D, E>(config: &Config, listing: &ListingConfig, driver: D, extractor: E) -> i32
where
    D: Driver,
    E: Extractor,
{
    let name = extractor.name();
    let crawler = build(config, listing, driver, extractor);
    match crawler {
        Ok(mut crawler) => drive(&mut crawler, shutdown_signal()).await,
        Err(e) => setup_failed(name, e),
    }
}

/// Assemble a crawler for `listing` over an already open driver
pub fn build<D, E>(
    config: &Config,
    listing: &ListingConfig,
    driver: D,
    extractor: E,
) -> Result<Crawler<D, E>, ScrapeError>
where
    D: Driver,
    E: Extractor,
{
    let sink = CsvSink::open(&listing.output, listing.write_bom)?;
    let navigator = Navigator::new(driver, listing.clone())?;
    let policy = config.retry.policy(listing.failure_policy);
    let diagnostics = Diagnostics::new(&config.diagnostics, extractor.name(), Utc::now());
    Ok(Crawler::new(navigator, extractor, sink, policy, diagnostics))
}

/// Run `crawler` until it finishes or `shutdown` resolves, log the summary
/// and return the exit code
pub async fn drive<D, E, S>(crawler: &mut Crawler<D, E>, shutdown: S) -> i32
where
    D: Driver,
    E: Extractor,
    S: Future<Output = ()>,
{
    let finished = tokio::select! {
        result = crawler.run() => Finished::Run(result),
        _ = shutdown => Finished::Shutdown,
    };

    match finished {
        Finished::Run(Ok(())) => {}
        Finished::Run(Err(e)) => log::error!("Run aborted: {}", e),
        Finished::Shutdown => crawler.interrupt(),
    }

    let metrics = crawler.metrics();
    metrics.log_summary();
    metrics.outcome.exit_code()
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    log::warn!("Ctrl-C received, stopping");
}

fn setup_failed(name: &str, err: ScrapeError) -> i32 {
    log::error!("{}: could not start: {}", name, err);
    RunOutcome::Aborted {
        reason: err.to_string(),
    }
    .exit_code()
}
