//! Listing navigation: open the listing, wait for rows, follow "next".

use crate::browser::{Driver, Locator};
use crate::config::ListingConfig;
use crate::error::ScrapeError;
use crate::helpers::{clean_text, fingerprint};
use scraper::{Html, Selector};
use std::time::Duration;
use tokio::time::{sleep, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Parse a CSS selector, keeping the offending text in the error
pub fn parse_selector(selector: &str) -> Result<Selector, ScrapeError> {
    Selector::parse(selector).map_err(|e| ScrapeError::Selector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

/// One rendered view of the listing table
#[derive(Debug, Clone)]
pub struct ListingPage {
    pub url: String,
    /// 1-based position in the run
    pub index: usize,
    pub html: String,
    pub row_count: usize,
    pub fingerprint: u64,
}

pub struct Navigator<D: Driver> {
    driver: D,
    config: ListingConfig,
    row_selector: Selector,
    next_selector: Selector,
}

impl<D: Driver> Navigator<D> {
    pub fn new(driver: D, config: ListingConfig) -> Result<Self, ScrapeError> {
        let row_selector = parse_selector(&config.row_selector)?;
        let next_selector = parse_selector(&config.next_selector)?;
        Ok(Self {
            driver,
            config,
            row_selector,
            next_selector,
        })
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    pub fn config(&self) -> &ListingConfig {
        &self.config
    }

    /// Load `url` and wait until the listing rows have rendered
    pub async fn open(&mut self, url: &str) -> Result<ListingPage, ScrapeError> {
        log::info!("Loading {}", url);
        self.driver.goto(url).await?;
        self.wait_for_rows(1, None).await
    }

    /// Take a fresh snapshot of the page currently shown
    pub async fn reload(&mut self, page: &ListingPage) -> Result<ListingPage, ScrapeError> {
        self.wait_for_rows(page.index, None).await
    }

    /// Whether the pagination control offers another page
    pub fn has_next(&self, page: &ListingPage) -> bool {
        let document = Html::parse_document(&page.html);
        let Some(next) = document.select(&self.next_selector).next() else {
            log::debug!("No next control on page {}", page.index);
            return false;
        };

        let el = next.value();
        if el.attr("aria-disabled").map(|v| v.eq_ignore_ascii_case("true")) == Some(true)
            || el.attr("disabled").is_some()
            || el.classes().any(|c| c.eq_ignore_ascii_case("disabled"))
        {
            return false;
        }

        let marked_last = ["aria-label", "title"]
            .iter()
            .filter_map(|a| el.attr(a))
            .any(|v| v.to_ascii_lowercase().contains("last"));
        !marked_last
    }

    /// Click "next" and wait for a different set of rows
    pub async fn advance(&mut self, page: &ListingPage) -> Result<ListingPage, ScrapeError> {
        let index = page.index + 1;

        // A retried advance may find that the earlier click already landed
        let html = self.driver.content().await?;
        if let Some(current) = self.snapshot(&html, index) {
            if current.fingerprint != page.fingerprint {
                log::debug!("Page {} already showing after earlier click", index);
                return Ok(current);
            }
        }

        self.driver
            .click(&Locator::first(&self.config.next_selector))
            .await?;
        sleep(self.config.settle_delay()).await;

        self.wait_for_rows(index, Some(page.fingerprint)).await
    }

    /// Poll the page until rows are present (and differ from `previous` when
    /// given), bounded by the render timeout
    async fn wait_for_rows(
        &mut self,
        index: usize,
        previous: Option<u64>,
    ) -> Result<ListingPage, ScrapeError> {
        let timeout = self.config.render_timeout();
        let start = Instant::now();

        loop {
            let html = self.driver.content().await?;
            if let Some(page) = self.snapshot(&html, index) {
                if previous != Some(page.fingerprint) {
                    log::info!("Page {}: {} rows rendered", index, page.row_count);
                    return Ok(page);
                }
            }

            if start.elapsed() >= timeout {
                let url = self.driver.current_url();
                let waited_ms = start.elapsed().as_millis();
                return Err(match previous {
                    None => ScrapeError::RenderTimeout { url, waited_ms },
                    Some(_) => ScrapeError::StaleContent { url, waited_ms },
                });
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    /// Build a page from `html` when it is ready and has rows
    fn snapshot(&self, html: &str, index: usize) -> Option<ListingPage> {
        if let Some(ready) = &self.config.ready_text {
            if !html.contains(ready.as_str()) {
                return None;
            }
        }

        let document = Html::parse_document(html);
        let rows: Vec<String> = document
            .select(&self.row_selector)
            .map(|row| clean_text(&row.text().collect::<String>()))
            .collect();
        if rows.is_empty() {
            return None;
        }

        Some(ListingPage {
            url: self.driver.current_url(),
            index,
            html: html.to_string(),
            row_count: rows.len(),
            fingerprint: fingerprint(&rows),
        })
    }
}
