//! Site-specific record extraction
//!
//! Each source knows the column layout of one PAA listing table and how to
//! reach the extra fields hidden behind a row. Row parsing itself is shared.

pub mod notams;
pub mod tenders;

use crate::browser::Driver;
use crate::error::ScrapeError;
use crate::helpers::clean_text;
use crate::models::Record;
use crate::navigator::{parse_selector, ListingPage};
use async_trait::async_trait;
use scraper::{Html, Selector};
use std::time::Duration;
use tokio::time::{sleep, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Turns one rendered listing page into records
#[async_trait]
pub trait Extractor: Send + Sync {
    type Record: Record + Send + Sync;

    /// Short name used in logs and artifact file names
    fn name(&self) -> &'static str;

    /// Every record on `page`. A page without any parseable row is
    /// [`ScrapeError::StaleContent`] so the caller can retry it.
    async fn extract(
        &self,
        driver: &mut dyn Driver,
        page: &ListingPage,
    ) -> Result<Vec<Self::Record>, ScrapeError>;
}

/// Summary cells of one listing row
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowCells {
    /// Position among all elements matching the row selector
    pub index: usize,
    pub cells: Vec<String>,
    /// `href` of the row's link; empty when the link has none
    pub link: Option<String>,
    /// Row carries a "view details" control
    pub has_details: bool,
}

impl RowCells {
    /// Text of cell `i`, empty when the row is shorter
    pub fn cell(&self, i: usize) -> String {
        self.cells.get(i).cloned().unwrap_or_default()
    }
}

/// Compiled selectors for reading rows of one listing table
pub struct RowSelectors {
    row: Selector,
    cell: Selector,
    link: Option<Selector>,
    details: Option<Selector>,
    min_cells: usize,
}

impl RowSelectors {
    pub fn new(
        row: &str,
        cell: &str,
        link: &str,
        details: &str,
        min_cells: usize,
    ) -> Result<Self, ScrapeError> {
        let optional = |s: &str| -> Result<Option<Selector>, ScrapeError> {
            if s.trim().is_empty() {
                Ok(None)
            } else {
                parse_selector(s).map(Some)
            }
        };

        Ok(Self {
            row: parse_selector(row)?,
            cell: parse_selector(cell)?,
            link: optional(link)?,
            details: optional(details)?,
            min_cells,
        })
    }

    /// Rows with at least `min_cells` cells; shorter ones are headers or
    /// malformed and are left out
    pub fn parse(&self, html: &str) -> Vec<RowCells> {
        let document = Html::parse_document(html);
        let mut out = Vec::new();

        for (index, row) in document.select(&self.row).enumerate() {
            let cells: Vec<String> = row
                .select(&self.cell)
                .map(|c| clean_text(&c.text().collect::<String>()))
                .collect();
            if cells.len() < self.min_cells {
                log::debug!("Skipping row {} with {} cells", index, cells.len());
                continue;
            }

            let link = self.link.as_ref().and_then(|sel| {
                row.select(sel)
                    .next()
                    .map(|a| a.value().attr("href").unwrap_or("").to_string())
            });
            let has_details = self
                .details
                .as_ref()
                .map(|sel| row.select(sel).next().is_some())
                .unwrap_or(false);

            out.push(RowCells {
                index,
                cells,
                link,
                has_details,
            });
        }
        out
    }
}

/// Poll the page until `selector` matches, returning the HTML at that moment
pub async fn wait_for_match(
    driver: &mut dyn Driver,
    selector: &Selector,
    timeout: Duration,
) -> Result<String, ScrapeError> {
    let start = Instant::now();
    loop {
        let html = driver.content().await?;
        if has_match(&html, selector) {
            return Ok(html);
        }
        if start.elapsed() >= timeout {
            return Err(ScrapeError::RenderTimeout {
                url: driver.current_url(),
                waited_ms: start.elapsed().as_millis(),
            });
        }
        sleep(POLL_INTERVAL).await;
    }
}

/// Poll the page until `selector` no longer matches
pub async fn wait_for_no_match(
    driver: &mut dyn Driver,
    selector: &Selector,
    timeout: Duration,
) -> Result<(), ScrapeError> {
    let start = Instant::now();
    loop {
        let html = driver.content().await?;
        if !has_match(&html, selector) {
            return Ok(());
        }
        if start.elapsed() >= timeout {
            return Err(ScrapeError::StaleContent {
                url: driver.current_url(),
                waited_ms: start.elapsed().as_millis(),
            });
        }
        sleep(POLL_INTERVAL).await;
    }
}

pub(crate) fn has_match(html: &str, selector: &Selector) -> bool {
    Html::parse_document(html).select(selector).next().is_some()
}

/// Error for a page whose rows all failed to parse
pub(crate) fn no_rows(page: &ListingPage) -> ScrapeError {
    ScrapeError::StaleContent {
        url: page.url.clone(),
        waited_ms: 0,
    }
}
