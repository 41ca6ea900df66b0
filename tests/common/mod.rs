//! Scripted browser used by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use paa_scraper::browser::{BrowserError, DetailTarget, Driver, Locator};
use paa_scraper::config::Config;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const NEXT: &str = "#pagination-next-page";

pub const NOTAM_TEXT: &str = "A0001/24 NOTAMN\nA) OPKC B) 2401051200 C) 2401101800\nE) RWY 07L CLSD";

const PANEL: &str = r#"<div role="dialog">
    <dl><dt>Category</dt><dd>Works</dd><dt>Description</dt><dd>Apron resurfacing</dd></dl>
    <a href="/docs/tender.pdf">Download</a>
    <button aria-label="Close">x</button>
</div>"#;

/// Serves a fixed list of pages; clicking "next" moves forward one page
#[derive(Default)]
pub struct ScriptedDriver {
    pub pages: Vec<String>,
    pub current: usize,
    pub loaded: bool,
    pub panel_open: bool,
    /// Upcoming clicks on "next" that fail before any succeeds
    pub failing_next_clicks: usize,
    pub next_clicks: usize,
    pub gotos: usize,
    pub details_read: usize,
    pub screenshots: Vec<PathBuf>,
}

impl ScriptedDriver {
    pub fn new(pages: Vec<String>) -> Self {
        Self {
            pages,
            ..Default::default()
        }
    }

    pub fn failing_next(mut self, clicks: usize) -> Self {
        self.failing_next_clicks = clicks;
        self
    }
}

#[async_trait]
impl Driver for ScriptedDriver {
    async fn goto(&mut self, _url: &str) -> Result<(), BrowserError> {
        self.gotos += 1;
        self.loaded = true;
        self.current = 0;
        Ok(())
    }

    async fn content(&mut self) -> Result<String, BrowserError> {
        if !self.loaded {
            return Ok("<html><body></body></html>".to_string());
        }
        let page = &self.pages[self.current];
        if self.panel_open {
            Ok(page.replace("</body>", &format!("{}</body>", PANEL)))
        } else {
            Ok(page.clone())
        }
    }

    async fn click(&mut self, target: &Locator) -> Result<(), BrowserError> {
        if target.selector == NEXT {
            if self.failing_next_clicks > 0 {
                self.failing_next_clicks -= 1;
                return Err(BrowserError::ElementNotFound(NEXT.to_string()));
            }
            self.next_clicks += 1;
            self.current = (self.current + 1).min(self.pages.len() - 1);
        } else if target.within.is_some() {
            self.panel_open = true;
        } else if target.selector.contains("Close") {
            self.panel_open = false;
        }
        Ok(())
    }

    async fn read_detail(
        &mut self,
        _target: &DetailTarget,
        _selector: &str,
        _timeout: Duration,
    ) -> Result<String, BrowserError> {
        self.details_read += 1;
        Ok(NOTAM_TEXT.to_string())
    }

    async fn screenshot(&mut self, path: &Path) -> Result<(), BrowserError> {
        std::fs::write(path, b"\x89PNG").map_err(|e| BrowserError::ScreenshotError(e.to_string()))?;
        self.screenshots.push(path.to_path_buf());
        Ok(())
    }

    fn current_url(&self) -> String {
        format!("https://paa.test/listing?page={}", self.current + 1)
    }
}

fn next_button(last: bool) -> String {
    format!(
        r#"<button id="pagination-next-page"{}>Next</button>"#,
        if last { " disabled" } else { "" }
    )
}

/// NOTAM listing page with one row per id
pub fn notam_page(ids: &[&str], last: bool) -> String {
    let rows: String = ids
        .iter()
        .map(|id| {
            format!(
                r#"<div class="rdt_TableRow">
                    <div class="rdt_TableCell">OPKC</div>
                    <div class="rdt_TableCell">{id}</div>
                    <div class="rdt_TableCell">05-01-2024 12:00</div>
                    <div class="rdt_TableCell">10-01-2024 18:00</div>
                    <div class="rdt_TableCell">Active</div>
                    <div class="rdt_TableCell">RWY 07L CLSD</div>
                    <div class="rdt_TableCell"><a href="blob:https://paa.gov.pk/{id}">View</a></div>
                </div>"#
            )
        })
        .collect();
    format!(
        r#"<html><body><div class="rdt_TableHeadRow"></div>{}{}</body></html>"#,
        rows,
        next_button(last)
    )
}

/// Tender listing page; each row is `[sr, title, location, advertised, closing]`
pub fn tender_page(rows: &[[&str; 5]], last: bool, with_details: bool) -> String {
    let button = if with_details {
        r#"<button title="View Details">View</button>"#
    } else {
        ""
    };
    let body: String = rows
        .iter()
        .map(|cells| {
            let cells: String = cells
                .iter()
                .map(|c| format!(r#"<div role="cell">{}</div>"#, c))
                .collect();
            format!(r#"<div role="row">{}{}</div>"#, cells, button)
        })
        .collect();
    format!(
        r#"<html><body><h1>INVITATION TO BID</h1>
        <div role="row"><div role="columnheader">Sr</div><div role="columnheader">Title</div></div>
        {}{}</body></html>"#,
        body,
        next_button(last)
    )
}

/// Defaults pointed at `dir`, with short backoff
pub fn test_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.diagnostics.dir = dir.join("diagnostics");
    config.retry.initial_delay_ms = 100;
    config.retry.max_delay_ms = 400;
    config.notams.listing.url = "https://paa.test/notams".to_string();
    config.notams.listing.output = dir.join("notams.csv");
    config.tenders.listing.url = "https://paa.test/tenders".to_string();
    config.tenders.listing.output = dir.join("tenders.csv");
    config
}

/// Rows of a CSV file, header included
pub fn read_csv(path: &Path) -> Vec<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)
        .unwrap();
    reader
        .records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect()
}
