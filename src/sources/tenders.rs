use super::{has_match, no_rows, wait_for_match, wait_for_no_match, Extractor, RowCells, RowSelectors};
use crate::browser::{Driver, Locator};
use crate::config::TenderSiteConfig;
use crate::error::ScrapeError;
use crate::helpers::{clean_text, resolve_url};
use crate::models::{DateField, TenderRecord};
use crate::navigator::{parse_selector, ListingPage};
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;

// Column layout of the tender table
const SERIAL: usize = 0;
const TITLE: usize = 1;
const LOCATION: usize = 2;
const ADVERTISED: usize = 3;
const CLOSING: usize = 4;

const CATEGORY_LABELS: &[&str] = &["category", "tender category", "type", "procurement type"];
const DESCRIPTION_LABELS: &[&str] = &["description", "details", "scope of work", "scope"];

/// Fields revealed by a tender's details panel
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TenderDetails {
    pub category: String,
    pub description: String,
    pub document_link: String,
}

/// PAA tender listing
pub struct TenderExtractor {
    config: TenderSiteConfig,
    rows: RowSelectors,
    panel: Option<Selector>,
    panel_link: Selector,
}

impl TenderExtractor {
    pub fn new(config: TenderSiteConfig) -> Result<Self, ScrapeError> {
        let rows = RowSelectors::new(
            &config.listing.row_selector,
            &config.listing.cell_selector,
            &config.document_link_selector,
            &config.details_button_selector,
            config.listing.min_cells,
        )?;
        let panel = if config.details_button_selector.trim().is_empty() {
            None
        } else {
            Some(parse_selector(&config.details_panel_selector)?)
        };
        let panel_link = parse_selector(&config.document_link_selector)?;

        Ok(Self {
            config,
            rows,
            panel,
            panel_link,
        })
    }

    /// Record from the table cells alone
    pub fn summary(row: &RowCells, page_url: &str) -> TenderRecord {
        TenderRecord {
            tender_id: row.cell(SERIAL),
            title: row.cell(TITLE),
            location: row.cell(LOCATION),
            publish_date: DateField::new(&row.cell(ADVERTISED)),
            closing_date: DateField::new(&row.cell(CLOSING)),
            category: String::new(),
            document_link: row
                .link
                .as_deref()
                .map(|href| resolve_url(page_url, href))
                .unwrap_or_default(),
            description: String::new(),
        }
    }

    /// Open the row's details panel and read it. The panel is left open.
    async fn expand(
        &self,
        driver: &mut dyn Driver,
        panel: &Selector,
        page: &ListingPage,
        row: &RowCells,
    ) -> Result<TenderDetails, ScrapeError> {
        let button = Locator::nth(&self.config.listing.row_selector, row.index)
            .within(&self.config.details_button_selector);
        driver.click(&button).await?;

        let timeout = Duration::from_secs(self.config.details_timeout_secs);
        let html = wait_for_match(driver, panel, timeout).await?;
        Ok(parse_details(&html, panel, &self.panel_link, &page.url))
    }

    /// Make sure no details panel is showing, closing one if needed.
    /// False when a panel is still open after the details timeout.
    async fn dismiss(&self, driver: &mut dyn Driver, panel: &Selector) -> bool {
        match driver.content().await {
            Ok(html) if !has_match(&html, panel) => return true,
            Ok(_) => {}
            Err(e) => {
                log::warn!("Cannot check for an open details panel: {}", e);
                return false;
            }
        }

        if let Err(e) = driver
            .click(&Locator::first(&self.config.details_close_selector))
            .await
        {
            log::warn!("Close control of the details panel failed: {}", e);
        }

        let timeout = Duration::from_secs(self.config.details_timeout_secs);
        match wait_for_no_match(driver, panel, timeout).await {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Details panel did not close: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl Extractor for TenderExtractor {
    type Record = TenderRecord;

    fn name(&self) -> &'static str {
        "tenders"
    }

    async fn extract(
        &self,
        driver: &mut dyn Driver,
        page: &ListingPage,
    ) -> Result<Vec<TenderRecord>, ScrapeError> {
        let rows = self.rows.parse(&page.html);
        if rows.is_empty() {
            return Err(no_rows(page));
        }

        let mut records = Vec::with_capacity(rows.len());
        let mut expanding = self.panel.is_some();
        for row in &rows {
            let mut record = Self::summary(row, &page.url);

            if record.tender_id.is_empty() {
                log::warn!(
                    "Dropping row {} on page {}: no tender_id",
                    row.index,
                    page.index
                );
                records.push(record);
                continue;
            }

            if let (true, true, Some(panel)) = (row.has_details, expanding, self.panel.as_ref()) {
                let mut ready = self.dismiss(driver, panel).await;
                if ready {
                    match self.expand(driver, panel, page, row).await {
                        Ok(details) => {
                            record.category = details.category;
                            record.description = details.description;
                            if record.document_link.is_empty() {
                                record.document_link = details.document_link;
                            }
                        }
                        Err(e) => log::warn!(
                            "Tender {} on page {}: details unavailable, keeping summary ({})",
                            record.tender_id,
                            page.index,
                            e
                        ),
                    }
                    ready = self.dismiss(driver, panel).await;
                }
                if !ready {
                    log::warn!(
                        "Details panel stuck open on page {}; remaining rows keep their summary fields",
                        page.index
                    );
                    expanding = false;
                }
            }

            log::debug!("Extracted tender {}: {}", record.tender_id, record.title);
            records.push(record);
        }
        Ok(records)
    }
}

/// Read the labelled fields of the first panel in `html`
pub fn parse_details(html: &str, panel: &Selector, link: &Selector, page_url: &str) -> TenderDetails {
    let document = Html::parse_document(html);
    let Some(panel) = document.select(panel).next() else {
        return TenderDetails::default();
    };

    let pairs = labelled_values(panel);
    let lookup = |labels: &[&str]| {
        pairs
            .iter()
            .find(|(label, _)| labels.contains(&label.as_str()))
            .map(|(_, value)| value.clone())
            .unwrap_or_default()
    };

    TenderDetails {
        category: lookup(CATEGORY_LABELS),
        description: lookup(DESCRIPTION_LABELS),
        document_link: panel
            .select(link)
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(|href| resolve_url(page_url, href))
            .unwrap_or_default(),
    }
}

/// `(label, value)` pairs from definition lists, two-column table rows and
/// `Label: value` text, labels lowercased without the trailing colon
fn labelled_values(panel: ElementRef) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let normalize = |s: &str| clean_text(s).trim_end_matches(':').trim().to_lowercase();

    if let (Ok(dt), Ok(tr), Ok(th), Ok(td)) = (
        Selector::parse("dt"),
        Selector::parse("tr"),
        Selector::parse("th, td"),
        Selector::parse("td"),
    ) {
        for term in panel.select(&dt) {
            let value = term
                .next_siblings()
                .filter_map(ElementRef::wrap)
                .find(|e| e.value().name() == "dd");
            if let Some(value) = value {
                pairs.push((
                    normalize(&term.text().collect::<String>()),
                    clean_text(&value.text().collect::<String>()),
                ));
            }
        }

        for row in panel.select(&tr) {
            let cells: Vec<String> = row
                .select(&th)
                .map(|c| c.text().collect::<String>())
                .collect();
            if cells.len() == 2 && row.select(&td).next().is_some() {
                pairs.push((normalize(&cells[0]), clean_text(&cells[1])));
            }
        }
    }

    let lines: Vec<String> = panel
        .text()
        .flat_map(|t| t.lines())
        .map(clean_text)
        .filter(|l| !l.is_empty())
        .collect();
    for (i, line) in lines.iter().enumerate() {
        match line.split_once(':') {
            Some((label, value)) if !value.trim().is_empty() => {
                pairs.push((normalize(label), clean_text(value)));
            }
            Some((label, _)) => {
                if let Some(next) = lines.get(i + 1) {
                    pairs.push((normalize(label), next.clone()));
                }
            }
            None => {}
        }
    }

    pairs
}
