use super::{no_rows, Extractor, RowCells, RowSelectors};
use crate::browser::{DetailTarget, Driver, Locator};
use crate::config::NotamSiteConfig;
use crate::error::ScrapeError;
use crate::helpers::notam_issue_date;
use crate::models::{DateField, NotamRecord};
use crate::navigator::ListingPage;
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::sleep;

const DETAIL_RETRY_DELAY: Duration = Duration::from_secs(1);

// Column layout of the NOTAM table
const LOCATION: usize = 0;
const NOTAM_NO: usize = 1;
const START_DATE: usize = 2;
const END_DATE: usize = 3;
const STATUS: usize = 4;
const SUMMARY: usize = 5;

/// PAA notice-to-airmen listing
pub struct NotamExtractor {
    config: NotamSiteConfig,
    rows: RowSelectors,
}

impl NotamExtractor {
    pub fn new(config: NotamSiteConfig) -> Result<Self, ScrapeError> {
        let rows = RowSelectors::new(
            &config.listing.row_selector,
            &config.listing.cell_selector,
            &config.detail_link_selector,
            "",
            config.listing.min_cells,
        )?;
        Ok(Self { config, rows })
    }

    /// Record from the table cells alone
    pub fn summary(row: &RowCells) -> NotamRecord {
        NotamRecord {
            reference_id: row.cell(NOTAM_NO),
            issue_date: DateField::default(),
            effective_from: DateField::new(&row.cell(START_DATE)),
            effective_to: DateField::new(&row.cell(END_DATE)),
            location: row.cell(LOCATION),
            status: row.cell(STATUS),
            description: row.cell(SUMMARY),
            raw_text: String::new(),
        }
    }

    /// Full NOTAM text behind the row's link, empty when it cannot be read.
    /// Blob links open directly; anything else is clicked and the popup read.
    async fn detail_text(&self, driver: &mut dyn Driver, page: &ListingPage, row: &RowCells) -> String {
        let Some(href) = &row.link else {
            log::debug!("Row {} on page {} has no detail link", row.index, page.index);
            return String::new();
        };

        let selector = &self.config.detail_text_selector;
        let timeout = Duration::from_secs(self.config.detail_timeout_secs);

        if href.starts_with("blob:") {
            return match driver
                .read_detail(&DetailTarget::Href(href.clone()), selector, timeout)
                .await
            {
                Ok(text) => text,
                Err(e) => {
                    log::warn!("Could not read blob detail for row {} on page {}: {}", row.index, page.index, e);
                    String::new()
                }
            };
        }

        let target = DetailTarget::Click(
            Locator::nth(&self.config.listing.row_selector, row.index)
                .within(&self.config.detail_link_selector),
        );
        let attempts = self.config.detail_attempts.max(1);
        for attempt in 1..=attempts {
            match driver.read_detail(&target, selector, timeout).await {
                Ok(text) => return text,
                Err(e) => {
                    log::warn!(
                        "Detail view for row {} on page {}, attempt {}/{}: {}",
                        row.index,
                        page.index,
                        attempt,
                        attempts,
                        e
                    );
                    if attempt < attempts {
                        sleep(DETAIL_RETRY_DELAY).await;
                    }
                }
            }
        }
        String::new()
    }
}

#[async_trait]
impl Extractor for NotamExtractor {
    type Record = NotamRecord;

    fn name(&self) -> &'static str {
        "notams"
    }

    async fn extract(
        &self,
        driver: &mut dyn Driver,
        page: &ListingPage,
    ) -> Result<Vec<NotamRecord>, ScrapeError> {
        let rows = self.rows.parse(&page.html);
        if rows.is_empty() {
            return Err(no_rows(page));
        }

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut record = Self::summary(row);

            if record.reference_id.is_empty() {
                log::warn!(
                    "Dropping row {} on page {}: no reference_id",
                    row.index,
                    page.index
                );
                records.push(record);
                continue;
            }

            record.raw_text = self.detail_text(driver, page, row).await;
            record.issue_date = DateField::new(&notam_issue_date(&record.raw_text));

            log::debug!("Extracted NOTAM {}", record.reference_id);
            records.push(record);
        }
        Ok(records)
    }
}
