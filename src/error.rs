use crate::browser::BrowserError;

/// Errors surfaced by the scraping pipeline
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("rows did not render at {url} within {waited_ms}ms")]
    RenderTimeout { url: String, waited_ms: u128 },

    #[error("page content did not change at {url} within {waited_ms}ms")]
    StaleContent { url: String, waited_ms: u128 },

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("{operation} on page {page} failed after {attempts} attempts: {last}")]
    RetryExhausted {
        operation: &'static str,
        page: usize,
        attempts: usize,
        last: Box<ScrapeError>,
    },

    #[error("invalid selector {selector:?}: {reason}")]
    Selector { selector: String, reason: String },

    #[error("browser error: {0}")]
    Browser(BrowserError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl ScrapeError {
    /// Whether retrying the same operation unchanged may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RenderTimeout { .. } | Self::StaleContent { .. } | Self::Navigation(_)
        )
    }
}

impl From<BrowserError> for ScrapeError {
    fn from(e: BrowserError) -> Self {
        match e {
            BrowserError::NavigationError(msg) => Self::Navigation(msg),
            BrowserError::Timeout(msg) => Self::Navigation(format!("timeout: {}", msg)),
            BrowserError::HtmlExtractionError(msg) => {
                Self::Navigation(format!("content unavailable: {}", msg))
            }
            BrowserError::ElementNotFound(msg) => {
                Self::Navigation(format!("element not found: {}", msg))
            }
            other => Self::Browser(other),
        }
    }
}
