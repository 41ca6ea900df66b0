use super::manager::BrowserError;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

/// Points at one element: the `nth` match of `selector`, optionally narrowed
/// to the first descendant matching `within`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    pub selector: String,
    pub nth: usize,
    pub within: Option<String>,
}

impl Locator {
    pub fn first(selector: &str) -> Self {
        Self::nth(selector, 0)
    }

    pub fn nth(selector: &str, nth: usize) -> Self {
        Self {
            selector: selector.to_string(),
            nth,
            within: None,
        }
    }

    pub fn within(mut self, selector: &str) -> Self {
        self.within = Some(selector.to_string());
        self
    }

    /// JavaScript expression evaluating to the element or `null`
    pub fn to_js(&self) -> String {
        let base = format!(
            "(document.querySelectorAll({})[{}] || null)",
            js_string(&self.selector),
            self.nth
        );
        match &self.within {
            Some(inner) => format!("({base} && {base}.querySelector({}))", js_string(inner)),
            None => base,
        }
    }
}

/// How a record's detail view is reached
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetailTarget {
    /// Load the URL in a separate tab
    Href(String),
    /// Click the element and capture the tab it opens
    Click(Locator),
}

/// Capabilities the scrapers need from a browser page.
///
/// One driver wraps one page that is reused across the whole run.
#[async_trait]
pub trait Driver: Send {
    /// Navigate the page to `url` and wait for the load to finish
    async fn goto(&mut self, url: &str) -> Result<(), BrowserError>;

    /// Current rendered HTML of the page
    async fn content(&mut self) -> Result<String, BrowserError>;

    /// Click the located element
    async fn click(&mut self, target: &Locator) -> Result<(), BrowserError>;

    /// Open a detail view outside the listing page and return the visible
    /// text of the first element matching `selector` there
    async fn read_detail(
        &mut self,
        target: &DetailTarget,
        selector: &str,
        timeout: Duration,
    ) -> Result<String, BrowserError>;

    /// Save a PNG screenshot of the page
    async fn screenshot(&mut self, path: &Path) -> Result<(), BrowserError>;

    /// URL the page is currently showing
    fn current_url(&self) -> String;
}

/// Quote a string for safe embedding in a JavaScript expression
pub(crate) fn js_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}
