use super::driver::{js_string, DetailTarget, Driver, Locator};
use super::manager::{BrowserError, BrowserManager};
use async_trait::async_trait;
use headless_chrome::protocol::cdp::Page;
use headless_chrome::{Browser, Tab};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const POPUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Run a synchronous browser call on the blocking pool so the runtime keeps
/// polling timers and signals while Chrome answers
async fn blocking<T, F>(call: F) -> Result<T, BrowserError>
where
    F: FnOnce() -> Result<T, BrowserError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(call)
        .await
        .map_err(|e| BrowserError::TaskFailed(e.to_string()))?
}

/// [`Driver`] over a single headless Chrome tab
pub struct TabDriver {
    browser: Arc<Browser>,
    tab: Arc<Tab>,
    detail_settle: Duration,
}

impl TabDriver {
    /// Open the tab that will be reused for the whole run
    pub fn new(manager: &BrowserManager) -> Result<Self, BrowserError> {
        Ok(Self {
            browser: manager.browser().clone(),
            tab: manager.new_tab()?,
            detail_settle: Duration::from_secs(1),
        })
    }

    /// Pause after a detail view renders before reading it
    pub fn with_detail_settle(mut self, settle: Duration) -> Self {
        self.detail_settle = settle;
        self
    }

    fn evaluate_bool(tab: &Tab, script: &str) -> Result<bool, BrowserError> {
        let result = tab
            .evaluate(script, false)
            .map_err(|e| BrowserError::JavaScriptError(e.to_string()))?;
        Ok(result.value.and_then(|v| v.as_bool()).unwrap_or(false))
    }

    /// Poll until `selector` matches something in `tab`
    async fn wait_for_selector(
        tab: &Arc<Tab>,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), BrowserError> {
        let start = Instant::now();
        let script = format!("document.querySelector({}) !== null", js_string(selector));

        loop {
            let (t, s) = (tab.clone(), script.clone());
            // Evaluation errors while the page is still loading are expected
            if let Ok(true) = blocking(move || Self::evaluate_bool(&t, &s)).await {
                return Ok(());
            }
            if start.elapsed() > timeout {
                return Err(BrowserError::Timeout(format!(
                    "Waiting for selector: {}",
                    selector
                )));
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    /// Visible text of `selector`, falling back to `textContent` when the
    /// rendered text collapses to a single line
    fn read_text(tab: &Tab, selector: &str) -> Result<String, BrowserError> {
        let script = format!(
            r#"(() => {{
                const e = document.querySelector({});
                if (!e) return null;
                const t = e.innerText || '';
                return t.trim().split('\n').length < 2 ? (e.textContent || '') : t;
            }})()"#,
            js_string(selector)
        );

        let result = tab
            .evaluate(&script, false)
            .map_err(|e| BrowserError::JavaScriptError(e.to_string()))?;

        result
            .value
            .and_then(|v| v.as_str().map(|s| s.trim().to_string()))
            .ok_or_else(|| BrowserError::ElementNotFound(selector.to_string()))
    }

    fn known_tab_ids(&self) -> Result<HashSet<String>, BrowserError> {
        let tabs = self
            .browser
            .get_tabs()
            .lock()
            .map_err(|e| BrowserError::TabCreationError(e.to_string()))?;
        Ok(tabs.iter().map(|t| t.get_target_id().to_string()).collect())
    }

    /// Click `target` and return the tab the click opened
    async fn capture_popup(&mut self, target: &Locator) -> Result<Arc<Tab>, BrowserError> {
        let before = self.known_tab_ids()?;
        self.click(target).await?;

        let start = Instant::now();
        loop {
            let opened = {
                let tabs = self
                    .browser
                    .get_tabs()
                    .lock()
                    .map_err(|e| BrowserError::TabCreationError(e.to_string()))?;
                tabs.iter()
                    .find(|t| !before.contains(t.get_target_id().as_str()))
                    .cloned()
            };
            if let Some(tab) = opened {
                return Ok(tab);
            }
            if start.elapsed() > POPUP_TIMEOUT {
                return Err(BrowserError::Timeout("popup tab after click".to_string()));
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    /// Load `href` in a fresh tab, closing it again if the load fails
    async fn open_detail_tab(&self, href: &str) -> Result<Arc<Tab>, BrowserError> {
        let browser = self.browser.clone();
        let href = href.to_string();
        blocking(move || {
            let tab = browser
                .new_tab()
                .map_err(|e| BrowserError::TabCreationError(e.to_string()))?;
            let loaded = tab
                .navigate_to(&href)
                .and_then(|t| t.wait_until_navigated())
                .map(|_| ());
            match loaded {
                Ok(()) => Ok(tab),
                Err(e) => {
                    let _ = tab.close(false);
                    Err(BrowserError::NavigationError(format!("{}: {}", href, e)))
                }
            }
        })
        .await
    }
}

#[async_trait]
impl Driver for TabDriver {
    async fn goto(&mut self, url: &str) -> Result<(), BrowserError> {
        log::debug!("Browser navigating to: {}", url);

        let tab = self.tab.clone();
        let url = url.to_string();
        blocking(move || {
            tab.navigate_to(&url).map_err(|e| {
                BrowserError::NavigationError(format!("Failed to navigate to {}: {}", url, e))
            })?;
            tab.wait_until_navigated().map_err(|e| {
                BrowserError::NavigationError(format!("Navigation timeout for {}: {}", url, e))
            })?;
            Ok(())
        })
        .await
    }

    async fn content(&mut self) -> Result<String, BrowserError> {
        let tab = self.tab.clone();
        blocking(move || {
            tab.get_content()
                .map_err(|e| BrowserError::HtmlExtractionError(e.to_string()))
        })
        .await
    }

    async fn click(&mut self, target: &Locator) -> Result<(), BrowserError> {
        let script = format!(
            "(() => {{ const e = {}; if (!e) return false; e.click(); return true; }})()",
            target.to_js()
        );

        let tab = self.tab.clone();
        if blocking(move || Self::evaluate_bool(&tab, &script)).await? {
            Ok(())
        } else {
            Err(BrowserError::ElementNotFound(format!(
                "{}[{}]",
                target.selector, target.nth
            )))
        }
    }

    async fn read_detail(
        &mut self,
        target: &DetailTarget,
        selector: &str,
        timeout: Duration,
    ) -> Result<String, BrowserError> {
        let detail = match target {
            DetailTarget::Href(href) => self.open_detail_tab(href).await?,
            DetailTarget::Click(locator) => self.capture_popup(locator).await?,
        };

        let settle = self.detail_settle;
        let text = async {
            Self::wait_for_selector(&detail, selector, timeout).await?;
            sleep(settle).await;
            let (t, s) = (detail.clone(), selector.to_string());
            blocking(move || Self::read_text(&t, &s)).await
        }
        .await;

        let closing = detail.clone();
        let closed = blocking(move || {
            closing
                .close(false)
                .map(|_| ())
                .map_err(|e| BrowserError::TabCreationError(e.to_string()))
        })
        .await;
        if let Err(e) = closed {
            log::debug!("Failed to close detail tab: {}", e);
        }

        text
    }

    async fn screenshot(&mut self, path: &Path) -> Result<(), BrowserError> {
        let tab = self.tab.clone();
        let path = path.to_path_buf();
        blocking(move || {
            let screenshot_data = tab
                .capture_screenshot(Page::CaptureScreenshotFormatOption::Png, None, None, true)
                .map_err(|e| BrowserError::ScreenshotError(e.to_string()))?;

            std::fs::write(&path, screenshot_data).map_err(|e| {
                BrowserError::ScreenshotError(format!("Failed to save {}: {}", path.display(), e))
            })
        })
        .await
    }

    fn current_url(&self) -> String {
        self.tab.get_url()
    }
}
