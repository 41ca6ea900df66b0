use super::config::BrowserConfig;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::ffi::OsStr;
use std::sync::Arc;

/// Overrides navigator properties commonly used for automation detection
const STEALTH_SCRIPT: &str = r#"
    Object.defineProperty(navigator, 'webdriver', {
        get: () => undefined
    });
    Object.defineProperty(navigator, 'languages', {
        get: () => ['en-US', 'en']
    });
"#;

/// Owns the Chrome process for the duration of a run
pub struct BrowserManager {
    browser: Arc<Browser>,
    config: BrowserConfig,
}

impl BrowserManager {
    /// Launch a browser with the given configuration
    pub fn new(config: BrowserConfig) -> Result<Self, BrowserError> {
        let args = config.launch_args();
        let launch_options = Self::build_launch_options(&config, &args)?;

        let browser = Browser::new(launch_options)
            .map_err(|e| BrowserError::InitializationError(e.to_string()))?;

        log::info!(
            "Browser launched (headless: {}, window: {}x{})",
            config.headless,
            config.window_size.0,
            config.window_size.1
        );

        Ok(Self {
            browser: Arc::new(browser),
            config,
        })
    }

    /// Build Chrome launch options from our config
    fn build_launch_options<'a>(
        config: &BrowserConfig,
        args: &'a [String],
    ) -> Result<LaunchOptions<'a>, BrowserError> {
        let args: Vec<&OsStr> = args.iter().map(OsStr::new).collect();

        LaunchOptions::default_builder()
            .headless(config.headless)
            .window_size(Some((config.window_size.0, config.window_size.1)))
            .idle_browser_timeout(config.timeout() * 10)
            .args(args)
            .build()
            .map_err(|e| BrowserError::ConfigurationError(e.to_string()))
    }

    /// Create a new tab with the stealth overrides applied
    pub fn new_tab(&self) -> Result<Arc<Tab>, BrowserError> {
        let tab = self
            .browser
            .new_tab()
            .map_err(|e| BrowserError::TabCreationError(e.to_string()))?;

        tab.set_default_timeout(self.config.timeout());
        tab.evaluate(STEALTH_SCRIPT, false)
            .map_err(|e| BrowserError::JavaScriptError(e.to_string()))?;

        Ok(tab)
    }

    /// Get a reference to the underlying browser
    pub fn browser(&self) -> &Arc<Browser> {
        &self.browser
    }
}

/// Errors that can occur during browser operations
#[derive(Debug, thiserror::Error)]
pub enum BrowserError {
    #[error("Browser initialization failed: {0}")]
    InitializationError(String),

    #[error("Browser configuration error: {0}")]
    ConfigurationError(String),

    #[error("Tab creation failed: {0}")]
    TabCreationError(String),

    #[error("Navigation error: {0}")]
    NavigationError(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("JavaScript execution error: {0}")]
    JavaScriptError(String),

    #[error("HTML extraction error: {0}")]
    HtmlExtractionError(String),

    #[error("Screenshot failed: {0}")]
    ScreenshotError(String),

    #[error("Browser task failed: {0}")]
    TaskFailed(String),
}
