use crate::browser::BrowserConfig;
use crate::retry::{FailurePolicy, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const NOTAMS_URL: &str = "https://paa.gov.pk/aeronautical-information/notice-to-airmen";
pub const TENDERS_URL: &str = "https://paa.gov.pk/allTender";

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
    #[serde(default)]
    pub notams: NotamSiteConfig,
    #[serde(default)]
    pub tenders: TenderSiteConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RetryConfig {
    /// Attempts per operation, the first one included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,

    /// Delay before the first retry in milliseconds
    #[serde(default = "default_initial_retry_delay")]
    pub initial_delay_ms: u64,

    /// Upper bound for the backoff delay in milliseconds
    #[serde(default = "default_max_retry_delay")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> usize { 3 }
fn default_initial_retry_delay() -> u64 { 1000 }
fn default_max_retry_delay() -> u64 { 8000 }

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_retry_delay(),
            max_delay_ms: default_max_retry_delay(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self, on_exhausted: FailurePolicy) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            on_exhausted,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DiagnosticsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_diagnostics_dir")]
    pub dir: PathBuf,
}

fn default_true() -> bool { true }
fn default_diagnostics_dir() -> PathBuf { PathBuf::from("diagnostics") }

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: default_diagnostics_dir(),
        }
    }
}

/// Selectors and timing shared by both listing sites
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ListingConfig {
    pub url: String,
    pub output: PathBuf,
    /// Text that must be present before rows are looked for
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ready_text: Option<String>,
    pub row_selector: String,
    pub cell_selector: String,
    /// Rows with fewer cells are headers or malformed
    pub min_cells: usize,
    pub next_selector: String,
    pub render_timeout_secs: u64,
    /// Pause after clicking "next" before polling for new rows
    pub settle_delay_ms: u64,
    pub failure_policy: FailurePolicy,
    /// Skip-policy runs stop after this many failed advances in a row
    pub max_consecutive_skips: usize,
    /// Prefix a newly created file with a UTF-8 byte order mark
    pub write_bom: bool,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            output: PathBuf::from("output.csv"),
            ready_text: None,
            row_selector: ".rdt_TableRow".to_string(),
            cell_selector: ".rdt_TableCell".to_string(),
            min_cells: 1,
            next_selector: "#pagination-next-page".to_string(),
            render_timeout_secs: 10,
            settle_delay_ms: 3000,
            failure_policy: FailurePolicy::Abort,
            max_consecutive_skips: 3,
            write_bom: false,
        }
    }
}

impl ListingConfig {
    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render_timeout_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct NotamSiteConfig {
    #[serde(flatten)]
    pub listing: ListingConfig,
    /// Anchor inside a row that leads to the full NOTAM text
    pub detail_link_selector: String,
    /// Element holding the full text on the detail view
    pub detail_text_selector: String,
    pub detail_attempts: usize,
    pub detail_timeout_secs: u64,
    /// Pause after the detail view renders, before its text is read
    pub detail_settle_ms: u64,
}

impl Default for NotamSiteConfig {
    fn default() -> Self {
        Self {
            listing: ListingConfig {
                url: NOTAMS_URL.to_string(),
                output: PathBuf::from("notams.csv"),
                min_cells: 6,
                failure_policy: FailurePolicy::Abort,
                ..ListingConfig::default()
            },
            detail_link_selector: "a".to_string(),
            detail_text_selector: "pre".to_string(),
            detail_attempts: 4,
            detail_timeout_secs: 10,
            detail_settle_ms: 1000,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct TenderSiteConfig {
    #[serde(flatten)]
    pub listing: ListingConfig,
    /// Link to the tender document inside a row
    pub document_link_selector: String,
    /// "View details" control inside a row; empty disables expansion
    pub details_button_selector: String,
    /// Panel revealed by the details control
    pub details_panel_selector: String,
    /// Control that dismisses the panel
    pub details_close_selector: String,
    pub details_timeout_secs: u64,
}

impl Default for TenderSiteConfig {
    fn default() -> Self {
        Self {
            listing: ListingConfig {
                url: TENDERS_URL.to_string(),
                output: PathBuf::from("tenders.csv"),
                ready_text: Some("INVITATION TO BID".to_string()),
                row_selector: "div[role=\"row\"]".to_string(),
                cell_selector: "div[role=\"cell\"]".to_string(),
                min_cells: 5,
                render_timeout_secs: 60,
                failure_policy: FailurePolicy::Skip,
                ..ListingConfig::default()
            },
            document_link_selector: "a[href]".to_string(),
            details_button_selector: "button[title=\"View Details\"], .view-details".to_string(),
            details_panel_selector: "[role=\"dialog\"]".to_string(),
            details_close_selector: "[role=\"dialog\"] button[aria-label=\"Close\"]".to_string(),
            details_timeout_secs: 5,
        }
    }
}

/// Errors while reading `config.toml`
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("could not lay out default configuration: {0}")]
    Defaults(#[from] toml::ser::Error),
}

impl Config {
    /// Load `config.toml` (or the file named by `PAA_CONFIG`), then apply
    /// environment overrides. Missing or invalid files fall back to defaults.
    pub fn load() -> Self {
        let path = env::var("PAA_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
        let mut config = Self::from_file(Path::new(&path));
        config.apply_env(|key| env::var(key).ok());
        config
    }

    fn from_file(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                log::warn!("Could not read {}: {}", path.display(), e);
                return Self::default();
            }
        };
        match Self::from_toml_str(&content) {
            Ok(cfg) => {
                log::info!("Loaded configuration from {}", path.display());
                cfg
            }
            Err(e) => {
                log::warn!("Ignoring {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Parse a TOML document laid over the defaults, so a partially
    /// specified site section keeps that site's own defaults
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let overlay: toml::Value = toml::from_str(content)?;
        let mut merged = toml::Value::try_from(Self::default())?;
        merge_toml(&mut merged, overlay);
        Ok(merged.try_into()?)
    }

    /// Apply `PAA_*` overrides looked up through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("PAA_NOTAMS_OUTPUT") {
            self.notams.listing.output = PathBuf::from(path);
        }
        if let Some(path) = lookup("PAA_TENDERS_OUTPUT") {
            self.tenders.listing.output = PathBuf::from(path);
        }
        if let Some(dir) = lookup("PAA_DIAGNOSTICS_DIR") {
            self.diagnostics.dir = PathBuf::from(dir);
        }
        if let Some(value) = lookup("PAA_HEADLESS") {
            match value.trim().to_ascii_lowercase().as_str() {
                "0" | "false" | "no" | "off" => self.browser.headless = false,
                "1" | "true" | "yes" | "on" => self.browser.headless = true,
                other => log::warn!("Ignoring PAA_HEADLESS={}", other),
            }
        }
    }
}

fn merge_toml(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_toml(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}
