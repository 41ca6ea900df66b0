//! Browser automation boundary
//!
//! The scrapers never talk to Chrome directly. Everything they need from a
//! browser (load a URL, read the rendered HTML, click an element, read a
//! detail view, take a screenshot) goes through the [`Driver`] trait, so the
//! navigation and extraction logic can be exercised against a scripted page.
//!
//! # Example
//!
//! ```no_run
//! use paa_scraper::browser::{BrowserConfig, BrowserManager, Driver, TabDriver};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = BrowserManager::new(BrowserConfig::default())?;
//! let mut driver = TabDriver::new(&manager)?;
//!
//! driver.goto("https://example.com").await?;
//! let html = driver.content().await?;
//!
//! println!("Rendered {} bytes of HTML", html.len());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod driver;
pub mod manager;
pub mod tab;

pub use config::BrowserConfig;
pub use driver::{DetailTarget, Driver, Locator};
pub use manager::{BrowserError, BrowserManager};
pub use tab::TabDriver;
