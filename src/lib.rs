//! Headless-browser scrapers for the Pakistan Airports Authority NOTAM and
//! tender listings, writing incremental CSV.

pub mod browser;
pub mod config;
pub mod crawler;
pub mod error;
pub mod helpers;
pub mod metrics;
pub mod models;
pub mod navigator;
pub mod retry;
pub mod runner;
pub mod sources;
pub mod writer;

pub use crawler::{Crawler, PageState};
pub use error::ScrapeError;
