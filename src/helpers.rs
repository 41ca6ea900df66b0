//! Text helpers shared by the scrapers
//!
//! - Date parsing against the formats the PAA site is known to use
//! - Whitespace cleanup of cell text
//! - Link resolution against the listing URL
//! - Row fingerprints for detecting a page change
//!
//! # Examples
//!
//! ```
//! use paa_scraper::helpers::{clean_text, parse_site_date};
//!
//! assert_eq!(clean_text("  Jinnah \n  International "), "Jinnah International");
//! assert!(parse_site_date("05-01-2024").is_some());
//! assert!(parse_site_date("TBA").is_none());
//! ```

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::OnceLock;
use url::Url;

const DATETIME_FORMATS: &[&str] = &[
    "%d-%m-%Y %H:%M",
    "%d/%m/%Y %H:%M",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%d %b %Y %H:%M",
    // ICAO validity group, e.g. 2401051200
    "%y%m%d%H%M",
];

const DATE_FORMATS: &[&str] = &[
    "%d-%m-%Y",
    "%d/%m/%Y",
    "%Y-%m-%d",
    "%d %b %Y",
    "%d %B %Y",
    "%d-%b-%Y",
    "%b %d, %Y",
    "%B %d, %Y",
];

/// Parse a date as shown on the site; `None` when no known format matches
pub fn parse_site_date(raw: &str) -> Option<NaiveDateTime> {
    let s = clean_text(raw);
    if s.is_empty() {
        return None;
    }

    if s.len() == 10 && s.bytes().all(|b| b.is_ascii_digit()) {
        return NaiveDateTime::parse_from_str(&s, "%y%m%d%H%M").ok();
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&s, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(&s, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Collapse runs of whitespace and trim
pub fn clean_text(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Resolve a link found on `page_url` to an absolute URL. In-page anchors
/// and script links resolve to nothing.
pub fn resolve_url(page_url: &str, href: &str) -> String {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return String::new();
    }

    match Url::parse(page_url).and_then(|base| base.join(href)) {
        Ok(url) => url.to_string(),
        Err(e) => {
            log::debug!("Keeping link {:?} unresolved against {:?}: {}", href, page_url, e);
            href.to_string()
        }
    }
}

/// Issue time of a NOTAM, taken from the first validity group after `B)`
pub fn notam_issue_date(raw_text: &str) -> String {
    static ISSUE: OnceLock<Regex> = OnceLock::new();
    let re = ISSUE.get_or_init(|| {
        Regex::new(r"B\)\s*(\d{10})").expect("valid NOTAM issue regex")
    });
    re.captures(raw_text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// Order-sensitive hash of a page's row texts
pub fn fingerprint<I, S>(rows: I) -> u64
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut hasher = DefaultHasher::new();
    for row in rows {
        row.as_ref().hash(&mut hasher);
    }
    hasher.finish()
}
