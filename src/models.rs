use crate::helpers::parse_site_date;
use chrono::NaiveDateTime;
use serde::Serialize;

/// A row type the incremental writer can persist
pub trait Record {
    /// Column order used when the record type creates a new file
    const COLUMNS: &'static [&'static str];

    /// Identifying field used for the blank-id and dedup checks
    fn id(&self) -> &str;

    /// Value of a named column, `None` when the record has no such column
    fn field(&self, column: &str) -> Option<String>;

    /// Whether some non-empty date cell could not be parsed
    fn date_unparsed(&self) -> bool;
}

/// A scraped date cell: the text as shown on the site plus its parsed value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DateField {
    pub raw: String,
    pub parsed: Option<NaiveDateTime>,
}

impl DateField {
    pub fn new(raw: &str) -> Self {
        let raw = raw.trim().to_string();
        let parsed = parse_site_date(&raw);
        Self { raw, parsed }
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Text is present but matched none of the known formats
    pub fn is_unparsed(&self) -> bool {
        !self.raw.is_empty() && self.parsed.is_none()
    }
}

fn flag(b: bool) -> String {
    if b { "true" } else { "false" }.to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NotamRecord {
    pub reference_id: String,
    pub issue_date: DateField,
    pub effective_from: DateField,
    pub effective_to: DateField,
    pub location: String,
    pub status: String,
    pub description: String,
    pub raw_text: String,
}

impl Record for NotamRecord {
    const COLUMNS: &'static [&'static str] = &[
        "reference_id",
        "issue_date",
        "effective_from",
        "effective_to",
        "location",
        "status",
        "description",
        "raw_text",
        "date_unparsed",
    ];

    fn id(&self) -> &str {
        &self.reference_id
    }

    fn field(&self, column: &str) -> Option<String> {
        let value = match column {
            "reference_id" => self.reference_id.clone(),
            "issue_date" => self.issue_date.raw.clone(),
            "effective_from" => self.effective_from.raw.clone(),
            "effective_to" => self.effective_to.raw.clone(),
            "location" => self.location.clone(),
            "status" => self.status.clone(),
            "description" => self.description.clone(),
            "raw_text" => self.raw_text.clone(),
            "date_unparsed" => flag(self.date_unparsed()),
            _ => return None,
        };
        Some(value)
    }

    fn date_unparsed(&self) -> bool {
        [&self.issue_date, &self.effective_from, &self.effective_to]
            .iter()
            .any(|d| d.is_unparsed())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TenderRecord {
    pub tender_id: String,
    pub title: String,
    pub location: String,
    pub publish_date: DateField,
    pub closing_date: DateField,
    pub category: String,
    pub document_link: String,
    pub description: String,
}

impl Record for TenderRecord {
    const COLUMNS: &'static [&'static str] = &[
        "tender_id",
        "title",
        "location",
        "publish_date",
        "closing_date",
        "category",
        "document_link",
        "description",
        "date_unparsed",
    ];

    fn id(&self) -> &str {
        &self.tender_id
    }

    fn field(&self, column: &str) -> Option<String> {
        let value = match column {
            "tender_id" => self.tender_id.clone(),
            "title" => self.title.clone(),
            "location" => self.location.clone(),
            "publish_date" => self.publish_date.raw.clone(),
            "closing_date" => self.closing_date.raw.clone(),
            "category" => self.category.clone(),
            "document_link" => self.document_link.clone(),
            "description" => self.description.clone(),
            "date_unparsed" => flag(self.date_unparsed()),
            _ => return None,
        };
        Some(value)
    }

    fn date_unparsed(&self) -> bool {
        self.publish_date.is_unparsed() || self.closing_date.is_unparsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_date_is_absent_not_unparsed() {
        let d = DateField::new("   ");
        assert!(d.is_empty());
        assert!(!d.is_unparsed());
        assert!(d.parsed.is_none());
    }

    #[test]
    fn test_unparsable_date_keeps_raw_text() {
        let d = DateField::new("sometime next week");
        assert_eq!(d.raw, "sometime next week");
        assert!(d.is_unparsed());
    }

    #[test]
    fn test_tender_columns_resolve() {
        let t = TenderRecord {
            tender_id: "12".into(),
            title: "Runway lights".into(),
            closing_date: DateField::new("not announced"),
            ..Default::default()
        };
        for column in TenderRecord::COLUMNS {
            assert!(t.field(column).is_some(), "column {} unresolved", column);
        }
        assert_eq!(t.field("closing_date").as_deref(), Some("not announced"));
        assert_eq!(t.field("date_unparsed").as_deref(), Some("true"));
        assert_eq!(t.field("nonexistent"), None);
    }

    #[test]
    fn test_notam_date_flag() {
        let mut n = NotamRecord {
            reference_id: "A0123/24".into(),
            effective_from: DateField::new("2024-01-05"),
            ..Default::default()
        };
        assert!(!n.date_unparsed());
        n.effective_to = DateField::new("PERM");
        assert!(n.date_unparsed());
        assert_eq!(n.id(), "A0123/24");
    }
}
