//! Widget contract shared by every dashboard panel
//!
//! A widget kind knows how to fetch raw data from its source, narrow it down with a
//! pure filter, and render the result as styled text. The scheduler and the render
//! coordinator only ever talk to widgets through the `Widget` trait, so adding a kind
//! means registering a constructor in the `registry`, not touching the core.

pub mod instance;
pub mod registry;

#[cfg(test)]
pub mod testing;

pub use instance::{InstanceState, WidgetInstance};
pub use registry::{instantiate, WidgetKind, WidgetRegistry, WidgetSet};

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use ratatui::text::Text;
use thiserror::Error;
use tracing::warn;

use crate::config::RowColors;

/// A single item shown by a widget
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub title: String,
    /// Source-provided date, kept verbatim; parsed only when filtering
    pub date: Option<String>,
    pub detail: Option<String>,
}

impl Record {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            date: None,
            detail: None,
        }
    }

    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Immutable snapshot of one subject's records
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    /// What the records describe (an account, a file, a command line)
    pub subject: String,
    pub records: Vec<Record>,
}

impl Status {
    pub fn new(subject: impl Into<String>, records: Vec<Record>) -> Self {
        Self {
            subject: subject.into(),
            records,
        }
    }
}

/// Unfiltered fetch output, one `Status` per subject
pub type RawData = Vec<Status>;

/// Errors a fetch can end with. They never leave the widget that produced them.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("timed out after {}s", .0.as_secs_f32())]
    Timeout(Duration),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server responded with status {0}")]
    Status(u16),

    #[error("malformed response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("`{cmd}` exited with status {code}: {stderr}")]
    Command {
        cmd: String,
        code: i32,
        stderr: String,
    },

    #[error("fetch task failed: {0}")]
    Task(String),
}

/// Contract every widget kind implements
///
/// `fetch` is the only suspending operation. `filter` and `render` are pure and
/// synchronous; `filter` cannot fail.
#[async_trait]
pub trait Widget: Send + Sync {
    /// Stable key used for focus bookkeeping and logs
    fn identify(&self) -> &str;

    /// Kind name this widget was registered under
    fn kind(&self) -> &'static str;

    /// Pull fresh data from the source, giving up after `timeout`
    ///
    /// "Nothing to show" is `Ok` with empty records, never an error.
    async fn fetch(&self, timeout: Duration) -> Result<RawData, FetchError>;

    /// Narrow fetched data down to what should be displayed
    fn filter(&self, raw: RawData) -> Vec<Status>;

    /// Produce the widget body. Externally sourced text must go through
    /// `formatting::sanitize`.
    fn render(&self, statuses: &[Status], focused: bool, rows: &RowColors) -> Text<'static>;
}

/// Parse a record or settings date
///
/// Accepts `YYYY-MM-DD` and RFC 3339 timestamps.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive()))
}

/// Parse a configured `since` boundary
///
/// An unparsable boundary disables date filtering rather than hiding records.
pub fn parse_since(widget: &str, since: Option<&str>) -> Option<NaiveDate> {
    let raw = since.filter(|s| !s.trim().is_empty())?;
    let date = parse_date(raw);
    if date.is_none() {
        warn!("FILTER: widget '{}' has unparsable since '{}', showing everything", widget, raw);
    }
    date
}

/// Keep records dated strictly after `since`
///
/// Records with a missing or unparsable date are kept: hiding data is worse than
/// showing an item that may be stale.
pub fn filter_since(records: Vec<Record>, since: Option<NaiveDate>) -> Vec<Record> {
    let Some(since) = since else {
        return records;
    };

    records
        .into_iter()
        .filter(|record| match record.date.as_deref().and_then(parse_date) {
            Some(date) => date > since,
            None => true,
        })
        .collect()
}

/// Apply `filter_since` to every status, preserving subjects and order
pub fn filter_statuses(raw: RawData, since: Option<NaiveDate>) -> Vec<Status> {
    raw.into_iter()
        .map(|status| Status {
            subject: status.subject,
            records: filter_since(status.records, since),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_parse_date_formats() {
        assert_eq!(parse_date("2024-01-01"), Some(date("2024-01-01")));
        assert_eq!(parse_date(" 2024-01-01 "), Some(date("2024-01-01")));
        assert_eq!(parse_date("2024-01-01T10:00:00Z"), Some(date("2024-01-01")));
        assert_eq!(parse_date("01/01/2024"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn test_filter_keeps_newer_records_only() {
        let records = vec![
            Record::new("old").with_date("2022-01-01"),
            Record::new("new").with_date("2024-01-01"),
        ];

        let kept = filter_since(records, Some(date("2023-01-01")));

        assert_eq!(kept, vec![Record::new("new").with_date("2024-01-01")]);
    }

    #[test]
    fn test_filter_boundary_is_exclusive() {
        let records = vec![Record::new("same day").with_date("2023-01-01")];
        assert!(filter_since(records, Some(date("2023-01-01"))).is_empty());
    }

    #[test]
    fn test_filter_keeps_unparsable_dates() {
        let records = vec![
            Record::new("garbled").with_date("last tuesday"),
            Record::new("undated"),
        ];

        let kept = filter_since(records.clone(), Some(date("2023-01-01")));

        assert_eq!(kept, records);
    }

    #[test]
    fn test_filter_empty_input_is_empty() {
        assert!(filter_since(Vec::new(), Some(date("2023-01-01"))).is_empty());
    }

    #[test]
    fn test_filter_without_since_is_identity() {
        let records = vec![Record::new("a").with_date("1999-01-01"), Record::new("b")];
        assert_eq!(filter_since(records.clone(), None), records);
    }

    #[test]
    fn test_parse_since_rejects_garbage() {
        assert_eq!(parse_since("w", Some("2023-01-01")), Some(date("2023-01-01")));
        assert_eq!(parse_since("w", Some("soon")), None);
        assert_eq!(parse_since("w", Some("  ")), None);
        assert_eq!(parse_since("w", None), None);
    }

    #[test]
    fn test_filter_statuses_keeps_subjects() {
        let raw = vec![
            Status::new("a", vec![Record::new("x").with_date("2020-05-05")]),
            Status::new("b", vec![]),
        ];

        let filtered = filter_statuses(raw, Some(date("2021-01-01")));

        assert_eq!(filtered, vec![Status::new("a", vec![]), Status::new("b", vec![])]);
    }
}
