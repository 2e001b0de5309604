//! Breach-notification lookup against the Have I Been Pwned API
//!
//! One GET per configured account. When no `since` boundary is configured the request
//! asks for truncated (name-only) results; with a boundary the full records are needed
//! because the breach dates drive filtering.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use futures::future::join_all;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, trace};

use crate::config::{ConfigError, RowColors, WidgetConfig};
use crate::formatting::{plural, sanitize};
use crate::widget::registry::{parse_settings, WidgetKind};
use crate::widget::{filter_statuses, parse_since, FetchError, RawData, Record, Status, Widget};

pub const KIND: &str = "hibp";
pub const KNOWN_KEYS: &[&str] = &["accounts", "since", "base_url"];

const API_URL: &str = "https://haveibeenpwned.com/api/breachedaccount/";
const API_VERSION: &str = "application/vnd.haveibeenpwned.v2+json";
const CLIENT_TIMEOUT: Duration = Duration::from_secs(2);
const USER_AGENT: &str = "griddash";

/// RFC 3986 unreserved characters stay as-is
const SUBJECT_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HibpSettings {
    #[serde(default)]
    pub accounts: Vec<String>,
    /// `YYYY-MM-DD`; only breaches after this date are shown
    pub since: Option<String>,
    /// Endpoint override, mostly for tests
    pub base_url: Option<String>,
}

impl HibpSettings {
    pub fn has_since(&self) -> bool {
        self.since.as_deref().is_some_and(|s| !s.trim().is_empty())
    }
}

/// One breach as returned by the API. Truncated responses only carry `Name`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Breach {
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub breach_date: Option<String>,
}

impl From<Breach> for Record {
    fn from(breach: Breach) -> Self {
        Record {
            title: breach.title.unwrap_or(breach.name),
            date: breach.breach_date,
            detail: breach.domain.filter(|d| !d.is_empty()),
        }
    }
}

/// Parse a response body. An empty body means the account has no breaches.
pub fn parse_response_body(body: &str) -> Result<Vec<Breach>, FetchError> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(body)?)
}

/// HTTP client for the breach endpoint
pub struct HibpClient {
    http: reqwest::Client,
    base_url: String,
}

impl HibpClient {
    pub fn new(base_url: Option<String>) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(CLIENT_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.unwrap_or_else(|| API_URL.to_string()),
        })
    }

    pub fn full_url(&self, account: &str, truncated: bool) -> String {
        format!(
            "{}{}?truncateResponse={}",
            self.base_url,
            utf8_percent_encode(account, SUBJECT_ENCODE_SET),
            truncated
        )
    }

    /// Look up one account
    ///
    /// 404 is how the API reports "no breaches", so it maps to an empty result.
    pub async fn fetch_account(
        &self,
        account: &str,
        truncated: bool,
        timeout: Duration,
    ) -> Result<Vec<Breach>, FetchError> {
        let url = self.full_url(account, truncated);
        let timeout = timeout.min(CLIENT_TIMEOUT);
        trace!("FETCH: GET {}", url);

        let response = self
            .http
            .get(&url)
            .header(ACCEPT, API_VERSION)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify(e, timeout))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.text().await.map_err(|e| classify(e, timeout))?;
        parse_response_body(&body)
    }
}

fn classify(error: reqwest::Error, timeout: Duration) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout(timeout)
    } else {
        FetchError::Http(error)
    }
}

pub struct HibpWidget {
    name: String,
    settings: HibpSettings,
    since: Option<NaiveDate>,
    client: HibpClient,
}

impl HibpWidget {
    pub fn new(name: impl Into<String>, settings: HibpSettings) -> Result<Self, reqwest::Error> {
        let name = name.into();
        let since = parse_since(&name, settings.since.as_deref());
        let client = HibpClient::new(settings.base_url.clone())?;
        Ok(Self {
            name,
            settings,
            since,
            client,
        })
    }

    fn accounts(&self) -> impl Iterator<Item = &str> {
        self.settings
            .accounts
            .iter()
            .map(|a| a.trim())
            .filter(|a| !a.is_empty())
    }
}

#[async_trait]
impl Widget for HibpWidget {
    fn identify(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        KIND
    }

    async fn fetch(&self, timeout: Duration) -> Result<RawData, FetchError> {
        let truncated = !self.settings.has_since();
        debug!(
            "FETCH: '{}' looking up {} account(s), truncated={}",
            self.name,
            self.accounts().count(),
            truncated
        );

        let lookups = self.accounts().map(|account| async move {
            let breaches = self.client.fetch_account(account, truncated, timeout).await?;
            let records = breaches.into_iter().map(Record::from).collect();
            Ok::<_, FetchError>(Status::new(account, records))
        });

        // Any failing account fails the cycle so the last good snapshot stays on screen
        join_all(lookups).await.into_iter().collect()
    }

    fn filter(&self, raw: RawData) -> Vec<Status> {
        filter_statuses(raw, self.since)
    }

    fn render(&self, statuses: &[Status], focused: bool, rows: &RowColors) -> Text<'static> {
        if statuses.is_empty() {
            return Text::from(Line::styled(
                "No accounts configured",
                Style::default().fg(Color::DarkGray),
            ));
        }

        let mut lines = Vec::new();
        for status in statuses {
            let subject = sanitize(&status.subject);
            let header_style = Style::default().add_modifier(Modifier::BOLD);

            if status.records.is_empty() {
                lines.push(Line::from(vec![
                    Span::styled("✓ ", header_style.fg(Color::Green)),
                    Span::styled(subject, header_style),
                    Span::raw(" no breaches"),
                ]));
                continue;
            }

            lines.push(Line::from(vec![
                Span::styled("✗ ", header_style.fg(Color::Red)),
                Span::styled(subject, header_style),
                Span::styled(
                    format!(" {}", plural(status.records.len(), "breach", "breaches")),
                    Style::default().fg(Color::Red),
                ),
            ]));

            for (idx, record) in status.records.iter().enumerate() {
                let mut spans = vec![Span::styled(
                    format!("  {}", sanitize(&record.title)),
                    Style::default().fg(rows.for_row(idx)),
                )];
                if focused {
                    if let Some(date) = &record.date {
                        spans.push(Span::styled(
                            format!(" {}", sanitize(date)),
                            Style::default().fg(Color::DarkGray),
                        ));
                    }
                }
                lines.push(Line::from(spans));
            }
        }

        Text::from(lines)
    }
}

/// Registry entry
pub fn kind() -> WidgetKind {
    WidgetKind::new(KIND, KNOWN_KEYS, build)
}

fn build(config: &WidgetConfig) -> Result<Box<dyn Widget>, ConfigError> {
    let settings: HibpSettings = parse_settings(config)?;
    let widget = HibpWidget::new(config.name.clone(), settings).map_err(|e| {
        ConfigError::InvalidSettings {
            widget: config.name.clone(),
            source: serde::de::Error::custom(format!("cannot build HTTP client: {}", e)),
        }
    })?;
    Ok(Box::new(widget))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tui::testing::text_to_string;
    use wiremock::matchers::{header, method, path_regex, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TIMEOUT: Duration = Duration::from_secs(2);

    fn widget(server: &MockServer, accounts: &[&str], since: Option<&str>) -> HibpWidget {
        HibpWidget::new(
            "security",
            HibpSettings {
                accounts: accounts.iter().map(|a| a.to_string()).collect(),
                since: since.map(str::to_string),
                base_url: Some(format!("{}/api/breachedaccount/", server.uri())),
            },
        )
        .unwrap()
    }

    #[test]
    fn test_full_url_encodes_subject() {
        let client = HibpClient::new(None).unwrap();

        assert_eq!(
            client.full_url("me+tag@example.com", true),
            "https://haveibeenpwned.com/api/breachedaccount/me%2Btag%40example.com?truncateResponse=true"
        );
        assert!(client.full_url("x", false).ends_with("x?truncateResponse=false"));
    }

    #[test]
    fn test_parse_empty_body_is_no_breaches() {
        assert!(parse_response_body("").unwrap().is_empty());
        assert!(parse_response_body("  \n").unwrap().is_empty());
    }

    #[test]
    fn test_parse_truncated_body() {
        let breaches = parse_response_body(r#"[{"Name":"Adobe"},{"Name":"LinkedIn"}]"#).unwrap();

        assert_eq!(breaches.len(), 2);
        assert_eq!(breaches[0].name, "Adobe");
        assert!(breaches[0].breach_date.is_none());
    }

    #[test]
    fn test_parse_malformed_body() {
        assert!(matches!(parse_response_body("{not json"), Err(FetchError::Parse(_))));
    }

    #[test]
    fn test_breach_to_record_prefers_title() {
        let breach = Breach {
            name: "Adobe".into(),
            title: Some("Adobe Systems".into()),
            domain: Some("adobe.com".into()),
            breach_date: Some("2013-10-04".into()),
        };

        let record = Record::from(breach);

        assert_eq!(record, Record::new("Adobe Systems").with_date("2013-10-04").with_detail("adobe.com"));
    }

    #[tokio::test]
    async fn test_fetch_without_since_requests_truncated() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/api/breachedaccount/.+$"))
            .and(query_param("truncateResponse", "true"))
            .and(header("Accept", API_VERSION))
            .and(header("User-Agent", USER_AGENT))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"[{"Name":"Adobe"}]"#))
            .expect(1)
            .mount(&server)
            .await;

        let raw = widget(&server, &["me@example.com"], None).fetch(TIMEOUT).await.unwrap();

        assert_eq!(raw, vec![Status::new("me@example.com", vec![Record::new("Adobe")])]);
    }

    #[tokio::test]
    async fn test_fetch_with_since_requests_full_records() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("truncateResponse", "false"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .expect(1)
            .mount(&server)
            .await;

        let raw = widget(&server, &["me@example.com"], Some("2023-01-01"))
            .fetch(TIMEOUT)
            .await
            .unwrap();

        assert!(raw[0].records.is_empty());
    }

    #[tokio::test]
    async fn test_not_found_means_no_breaches() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let raw = widget(&server, &["clean@example.com"], None).fetch(TIMEOUT).await.unwrap();

        assert_eq!(raw, vec![Status::new("clean@example.com", vec![])]);
    }

    #[tokio::test]
    async fn test_server_error_fails_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = widget(&server, &["me@example.com"], None).fetch(TIMEOUT).await.unwrap_err();

        assert!(matches!(err, FetchError::Status(503)));
    }

    #[tokio::test]
    async fn test_slow_server_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let err = widget(&server, &["me@example.com"], None)
            .fetch(Duration::from_millis(50))
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_no_accounts_fetches_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let raw = widget(&server, &["", "  "], None).fetch(TIMEOUT).await.unwrap();

        assert!(raw.is_empty());
    }

    #[test]
    fn test_filter_uses_since_and_keeps_undated() {
        let w = HibpWidget::new(
            "security",
            HibpSettings {
                accounts: vec![],
                since: Some("2023-01-01".into()),
                base_url: None,
            },
        )
        .unwrap();
        let raw = vec![Status::new(
            "me",
            vec![
                Record::new("old").with_date("2022-01-01"),
                Record::new("new").with_date("2024-01-01"),
                Record::new("mystery").with_date("n/a"),
            ],
        )];

        let filtered = w.filter(raw);

        let titles: Vec<&str> = filtered[0].records.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["new", "mystery"]);
    }

    #[test]
    fn test_render_marks_breached_and_clean_accounts() {
        let w = HibpWidget::new("security", HibpSettings::default()).unwrap();
        let statuses = vec![
            Status::new("clean@example.com", vec![]),
            Status::new(
                "owned@example.com",
                vec![Record::new("Adobe").with_date("2013-10-04")],
            ),
        ];

        let unfocused = text_to_string(&w.render(&statuses, false, &RowColors::default()));
        let focused = text_to_string(&w.render(&statuses, true, &RowColors::default()));

        assert_eq!(
            unfocused,
            "✓ clean@example.com no breaches\n✗ owned@example.com 1 breach\n  Adobe"
        );
        assert!(focused.ends_with("  Adobe 2013-10-04"));
    }

    #[test]
    fn test_render_escapes_hostile_titles() {
        let w = HibpWidget::new("security", HibpSettings::default()).unwrap();
        let statuses = vec![Status::new("me", vec![Record::new("evil\x1b[31m")])];

        let rendered = text_to_string(&w.render(&statuses, false, &RowColors::default()));

        assert!(!rendered.contains('\x1b'));
    }
}
