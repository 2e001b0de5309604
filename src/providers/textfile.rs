//! Shows the contents of a local text file, optionally only its last lines

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use ratatui::style::Style;
use ratatui::text::{Line, Text};
use serde::Deserialize;

use crate::config::{expand_home, ConfigError, RowColors, WidgetConfig};
use crate::formatting::sanitize;
use crate::widget::registry::{parse_settings, WidgetKind};
use crate::widget::{FetchError, RawData, Record, Status, Widget};

pub const KIND: &str = "textfile";
pub const KNOWN_KEYS: &[&str] = &["file_path", "filePath", "max_lines"];

#[derive(Debug, Clone, Deserialize)]
pub struct TextFileSettings {
    #[serde(alias = "filePath")]
    pub file_path: String,
    /// Keep only the last N lines
    pub max_lines: Option<usize>,
}

pub struct TextFileWidget {
    name: String,
    path: PathBuf,
    max_lines: Option<usize>,
}

impl TextFileWidget {
    pub fn new(name: impl Into<String>, settings: TextFileSettings) -> Self {
        Self {
            name: name.into(),
            path: expand_home(&settings.file_path),
            max_lines: settings.max_lines,
        }
    }
}

#[async_trait]
impl Widget for TextFileWidget {
    fn identify(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        KIND
    }

    async fn fetch(&self, timeout: Duration) -> Result<RawData, FetchError> {
        let subject = self.path.display().to_string();
        let bytes = tokio::time::timeout(timeout, tokio::fs::read(&self.path))
            .await
            .map_err(|_| FetchError::Timeout(timeout))?
            .map_err(|source| FetchError::Io {
                path: subject.clone(),
                source,
            })?;
        let content = String::from_utf8_lossy(&bytes);

        let lines: Vec<&str> = content.lines().collect();
        let skip = match self.max_lines {
            Some(max) => lines.len().saturating_sub(max),
            None => 0,
        };
        let records = lines[skip..].iter().map(|line| Record::new(*line)).collect();

        Ok(vec![Status::new(subject, records)])
    }

    fn filter(&self, raw: RawData) -> Vec<Status> {
        raw
    }

    fn render(&self, statuses: &[Status], _focused: bool, rows: &RowColors) -> Text<'static> {
        let lines: Vec<Line<'static>> = statuses
            .iter()
            .flat_map(|status| status.records.iter())
            .enumerate()
            .map(|(idx, record)| {
                Line::styled(sanitize(&record.title), Style::default().fg(rows.for_row(idx)))
            })
            .collect();
        Text::from(lines)
    }
}

pub fn kind() -> WidgetKind {
    WidgetKind::new(KIND, KNOWN_KEYS, build)
}

fn build(config: &WidgetConfig) -> Result<Box<dyn Widget>, ConfigError> {
    let settings: TextFileSettings = parse_settings(config)?;
    Ok(Box::new(TextFileWidget::new(config.name.clone(), settings)))
}
