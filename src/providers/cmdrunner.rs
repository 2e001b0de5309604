//! Runs a command and shows its standard output

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use ratatui::style::Style;
use ratatui::text::{Line, Text};
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use crate::config::{ConfigError, RowColors, WidgetConfig};
use crate::formatting::sanitize;
use crate::widget::registry::{parse_settings, WidgetKind};
use crate::widget::{FetchError, RawData, Record, Status, Widget};

pub const KIND: &str = "cmdrunner";
pub const KNOWN_KEYS: &[&str] = &["cmd", "args"];

#[derive(Debug, Clone, Deserialize)]
pub struct CmdRunnerSettings {
    pub cmd: String,
    #[serde(default)]
    pub args: Vec<String>,
}

pub struct CmdRunnerWidget {
    name: String,
    settings: CmdRunnerSettings,
}

impl CmdRunnerWidget {
    pub fn new(name: impl Into<String>, settings: CmdRunnerSettings) -> Self {
        Self {
            name: name.into(),
            settings,
        }
    }

    /// Command line as shown to the user
    pub fn command_line(&self) -> String {
        std::iter::once(self.settings.cmd.as_str())
            .chain(self.settings.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[async_trait]
impl Widget for CmdRunnerWidget {
    fn identify(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        KIND
    }

    async fn fetch(&self, timeout: Duration) -> Result<RawData, FetchError> {
        let command_line = self.command_line();
        debug!("FETCH: '{}' running `{}`", self.name, command_line);

        // Dropping the child on timeout kills it
        let output = Command::new(&self.settings.cmd)
            .args(&self.settings.args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();
        let output = tokio::time::timeout(timeout, output)
            .await
            .map_err(|_| FetchError::Timeout(timeout))?
            .map_err(|source| FetchError::Io {
                path: self.settings.cmd.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(FetchError::Command {
                cmd: command_line,
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let records = stdout.lines().map(Record::new).collect();
        Ok(vec![Status::new(command_line, records)])
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
    let settings: CmdRunnerSettings = parse_settings(config)?;
    Ok(Box::new(CmdRunnerWidget::new(config.name.clone(), settings)))
}
