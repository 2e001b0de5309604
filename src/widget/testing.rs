//! Test doubles for the widget contract
//!
//! `FakeWidget` returns queued results and can be held mid-fetch with a gate, which is
//! how scheduler tests observe in-flight behaviour.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ratatui::text::{Line, Text};
use tokio::sync::Notify;

use super::registry::WidgetKind;
use super::{FetchError, RawData, Status, Widget};
use crate::config::{RowColors, WidgetConfig};
use crate::formatting::sanitize;
use crate::grid::Position;

pub const FAKE_KIND: &str = "fake";

/// Counters shared between a fake widget and the test observing it
#[derive(Debug, Default)]
pub struct FakeProbe {
    pub calls: AtomicUsize,
    pub active: AtomicUsize,
    pub max_active: AtomicUsize,
}

impl FakeProbe {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

pub struct FakeWidget {
    name: String,
    responses: Mutex<VecDeque<Result<RawData, FetchError>>>,
    gate: Option<Arc<Notify>>,
    probe: Arc<FakeProbe>,
}

impl FakeWidget {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            responses: Mutex::new(VecDeque::new()),
            gate: None,
            probe: Arc::new(FakeProbe::default()),
        }
    }

    /// Queue a result for the next fetch. Once the queue is empty fetches return `Ok(vec![])`.
    pub fn respond(self, result: Result<RawData, FetchError>) -> Self {
        self.responses.lock().unwrap().push_back(result);
        self
    }

    /// Block every fetch until the gate is notified
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn probe(&self) -> Arc<FakeProbe> {
        Arc::clone(&self.probe)
    }
}

#[async_trait]
impl Widget for FakeWidget {
    fn identify(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        FAKE_KIND
    }

    async fn fetch(&self, _timeout: Duration) -> Result<RawData, FetchError> {
        self.probe.calls.fetch_add(1, Ordering::SeqCst);
        let active = self.probe.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.probe.max_active.fetch_max(active, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        let result = self.responses.lock().unwrap().pop_front().unwrap_or(Ok(Vec::new()));
        self.probe.active.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn filter(&self, raw: RawData) -> Vec<Status> {
        raw
    }

    fn render(&self, statuses: &[Status], _focused: bool, _rows: &RowColors) -> Text<'static> {
        let lines: Vec<Line<'static>> = statuses
            .iter()
            .flat_map(|status| status.records.iter())
            .map(|record| Line::from(sanitize(&record.title)))
            .collect();
        Text::from(lines)
    }
}

/// Entry for a fake widget filling one cell
pub fn fake_config(name: &str) -> WidgetConfig {
    WidgetConfig {
        name: name.to_string(),
        kind: FAKE_KIND.to_string(),
        enabled: true,
        position: Position { top: 0, left: 0, height: 1, width: 1 },
        refresh_interval: Duration::from_secs(60),
        settings: toml::Table::new(),
    }
}

/// Registry entry that builds plain `FakeWidget`s
pub fn fake_kind() -> WidgetKind {
    WidgetKind::new(FAKE_KIND, &[], |config| {
        Ok(Box::new(FakeWidget::new(config.name.clone())) as Box<dyn Widget>)
    })
}
