use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Local};
use tracing::debug;

use super::{FetchError, Status, Widget};
use crate::config::WidgetConfig;
use crate::grid::CellRect;

/// What a widget currently has to show
///
/// Cloning is cheap: statuses and errors are shared.
#[derive(Debug, Clone, Default)]
pub struct InstanceState {
    /// Last successful fetch, `None` until the first one completes
    pub statuses: Option<Arc<Vec<Status>>>,
    /// Error from the most recent cycle, cleared by the next success
    pub last_error: Option<Arc<FetchError>>,
    pub last_refresh: Option<DateTime<Local>>,
    /// Bumped on every update; painters compare it to skip unchanged widgets
    pub seq: u64,
}

/// Runtime object bound to one enabled widget entry
///
/// Only this widget's scheduled cycle writes the state; the render path reads it.
pub struct WidgetInstance {
    index: usize,
    config: WidgetConfig,
    rect: CellRect,
    widget: Box<dyn Widget>,
    in_flight: AtomicBool,
    state: RwLock<InstanceState>,
}

impl WidgetInstance {
    pub fn new(index: usize, config: WidgetConfig, rect: CellRect, widget: Box<dyn Widget>) -> Self {
        Self {
            index,
            config,
            rect,
            widget,
            in_flight: AtomicBool::new(false),
            state: RwLock::new(InstanceState::default()),
        }
    }

    /// Position in declaration order
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        self.widget.identify()
    }

    pub fn config(&self) -> &WidgetConfig {
        &self.config
    }

    pub fn rect(&self) -> CellRect {
        self.rect
    }

    pub fn widget(&self) -> &dyn Widget {
        self.widget.as_ref()
    }

    /// Claim the in-flight slot. Returns false when a fetch is already running.
    pub fn try_begin_fetch(&self) -> bool {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn end_fetch(&self) {
        self.in_flight.store(false, Ordering::Release);
    }

    pub fn is_fetching(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Swap in a freshly filtered snapshot and clear any previous error
    pub fn record_success(&self, statuses: Vec<Status>) {
        let mut state = self.write_state();
        state.statuses = Some(Arc::new(statuses));
        state.last_error = None;
        state.last_refresh = Some(Local::now());
        state.seq += 1;
        debug!("FETCH: '{}' updated (seq {})", self.name(), state.seq);
    }

    /// Attach an error, leaving the last good snapshot in place
    pub fn record_failure(&self, error: FetchError) {
        let mut state = self.write_state();
        state.last_error = Some(Arc::new(error));
        state.seq += 1;
    }

    pub fn snapshot(&self) -> InstanceState {
        self.read_state().clone()
    }

    pub fn seq(&self) -> u64 {
        self.read_state().seq
    }

    fn read_state(&self) -> RwLockReadGuard<'_, InstanceState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, InstanceState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for WidgetInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WidgetInstance")
            .field("index", &self.index)
            .field("name", &self.name())
            .field("rect", &self.rect)
            .field("in_flight", &self.is_fetching())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::widget::testing::{fake_config, FakeWidget};
    use crate::widget::Record;

    fn instance() -> WidgetInstance {
        WidgetInstance::new(
            0,
            fake_config("fake"),
            CellRect { top: 0, left: 0, height: 1, width: 1 },
            Box::new(FakeWidget::new("fake")),
        )
    }

    #[test]
    fn test_in_flight_slot_is_exclusive() {
        let inst = instance();

        assert!(inst.try_begin_fetch());
        assert!(!inst.try_begin_fetch());
        assert!(inst.is_fetching());

        inst.end_fetch();
        assert!(!inst.is_fetching());
        assert!(inst.try_begin_fetch());
    }

    #[test]
    fn test_failure_keeps_previous_statuses() {
        let inst = instance();
        let good = vec![Status::new("acct", vec![Record::new("breach")])];

        inst.record_success(good.clone());
        inst.record_failure(FetchError::Status(503));

        let state = inst.snapshot();
        assert_eq!(state.statuses.as_deref(), Some(&good));
        assert!(matches!(state.last_error.as_deref(), Some(FetchError::Status(503))));
        assert_eq!(state.seq, 2);
    }

    #[test]
    fn test_success_clears_error() {
        let inst = instance();

        inst.record_failure(FetchError::Status(500));
        inst.record_success(vec![]);

        let state = inst.snapshot();
        assert!(state.last_error.is_none());
        assert!(state.last_refresh.is_some());
        assert_eq!(state.statuses.as_deref(), Some(&Vec::new()));
    }

    #[test]
    fn test_initial_state_is_empty() {
        let inst = instance();
        let state = inst.snapshot();

        assert!(state.statuses.is_none());
        assert!(state.last_error.is_none());
        assert_eq!(inst.seq(), 0);
        assert_eq!(inst.name(), "fake");
    }
}
