use crossterm::event::{MouseButton, MouseEvent, MouseEventKind};
use ratatui::backend::Backend;
use tracing::{debug, info};

use super::action::Action;
use super::error::{TuiError, TuiResult};
use super::focus::{FocusCommand, FocusManager};
use super::renderer::RenderCoordinator;
use super::viewport::RowCursor;
use crate::scheduler::{Scheduler, Trigger};

/// Dashboard state driven by the event loop
///
/// Ties the scheduler, the focus manager and the render coordinator together.
/// Generic over the backend so tests can drive it with `TestBackend`.
pub struct App<B: Backend> {
    scheduler: Scheduler,
    focus: FocusManager,
    renderer: RenderCoordinator<B>,
    hover: Option<usize>,
    /// Selected row per widget, by index
    cursors: Vec<RowCursor>,
}

impl<B: Backend> App<B> {
    pub fn new(scheduler: Scheduler, renderer: RenderCoordinator<B>) -> Self {
        let rects = scheduler.instances().iter().map(|i| i.rect()).collect();
        let cursors = vec![RowCursor::default(); scheduler.instances().len()];
        Self {
            scheduler,
            focus: FocusManager::new(rects),
            renderer,
            hover: None,
            cursors,
        }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn focus(&self) -> &FocusManager {
        &self.focus
    }

    pub fn renderer(&self) -> &RenderCoordinator<B> {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut RenderCoordinator<B> {
        &mut self.renderer
    }

    pub fn hover(&self) -> Option<usize> {
        self.hover
    }

    pub fn cursor(&self, index: usize) -> Option<RowCursor> {
        self.cursors.get(index).copied()
    }

    /// Apply an action. Returns true when the screen needs repainting.
    pub fn handle(&mut self, action: Action) -> TuiResult<bool> {
        match action {
            Action::Quit => Ok(false),
            Action::Focus(command) => Ok(self.focus.apply(command)),
            Action::Rows(command) => {
                let Some(index) = self.focus.state().focused() else {
                    return Ok(false);
                };
                let (Some(instance), Some(cursor)) =
                    (self.scheduler.instances().get(index), self.cursors.get_mut(index))
                else {
                    return Err(TuiError::UnknownWidget(index));
                };
                let (rows, height) = self.renderer.body_extent(instance);
                let before = *cursor;
                cursor.apply(command, height);
                cursor.fit(rows, height);
                Ok(*cursor != before)
            }
            Action::RefreshFocused => {
                let Some(index) = self.focus.state().focused() else {
                    debug!("ACTION: refresh requested with nothing focused");
                    return Ok(false);
                };
                match self.scheduler.trigger(index) {
                    Some(Trigger::Started) => info!("ACTION: refreshing widget {}", index),
                    Some(Trigger::Skipped) => debug!("ACTION: widget {} already refreshing", index),
                    None => return Err(TuiError::UnknownWidget(index)),
                }
                Ok(false)
            }
            Action::RefreshAll => {
                info!("ACTION: refreshing all widgets");
                self.scheduler.trigger_all();
                Ok(false)
            }
        }
    }

    /// Track hover on movement, focus on left click. Returns true when the screen changed.
    pub fn handle_mouse(&mut self, event: MouseEvent) -> bool {
        let target = self
            .renderer
            .widget_at(self.scheduler.instances(), event.column, event.row);

        match event.kind {
            MouseEventKind::Moved => {
                if target == self.hover {
                    return false;
                }
                self.hover = target;
                true
            }
            MouseEventKind::Down(MouseButton::Left) => match target {
                Some(index) => self.focus.apply(FocusCommand::Select(index)),
                None => false,
            },
            _ => false,
        }
    }

    pub fn paint(&mut self) -> TuiResult<()> {
        self.renderer.paint(
            self.scheduler.instances(),
            self.focus.state(),
            self.hover,
            &mut self.cursors,
        )
    }

    /// Stop timers and cancel pending fetches
    pub async fn shutdown(self) {
        self.scheduler.shutdown().await;
    }
}
