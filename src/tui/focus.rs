//! Focus management for dashboard widgets
//!
//! `FocusState` holds the focused widget index. Only `FocusManager` can change it;
//! the painter borrows it read-only.

use tracing::debug;

use crate::grid::CellRect;

/// Navigation request understood by the focus manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusCommand {
    /// Following widget in declaration order, wrapping around
    Next,
    /// Preceding widget in declaration order, wrapping around
    Previous,
    Up,
    Down,
    Left,
    Right,
    Clear,
    Select(usize),
}

/// Currently focused widget, by declaration index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FocusState {
    focused: Option<usize>,
}

impl FocusState {
    pub fn focused(&self) -> Option<usize> {
        self.focused
    }

    pub fn is_focused(&self, index: usize) -> bool {
        self.focused == Some(index)
    }
}

pub struct FocusManager {
    rects: Vec<CellRect>,
    state: FocusState,
}

impl FocusManager {
    /// Start with the first widget focused, or nothing when there are no widgets
    pub fn new(rects: Vec<CellRect>) -> Self {
        let focused = if rects.is_empty() { None } else { Some(0) };
        Self {
            rects,
            state: FocusState { focused },
        }
    }

    pub fn state(&self) -> &FocusState {
        &self.state
    }

    pub fn len(&self) -> usize {
        self.rects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    /// Apply a navigation command. Returns true when the focused widget changed.
    pub fn apply(&mut self, command: FocusCommand) -> bool {
        if self.rects.is_empty() {
            return false;
        }

        let count = self.rects.len();
        let next = match (command, self.state.focused) {
            (FocusCommand::Clear, _) => None,
            (FocusCommand::Select(index), current) => {
                if index < count {
                    Some(index)
                } else {
                    current
                }
            }
            (FocusCommand::Next, None) => Some(0),
            (FocusCommand::Next, Some(current)) => Some((current + 1) % count),
            (FocusCommand::Previous, None) => Some(count - 1),
            (FocusCommand::Previous, Some(current)) => Some((current + count - 1) % count),
            // Directional moves with nothing focused land on the first widget
            (_, None) => Some(0),
            (direction, Some(current)) => self.nearest(current, direction).or(Some(current)),
        };

        if next == self.state.focused {
            return false;
        }
        debug!("FOCUS: {:?} -> {:?} ({:?})", self.state.focused, next, command);
        self.state.focused = next;
        true
    }

    /// Closest widget whose center lies strictly in `direction` from `from`
    fn nearest(&self, from: usize, direction: FocusCommand) -> Option<usize> {
        let (fx, fy) = self.rects[from].center2();

        let mut best: Option<(i64, usize)> = None;
        for (index, rect) in self.rects.iter().enumerate() {
            if index == from {
                continue;
            }
            let (x, y) = rect.center2();
            let (dx, dy) = ((x - fx) as i64, (y - fy) as i64);
            let in_direction = match direction {
                FocusCommand::Up => dy < 0,
                FocusCommand::Down => dy > 0,
                FocusCommand::Left => dx < 0,
                FocusCommand::Right => dx > 0,
                _ => false,
            };
            if !in_direction {
                continue;
            }

            let distance = dx * dx + dy * dy;
            // Strict comparison keeps the earliest declared widget on ties
            if best.map_or(true, |(d, _)| distance < d) {
                best = Some((distance, index));
            }
        }
        best.map(|(_, index)| index)
    }
}
