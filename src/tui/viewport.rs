//! Row selection and scrolling inside one widget body

/// Row movement inside the focused widget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowCommand {
    Up,
    Down,
    PageUp,
    PageDown,
    Top,
    Bottom,
}

/// Selected row and first visible row of one widget body
///
/// The cursor knows nothing about the content it points into; `fit` clamps it
/// against the current line count and view height before every draw.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowCursor {
    selected: u16,
    offset: u16,
}

impl RowCursor {
    pub fn selected(&self) -> u16 {
        self.selected
    }

    /// First visible line
    pub fn offset(&self) -> u16 {
        self.offset
    }

    /// Move the selection. `page` is the height of the visible body.
    pub fn apply(&mut self, command: RowCommand, page: u16) {
        let page = page.max(1);
        self.selected = match command {
            RowCommand::Up => self.selected.saturating_sub(1),
            RowCommand::Down => self.selected.saturating_add(1),
            RowCommand::PageUp => self.selected.saturating_sub(page),
            RowCommand::PageDown => self.selected.saturating_add(page),
            RowCommand::Top => 0,
            RowCommand::Bottom => u16::MAX,
        };
    }

    /// Clamp to `rows` lines and scroll so the selection stays inside a `height`-row view
    pub fn fit(&mut self, rows: u16, height: u16) {
        if rows == 0 {
            *self = Self::default();
            return;
        }

        self.selected = self.selected.min(rows - 1);
        if self.selected < self.offset {
            self.offset = self.selected;
        } else if height > 0 && self.selected >= self.offset.saturating_add(height) {
            self.offset = self.selected + 1 - height;
        }
        self.offset = self.offset.min(rows.saturating_sub(height));
    }
}
