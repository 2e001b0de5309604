use super::focus::FocusCommand;
use super::viewport::RowCommand;

/// Everything the event loop can be asked to do
///
/// Actions come from key presses and mouse events and are handled by `App::handle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    Focus(FocusCommand),
    /// Move the selected row of the focused widget
    Rows(RowCommand),
    /// Refresh the focused widget now
    RefreshFocused,
    RefreshAll,
}
