//! Keyboard event to action mapping

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tracing::trace;

use super::action::Action;
use super::focus::FocusCommand;
use super::viewport::RowCommand;

/// Map a key press to an action. Unbound keys return `None`.
pub fn key_to_action(key: KeyEvent) -> Option<Action> {
    if key.kind == KeyEventKind::Release {
        return None;
    }

    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c') => Some(Action::Quit),
            _ => None,
        };
    }

    let action = match key.code {
        KeyCode::Char('q') | KeyCode::Char('Q') => Action::Quit,
        KeyCode::Tab => Action::Focus(FocusCommand::Next),
        KeyCode::BackTab => Action::Focus(FocusCommand::Previous),
        KeyCode::Up | KeyCode::Char('k') => Action::Focus(FocusCommand::Up),
        KeyCode::Down | KeyCode::Char('j') => Action::Focus(FocusCommand::Down),
        KeyCode::Left | KeyCode::Char('h') => Action::Focus(FocusCommand::Left),
        KeyCode::Right | KeyCode::Char('l') => Action::Focus(FocusCommand::Right),
        KeyCode::Esc => Action::Focus(FocusCommand::Clear),
        KeyCode::Char('J') => Action::Rows(RowCommand::Down),
        KeyCode::Char('K') => Action::Rows(RowCommand::Up),
        KeyCode::PageDown => Action::Rows(RowCommand::PageDown),
        KeyCode::PageUp => Action::Rows(RowCommand::PageUp),
        KeyCode::Home => Action::Rows(RowCommand::Top),
        KeyCode::End => Action::Rows(RowCommand::Bottom),
        KeyCode::Char('r') => Action::RefreshFocused,
        KeyCode::Char('R') => Action::RefreshAll,
        _ => return None,
    };
    trace!("KEY: {:?} -> {:?}", key.code, action);
    Some(action)
}
