//! Key bindings: normal and vim-style.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Action from a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CursorLeft,
    CursorRight,
    CursorUp,
    CursorDown,
    LayerPrev,
    LayerNext,
    Tap,
    RotateX,
    RotateY,
    RotateZ,
    Pause,
    Restart,
    Quit,
    None,
}

/// Map key event to game action. Supports both normal (arrows, space) and vim (hjkl, etc.).
pub fn key_to_action(key: KeyEvent) -> Action {
    let KeyEvent { code, modifiers, .. } = key;
    let no_mod = modifiers.is_empty() || modifiers == KeyModifiers::SHIFT;
    if !no_mod && modifiers != KeyModifiers::CONTROL {
        return Action::None;
    }
    match code {
        KeyCode::Char('c') if modifiers == KeyModifiers::CONTROL => Action::Quit,
        KeyCode::Char('q') | KeyCode::Esc if no_mod => Action::Quit,
        KeyCode::Char('p') if no_mod => Action::Pause,
        KeyCode::Char('n') if no_mod => Action::Restart,
        KeyCode::Left | KeyCode::Char('h') if no_mod => Action::CursorLeft,
        KeyCode::Right | KeyCode::Char('l') if no_mod => Action::CursorRight,
        KeyCode::Up | KeyCode::Char('k') if no_mod => Action::CursorUp,
        KeyCode::Down | KeyCode::Char('j') if no_mod => Action::CursorDown,
        KeyCode::Char('[') | KeyCode::Char('u') if no_mod => Action::LayerPrev,
        KeyCode::Char(']') | KeyCode::Char('i') if no_mod => Action::LayerNext,
        KeyCode::Enter | KeyCode::Char(' ') if no_mod => Action::Tap,
        KeyCode::Char('r') | KeyCode::Char('y') if no_mod => Action::RotateY,
        KeyCode::Char('x') if no_mod => Action::RotateX,
        KeyCode::Char('z') if no_mod => Action::RotateZ,
        _ => Action::None,
    }
}
