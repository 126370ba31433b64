//! Terminal-independent key model.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// Keys the session reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Enter,
    /// Alt/Shift+Enter: literal newline in the draft.
    Newline,
    Backspace,
    Left,
    Right,
    Up,
    Down,
    Esc,
    Tab,
    BackTab,
    CtrlC,
    CtrlD,
}

impl Key {
    /// Map a crossterm key event. Releases and unmapped keys yield `None`.
    pub fn from_event(key: KeyEvent) -> Option<Self> {
        if key.kind == KeyEventKind::Release {
            return None;
        }
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        let mapped = match key.code {
            KeyCode::Char('c') if ctrl => Self::CtrlC,
            KeyCode::Char('d') if ctrl => Self::CtrlD,
            KeyCode::Char('j') if ctrl => Self::Newline,
            KeyCode::Char(_) if ctrl || key.modifiers.contains(KeyModifiers::ALT) => return None,
            KeyCode::Char(ch) => Self::Char(ch),
            KeyCode::Enter
                if key
                    .modifiers
                    .intersects(KeyModifiers::ALT | KeyModifiers::SHIFT) =>
            {
                Self::Newline
            }
            KeyCode::Enter => Self::Enter,
            KeyCode::Backspace => Self::Backspace,
            KeyCode::Left => Self::Left,
            KeyCode::Right => Self::Right,
            KeyCode::Up => Self::Up,
            KeyCode::Down => Self::Down,
            KeyCode::Esc => Self::Esc,
            KeyCode::Tab => Self::Tab,
            KeyCode::BackTab => Self::BackTab,
            _ => return None,
        };
        Some(mapped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn maps_control_chords() {
        assert_eq!(
            Key::from_event(event(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(Key::CtrlC)
        );
        assert_eq!(
            Key::from_event(event(KeyCode::Char('x'), KeyModifiers::CONTROL)),
            None
        );
    }

    #[test]
    fn alt_enter_is_newline() {
        assert_eq!(
            Key::from_event(event(KeyCode::Enter, KeyModifiers::ALT)),
            Some(Key::Newline)
        );
        assert_eq!(
            Key::from_event(event(KeyCode::Enter, KeyModifiers::NONE)),
            Some(Key::Enter)
        );
    }

    #[test]
    fn plain_chars_pass_through() {
        assert_eq!(
            Key::from_event(event(KeyCode::Char('y'), KeyModifiers::SHIFT)),
            Some(Key::Char('y'))
        );
        assert_eq!(Key::from_event(event(KeyCode::F(1), KeyModifiers::NONE)), None);
    }
}
