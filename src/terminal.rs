//! Raw-mode keyboard frontend.
//!
//! Reads crossterm events on a blocking thread and forwards them to the
//! session host as [`SessionMsg::Key`] and [`SessionMsg::Resize`]. The
//! reducer owns the draft; this module only translates.

use crate::runtime::HostHandle;
use crate::session::{Key, SessionMsg};
use crossterm::event::{self, Event};
use crossterm::terminal;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// How long one poll waits before re-checking the stop flag.
const EVENT_POLL: Duration = Duration::from_millis(50);

/// Raw mode lifetime guard so terminal state is restored on any return path.
pub struct RawModeGuard;

impl RawModeGuard {
    pub fn acquire() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

/// Session message for one terminal event, if it means anything to us.
pub fn translate_event(event: Event) -> Option<SessionMsg> {
    match event {
        Event::Key(key) => Key::from_event(key).map(SessionMsg::Key),
        Event::Resize(width, height) => Some(SessionMsg::Resize { width, height }),
        _ => None,
    }
}

/// Forward terminal events until `stop` is set or the host goes away.
///
/// Blocking; run it on `spawn_blocking`.
pub fn forward_events(handle: HostHandle, stop: Arc<AtomicBool>) -> io::Result<()> {
    while !stop.load(Ordering::Relaxed) {
        if !event::poll(EVENT_POLL)? {
            continue;
        }
        let Some(msg) = translate_event(event::read()?) else {
            continue;
        };
        if handle.send(msg).is_err() {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

    #[test]
    fn key_presses_become_session_keys() {
        let press = KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE);
        assert!(matches!(
            translate_event(Event::Key(press)),
            Some(SessionMsg::Key(Key::Char('q')))
        ));

        let mut release = KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE);
        release.kind = KeyEventKind::Release;
        assert!(translate_event(Event::Key(release)).is_none());
    }

    #[test]
    fn resize_and_focus_events() {
        assert!(matches!(
            translate_event(Event::Resize(120, 40)),
            Some(SessionMsg::Resize {
                width: 120,
                height: 40
            })
        ));
        assert!(translate_event(Event::FocusGained).is_none());
    }

    #[test]
    fn ctrl_c_is_delivered_as_a_key() {
        // Raw mode swallows SIGINT, so Ctrl-C must reach the reducer.
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert!(matches!(
            translate_event(Event::Key(ctrl_c)),
            Some(SessionMsg::Key(Key::CtrlC))
        ));
    }
}
