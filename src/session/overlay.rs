//! Modal overlays: approval prompt, queue manager, task manager.
//!
//! While an overlay is open it receives every key. Each handler takes the
//! overlay out of the state, and either puts it back (still open) or
//! dismisses it, after which the next waiting permission request opens.

use super::keys::Key;
use super::msg::Action;
use super::state::{QueueEdit, SessionState};
use crate::permission::{PermissionReply, PermissionRequest};
use crate::tasks::TaskStatus;

/// Open modal sub-state.
#[derive(Debug)]
pub enum Overlay {
    Approval(PermissionRequest),
    QueueManager { selected: usize },
    TaskManager { selected: usize },
}

impl Overlay {
    pub fn kind(&self) -> OverlayKind {
        match self {
            Self::Approval(_) => OverlayKind::Approval,
            Self::QueueManager { .. } => OverlayKind::QueueManager,
            Self::TaskManager { .. } => OverlayKind::TaskManager,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayKind {
    Approval,
    QueueManager,
    TaskManager,
}

/// Route one key to the open overlay.
pub(super) fn handle_key(state: &mut SessionState, key: Key) -> Option<Action> {
    let overlay = state.overlay.take()?;
    match overlay {
        Overlay::Approval(request) => approval_key(state, request, key),
        Overlay::QueueManager { selected } => queue_key(state, selected, key),
        Overlay::TaskManager { selected } => task_key(state, selected, key),
    }
}

/// Close the current overlay and surface the next queued approval.
pub(super) fn dismiss(state: &mut SessionState, kind: OverlayKind) -> Action {
    state.overlay = None;
    open_next_permission(state);
    Action::OverlayDismissed { kind }
}

pub(super) fn open_next_permission(state: &mut SessionState) {
    if state.overlay.is_some() {
        return;
    }
    if let Some(request) = state.pending_permissions.pop_front() {
        state.overlay = Some(Overlay::Approval(request));
    }
}

fn approval_key(
    state: &mut SessionState,
    request: PermissionRequest,
    key: Key,
) -> Option<Action> {
    let reply = match key {
        Key::Char('y' | 'Y') | Key::Enter => PermissionReply::ALLOW_ONCE,
        Key::Char('a' | 'A') => PermissionReply::ALLOW_ALWAYS,
        Key::Char('n' | 'N') | Key::Esc | Key::CtrlC => PermissionReply::DENIED,
        _ => {
            state.overlay = Some(Overlay::Approval(request));
            return None;
        }
    };

    let tool = request.tool().to_string();
    if request.respond(reply) {
        let verdict = match (reply.allowed, reply.always) {
            (true, true) => "Always allowed",
            (true, false) => "Allowed",
            (false, _) => "Denied",
        };
        state.push_notice(format!("{verdict} `{tool}`."));
    } else {
        state.push_notice(format!("Approval for `{tool}` was no longer pending."));
    }
    Some(dismiss(state, OverlayKind::Approval))
}

fn queue_key(state: &mut SessionState, selected: usize, key: Key) -> Option<Action> {
    let len = state.queue.len();
    let selected = selected.min(len.saturating_sub(1));
    match key {
        Key::Up => {
            state.overlay = Some(Overlay::QueueManager {
                selected: selected.saturating_sub(1),
            });
            None
        }
        Key::Down => {
            state.overlay = Some(Overlay::QueueManager {
                selected: (selected + 1).min(len.saturating_sub(1)),
            });
            None
        }
        Key::Enter | Key::Char('e') => {
            if let Some(text) = state.queue.get(selected).map(str::to_string) {
                state.editor.set(text.clone());
                state.queue_edit = Some(QueueEdit {
                    index: selected,
                    original: text,
                });
            }
            Some(dismiss(state, OverlayKind::QueueManager))
        }
        Key::Char('d') | Key::Backspace => {
            if let Some(removed) = state.queue.remove(selected) {
                tracing::debug!(index = selected, prompt = %removed, "queued prompt removed");
            }
            if state.queue.is_empty() {
                return Some(dismiss(state, OverlayKind::QueueManager));
            }
            state.overlay = Some(Overlay::QueueManager { selected });
            None
        }
        Key::Esc | Key::Char('q') | Key::CtrlC => Some(dismiss(state, OverlayKind::QueueManager)),
        _ => {
            state.overlay = Some(Overlay::QueueManager { selected });
            None
        }
    }
}

fn task_key(state: &mut SessionState, selected: usize, key: Key) -> Option<Action> {
    let tasks = state.registry.list();
    let selected = selected.min(tasks.len().saturating_sub(1));
    let current = tasks.get(selected);
    match key {
        Key::Up => {
            state.overlay = Some(Overlay::TaskManager {
                selected: selected.saturating_sub(1),
            });
            None
        }
        Key::Down => {
            state.overlay = Some(Overlay::TaskManager {
                selected: (selected + 1).min(tasks.len().saturating_sub(1)),
            });
            None
        }
        Key::Enter => {
            if let Some(task) = current {
                let detail = match task.status {
                    TaskStatus::Running => format!("{} is still running: {}", task.id, task.prompt),
                    TaskStatus::Done => format!(
                        "{} finished: {}",
                        task.id,
                        task.final_text().unwrap_or("(no output)")
                    ),
                    TaskStatus::Failed => format!(
                        "{} failed: {}",
                        task.id,
                        task.err.as_deref().unwrap_or("unknown error")
                    ),
                };
                state.push_notice(detail);
            }
            state.overlay = Some(Overlay::TaskManager { selected });
            None
        }
        Key::Char('c') => {
            if let Some(task) = current {
                match state.registry.cancel(&task.id) {
                    Ok(()) => state.push_notice(format!("Cancelling {}.", task.id)),
                    Err(err) => state.push_error(err.to_string()),
                }
            }
            state.overlay = Some(Overlay::TaskManager { selected });
            None
        }
        Key::Char('x' | 'd') | Key::Backspace => {
            if let Some(task) = current {
                match state.registry.remove(&task.id) {
                    Ok(removed) => state.push_notice(format!("Removed {}.", removed.id)),
                    Err(err) => state.push_error(err.to_string()),
                }
            }
            if state.registry.count() == 0 {
                return Some(dismiss(state, OverlayKind::TaskManager));
            }
            state.overlay = Some(Overlay::TaskManager { selected });
            None
        }
        Key::Esc | Key::Char('q') | Key::CtrlC => Some(dismiss(state, OverlayKind::TaskManager)),
        _ => {
            state.overlay = Some(Overlay::TaskManager { selected });
            None
        }
    }
}

/// Lines describing the open overlay, for renderers.
pub fn describe(state: &SessionState) -> Vec<String> {
    match state.overlay() {
        None => Vec::new(),
        Some(Overlay::Approval(request)) => vec![request.prompt_text()],
        Some(Overlay::QueueManager { selected }) => {
            let mut lines = vec!["Queued prompts ([e]dit, [d]elete, [q]uit):".to_string()];
            lines.extend(state.queue().iter().enumerate().map(|(i, prompt)| {
                let marker = if i == *selected { '>' } else { ' ' };
                format!("{marker} {}. {prompt}", i + 1)
            }));
            lines
        }
        Some(Overlay::TaskManager { selected }) => {
            let mut lines =
                vec!["Background tasks ([enter] details, [c]ancel, [x] remove, [q]uit):".to_string()];
            lines.extend(state.registry().list().iter().enumerate().map(|(i, task)| {
                let marker = if i == *selected { '>' } else { ' ' };
                format!("{marker} {} [{}] {}", task.id, task.status.label(), task.prompt)
            }));
            lines
        }
    }
}
