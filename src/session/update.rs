//! The session reducer.
//!
//! `update` is the only place session state changes. It never performs I/O:
//! starting runs, timers and compaction are returned as an [`Action`] for the
//! host to execute, and their outcomes come back as messages.

use super::commands::{help_text, parse_slash_command, SlashCommand};
use super::compact::compacted_conversation;
use super::keys::Key;
use super::msg::{Action, RunUpdate, SessionMsg};
use super::overlay::{self, Overlay};
use super::retry::{RetryDecision, TickOutcome, RETRY_TICK};
use super::state::{ContentEntry, Mode, SessionState};
use crate::agent::{RunId, RunOrigin, RunRequest};
use crate::error::RunError;
use crate::permission::{PermissionReply, PermissionRequest};
use crate::tasks::TaskStatus;
use crate::types::Message;
use std::time::Instant;

/// Apply one message to the session.
pub fn update(state: &mut SessionState, msg: SessionMsg) -> Option<Action> {
    match msg {
        SessionMsg::Quit => quit(state),
        SessionMsg::Resize { width, height } => {
            state.viewport = (width, height);
            None
        }
        SessionMsg::Key(key) if state.overlay.is_some() => overlay::handle_key(state, key),
        SessionMsg::Submit(text) if state.overlay.is_some() => submit_to_overlay(state, &text),
        SessionMsg::Interrupt if state.overlay.is_some() => overlay::handle_key(state, Key::CtrlC),
        SessionMsg::ToggleMode if state.overlay.is_some() => None,
        SessionMsg::Key(key) => handle_key(state, key),
        SessionMsg::Submit(text) => {
            state.editor.clear();
            submit(state, text)
        }
        SessionMsg::Interrupt => interrupt(state),
        SessionMsg::ToggleMode => set_mode(state, state.mode.toggled()),
        SessionMsg::Run { run_id, update } => on_run_update(state, run_id, update),
        SessionMsg::RunFinished { run_id, result } => on_run_finished(state, run_id, result),
        SessionMsg::RetryTick { now } => on_retry_tick(state, now),
        SessionMsg::CompactionFinished { result } => on_compaction_finished(state, result),
        SessionMsg::PermissionRequested(request) => on_permission_requested(state, request),
        SessionMsg::BackgroundFinished { id } => on_background_finished(state, &id),
        SessionMsg::ReplaceQueued { index, text } => replace_queued(state, index, text),
        SessionMsg::RemoveQueued { index } => {
            state.queue.remove(index);
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

fn handle_key(state: &mut SessionState, key: Key) -> Option<Action> {
    match key {
        Key::Char(ch) => {
            state.editor.insert_char(ch);
            state.history.reset_navigation();
            None
        }
        Key::Newline => {
            state.editor.insert_char('\n');
            state.history.reset_navigation();
            None
        }
        Key::Backspace => {
            if state.editor.backspace() {
                state.history.reset_navigation();
            }
            None
        }
        Key::Left => {
            state.editor.move_left();
            None
        }
        Key::Right => {
            state.editor.move_right();
            None
        }
        Key::Up => {
            history_previous(state);
            None
        }
        Key::Down => {
            history_next(state);
            None
        }
        Key::Enter => {
            let text = state.editor.take();
            submit(state, text)
        }
        Key::Esc => {
            if state.agent_running || state.retry.is_pending() {
                interrupt(state)
            } else {
                None
            }
        }
        Key::CtrlC => {
            if state.agent_running || state.retry.is_pending() {
                interrupt(state)
            } else if !state.editor.is_empty() {
                state.editor.clear();
                state.queue_edit = None;
                state.history.reset_navigation();
                None
            } else {
                quit(state)
            }
        }
        Key::CtrlD => {
            if state.editor.is_empty() {
                quit(state)
            } else {
                None
            }
        }
        Key::BackTab => set_mode(state, state.mode.toggled()),
        Key::Tab => None,
    }
}

fn history_previous(state: &mut SessionState) {
    if state.agent_running || !state.editor.on_first_line() {
        return;
    }
    let recalled = state
        .history
        .previous(state.editor.text())
        .map(str::to_string);
    if let Some(text) = recalled {
        state.editor.set(text);
    }
}

fn history_next(state: &mut SessionState) {
    if state.agent_running || !state.editor.on_first_line() {
        return;
    }
    if let Some(text) = state.history.next() {
        state.editor.set(text);
    }
}

fn submit_to_overlay(state: &mut SessionState, text: &str) -> Option<Action> {
    let text = text.trim();
    if text.is_empty() {
        return overlay::handle_key(state, Key::Enter);
    }
    let mut action = None;
    for ch in text.chars() {
        if state.overlay.is_none() {
            break;
        }
        action = overlay::handle_key(state, Key::Char(ch)).or(action);
    }
    action
}

fn submit(state: &mut SessionState, text: String) -> Option<Action> {
    let text = text.trim_end().to_string();
    if text.trim().is_empty() {
        return None;
    }
    state.history.reset_navigation();

    if let Some(edit) = state.queue_edit.take() {
        let index = if state.queue.get(edit.index) == Some(edit.original.as_str()) {
            Some(edit.index)
        } else {
            state.queue.iter().position(|queued| queued == edit.original)
        };
        if let Some(index) = index {
            return replace_queued(state, index, text);
        }
    }

    if let Some(command) = parse_slash_command(&text) {
        return run_command(state, command);
    }

    if state.is_busy() {
        tracing::debug!(queued = state.queue.len() + 1, "session busy; prompt queued");
        state.queue.push(text);
        return None;
    }
    if !state.queue.is_empty() {
        state.queue.push(text);
        return drain(state);
    }
    start_prompt(state, text)
}

fn replace_queued(state: &mut SessionState, index: usize, text: String) -> Option<Action> {
    if !state.queue.replace(index, text) {
        return None;
    }
    if state.is_busy() {
        None
    } else {
        drain(state)
    }
}

// ---------------------------------------------------------------------------
// Runs
// ---------------------------------------------------------------------------

/// Pop the queue head if nothing is running.
fn drain(state: &mut SessionState) -> Option<Action> {
    if state.is_busy() {
        return None;
    }
    let prompt = state.queue.pop_front()?;
    start_prompt(state, prompt)
}

/// Submit a fresh prompt: recorded in history and shown as a user turn.
fn start_prompt(state: &mut SessionState, prompt: String) -> Option<Action> {
    state.history.push(prompt.clone());
    state.content.push(ContentEntry::User(prompt.clone()));
    Some(start_run(state, prompt))
}

fn start_run(state: &mut SessionState, prompt: String) -> Action {
    let run_id = state.next_run_id;
    state.next_run_id += 1;
    state.run_id = Some(run_id);
    state.agent_running = true;
    state.cancelling = false;
    state.in_flight = Some(prompt.clone());
    tracing::info!(run_id, "starting foreground run");
    Action::StartRun(RunRequest {
        origin: RunOrigin::Foreground(run_id),
        prompt,
        messages: state.conversation.clone(),
        mode: state.mode,
    })
}

fn is_current_run(state: &SessionState, run_id: RunId) -> bool {
    state.agent_running && state.run_id == Some(run_id)
}

fn on_run_update(state: &mut SessionState, run_id: RunId, update: RunUpdate) -> Option<Action> {
    if !is_current_run(state, run_id) {
        tracing::debug!(run_id, "ignoring update from stale run");
        return None;
    }
    match update {
        RunUpdate::Text(delta) => state.with_turn(|turn| turn.push_text(&delta)),
        RunUpdate::Thinking(delta) => state.with_turn(|turn| turn.push_thinking(&delta)),
        RunUpdate::ToolStarted {
            call_id,
            name,
            arguments,
        } => state.with_turn(|turn| turn.start_tool(call_id, name, arguments)),
        RunUpdate::ToolProgress { call_id, output } => {
            state.with_turn(|turn| turn.tool_progress(&call_id, &output))
        }
        RunUpdate::ToolFinished {
            call_id,
            output,
            is_error,
        } => state.with_turn(|turn| turn.finish_tool(&call_id, output, is_error)),
        RunUpdate::Usage {
            input_tokens,
            output_tokens,
        } => {
            state.tokens.record(input_tokens, output_tokens);
            // Never compacts mid-run; a due compaction starts at RunFinished.
            state.compact.observe(&state.tokens);
        }
        RunUpdate::Error(message) => state.push_error(message),
    }
    None
}

fn on_run_finished(
    state: &mut SessionState,
    run_id: RunId,
    result: Result<Vec<Message>, RunError>,
) -> Option<Action> {
    if !is_current_run(state, run_id) {
        tracing::debug!(run_id, "ignoring completion of stale run");
        return None;
    }
    state.agent_running = false;
    let cancelling = std::mem::take(&mut state.cancelling);
    let prompt = state.in_flight.take().unwrap_or_default();
    state.finish_turns();

    match result {
        Ok(messages) => {
            tracing::info!(run_id, messages = messages.len(), "foreground run finished");
            state.retry.on_success();
            state.conversation.push(Message::user(prompt));
            state.conversation.extend(messages);
            after_success(state)
        }
        Err(err) if cancelling || err.is_cancelled() => {
            tracing::info!(run_id, "foreground run cancelled");
            state.retry.cancel();
            state.push_notice("Cancelled.");
            None
        }
        Err(err) => on_run_failed(state, &prompt, err),
    }
}

fn on_run_failed(state: &mut SessionState, prompt: &str, err: RunError) -> Option<Action> {
    match state.retry.on_failure(&err, prompt, Instant::now()) {
        RetryDecision::Scheduled { attempt, delay } => {
            let max = state.retry.policy().max_attempts;
            state.push_notice(format!(
                "Rate limited ({err}). Retrying in {}s (attempt {} of {max}).",
                delay.as_secs_f32().ceil() as u64,
                attempt + 1,
            ));
            Some(Action::ScheduleRetryTick {
                after: delay.min(RETRY_TICK),
            })
        }
        RetryDecision::Exhausted { attempts } => {
            tracing::warn!(%err, attempts, "run failed after retries");
            state.push_error(format!("{err} (gave up after {attempts} attempts)"));
            None
        }
        RetryDecision::NotRetryable => {
            tracing::warn!(%err, "run failed");
            state.push_error(err.to_string());
            None
        }
    }
}

/// Post-success bookkeeping: a due compaction goes first, then the queue.
fn after_success(state: &mut SessionState) -> Option<Action> {
    if state.compact.is_due() {
        if let Some(action) = start_compaction(state) {
            return Some(action);
        }
    }
    drain(state)
}

fn interrupt(state: &mut SessionState) -> Option<Action> {
    if state.agent_running {
        if state.cancelling {
            return None;
        }
        let run_id = state.run_id?;
        state.cancelling = true;
        state.push_notice("Cancelling...");
        return Some(Action::CancelRun { run_id });
    }
    if state.retry.cancel().is_some() {
        state.push_notice("Retry cancelled.");
    }
    None
}

fn on_retry_tick(state: &mut SessionState, now: Instant) -> Option<Action> {
    match state.retry.tick(now) {
        TickOutcome::Idle => None,
        TickOutcome::Wait(after) => Some(Action::ScheduleRetryTick { after }),
        TickOutcome::Fire(prompt) => {
            if state.agent_running || state.compact.is_compacting() {
                // Not reachable through the reducer; keep the prompt rather than drop it.
                state.queue.push(prompt);
                return None;
            }
            state.push_notice("Retrying...");
            Some(start_run(state, prompt))
        }
    }
}

// ---------------------------------------------------------------------------
// Compaction
// ---------------------------------------------------------------------------

fn start_compaction(state: &mut SessionState) -> Option<Action> {
    if state.conversation.is_empty() {
        state.compact.skip();
        return None;
    }
    if !state.compact.begin() {
        return None;
    }
    state.push_notice("Compacting conversation...");
    Some(Action::StartCompaction {
        messages: state.conversation.clone(),
    })
}

fn on_compaction_finished(
    state: &mut SessionState,
    result: Result<String, RunError>,
) -> Option<Action> {
    state.compact.finish();
    match result {
        Ok(summary) => {
            let conversation = compacted_conversation(&summary);
            let saved = state.tokens.apply_compaction(&conversation);
            state.conversation = conversation;
            state.conversation_epoch += 1;
            tracing::info!(saved, epoch = state.conversation_epoch, "conversation compacted");
            state.push_notice(format!("Conversation compacted (~{saved} tokens freed)."));
        }
        Err(err) => {
            tracing::warn!(%err, "compaction failed");
            state.push_error(format!("Compaction failed: {err}"));
        }
    }
    drain(state)
}

// ---------------------------------------------------------------------------
// Permissions and background tasks
// ---------------------------------------------------------------------------

fn on_permission_requested(state: &mut SessionState, request: PermissionRequest) -> Option<Action> {
    if state.mode == Mode::Plan {
        let tool = request.tool().to_string();
        request.respond(PermissionReply::DENIED);
        state.push_notice(format!("Denied `{tool}` (plan mode)."));
        return None;
    }
    if state.overlay.is_none() {
        state.overlay = Some(Overlay::Approval(request));
    } else {
        state.pending_permissions.push_back(request);
    }
    None
}

fn on_background_finished(state: &mut SessionState, id: &str) -> Option<Action> {
    let Some(task) = state.registry.get(id) else {
        return None;
    };
    match task.status {
        TaskStatus::Running => {}
        TaskStatus::Done => state.push_notice(format!(
            "Background task {id} finished: {}",
            task.final_text().unwrap_or("(no output)")
        )),
        TaskStatus::Failed => state.push_error(format!(
            "Background task {id} failed: {}",
            task.err.as_deref().unwrap_or("unknown error")
        )),
    }
    None
}

fn start_background(state: &mut SessionState, prompt: String) -> Option<Action> {
    if prompt.is_empty() {
        state.push_notice("Usage: /bg <prompt>");
        return None;
    }
    let id = format!("bg-{}", state.next_background_id);
    match state.registry.add(&id, &prompt) {
        Ok(cancel) => {
            state.next_background_id += 1;
            state.push_notice(format!("Started background task {id}."));
            Some(Action::StartBackground {
                request: RunRequest {
                    origin: RunOrigin::Background(id),
                    prompt,
                    messages: state.conversation.clone(),
                    mode: state.mode,
                },
                cancel,
            })
        }
        Err(err) => {
            state.push_error(err.to_string());
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn run_command(state: &mut SessionState, command: SlashCommand) -> Option<Action> {
    match command {
        SlashCommand::Help => {
            state.push_notice(help_text());
            None
        }
        SlashCommand::Clear => {
            state.content.clear();
            None
        }
        SlashCommand::Quit => quit(state),
        SlashCommand::Plan => set_mode(state, Mode::Plan),
        SlashCommand::Edit => set_mode(state, Mode::Edit),
        SlashCommand::Mode => set_mode(state, state.mode.toggled()),
        SlashCommand::Compact => {
            if state.compact.is_compacting() {
                state.push_notice("Compaction already in progress.");
                return None;
            }
            if state.conversation.is_empty() {
                state.push_notice("Nothing to compact.");
                return None;
            }
            state.compact.request();
            if state.agent_running || state.retry.is_pending() {
                state.push_notice("Compaction will start when the current run finishes.");
                return None;
            }
            start_compaction(state)
        }
        SlashCommand::Background(prompt) => start_background(state, prompt),
        SlashCommand::Tasks => {
            if state.registry.count() == 0 {
                state.push_notice("No background tasks.");
            } else {
                state.overlay = Some(Overlay::TaskManager { selected: 0 });
            }
            None
        }
        SlashCommand::Queue => {
            if state.queue.is_empty() {
                state.push_notice("Queue is empty.");
            } else {
                state.overlay = Some(Overlay::QueueManager { selected: 0 });
            }
            None
        }
        SlashCommand::Cancel => {
            if !state.agent_running && !state.retry.is_pending() {
                state.push_notice("Nothing to cancel.");
                return None;
            }
            interrupt(state)
        }
        SlashCommand::Unknown(name) => {
            state.push_notice(format!("Unknown command `{name}`. Type /help for a list."));
            None
        }
    }
}

fn set_mode(state: &mut SessionState, mode: Mode) -> Option<Action> {
    if state.mode != mode {
        state.mode = mode;
        state.push_notice(format!("Switched to {} mode.", mode.label()));
    }
    None
}

fn quit(state: &mut SessionState) -> Option<Action> {
    state.should_quit = true;
    // Dropping unanswered requests resolves them as denied.
    if matches!(state.overlay, Some(Overlay::Approval(_))) {
        state.overlay = None;
    }
    state.pending_permissions.clear();
    Some(Action::Quit)
}
