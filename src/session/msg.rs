//! Reducer inputs and outputs.

use super::keys::Key;
use super::overlay::OverlayKind;
use crate::agent::{RunId, RunRequest};
use crate::cancel::CancelToken;
use crate::error::RunError;
use crate::permission::PermissionRequest;
use crate::types::Message;
use std::time::{Duration, Instant};

/// Everything the session reducer reacts to.
#[derive(Debug)]
pub enum SessionMsg {
    Key(Key),
    /// A whole line of input, as if typed and confirmed with Enter.
    Submit(String),
    Interrupt,
    ToggleMode,
    Resize {
        width: u16,
        height: u16,
    },
    Quit,
    /// Streamed progress from foreground run `run_id`.
    Run {
        run_id: RunId,
        update: RunUpdate,
    },
    /// Foreground run `run_id` returned.
    RunFinished {
        run_id: RunId,
        result: Result<Vec<Message>, RunError>,
    },
    RetryTick {
        now: Instant,
    },
    CompactionFinished {
        result: Result<String, RunError>,
    },
    PermissionRequested(PermissionRequest),
    /// Background task `id` reached a terminal status in the registry.
    BackgroundFinished {
        id: String,
    },
    ReplaceQueued {
        index: usize,
        text: String,
    },
    RemoveQueued {
        index: usize,
    },
}

/// Reducer-facing view of one agent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunUpdate {
    Text(String),
    Thinking(String),
    ToolStarted {
        call_id: String,
        name: String,
        arguments: String,
    },
    ToolProgress {
        call_id: String,
        output: String,
    },
    ToolFinished {
        call_id: String,
        output: String,
        is_error: bool,
    },
    Usage {
        input_tokens: u64,
        output_tokens: u64,
    },
    /// Non-fatal error reported mid-run.
    Error(String),
}

/// Side effect requested by the reducer, executed by the host.
#[derive(Debug)]
pub enum Action {
    StartRun(RunRequest),
    CancelRun {
        run_id: RunId,
    },
    /// Deliver `SessionMsg::RetryTick` after `after`.
    ScheduleRetryTick {
        after: Duration,
    },
    /// Summarize `messages` and answer with `SessionMsg::CompactionFinished`.
    StartCompaction {
        messages: Vec<Message>,
    },
    /// Run a registered background task; its id is in `request.origin`.
    StartBackground {
        request: RunRequest,
        cancel: CancelToken,
    },
    OverlayDismissed {
        kind: OverlayKind,
    },
    Quit,
}
