//! Spawn helpers for the work the host runs off the actor loop.
//!
//! Every helper reports back exclusively through the session message
//! channel, so the reducer stays the only writer of session state.

use crate::agent::{bridge, AgentEvent, AgentRunner, RunId, RunRequest};
use crate::cancel::{CancelHandle, CancelToken};
use crate::error::RunError;
use crate::session::SessionMsg;
use crate::tasks::BackgroundRegistry;
use crate::types::Message;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Host-owned handle on the current foreground run.
pub(super) struct ActiveRun {
    pub(super) run_id: RunId,
    pub(super) cancel: CancelHandle,
}

/// Run the agent inside its own task so a panic surfaces as a run error
/// instead of a run that never finishes.
async fn run_guarded(
    runner: Arc<dyn AgentRunner>,
    request: RunRequest,
    events: mpsc::UnboundedSender<AgentEvent>,
    cancel: CancelToken,
) -> Result<Vec<Message>, RunError> {
    let run = tokio::spawn(async move { runner.run(request, events, cancel).await });
    match run.await {
        Ok(result) => result,
        Err(err) => Err(RunError::new(format!("agent run aborted: {err}"))),
    }
}

/// Spawn foreground run `run_id`: events stream through the bridge, then
/// exactly one `RunFinished` follows the last of them.
pub(super) fn spawn_foreground_run(
    runner: Arc<dyn AgentRunner>,
    run_id: RunId,
    request: RunRequest,
    cancel: CancelToken,
    msg_tx: mpsc::UnboundedSender<SessionMsg>,
) {
    tokio::spawn(async move {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let bridge = tokio::spawn(bridge::pump(run_id, events_rx, msg_tx.clone()));
        let result = run_guarded(runner, request, events_tx, cancel).await;
        // The event sender is gone once the run returns, so the bridge drains
        // and exits; waiting for it keeps RunFinished behind every update.
        match bridge.await {
            Ok(forwarded) => tracing::debug!(run_id, forwarded, "bridge drained"),
            Err(err) => tracing::warn!(run_id, %err, "bridge task failed"),
        }
        let _ = msg_tx.send(SessionMsg::RunFinished { run_id, result });
    });
}

/// Spawn background task `id` and record its result in the registry.
pub(super) fn spawn_background_run(
    runner: Arc<dyn AgentRunner>,
    registry: Arc<BackgroundRegistry>,
    id: String,
    request: RunRequest,
    cancel: CancelToken,
    msg_tx: mpsc::UnboundedSender<SessionMsg>,
) {
    tokio::spawn(async move {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel::<AgentEvent>();
        let drain = tokio::spawn(async move {
            let mut seen = 0usize;
            while events_rx.recv().await.is_some() {
                seen += 1;
            }
            seen
        });
        let result = run_guarded(runner, request, events_tx, cancel).await;
        let events = drain.await.unwrap_or_default();

        match registry.mark_done(&id, result) {
            Ok(status) => {
                tracing::info!(task = %id, status = status.label(), events, "background task finished")
            }
            Err(err) => {
                // Removed from the registry while it was running.
                tracing::debug!(task = %id, %err, "background result discarded");
                return;
            }
        }
        let _ = msg_tx.send(SessionMsg::BackgroundFinished { id });
    });
}

/// Summarize `messages` for compaction.
pub(super) fn spawn_compaction(
    runner: Arc<dyn AgentRunner>,
    messages: Vec<Message>,
    msg_tx: mpsc::UnboundedSender<SessionMsg>,
) {
    tokio::spawn(async move {
        // A panicking summarizer must still release the compaction guard.
        let summary = tokio::spawn(async move { runner.summarize(&messages).await });
        let result = match summary.await {
            Ok(result) => result,
            Err(err) => Err(RunError::new(format!("compaction aborted: {err}"))),
        };
        let _ = msg_tx.send(SessionMsg::CompactionFinished { result });
    });
}

/// Deliver one `RetryTick` after `after`.
pub(super) fn spawn_retry_tick(
    after: Duration,
    msg_tx: mpsc::UnboundedSender<SessionMsg>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        let _ = msg_tx.send(SessionMsg::RetryTick {
            now: Instant::now(),
        });
    })
}
