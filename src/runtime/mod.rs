//! Session host: the actor loop around the reducer.
//!
//! The host owns the session message channel. Each iteration takes one
//! message (from agent tasks, timers, the permission gate or the frontend),
//! runs it through [`update`], mirrors the conversation into the transcript
//! sink, renders, and executes the returned [`Action`].

use crate::agent::{AgentRunner, RunOrigin};
use crate::cancel::CancelHandle;
use crate::permission::PermissionRequest;
use crate::session::{update, Action, SessionMsg, SessionRenderer, SessionState};
use crate::tasks::BackgroundRegistry;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

mod tasks;
mod transcript;

use tasks::{
    spawn_background_run, spawn_compaction, spawn_foreground_run, spawn_retry_tick, ActiveRun,
};
use transcript::TranscriptCursor;
pub use transcript::{MemoryTranscript, TranscriptSink};

/// Cloneable sender for feeding messages into a running host.
#[derive(Clone, Debug)]
pub struct HostHandle {
    tx: mpsc::UnboundedSender<SessionMsg>,
}

impl HostHandle {
    /// Send one message to the session.
    pub fn send(&self, msg: SessionMsg) -> Result<(), String> {
        self.tx
            .send(msg)
            .map_err(|_| "session host has stopped".to_string())
    }
}

/// Owns the reducer loop and everything it spawns.
pub struct SessionHost {
    runner: Arc<dyn AgentRunner>,
    registry: Arc<BackgroundRegistry>,
    msg_tx: mpsc::UnboundedSender<SessionMsg>,
    msg_rx: mpsc::UnboundedReceiver<SessionMsg>,
    permission_rx: Option<mpsc::UnboundedReceiver<PermissionRequest>>,
    active: Option<ActiveRun>,
    retry_timer: Option<JoinHandle<()>>,
    transcript: Option<(Box<dyn TranscriptSink>, TranscriptCursor)>,
    exit_when_idle: bool,
}

impl SessionHost {
    pub fn new(runner: Arc<dyn AgentRunner>, registry: Arc<BackgroundRegistry>) -> Self {
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();
        Self {
            runner,
            registry,
            msg_tx,
            msg_rx,
            permission_rx: None,
            active: None,
            retry_timer: None,
            transcript: None,
            exit_when_idle: false,
        }
    }

    /// Listen for approval requests from a [`crate::permission::PermissionGate`].
    pub fn with_permissions(mut self, rx: mpsc::UnboundedReceiver<PermissionRequest>) -> Self {
        self.permission_rx = Some(rx);
        self
    }

    pub fn with_transcript(mut self, sink: Box<dyn TranscriptSink>) -> Self {
        self.transcript = Some((sink, TranscriptCursor::default()));
        self
    }

    /// Stop once the session has nothing left to do (one-shot mode).
    pub fn exit_when_idle(mut self, enabled: bool) -> Self {
        self.exit_when_idle = enabled;
        self
    }

    pub fn handle(&self) -> HostHandle {
        HostHandle {
            tx: self.msg_tx.clone(),
        }
    }

    /// Drive the session until it quits. Returns the final state.
    pub async fn run(
        mut self,
        mut state: SessionState,
        renderer: &mut dyn SessionRenderer,
    ) -> SessionState {
        tracing::info!("session host started");
        renderer.render(&state);

        loop {
            let msg = tokio::select! {
                Some(msg) = self.msg_rx.recv() => msg,
                Some(request) = recv_permission(&mut self.permission_rx) => {
                    SessionMsg::PermissionRequested(request)
                }
                else => break,
            };

            if let SessionMsg::RunFinished { run_id, .. } = &msg {
                if self.active.as_ref().is_some_and(|run| run.run_id == *run_id) {
                    self.active = None;
                }
            }

            let action = update(&mut state, msg);
            self.sync_transcript(&state);
            renderer.render(&state);

            if let Some(action) = action {
                if !self.execute(action) {
                    break;
                }
            }
            if state.should_quit() {
                break;
            }
            if self.exit_when_idle && self.is_settled(&state) {
                if !state.queue().is_empty() {
                    tracing::warn!(queued = state.queue().len(), "exiting with undrained prompts");
                }
                tracing::debug!("session idle; exiting");
                break;
            }
        }

        self.shutdown();
        renderer.finish(&state);
        tracing::info!("session host stopped");
        state
    }

    /// Nothing in flight that could still produce a message.
    ///
    /// Prompts left queued behind a failed or cancelled run never drain on
    /// their own, so they do not keep a one-shot session alive.
    fn is_settled(&self, state: &SessionState) -> bool {
        !state.is_busy() && state.overlay().is_none() && self.registry.running_count() == 0
    }

    /// Execute one reducer action. Returns false when the host should stop.
    fn execute(&mut self, action: Action) -> bool {
        match action {
            Action::StartRun(request) => {
                let RunOrigin::Foreground(run_id) = request.origin else {
                    tracing::warn!(origin = ?request.origin, "StartRun with non-foreground origin");
                    return true;
                };
                let (cancel, token) = CancelHandle::new();
                if let Some(previous) = self.active.replace(ActiveRun { run_id, cancel }) {
                    // Should not happen; never leave a run without an owner.
                    tracing::warn!(previous = previous.run_id, run_id, "replacing active run");
                    previous.cancel.cancel();
                }
                spawn_foreground_run(
                    Arc::clone(&self.runner),
                    run_id,
                    request,
                    token,
                    self.msg_tx.clone(),
                );
            }
            Action::CancelRun { run_id } => match &self.active {
                Some(run) if run.run_id == run_id => {
                    tracing::info!(run_id, "cancelling foreground run");
                    run.cancel.cancel();
                }
                _ => tracing::debug!(run_id, "cancel for inactive run ignored"),
            },
            Action::ScheduleRetryTick { after } => {
                if let Some(timer) = self.retry_timer.take() {
                    timer.abort();
                }
                self.retry_timer = Some(spawn_retry_tick(after, self.msg_tx.clone()));
            }
            Action::StartCompaction { messages } => {
                tracing::info!(messages = messages.len(), "starting compaction");
                spawn_compaction(Arc::clone(&self.runner), messages, self.msg_tx.clone());
            }
            Action::StartBackground { request, cancel } => {
                let RunOrigin::Background(id) = request.origin.clone() else {
                    tracing::warn!(origin = ?request.origin, "StartBackground with foreground origin");
                    return true;
                };
                tracing::info!(task = %id, "starting background task");
                spawn_background_run(
                    Arc::clone(&self.runner),
                    Arc::clone(&self.registry),
                    id,
                    request,
                    cancel,
                    self.msg_tx.clone(),
                );
            }
            Action::OverlayDismissed { kind } => {
                tracing::debug!(?kind, "overlay dismissed");
            }
            Action::Quit => return false,
        }
        true
    }

    fn sync_transcript(&mut self, state: &SessionState) {
        let Some((sink, cursor)) = self.transcript.as_mut() else {
            return;
        };
        if let Err(err) = cursor.sync(
            sink.as_mut(),
            state.conversation(),
            state.conversation_epoch(),
        ) {
            tracing::warn!(%err, "failed to persist transcript");
        }
    }

    fn shutdown(&mut self) {
        if let Some(run) = self.active.take() {
            run.cancel.cancel();
        }
        if let Some(timer) = self.retry_timer.take() {
            timer.abort();
        }
        let cancelled = self.registry.cancel_all();
        if cancelled > 0 {
            tracing::info!(cancelled, "cancelled background tasks on exit");
        }
    }
}

async fn recv_permission(
    rx: &mut Option<mpsc::UnboundedReceiver<PermissionRequest>>,
) -> Option<PermissionRequest> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
