//! Offline agent runner driven by pre-scripted turns.
//!
//! Used by the binary when no model backend is attached and by tests to play
//! back exact event sequences. Turns are consumed in order; once the script
//! runs out, every prompt is answered by an echo turn.

use super::{AgentEvent, AgentRunner, RunRequest};
use crate::cancel::CancelToken;
use crate::error::RunError;
use crate::permission::PermissionGate;
use crate::session::compact::local_summary;
use crate::session::Mode;
use crate::tokens::TokenTracker;
use crate::types::{Message, Role, ToolCall};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;

/// One step of a scripted turn.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    Emit(AgentEvent),
    /// Call a gated tool: asks the permission gate (if any) before "running".
    Tool {
        name: String,
        arguments: Value,
        output: String,
    },
    Sleep(Duration),
    /// Block until the run is cancelled.
    WaitForCancel,
}

/// A complete scripted response to one prompt.
#[derive(Debug, Clone)]
pub struct ScriptedTurn {
    steps: Vec<ScriptStep>,
    outcome: Result<String, RunError>,
}

impl ScriptedTurn {
    /// Stream `text` and finish successfully with it.
    pub fn reply(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            steps: vec![ScriptStep::Emit(AgentEvent::Text {
                delta: text.clone(),
            })],
            outcome: Ok(text),
        }
    }

    /// Fail with `message` without emitting anything.
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            steps: Vec::new(),
            outcome: Err(RunError::new(message)),
        }
    }

    /// Never finish on its own; only cancellation ends the run.
    pub fn hang() -> Self {
        Self {
            steps: vec![ScriptStep::WaitForCancel],
            outcome: Err(RunError::cancelled()),
        }
    }

    /// Append a usage report after the existing steps.
    pub fn with_usage(mut self, input_tokens: u64, output_tokens: u64) -> Self {
        self.steps.push(ScriptStep::Emit(AgentEvent::Usage {
            input_tokens,
            output_tokens,
        }));
        self
    }

    /// Call a gated tool before anything else in the turn.
    pub fn with_tool(
        mut self,
        name: impl Into<String>,
        arguments: Value,
        output: impl Into<String>,
    ) -> Self {
        self.steps.insert(
            0,
            ScriptStep::Tool {
                name: name.into(),
                arguments,
                output: output.into(),
            },
        );
        self
    }

    /// Wait `delay` before the first step.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.steps.insert(0, ScriptStep::Sleep(delay));
        self
    }

    pub fn then(mut self, step: ScriptStep) -> Self {
        self.steps.push(step);
        self
    }

    fn echo(request: &RunRequest) -> Self {
        let reply = match request.mode {
            Mode::Edit => format!("You said: {}", request.prompt),
            Mode::Plan => format!("Plan for: {}", request.prompt),
        };
        let mut context = request.messages.clone();
        context.push(Message::user(request.prompt.clone()));
        let input = TokenTracker::estimate_messages(&context);
        let output = TokenTracker::estimate_messages(&[Message::assistant(reply.clone())]);
        Self::reply(reply).with_usage(input, output)
    }
}

/// [`AgentRunner`] that plays back [`ScriptedTurn`]s.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    turns: Mutex<VecDeque<ScriptedTurn>>,
    summaries: Mutex<VecDeque<Result<String, RunError>>>,
    requests: Mutex<Vec<RunRequest>>,
    gate: Option<PermissionGate>,
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask `gate` before every scripted tool call.
    pub fn with_gate(mut self, gate: PermissionGate) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn push_turn(&self, turn: ScriptedTurn) {
        locked(&self.turns).push_back(turn);
    }

    pub fn push_summary(&self, summary: Result<String, RunError>) {
        locked(&self.summaries).push_back(summary);
    }

    /// Every request seen so far, in arrival order.
    pub fn requests(&self) -> Vec<RunRequest> {
        locked(&self.requests).clone()
    }

    async fn call_tool(
        &self,
        call_id: &str,
        name: String,
        arguments: Value,
        output: String,
        events: &mpsc::UnboundedSender<AgentEvent>,
        cancel: &mut CancelToken,
    ) -> Result<Vec<Message>, RunError> {
        let args_text = arguments.to_string();
        let _ = events.send(AgentEvent::ToolStart {
            call_id: call_id.to_string(),
            name: name.clone(),
            arguments: args_text.clone(),
        });

        let allowed = match &self.gate {
            Some(gate) => tokio::select! {
                reply = gate.request(name.clone(), arguments) => match reply {
                    Ok(reply) => reply.allowed,
                    Err(err) => {
                        tracing::warn!(%err, tool = %name, "permission gate unavailable; denying");
                        false
                    }
                },
                _ = cancel.cancelled() => return Err(RunError::cancelled()),
            },
            None => true,
        };

        let (output, is_error) = if allowed {
            (output, false)
        } else {
            (format!("permission denied for `{name}`"), true)
        };
        let _ = events.send(AgentEvent::ToolEnd {
            call_id: call_id.to_string(),
            output: output.clone(),
            is_error,
        });

        let call = Message {
            role: Role::Assistant,
            content: None,
            tool_calls: vec![ToolCall {
                id: call_id.to_string(),
                name,
                arguments: args_text,
            }],
            tool_call_id: None,
        };
        Ok(vec![call, Message::tool_result(call_id, output)])
    }
}

#[async_trait]
impl AgentRunner for ScriptedRunner {
    async fn run(
        &self,
        request: RunRequest,
        events: mpsc::UnboundedSender<AgentEvent>,
        mut cancel: CancelToken,
    ) -> Result<Vec<Message>, RunError> {
        locked(&self.requests).push(request.clone());
        let next = locked(&self.turns).pop_front();
        let turn = next.unwrap_or_else(|| ScriptedTurn::echo(&request));

        let mut messages = Vec::new();
        let mut calls = 0usize;
        for step in turn.steps {
            if cancel.is_cancelled() {
                return Err(RunError::cancelled());
            }
            match step {
                ScriptStep::Emit(event) => {
                    let _ = events.send(event);
                }
                ScriptStep::Sleep(delay) => {
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancel.cancelled() => return Err(RunError::cancelled()),
                    }
                }
                ScriptStep::WaitForCancel => {
                    cancel.cancelled().await;
                    return Err(RunError::cancelled());
                }
                ScriptStep::Tool {
                    name,
                    arguments,
                    output,
                } => {
                    calls += 1;
                    let call_id = format!("call_{calls}");
                    let produced = self
                        .call_tool(&call_id, name, arguments, output, &events, &mut cancel)
                        .await?;
                    messages.extend(produced);
                }
            }
        }
        drop(events);

        let text = turn.outcome?;
        messages.push(Message::assistant(text));
        Ok(messages)
    }

    async fn summarize(&self, messages: &[Message]) -> Result<String, RunError> {
        let scripted = locked(&self.summaries).pop_front();
        scripted.unwrap_or_else(|| Ok(local_summary(messages)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::RunOrigin;
    use crate::cancel::CancelHandle;
    use crate::permission::PermissionReply;
    use serde_json::json;

    fn request(prompt: &str) -> RunRequest {
        RunRequest {
            origin: RunOrigin::Foreground(1),
            prompt: prompt.to_string(),
            messages: Vec::new(),
            mode: Mode::Edit,
        }
    }

    fn drain(mut rx: mpsc::UnboundedReceiver<AgentEvent>) -> Vec<AgentEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn echo_when_script_is_empty() {
        let runner = ScriptedRunner::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let (_handle, token) = CancelHandle::new();
        let messages = runner.run(request("hi"), tx, token).await.expect("run");
        assert_eq!(messages, vec![Message::assistant("You said: hi")]);
        let events = drain(rx);
        assert!(matches!(events[0], AgentEvent::Text { .. }));
        assert!(matches!(events[1], AgentEvent::Usage { .. }));
        assert_eq!(runner.requests().len(), 1);
    }

    #[tokio::test]
    async fn scripted_failure_is_returned() {
        let runner = ScriptedRunner::new();
        runner.push_turn(ScriptedTurn::fail("429 rate limit"));
        let (tx, _rx) = mpsc::unbounded_channel();
        let (_handle, token) = CancelHandle::new();
        let err = runner.run(request("x"), tx, token).await.expect_err("fail");
        assert_eq!(err.to_string(), "429 rate limit");
    }

    #[tokio::test]
    async fn hang_ends_on_cancel() {
        let runner = ScriptedRunner::new();
        runner.push_turn(ScriptedTurn::hang());
        let (tx, _rx) = mpsc::unbounded_channel();
        let (handle, token) = CancelHandle::new();
        let run = runner.run(request("x"), tx, token);
        handle.cancel();
        let err = tokio::time::timeout(Duration::from_secs(1), run)
            .await
            .expect("cancel should end the run")
            .expect_err("cancelled");
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn denied_tool_reports_error_result() {
        let (gate, mut ui_rx) = PermissionGate::channel(None);
        let runner = ScriptedRunner::new().with_gate(gate);
        runner.push_turn(ScriptedTurn::reply("done").with_tool(
            "run_shell",
            json!({"command": "rm -rf target"}),
            "removed",
        ));
        let (tx, rx) = mpsc::unbounded_channel();
        let (_handle, token) = CancelHandle::new();

        let ui = tokio::spawn(async move {
            let request = ui_rx.recv().await.expect("permission request");
            assert_eq!(request.tool(), "run_shell");
            request.respond(PermissionReply::DENIED);
        });
        let messages = runner.run(request("clean"), tx, token).await.expect("run");
        ui.await.expect("ui task");

        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].tool_calls[0].name, "run_shell");
        assert_eq!(messages[1].text(), "permission denied for `run_shell`");
        let events = drain(rx);
        assert!(matches!(
            &events[1],
            AgentEvent::ToolEnd { is_error: true, .. }
        ));
    }

    #[tokio::test]
    async fn summaries_fall_back_to_local_digest() {
        let runner = ScriptedRunner::new();
        runner.push_summary(Err(RunError::new("summary model down")));
        assert!(runner.summarize(&[]).await.is_err());
        let summary = runner
            .summarize(&[Message::user("hello")])
            .await
            .expect("local summary");
        assert!(summary.contains("user: hello"));
    }
}
