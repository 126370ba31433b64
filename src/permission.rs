//! Permission gate between agent tasks and the approval UI.
//!
//! An agent that wants to run a gated tool calls [`PermissionGate::request`].
//! The gate forwards a [`PermissionRequest`] to the session, which shows it
//! in the approval overlay. Each request carries its own capacity-1 reply
//! channel, and the overlay answers with a non-blocking send, so a closed UI
//! or a repeated key press can never wedge either side.
//!
//! Anything short of an explicit approval resolves as denied: escape, a
//! dropped request, a closed UI, or an expired wait.

use crate::error::GateError;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;

/// Decision sent back for one permission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionReply {
    pub allowed: bool,
    /// Skip future prompts for the same tool.
    pub always: bool,
}

impl PermissionReply {
    pub const DENIED: Self = Self {
        allowed: false,
        always: false,
    };
    pub const ALLOW_ONCE: Self = Self {
        allowed: true,
        always: false,
    };
    pub const ALLOW_ALWAYS: Self = Self {
        allowed: true,
        always: true,
    };
}

/// One pending approval transaction.
///
/// Replying consumes the request, so at most one reply is ever attempted.
/// Dropping it unanswered closes the reply channel, which the gate treats as
/// a denial.
#[derive(Debug)]
pub struct PermissionRequest {
    tool: String,
    args: Value,
    reply: mpsc::Sender<PermissionReply>,
}

impl PermissionRequest {
    /// Build a request and the receiver its reply will arrive on.
    pub fn new(
        tool: impl Into<String>,
        args: Value,
    ) -> (Self, mpsc::Receiver<PermissionReply>) {
        let (reply, rx) = mpsc::channel(1);
        (
            Self {
                tool: tool.into(),
                args,
                reply,
            },
            rx,
        )
    }

    pub fn tool(&self) -> &str {
        &self.tool
    }

    pub fn args(&self) -> &Value {
        &self.args
    }

    /// Human-readable question shown by the approval overlay.
    pub fn prompt_text(&self) -> String {
        let args = match &self.args {
            Value::Null => String::new(),
            Value::Object(map) if map.is_empty() => String::new(),
            other => format!(" {other}"),
        };
        format!("Allow `{}`{args}? [y]es / [a]lways / [n]o", self.tool)
    }

    /// Best-effort reply. Returns false if nobody is listening any more.
    pub fn respond(self, reply: PermissionReply) -> bool {
        match self.reply.try_send(reply) {
            Ok(()) => true,
            Err(err) => {
                tracing::debug!(tool = %self.tool, %err, "permission reply dropped");
                false
            }
        }
    }
}

/// Agent-side handle for asking the user before running a tool.
#[derive(Debug, Clone)]
pub struct PermissionGate {
    tx: mpsc::UnboundedSender<PermissionRequest>,
    always_allowed: Arc<Mutex<HashSet<String>>>,
    timeout: Option<Duration>,
}

impl PermissionGate {
    /// Create a gate plus the receiver the session host listens on.
    ///
    /// `timeout` bounds how long one request waits for a reply; `None` waits
    /// until the reply channel resolves.
    pub fn channel(
        timeout: Option<Duration>,
    ) -> (Self, mpsc::UnboundedReceiver<PermissionRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                always_allowed: Arc::new(Mutex::new(HashSet::new())),
                timeout,
            },
            rx,
        )
    }

    /// Ask for permission to run `tool` and wait for exactly one decision.
    pub async fn request(
        &self,
        tool: impl Into<String>,
        args: Value,
    ) -> Result<PermissionReply, GateError> {
        let tool = tool.into();
        if self.is_always_allowed(&tool) {
            tracing::debug!(%tool, "tool allowed by earlier `always` reply");
            return Ok(PermissionReply::ALLOW_ALWAYS);
        }

        let (request, mut reply_rx) = PermissionRequest::new(tool.clone(), args);
        self.tx
            .send(request)
            .map_err(|_| GateError::UiUnavailable)?;

        let reply = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, reply_rx.recv()).await {
                Ok(reply) => reply,
                Err(_) => {
                    tracing::warn!(%tool, ?limit, "permission request timed out; denying");
                    None
                }
            },
            None => reply_rx.recv().await,
        };

        let reply = reply.unwrap_or(PermissionReply::DENIED);
        if reply.allowed && reply.always {
            self.always_allowed
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(tool.clone());
        }
        tracing::info!(%tool, allowed = reply.allowed, always = reply.always, "permission resolved");
        Ok(reply)
    }

    pub fn is_always_allowed(&self, tool: &str) -> bool {
        self.always_allowed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(tool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::time::timeout;

    #[tokio::test]
    async fn reply_reaches_waiting_requester() {
        let (gate, mut ui_rx) = PermissionGate::channel(None);
        let waiter = tokio::spawn(async move { gate.request("write_file", json!({"path": "a"})).await });

        let request = ui_rx.recv().await.expect("request forwarded");
        assert_eq!(request.tool(), "write_file");
        assert!(request.respond(PermissionReply::ALLOW_ONCE));

        let reply = waiter.await.expect("join").expect("gate");
        assert_eq!(reply, PermissionReply::ALLOW_ONCE);
    }

    #[tokio::test]
    async fn dropped_request_is_denied() {
        let (gate, mut ui_rx) = PermissionGate::channel(None);
        let waiter = tokio::spawn(async move { gate.request("shell", Value::Null).await });

        drop(ui_rx.recv().await.expect("request forwarded"));

        let reply = timeout(Duration::from_secs(1), waiter)
            .await
            .expect("requester must not hang")
            .expect("join")
            .expect("gate");
        assert_eq!(reply, PermissionReply::DENIED);
    }

    #[tokio::test]
    async fn closed_ui_is_an_error() {
        let (gate, ui_rx) = PermissionGate::channel(None);
        drop(ui_rx);
        assert_eq!(
            gate.request("shell", Value::Null).await,
            Err(GateError::UiUnavailable)
        );
    }

    #[tokio::test]
    async fn timeout_denies() {
        let (gate, mut ui_rx) = PermissionGate::channel(Some(Duration::from_millis(20)));
        let reply = gate.request("shell", Value::Null).await.expect("gate");
        assert_eq!(reply, PermissionReply::DENIED);
        // The request itself was still delivered; answering late is harmless.
        let late = ui_rx.recv().await.expect("request forwarded");
        assert!(!late.respond(PermissionReply::ALLOW_ONCE));
    }

    #[tokio::test]
    async fn always_skips_later_prompts() {
        let (gate, mut ui_rx) = PermissionGate::channel(None);
        let first = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.request("edit", Value::Null).await })
        };
        ui_rx
            .recv()
            .await
            .expect("request forwarded")
            .respond(PermissionReply::ALLOW_ALWAYS);
        assert_eq!(first.await.expect("join"), Ok(PermissionReply::ALLOW_ALWAYS));

        let second = gate.request("edit", Value::Null).await.expect("gate");
        assert!(second.allowed);
        assert!(ui_rx.try_recv().is_err(), "no second prompt expected");
        assert!(!gate.is_always_allowed("shell"));
    }

    #[test]
    fn respond_never_blocks_when_receiver_is_gone() {
        let (request, rx) = PermissionRequest::new("shell", Value::Null);
        drop(rx);
        assert!(!request.respond(PermissionReply::ALLOW_ONCE));
    }

    #[test]
    fn prompt_text_mentions_tool_and_args() {
        let (request, _rx) = PermissionRequest::new("run_shell", json!({"command": "ls"}));
        let text = request.prompt_text();
        assert!(text.starts_with("Allow `run_shell`"), "{text}");
        assert!(text.contains("\"command\":\"ls\""), "{text}");
    }
}
