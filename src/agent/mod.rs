//! Agent execution interface.
//!
//! The session never talks to a model directly. It asks an [`AgentRunner`] to
//! execute one turn and listens to the [`AgentEvent`]s the runner emits while
//! it works. The [`bridge`] turns those events into reducer messages.

use crate::cancel::CancelToken;
use crate::error::RunError;
use crate::session::Mode;
use crate::types::Message;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

pub mod bridge;
pub mod scripted;

/// Identifier of one foreground run. Increases monotonically per session.
pub type RunId = u64;

/// Who asked for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOrigin {
    Foreground(RunId),
    Background(String),
}

/// Everything a runner needs to execute one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub origin: RunOrigin,
    pub prompt: String,
    /// Conversation so far, not including `prompt`.
    pub messages: Vec<Message>,
    pub mode: Mode,
}

/// Streamed progress from a running agent.
///
/// Serialized with an internal `type` tag so JSON event sources decode
/// directly. Unrecognized tags decode as [`AgentEvent::Unknown`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    Text {
        delta: String,
    },
    Thinking {
        delta: String,
    },
    ToolStart {
        call_id: String,
        name: String,
        #[serde(default)]
        arguments: String,
    },
    ToolUpdate {
        call_id: String,
        output: String,
    },
    ToolEnd {
        call_id: String,
        output: String,
        #[serde(default)]
        is_error: bool,
    },
    Usage {
        input_tokens: u64,
        output_tokens: u64,
    },
    Error {
        message: String,
    },
    #[serde(other)]
    Unknown,
}

/// Executes agent turns on behalf of the session.
///
/// `run` must drop `events` before returning; the bridge treats the closed
/// channel as the end of the event stream. Implementations observe `cancel`
/// and return [`RunError::cancelled`] when it fires.
#[async_trait]
pub trait AgentRunner: Send + Sync {
    async fn run(
        &self,
        request: RunRequest,
        events: mpsc::UnboundedSender<AgentEvent>,
        cancel: CancelToken,
    ) -> Result<Vec<Message>, RunError>;

    /// Produce a summary that replaces `messages` during compaction.
    async fn summarize(&self, messages: &[Message]) -> Result<String, RunError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_decode_from_tagged_json() {
        let event: AgentEvent =
            serde_json::from_str(r#"{"type":"tool_start","call_id":"c1","name":"shell"}"#)
                .expect("decode");
        assert_eq!(
            event,
            AgentEvent::ToolStart {
                call_id: "c1".into(),
                name: "shell".into(),
                arguments: String::new(),
            }
        );
    }

    #[test]
    fn unknown_event_type_is_tolerated() {
        let event: AgentEvent =
            serde_json::from_str(r#"{"type":"heartbeat"}"#).expect("decode");
        assert_eq!(event, AgentEvent::Unknown);
    }

    #[test]
    fn usage_serializes_with_tag() {
        let value = serde_json::to_value(AgentEvent::Usage {
            input_tokens: 10,
            output_tokens: 2,
        })
        .expect("encode");
        assert_eq!(
            value,
            serde_json::json!({"type": "usage", "input_tokens": 10, "output_tokens": 2})
        );
    }
}
