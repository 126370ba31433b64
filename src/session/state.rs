//! Session state owned by the reducer.

use super::compact::AutoCompact;
use super::editor::Editor;
use super::overlay::Overlay;
use super::queue::{PromptHistory, PromptQueue};
use super::retry::{RetryGovernor, RetryPolicy};
use crate::agent::RunId;
use crate::config::Config;
use crate::permission::PermissionRequest;
use crate::tasks::BackgroundRegistry;
use crate::tokens::TokenTracker;
use crate::types::Message;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Agent operating mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    #[default]
    Edit,
    /// Read-only planning: gated tools are denied without asking.
    Plan,
}

impl Mode {
    pub fn label(self) -> &'static str {
        match self {
            Self::Edit => "edit",
            Self::Plan => "plan",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::Edit => Self::Plan,
            Self::Plan => Self::Edit,
        }
    }
}

/// One entry in the rendered transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentEntry {
    User(String),
    Assistant(AssistantTurn),
    Notice(String),
    Error(String),
}

impl ContentEntry {
    /// False only for an assistant turn that is still streaming.
    pub fn is_complete(&self) -> bool {
        match self {
            Self::Assistant(turn) => turn.done,
            _ => true,
        }
    }
}

/// Streamed output of one foreground run, in emission order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssistantTurn {
    pub blocks: Vec<AssistantBlock>,
    pub done: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssistantBlock {
    Text(String),
    Thinking(String),
    ToolCall(ToolCallBlock),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolStatus {
    Running,
    Done,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCallBlock {
    pub call_id: String,
    pub name: String,
    pub arguments: String,
    pub output: String,
    pub status: ToolStatus,
}

impl AssistantTurn {
    pub fn push_text(&mut self, delta: &str) {
        if let Some(AssistantBlock::Text(text)) = self.blocks.last_mut() {
            text.push_str(delta);
        } else {
            self.blocks.push(AssistantBlock::Text(delta.to_string()));
        }
    }

    pub fn push_thinking(&mut self, delta: &str) {
        if let Some(AssistantBlock::Thinking(text)) = self.blocks.last_mut() {
            text.push_str(delta);
        } else {
            self.blocks.push(AssistantBlock::Thinking(delta.to_string()));
        }
    }

    pub fn start_tool(&mut self, call_id: String, name: String, arguments: String) {
        self.blocks.push(AssistantBlock::ToolCall(ToolCallBlock {
            call_id,
            name,
            arguments,
            output: String::new(),
            status: ToolStatus::Running,
        }));
    }

    pub fn tool_progress(&mut self, call_id: &str, output: &str) {
        if let Some(block) = self.tool_mut(call_id) {
            block.output.push_str(output);
        }
    }

    pub fn finish_tool(&mut self, call_id: &str, output: String, is_error: bool) {
        if let Some(block) = self.tool_mut(call_id) {
            block.output = output;
            block.status = if is_error {
                ToolStatus::Failed
            } else {
                ToolStatus::Done
            };
        }
    }

    fn tool_mut(&mut self, call_id: &str) -> Option<&mut ToolCallBlock> {
        self.blocks.iter_mut().rev().find_map(|block| match block {
            AssistantBlock::ToolCall(call) if call.call_id == call_id => Some(call),
            _ => None,
        })
    }

    /// All text blocks joined.
    pub fn text(&self) -> String {
        self.blocks
            .iter()
            .filter_map(|block| match block {
                AssistantBlock::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// Footer/status data for the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub mode: &'static str,
    pub agent_running: bool,
    pub compacting: bool,
    pub queued: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub context_tokens: u64,
    pub saved_tokens: u64,
    pub background_running: usize,
    pub background_total: usize,
    /// Time left before a pending retry fires.
    pub retry_in: Option<Duration>,
    pub retry_attempt: u32,
    /// Question shown by the approval overlay, if open.
    pub permission_prompt: Option<String>,
}

/// A queued prompt loaded into the editor for editing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct QueueEdit {
    pub(super) index: usize,
    pub(super) original: String,
}

/// Complete interactive session state.
///
/// Owned by the host task and mutated only by [`super::update`].
#[derive(Debug)]
pub struct SessionState {
    pub(super) mode: Mode,
    pub(super) overlay: Option<Overlay>,
    pub(super) content: Vec<ContentEntry>,
    pub(super) agent_running: bool,
    pub(super) cancelling: bool,
    pub(super) run_id: Option<RunId>,
    pub(super) next_run_id: RunId,
    /// Prompt of the foreground run in flight.
    pub(super) in_flight: Option<String>,
    pub(super) queue: PromptQueue,
    pub(super) queue_edit: Option<QueueEdit>,
    pub(super) history: PromptHistory,
    pub(super) editor: Editor,
    pub(super) retry: RetryGovernor,
    pub(super) compact: AutoCompact,
    pub(super) tokens: TokenTracker,
    pub(super) conversation: Vec<Message>,
    pub(super) conversation_epoch: u64,
    pub(super) pending_permissions: VecDeque<PermissionRequest>,
    pub(super) registry: Arc<BackgroundRegistry>,
    pub(super) next_background_id: u64,
    pub(super) viewport: (u16, u16),
    pub(super) should_quit: bool,
}

impl SessionState {
    pub fn new(config: &Config, registry: Arc<BackgroundRegistry>) -> Self {
        Self {
            mode: Mode::default(),
            overlay: None,
            content: Vec::new(),
            agent_running: false,
            cancelling: false,
            run_id: None,
            next_run_id: 1,
            in_flight: None,
            queue: PromptQueue::new(),
            queue_edit: None,
            history: PromptHistory::new(),
            editor: Editor::new(),
            retry: RetryGovernor::new(RetryPolicy::from(&config.retry)),
            compact: AutoCompact::new(&config.compaction),
            tokens: TokenTracker::new(),
            conversation: Vec::new(),
            conversation_epoch: 0,
            pending_permissions: VecDeque::new(),
            registry,
            next_background_id: 1,
            viewport: (80, 24),
            should_quit: false,
        }
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn overlay(&self) -> Option<&Overlay> {
        self.overlay.as_ref()
    }

    pub fn content(&self) -> &[ContentEntry] {
        &self.content
    }

    pub fn is_agent_running(&self) -> bool {
        self.agent_running
    }

    /// Id of the foreground run, while one is active.
    pub fn current_run(&self) -> Option<RunId> {
        self.agent_running.then_some(self.run_id).flatten()
    }

    pub fn is_compacting(&self) -> bool {
        self.compact.is_compacting()
    }

    pub fn is_retry_pending(&self) -> bool {
        self.retry.is_pending()
    }

    /// A new prompt cannot start right now.
    pub fn is_busy(&self) -> bool {
        self.agent_running || self.compact.is_compacting() || self.retry.is_pending()
    }

    /// Nothing running and nothing waiting.
    pub fn is_idle(&self) -> bool {
        !self.is_busy() && self.queue.is_empty()
    }

    pub fn queue(&self) -> &PromptQueue {
        &self.queue
    }

    pub fn history(&self) -> &PromptHistory {
        &self.history
    }

    pub fn editor(&self) -> &super::editor::Editor {
        &self.editor
    }

    pub fn conversation(&self) -> &[Message] {
        &self.conversation
    }

    /// Bumped every time compaction replaces the conversation.
    pub fn conversation_epoch(&self) -> u64 {
        self.conversation_epoch
    }

    pub fn tokens(&self) -> &TokenTracker {
        &self.tokens
    }

    pub fn retry_count(&self) -> u32 {
        self.retry.count()
    }

    pub fn registry(&self) -> &Arc<BackgroundRegistry> {
        &self.registry
    }

    pub fn pending_permissions(&self) -> usize {
        self.pending_permissions.len()
    }

    pub fn viewport(&self) -> (u16, u16) {
        self.viewport
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn status(&self) -> StatusSnapshot {
        self.status_at(Instant::now())
    }

    pub fn status_at(&self, now: Instant) -> StatusSnapshot {
        let permission_prompt = match &self.overlay {
            Some(Overlay::Approval(request)) => Some(request.prompt_text()),
            _ => None,
        };
        StatusSnapshot {
            mode: self.mode.label(),
            agent_running: self.agent_running,
            compacting: self.compact.is_compacting(),
            queued: self.queue.len(),
            total_input_tokens: self.tokens.total_input_tokens,
            total_output_tokens: self.tokens.total_output_tokens,
            context_tokens: self.tokens.context_tokens(),
            saved_tokens: self.tokens.saved_tokens(),
            background_running: self.registry.running_count(),
            background_total: self.registry.count(),
            retry_in: self.retry.remaining(now),
            retry_attempt: self.retry.count(),
            permission_prompt,
        }
    }

    pub(super) fn push_notice(&mut self, text: impl Into<String>) {
        self.content.push(ContentEntry::Notice(text.into()));
    }

    pub(super) fn push_error(&mut self, text: impl Into<String>) {
        self.content.push(ContentEntry::Error(text.into()));
    }

    /// Apply `f` to the streaming assistant turn, opening one if needed.
    pub(super) fn with_turn(&mut self, f: impl FnOnce(&mut AssistantTurn)) {
        let open = matches!(self.content.last(), Some(ContentEntry::Assistant(turn)) if !turn.done);
        if !open {
            self.content
                .push(ContentEntry::Assistant(AssistantTurn::default()));
        }
        if let Some(ContentEntry::Assistant(turn)) = self.content.last_mut() {
            f(turn);
        }
    }

    /// Close every streaming assistant turn.
    pub(super) fn finish_turns(&mut self) {
        for entry in self.content.iter_mut().rev() {
            if let ContentEntry::Assistant(turn) = entry {
                if turn.done {
                    break;
                }
                turn.done = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_deltas_merge_and_tools_interleave() {
        let mut turn = AssistantTurn::default();
        turn.push_text("Hel");
        turn.push_text("lo");
        turn.start_tool("c1".into(), "shell".into(), "{}".into());
        turn.tool_progress("c1", "partial ");
        turn.tool_progress("c1", "output");
        turn.push_text(" done");
        turn.finish_tool("c1", "final".into(), true);
        assert_eq!(turn.blocks.len(), 3);
        assert_eq!(turn.text(), "Hello done");
        match &turn.blocks[1] {
            AssistantBlock::ToolCall(call) => {
                assert_eq!(call.output, "final");
                assert_eq!(call.status, ToolStatus::Failed);
            }
            other => panic!("expected tool call, got {other:?}"),
        }
    }

    #[test]
    fn unknown_tool_progress_is_ignored() {
        let mut turn = AssistantTurn::default();
        turn.tool_progress("ghost", "x");
        assert!(turn.blocks.is_empty());
    }

    #[test]
    fn status_reflects_state() {
        let state = SessionState::new(&Config::default(), Arc::new(BackgroundRegistry::new()))
            .with_mode(Mode::Plan);
        let status = state.status();
        assert_eq!(status.mode, "plan");
        assert_eq!(status.queued, 0);
        assert_eq!(status.retry_in, None);
        assert!(state.is_idle());
    }

    #[test]
    fn mode_toggles() {
        assert_eq!(Mode::Edit.toggled(), Mode::Plan);
        assert_eq!(Mode::Plan.toggled().label(), "edit");
    }
}
