//! Token-threshold auto-compaction.
//!
//! [`AutoCompact`] is the guard: it decides when a compaction is due and
//! makes sure only one is ever in flight. The summary itself comes from the
//! agent runner; [`local_summary`] is an offline fallback that condenses the
//! transcript line by line.

use crate::config::CompactionConfig;
use crate::tokens::TokenTracker;
use crate::types::{Message, Role};

/// First line of every compacted-conversation summary message.
pub const SUMMARY_PREFIX: &str = "[conversation summary]";
/// Assistant acknowledgement that follows the summary.
pub const COMPACT_ACK: &str = "Understood. I'll continue from this summary.";

const MAX_SUMMARY_LINES: usize = 24;
const MAX_PREVIEW_CHARS: usize = 180;

/// Compaction trigger state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoCompact {
    enabled: bool,
    threshold: u64,
    compacting: bool,
    due: bool,
}

impl AutoCompact {
    pub fn new(config: &CompactionConfig) -> Self {
        Self {
            enabled: config.enabled,
            threshold: config.threshold_tokens,
            compacting: false,
            due: false,
        }
    }

    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    pub fn is_compacting(&self) -> bool {
        self.compacting
    }

    /// True when a compaction was requested but is waiting for the
    /// foreground run to finish.
    pub fn is_due(&self) -> bool {
        self.due
    }

    /// Look at fresh usage numbers; marks compaction due when the context
    /// crossed the threshold. Returns whether it is now due.
    pub fn observe(&mut self, tokens: &TokenTracker) -> bool {
        if self.enabled && !self.compacting && tokens.exceeds(self.threshold) {
            if !self.due {
                tracing::info!(
                    context = tokens.context_tokens(),
                    threshold = self.threshold,
                    "context over threshold; compaction due"
                );
            }
            self.due = true;
        }
        self.due
    }

    /// Mark a compaction requested regardless of the threshold (`/compact`).
    pub fn request(&mut self) {
        if !self.compacting {
            self.due = true;
        }
    }

    /// Forget a due compaction without running it.
    pub fn skip(&mut self) {
        self.due = false;
    }

    /// Enter the compacting state. Returns false if one is already running.
    pub fn begin(&mut self) -> bool {
        if self.compacting {
            return false;
        }
        self.compacting = true;
        self.due = false;
        true
    }

    pub fn finish(&mut self) {
        self.compacting = false;
    }
}

/// Conversation that replaces the old one once a summary is available.
pub fn compacted_conversation(summary: &str) -> Vec<Message> {
    let body = summary.trim();
    let text = if body.starts_with(SUMMARY_PREFIX) {
        body.to_string()
    } else {
        format!("{SUMMARY_PREFIX}\n{body}")
    };
    vec![Message::user(text), Message::assistant(COMPACT_ACK)]
}

/// Build a plain-text digest of `messages` without calling a model.
pub fn local_summary(messages: &[Message]) -> String {
    let mut lines = vec![SUMMARY_PREFIX.to_string()];
    lines.push("Earlier turns were compacted to free context space.".to_string());

    let mut added = 0usize;
    for message in messages {
        if added >= MAX_SUMMARY_LINES {
            break;
        }
        if let Some(line) = summary_line(message) {
            lines.push(line);
            added += 1;
        }
    }
    let summarized = messages.iter().filter(|m| summary_line(m).is_some()).count();
    if summarized > added {
        lines.push(format!(
            "... {} more message(s) omitted",
            summarized - added
        ));
    }
    lines.join("\n")
}

fn summary_line(message: &Message) -> Option<String> {
    match message.role {
        Role::System => None,
        Role::User => {
            let text = message.text().trim();
            // Nested summaries are carried forward as their body only.
            let text = text.strip_prefix(SUMMARY_PREFIX).unwrap_or(text).trim();
            (!text.is_empty()).then(|| format!("user: {}", preview(text)))
        }
        Role::Assistant => {
            let mut parts = Vec::new();
            let text = message.text().trim();
            if !text.is_empty() && text != COMPACT_ACK {
                parts.push(format!("assistant: {}", preview(text)));
            }
            let names = message
                .tool_calls
                .iter()
                .map(|call| call.name.as_str())
                .collect::<Vec<_>>();
            if !names.is_empty() {
                parts.push(format!("assistant tools: {}", preview(&names.join(", "))));
            }
            (!parts.is_empty()).then(|| parts.join(" | "))
        }
        Role::Tool => {
            let id = message.tool_call_id.as_deref().unwrap_or("<unknown>");
            Some(format!("tool ({id}): {}", preview(message.text())))
        }
    }
}

fn preview(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= MAX_PREVIEW_CHARS {
        return trimmed.to_string();
    }
    let prefix = trimmed
        .chars()
        .take(MAX_PREVIEW_CHARS.saturating_sub(3))
        .collect::<String>();
    format!("{prefix}...")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ToolCall;

    fn config(threshold: u64) -> CompactionConfig {
        CompactionConfig {
            enabled: true,
            threshold_tokens: threshold,
        }
    }

    fn tokens(context: u64) -> TokenTracker {
        let mut tracker = TokenTracker::new();
        tracker.record(context, 0);
        tracker
    }

    #[test]
    fn observe_marks_due_at_threshold() {
        let mut trigger = AutoCompact::new(&config(100));
        assert!(!trigger.observe(&tokens(99)));
        assert!(trigger.observe(&tokens(100)));
        assert!(trigger.is_due());
    }

    #[test]
    fn disabled_trigger_never_fires() {
        let mut trigger = AutoCompact::new(&CompactionConfig {
            enabled: false,
            threshold_tokens: 10,
        });
        assert!(!trigger.observe(&tokens(1_000)));
    }

    #[test]
    fn begin_is_guarded() {
        let mut trigger = AutoCompact::new(&config(100));
        trigger.observe(&tokens(500));
        assert!(trigger.begin());
        assert!(!trigger.is_due());
        // Further usage while compacting must not queue a second run.
        assert!(!trigger.observe(&tokens(900)));
        assert!(!trigger.begin());
        trigger.finish();
        assert!(!trigger.is_compacting());
        assert!(trigger.begin());
    }

    #[test]
    fn compacted_conversation_has_summary_and_ack() {
        let conversation = compacted_conversation("user asked about parsers");
        assert_eq!(conversation.len(), 2);
        assert_eq!(
            conversation[0].text(),
            "[conversation summary]\nuser asked about parsers"
        );
        assert_eq!(conversation[1].text(), COMPACT_ACK);
    }

    #[test]
    fn local_summary_lists_turns() {
        let mut call = Message::assistant("");
        call.tool_calls.push(ToolCall {
            id: "c1".into(),
            name: "read_file".into(),
            arguments: "{}".into(),
        });
        let summary = local_summary(&[
            Message::system("ignored"),
            Message::user("fix the bug"),
            call,
            Message::tool_result("c1", "fn main() {}"),
            Message::assistant("done"),
        ]);
        let lines = summary.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], SUMMARY_PREFIX);
        assert!(lines.contains(&"user: fix the bug"));
        assert!(lines.contains(&"assistant tools: read_file"));
        assert!(lines.contains(&"tool (c1): fn main() {}"));
        assert!(lines.contains(&"assistant: done"));
        assert!(!summary.contains("ignored"));
    }

    #[test]
    fn local_summary_caps_line_count() {
        let messages = (0..40)
            .map(|i| Message::user(format!("turn {i}")))
            .collect::<Vec<_>>();
        let summary = local_summary(&messages);
        assert!(summary.ends_with("... 16 more message(s) omitted"), "{summary}");
    }

    #[test]
    fn previews_truncate_long_text() {
        let long = "x".repeat(400);
        let line = preview(&long);
        assert_eq!(line.chars().count(), MAX_PREVIEW_CHARS);
        assert!(line.ends_with("..."));
    }
}
