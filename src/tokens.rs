//! Session token accounting.
//!
//! Cumulative totals come from the usage updates reported by the agent and
//! only ever increase. The "context" figure is the size of what the model
//! currently holds (last request's input plus output) and drops back down
//! after compaction, which is what the auto-compact trigger watches.

use crate::types::Message;

/// Token counters for one interactive session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenTracker {
    /// Running total of input tokens sent.
    pub total_input_tokens: u64,
    /// Running total of output tokens received.
    pub total_output_tokens: u64,
    /// Input tokens in the most recent request.
    pub last_input_tokens: u64,
    /// Output tokens in the most recent response.
    pub last_output_tokens: u64,
    context_tokens: u64,
    saved_tokens: u64,
}

impl TokenTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one usage update.
    pub fn record(&mut self, input_tokens: u64, output_tokens: u64) {
        self.last_input_tokens = input_tokens;
        self.last_output_tokens = output_tokens;
        self.total_input_tokens = self.total_input_tokens.saturating_add(input_tokens);
        self.total_output_tokens = self.total_output_tokens.saturating_add(output_tokens);
        self.context_tokens = input_tokens.saturating_add(output_tokens);
    }

    /// Tokens consumed across the entire session.
    pub fn session_total(&self) -> u64 {
        self.total_input_tokens
            .saturating_add(self.total_output_tokens)
    }

    /// Current context size as last reported (or estimated after compaction).
    pub fn context_tokens(&self) -> u64 {
        self.context_tokens
    }

    /// Tokens freed by compactions so far.
    pub fn saved_tokens(&self) -> u64 {
        self.saved_tokens
    }

    /// True once the context size reaches `threshold`. A zero threshold never fires.
    pub fn exceeds(&self, threshold: u64) -> bool {
        threshold > 0 && self.context_tokens >= threshold
    }

    /// Reset the context figure to the size of a compacted message set.
    pub fn apply_compaction(&mut self, compacted: &[Message]) -> u64 {
        let after = Self::estimate_messages(compacted);
        let saved = self.context_tokens.saturating_sub(after);
        self.saved_tokens = self.saved_tokens.saturating_add(saved);
        self.context_tokens = after;
        saved
    }

    /// Estimate how many tokens a set of messages would consume.
    ///
    /// Crude heuristic: ~1 token per 4 characters, plus overhead per message.
    pub fn estimate_messages(messages: &[Message]) -> u64 {
        let mut chars = 0usize;
        for msg in messages {
            chars += 16;
            chars += msg.text().len();
            for call in &msg.tool_calls {
                chars += call.name.len() + call.arguments.len();
            }
        }
        (chars / 4) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_accumulates_totals_and_tracks_context() {
        let mut tracker = TokenTracker::new();
        tracker.record(100, 20);
        tracker.record(150, 30);
        assert_eq!(tracker.total_input_tokens, 250);
        assert_eq!(tracker.total_output_tokens, 50);
        assert_eq!(tracker.session_total(), 300);
        assert_eq!(tracker.context_tokens(), 180);
    }

    #[test]
    fn zero_threshold_never_exceeds() {
        let mut tracker = TokenTracker::new();
        tracker.record(1_000_000, 0);
        assert!(!tracker.exceeds(0));
        assert!(tracker.exceeds(1_000_000));
        assert!(!tracker.exceeds(1_000_001));
    }

    #[test]
    fn compaction_lowers_context_and_records_savings() {
        let mut tracker = TokenTracker::new();
        tracker.record(5_000, 500);
        let saved = tracker.apply_compaction(&[Message::user("summary"), Message::assistant("ok")]);
        assert!(saved > 5_000);
        assert_eq!(tracker.saved_tokens(), saved);
        assert!(tracker.context_tokens() < 100);
        assert_eq!(tracker.session_total(), 5_500);
    }

    #[test]
    fn estimate_counts_overhead_per_message() {
        let messages = vec![Message::user(""), Message::user("")];
        assert_eq!(TokenTracker::estimate_messages(&messages), 8);
    }
}
