//! Prompt queue and submission history.
//!
//! The queue holds prompts typed while the session was busy and hands them
//! out strictly first-in first-out. History records what was actually
//! submitted, in submission order, and supports up/down recall with the
//! in-progress draft preserved.

use std::collections::VecDeque;

/// FIFO of prompts waiting for the session to go idle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptQueue {
    items: VecDeque<String>,
}

impl PromptQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, prompt: impl Into<String>) {
        self.items.push_back(prompt.into());
    }

    /// Remove and return the oldest prompt.
    pub fn pop_front(&mut self) -> Option<String> {
        self.items.pop_front()
    }

    /// Replace the prompt at `index` in place. Out of range is a no-op.
    pub fn replace(&mut self, index: usize, prompt: impl Into<String>) -> bool {
        match self.items.get_mut(index) {
            Some(slot) => {
                *slot = prompt.into();
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, index: usize) -> Option<String> {
        self.items.remove(index)
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.items.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(String::as_str)
    }
}

/// Submitted prompts plus the recall cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptHistory {
    entries: Vec<String>,
    /// `None` while not browsing.
    index: Option<usize>,
    saved_draft: String,
}

impl PromptHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one submission. Resets any in-progress browsing.
    pub fn push(&mut self, entry: impl Into<String>) {
        self.entries.push(entry.into());
        self.reset_navigation();
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn is_browsing(&self) -> bool {
        self.index.is_some()
    }

    /// Step toward older entries, saving `draft` when browsing starts.
    ///
    /// Returns the entry to show, or `None` when there is nothing to recall.
    pub fn previous(&mut self, draft: &str) -> Option<&str> {
        if self.entries.is_empty() {
            return None;
        }
        let idx = match self.index {
            Some(idx) => idx.saturating_sub(1),
            None => {
                self.saved_draft = draft.to_string();
                self.entries.len() - 1
            }
        };
        self.index = Some(idx);
        self.entries.get(idx).map(String::as_str)
    }

    /// Step toward newer entries. Past the newest, the saved draft comes back
    /// and browsing ends. Returns `None` when not browsing.
    pub fn next(&mut self) -> Option<String> {
        let idx = self.index?;
        if idx + 1 < self.entries.len() {
            self.index = Some(idx + 1);
            return self.entries.get(idx + 1).cloned();
        }
        self.index = None;
        Some(std::mem::take(&mut self.saved_draft))
    }

    /// Stop browsing without touching the editor.
    pub fn reset_navigation(&mut self) {
        self.index = None;
        self.saved_draft.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_is_fifo() {
        let mut queue = PromptQueue::new();
        for p in ["a", "b", "c"] {
            queue.push(p);
        }
        assert_eq!(queue.iter().collect::<Vec<_>>(), ["a", "b", "c"]);
        assert_eq!(queue.pop_front().as_deref(), Some("a"));
        assert_eq!(queue.pop_front().as_deref(), Some("b"));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn replace_in_place_keeps_order() {
        let mut queue = PromptQueue::new();
        queue.push("a");
        queue.push("b");
        assert!(queue.replace(1, "B"));
        assert!(!queue.replace(5, "x"));
        assert_eq!(queue.iter().collect::<Vec<_>>(), ["a", "B"]);
        assert_eq!(queue.remove(0).as_deref(), Some("a"));
        assert_eq!(queue.remove(3), None);
    }

    #[test]
    fn previous_clamps_at_oldest_and_saves_draft() {
        let mut history = PromptHistory::new();
        history.push("one");
        history.push("two");
        assert_eq!(history.previous("draft"), Some("two"));
        assert_eq!(history.previous("ignored"), Some("one"));
        assert_eq!(history.previous("ignored"), Some("one"));
        assert_eq!(history.index(), Some(0));
        assert_eq!(history.next().as_deref(), Some("two"));
        assert_eq!(history.next().as_deref(), Some("draft"));
        assert!(!history.is_browsing());
        assert_eq!(history.next(), None);
    }

    #[test]
    fn previous_on_empty_history_is_noop() {
        let mut history = PromptHistory::new();
        assert_eq!(history.previous("draft"), None);
        assert!(!history.is_browsing());
    }

    #[test]
    fn push_resets_browsing() {
        let mut history = PromptHistory::new();
        history.push("one");
        history.previous("d");
        history.push("two");
        assert!(!history.is_browsing());
        assert_eq!(history.entries(), ["one", "two"]);
    }

    #[cfg(feature = "fuzz-tests")]
    mod fuzz {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn drain_order_matches_enqueue_order(prompts in proptest::collection::vec("[a-z]{1,8}", 0..32)) {
                let mut queue = PromptQueue::new();
                for p in &prompts {
                    queue.push(p.clone());
                }
                let drained = std::iter::from_fn(|| queue.pop_front()).collect::<Vec<_>>();
                prop_assert_eq!(drained, prompts);
            }
        }
    }
}
