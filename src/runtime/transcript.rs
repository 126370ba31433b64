//! Conversation persistence hook.
//!
//! The host mirrors the model-facing conversation into a [`TranscriptSink`]
//! after every reducer step: new messages are appended, and a compaction
//! (which rewrites history) replaces the stored transcript wholesale.

use crate::types::Message;
use std::io;
use std::sync::{Arc, Mutex, PoisonError};

/// Destination for the conversation transcript.
pub trait TranscriptSink: Send {
    fn replace_all(&mut self, messages: &[Message]) -> io::Result<()>;
    fn append(&mut self, messages: &[Message]) -> io::Result<()>;
}

#[derive(Debug, Default)]
struct Stored {
    messages: Vec<Message>,
    replacements: usize,
}

/// In-memory transcript. Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryTranscript {
    stored: Arc<Mutex<Stored>>,
}

impl MemoryTranscript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.stored
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .messages
            .clone()
    }

    /// How many times the transcript was rewritten by compaction.
    pub fn replacements(&self) -> usize {
        self.stored
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replacements
    }
}

impl TranscriptSink for MemoryTranscript {
    fn replace_all(&mut self, messages: &[Message]) -> io::Result<()> {
        let mut stored = self.stored.lock().unwrap_or_else(PoisonError::into_inner);
        stored.messages = messages.to_vec();
        stored.replacements += 1;
        Ok(())
    }

    fn append(&mut self, messages: &[Message]) -> io::Result<()> {
        self.stored
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .messages
            .extend_from_slice(messages);
        Ok(())
    }
}

/// Tracks how much of the conversation a sink has already seen.
#[derive(Debug, Default)]
pub(super) struct TranscriptCursor {
    epoch: u64,
    len: usize,
}

impl TranscriptCursor {
    /// Bring `sink` up to date with `conversation` at `epoch`.
    pub(super) fn sync(
        &mut self,
        sink: &mut dyn TranscriptSink,
        conversation: &[Message],
        epoch: u64,
    ) -> io::Result<()> {
        if epoch != self.epoch || conversation.len() < self.len {
            sink.replace_all(conversation)?;
        } else if conversation.len() > self.len {
            sink.append(&conversation[self.len..])?;
        }
        self.epoch = epoch;
        self.len = conversation.len();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_appends_only_new_messages() {
        let mut sink = MemoryTranscript::new();
        let mut cursor = TranscriptCursor::default();
        let mut conversation = vec![Message::user("a"), Message::assistant("b")];
        cursor.sync(&mut sink, &conversation, 0).expect("sync");
        cursor.sync(&mut sink, &conversation, 0).expect("sync");
        conversation.push(Message::user("c"));
        cursor.sync(&mut sink, &conversation, 0).expect("sync");
        assert_eq!(sink.messages(), conversation);
        assert_eq!(sink.replacements(), 0);
    }

    #[test]
    fn cursor_replaces_after_epoch_change() {
        let mut sink = MemoryTranscript::new();
        let mut cursor = TranscriptCursor::default();
        let long = vec![Message::user("a"), Message::assistant("b"), Message::user("c")];
        cursor.sync(&mut sink, &long, 0).expect("sync");
        let compacted = vec![Message::user("summary"), Message::assistant("ok")];
        cursor.sync(&mut sink, &compacted, 1).expect("sync");
        assert_eq!(sink.messages(), compacted);
        assert_eq!(sink.replacements(), 1);
    }
}
