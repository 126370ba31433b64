//! Draft prompt editor.
//!
//! The cursor is a char index, converted to byte offsets only at the point
//! of mutation.

/// In-progress prompt text and cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Editor {
    text: String,
    cursor: usize,
}

impl Editor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// True when the cursor sits on the first line of the draft.
    pub fn on_first_line(&self) -> bool {
        !self.text.chars().take(self.cursor).any(|c| c == '\n')
    }

    /// Replace the draft; the cursor lands at the end of its first line.
    pub fn set(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.cursor = self
            .text
            .chars()
            .position(|c| c == '\n')
            .unwrap_or_else(|| self.text.chars().count());
    }

    /// Take the draft out, leaving the editor empty.
    pub fn take(&mut self) -> String {
        self.cursor = 0;
        std::mem::take(&mut self.text)
    }

    pub fn clear(&mut self) {
        self.take();
    }

    pub fn insert_char(&mut self, ch: char) {
        let byte_idx = byte_index_at_char(&self.text, self.cursor);
        self.text.insert(byte_idx, ch);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        let start = byte_index_at_char(&self.text, self.cursor - 1);
        let end = byte_index_at_char(&self.text, self.cursor);
        self.text.replace_range(start..end, "");
        self.cursor -= 1;
        true
    }

    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        if self.cursor < self.text.chars().count() {
            self.cursor += 1;
        }
    }
}

fn byte_index_at_char(text: &str, char_idx: usize) -> usize {
    text.char_indices()
        .nth(char_idx)
        .map(|(idx, _)| idx)
        .unwrap_or(text.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_backspace_handle_multibyte() {
        let mut editor = Editor::new();
        for ch in "héllo".chars() {
            editor.insert_char(ch);
        }
        editor.move_left();
        editor.move_left();
        editor.move_left();
        assert!(editor.backspace());
        assert_eq!(editor.text(), "hllo");
        assert_eq!(editor.cursor(), 1);
    }

    #[test]
    fn set_places_cursor_on_first_line() {
        let mut editor = Editor::new();
        editor.set("first\nsecond");
        assert_eq!(editor.cursor(), 5);
        assert!(editor.on_first_line());
        editor.move_right();
        assert!(!editor.on_first_line());
    }

    #[test]
    fn take_empties_editor() {
        let mut editor = Editor::new();
        editor.set("abc");
        assert_eq!(editor.take(), "abc");
        assert!(editor.is_empty());
        assert_eq!(editor.cursor(), 0);
        assert!(!editor.backspace());
    }
}
