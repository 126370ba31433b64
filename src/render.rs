//! Line-oriented terminal renderer.
//!
//! Prints each transcript entry once it is complete, the open overlay when
//! it changes, and the retry countdown. Suitable for plain stdout and for
//! tests writing into a buffer. In raw mode it also keeps the draft on the
//! last line, redrawn after every update.

use crate::session::overlay::describe;
use crate::session::{
    AssistantBlock, AssistantTurn, ContentEntry, SessionRenderer, SessionState, ToolStatus,
};
use crossterm::style::Stylize;
use crossterm::terminal::{Clear, ClearType};
use crossterm::QueueableCommand;
use std::io::{self, Write};

/// Renders session state as appended lines of text.
pub struct PlainRenderer<W: Write + Send> {
    out: W,
    color: bool,
    printed: usize,
    overlay: Vec<String>,
    retry_secs: Option<u64>,
    raw: bool,
}

impl<W: Write + Send> PlainRenderer<W> {
    pub fn new(out: W, color: bool) -> Self {
        Self {
            out,
            color,
            printed: 0,
            overlay: Vec::new(),
            retry_secs: None,
            raw: false,
        }
    }

    /// Terminal is in raw mode: emit `\r\n` and keep a live draft line.
    pub fn with_raw_mode(mut self, raw: bool) -> Self {
        self.raw = raw;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn draw(&mut self, state: &SessionState) -> io::Result<()> {
        self.clear_draft()?;
        let content = state.content();
        if content.len() < self.printed {
            // Transcript was cleared.
            self.printed = 0;
        }
        while let Some(entry) = content.get(self.printed) {
            if !entry.is_complete() {
                break;
            }
            self.write_entry(entry)?;
            self.printed += 1;
        }

        let overlay = describe(state);
        if overlay != self.overlay {
            for line in &overlay {
                let line = if self.color {
                    line.clone().yellow().to_string()
                } else {
                    line.clone()
                };
                self.line(&line)?;
            }
            self.overlay = overlay;
        }

        let status = state.status();
        let retry_secs = status.retry_in.map(|left| left.as_secs_f32().ceil() as u64);
        if retry_secs != self.retry_secs {
            if let Some(secs) = retry_secs {
                self.write_dim(&format!("retrying in {secs}s..."))?;
            }
            self.retry_secs = retry_secs;
        }
        if self.raw && state.overlay().is_none() {
            let draft = state.editor().text().replace('\n', " / ");
            write!(self.out, "{}> {draft}", state.mode().label())?;
        }
        self.out.flush()
    }

    /// Wipe the draft line so output continues from column 0.
    fn clear_draft(&mut self) -> io::Result<()> {
        if self.raw {
            self.out.queue(Clear(ClearType::CurrentLine))?;
            write!(self.out, "\r")?;
        }
        Ok(())
    }

    fn line(&mut self, text: &str) -> io::Result<()> {
        let end = if self.raw { "\r\n" } else { "\n" };
        write!(self.out, "{text}{end}")
    }

    fn write_entry(&mut self, entry: &ContentEntry) -> io::Result<()> {
        match entry {
            ContentEntry::User(text) => {
                let line = format!("> {text}");
                if self.color {
                    self.line(&line.bold().to_string())
                } else {
                    self.line(&line)
                }
            }
            ContentEntry::Assistant(turn) => self.write_turn(turn),
            ContentEntry::Notice(text) => self.write_dim(text),
            ContentEntry::Error(text) => {
                let line = format!("error: {text}");
                if self.color {
                    self.line(&line.red().to_string())
                } else {
                    self.line(&line)
                }
            }
        }
    }

    fn write_turn(&mut self, turn: &AssistantTurn) -> io::Result<()> {
        for block in &turn.blocks {
            match block {
                AssistantBlock::Text(text) => {
                    for line in text.trim_end().lines() {
                        self.line(line)?;
                    }
                }
                AssistantBlock::Thinking(text) => {
                    self.write_dim(&format!("thinking: {}", text.trim()))?
                }
                AssistantBlock::ToolCall(call) => {
                    let header = format!("* {} {}", call.name, call.arguments);
                    let header = match (self.color, call.status) {
                        (false, _) => header,
                        (true, ToolStatus::Failed) => header.red().to_string(),
                        (true, _) => header.cyan().to_string(),
                    };
                    self.line(&header)?;
                    for line in call.output.lines() {
                        self.write_dim(&format!("  {line}"))?;
                    }
                }
            }
        }
        Ok(())
    }

    fn write_dim(&mut self, text: &str) -> io::Result<()> {
        if self.color {
            self.line(&text.dark_grey().to_string())
        } else {
            self.line(text)
        }
    }
}

impl<W: Write + Send> SessionRenderer for PlainRenderer<W> {
    fn render(&mut self, state: &SessionState) {
        if let Err(err) = self.draw(state) {
            tracing::debug!(%err, "render failed");
        }
    }

    fn finish(&mut self, state: &SessionState) {
        self.render(state);
        let status = state.status();
        let summary = format!(
            "tokens: {} in / {} out, context {}, saved {}",
            status.total_input_tokens,
            status.total_output_tokens,
            status.context_tokens,
            status.saved_tokens
        );
        let written = self.clear_draft().and_then(|()| self.write_dim(&summary));
        if let Err(err) = written.and_then(|()| self.out.flush()) {
            tracing::debug!(%err, "render failed");
        }
    }
}
