//! Slash commands typed into the prompt.

/// Parsed slash command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    Help,
    Clear,
    Quit,
    Plan,
    Edit,
    /// Toggle between edit and plan mode.
    Mode,
    Compact,
    /// Start a background task; the prompt may be empty (reported as usage).
    Background(String),
    Tasks,
    Queue,
    Cancel,
    Unknown(String),
}

/// One-line help per command, shown by `/help`.
pub const HELP_LINES: &[(&str, &str)] = &[
    ("/help", "show this help"),
    ("/clear", "clear the transcript view"),
    ("/plan", "switch to plan mode (tool approvals auto-denied)"),
    ("/edit", "switch to edit mode"),
    ("/mode", "toggle between edit and plan mode"),
    ("/compact", "summarize the conversation now"),
    ("/bg <prompt>", "run a prompt as a background task"),
    ("/tasks", "manage background tasks"),
    ("/queue", "manage queued prompts"),
    ("/cancel", "cancel the running prompt or pending retry"),
    ("/quit", "exit"),
];

/// Parse `input` if it is a slash command. Plain prompts return `None`.
pub fn parse_slash_command(input: &str) -> Option<SlashCommand> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let (command, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (trimmed, ""),
    };

    let parsed = match command {
        "/help" | "/?" => SlashCommand::Help,
        "/clear" => SlashCommand::Clear,
        "/quit" | "/exit" => SlashCommand::Quit,
        "/plan" => SlashCommand::Plan,
        "/edit" => SlashCommand::Edit,
        "/mode" => SlashCommand::Mode,
        "/compact" => SlashCommand::Compact,
        "/bg" => SlashCommand::Background(rest.to_string()),
        "/tasks" => SlashCommand::Tasks,
        "/queue" => SlashCommand::Queue,
        "/cancel" => SlashCommand::Cancel,
        _ => SlashCommand::Unknown(command.to_string()),
    };

    Some(parsed)
}

pub fn help_text() -> String {
    let width = HELP_LINES
        .iter()
        .map(|(name, _)| name.len())
        .max()
        .unwrap_or(0);
    HELP_LINES
        .iter()
        .map(|(name, about)| format!("{name:<width$}  {about}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_prompts_are_not_commands() {
        assert_eq!(parse_slash_command("fix the tests"), None);
        assert_eq!(parse_slash_command("  "), None);
    }

    #[test]
    fn background_keeps_its_prompt() {
        assert_eq!(
            parse_slash_command("/bg   write docs for queue.rs "),
            Some(SlashCommand::Background("write docs for queue.rs".into()))
        );
        assert_eq!(
            parse_slash_command("/bg"),
            Some(SlashCommand::Background(String::new()))
        );
    }

    #[test]
    fn unknown_command_keeps_name() {
        assert_eq!(
            parse_slash_command("/frobnicate now"),
            Some(SlashCommand::Unknown("/frobnicate".into()))
        );
    }

    #[test]
    fn help_lists_every_command() {
        let help = help_text();
        assert_eq!(help.lines().count(), HELP_LINES.len());
        assert!(help.contains("/bg <prompt>"));
    }
}
