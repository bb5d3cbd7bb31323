//! Slash command parsing for the advisor chat.
//!
//! Input starting with `/` controls the session and is never sent to the model.

/// A parsed chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// Display help information.
    Help,

    /// Exit the chat application.
    Quit,

    /// Display session statistics.
    Stats,

    /// Show the current configuration.
    ShowConfig,

    /// Reprint the conversation so far.
    History,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for slash commands.
///
/// Returns `Some(ChatCommand)` if the input is a command,
/// or `None` if it should be sent as a regular message.
///
/// # Examples
///
/// ```
/// # use smart_advisor::chat::parse_command;
/// assert!(parse_command("/quit").is_some());
/// assert!(parse_command("/history").is_some());
/// assert!(parse_command("How do I calculate CGPA?").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();
    let rest = input.strip_prefix('/')?;

    let mut parts = rest.splitn(2, char::is_whitespace);
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(str::trim).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "help" | "?" => no_argument(ChatCommand::Help, "/help", argument),
        "quit" | "exit" | "q" => ChatCommand::Quit,
        "stats" | "status" => no_argument(ChatCommand::Stats, "/stats", argument),
        "config" => no_argument(ChatCommand::ShowConfig, "/config", argument),
        "history" => no_argument(ChatCommand::History, "/history", argument),
        "" => ChatCommand::Invalid("empty command; try /help".to_string()),
        other => ChatCommand::Invalid(format!("unknown command /{other}; try /help")),
    };
    Some(result)
}

fn no_argument(command: ChatCommand, name: &str, argument: Option<&str>) -> ChatCommand {
    match argument {
        Some(_) => ChatCommand::Invalid(format!("{name} takes no arguments")),
        None => command,
    }
}

/// Returns the help text displayed by `/help`.
pub fn help_text() -> &'static str {
    r#"Ask anything about your courses, study habits or university life.

Commands:
  /help, /?          Show this help message
  /quit, /exit, /q   Exit the chat
  /stats             Show session statistics
  /config            Show the current configuration
  /history           Reprint the conversation so far

Press Ctrl+C while a reply is streaming to interrupt it."#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_quit_commands() {
        assert_eq!(parse_command("/quit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/exit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/q"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("  /QUIT  "), Some(ChatCommand::Quit));
    }

    #[test]
    fn parse_session_commands() {
        assert_eq!(parse_command("/help"), Some(ChatCommand::Help));
        assert_eq!(parse_command("/?"), Some(ChatCommand::Help));
        assert_eq!(parse_command("/stats"), Some(ChatCommand::Stats));
        assert_eq!(parse_command("/status"), Some(ChatCommand::Stats));
        assert_eq!(parse_command("/config"), Some(ChatCommand::ShowConfig));
        assert_eq!(parse_command("/history"), Some(ChatCommand::History));
    }

    #[test]
    fn unexpected_arguments() {
        assert!(matches!(
            parse_command("/stats now"),
            Some(ChatCommand::Invalid(msg)) if msg.contains("no arguments")
        ));
    }

    #[test]
    fn unknown_commands() {
        assert!(matches!(
            parse_command("/grades"),
            Some(ChatCommand::Invalid(msg)) if msg.contains("/grades")
        ));
        assert!(matches!(parse_command("/"), Some(ChatCommand::Invalid(_))));
    }

    #[test]
    fn non_commands() {
        assert!(parse_command("Hello!").is_none());
        assert!(parse_command("What is 3/4 of my credits?").is_none());
        assert!(parse_command("").is_none());
    }

    #[test]
    fn help_text_not_empty() {
        let help = help_text();
        assert!(help.contains("/quit"));
        assert!(help.contains("/history"));
    }
}
