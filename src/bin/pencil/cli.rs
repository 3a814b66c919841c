use pencil_ai::Mode;

#[derive(Debug, PartialEq)]
pub enum CliCommand {
    Quit,
    Clear,
    SwitchMode(Mode),
    Help,
    Message(String),
}

pub fn parse_input(line: &str) -> Option<CliCommand> {
    let trimmed = line.trim();

    if trimmed.is_empty() {
        return None;
    }

    if let Some(rest) = trimmed.strip_prefix("/mode") {
        if let Ok(mode) = rest.trim().parse::<Mode>() {
            return Some(CliCommand::SwitchMode(mode));
        }
        return Some(CliCommand::Help);
    }

    match trimmed {
        "/q" | "exit" | "quit" => Some(CliCommand::Quit),
        "/c" | "clear" => Some(CliCommand::Clear),
        "/h" | "/help" => Some(CliCommand::Help),
        msg => Some(CliCommand::Message(msg.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_quit_commands() {
        assert_eq!(parse_input("/q"), Some(CliCommand::Quit));
        assert_eq!(parse_input("exit"), Some(CliCommand::Quit));
    }

    #[test]
    fn parse_clear_commands() {
        assert_eq!(parse_input("/c"), Some(CliCommand::Clear));
        assert_eq!(parse_input("clear"), Some(CliCommand::Clear));
    }

    #[test]
    fn parse_mode_switch() {
        assert_eq!(parse_input("/mode code"), Some(CliCommand::SwitchMode(Mode::Code)));
        assert_eq!(parse_input("/mode bogus"), Some(CliCommand::Help));
    }

    #[test]
    fn ignore_empty_input() {
        assert!(parse_input("").is_none());
        assert!(parse_input("   ").is_none());
    }

    #[test]
    fn everything_else_is_a_message() {
        assert_eq!(
            parse_input("  draw a cat "),
            Some(CliCommand::Message("draw a cat".to_string()))
        );
    }
}
