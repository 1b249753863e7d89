#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    Help,
    Clear,
    Export,
    /// Copy code block `n` (1-based) of the latest reply, or the whole reply.
    Copy(Option<usize>),
    /// Save code block `n` (1-based, default 1) of the latest reply.
    Save(Option<usize>),
    Quit,
    Invalid { command: String, usage: &'static str },
    Unknown(String),
}

pub const HELP_TEXT: &str =
    "Commands: /help, /clear, /export, /copy [n], /save [n], /quit";

pub fn parse_slash_command(input: &str) -> Option<SlashCommand> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let mut words = trimmed.split_whitespace();
    let command = words.next().unwrap_or(trimmed).to_string();
    let argument = words.next();

    let parsed = match command.as_str() {
        "/help" => SlashCommand::Help,
        "/clear" => SlashCommand::Clear,
        "/export" => SlashCommand::Export,
        "/copy" => match parse_block_number(argument) {
            Ok(block) => SlashCommand::Copy(block),
            Err(()) => SlashCommand::Invalid {
                command,
                usage: "/copy [n] where n is a code block number starting at 1",
            },
        },
        "/save" => match parse_block_number(argument) {
            Ok(block) => SlashCommand::Save(block),
            Err(()) => SlashCommand::Invalid {
                command,
                usage: "/save [n] where n is a code block number starting at 1",
            },
        },
        "/quit" | "/exit" => SlashCommand::Quit,
        _ => SlashCommand::Unknown(command),
    };

    Some(parsed)
}

fn parse_block_number(argument: Option<&str>) -> Result<Option<usize>, ()> {
    match argument {
        None => Ok(None),
        Some(raw) => match raw.parse::<usize>() {
            Ok(number) if number > 0 => Ok(Some(number)),
            _ => Err(()),
        },
    }
}
