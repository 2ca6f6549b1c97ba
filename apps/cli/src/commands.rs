//! Stdin line grammar. Lines starting with `/` are commands, anything else is
//! sent to the open conversation (`//` escapes a leading slash).

use anyhow::{bail, Result};

pub const HELP: &str = "\
/register <name>  sign in as <name>
/open <peer>      open the conversation with <peer>
/close            close the open conversation
/users            show the roster
/logout           sign out and forget the saved identity
/quit             exit
<text>            send <text> to the open conversation";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    Register(String),
    Open(String),
    Close,
    Users,
    Logout,
    Help,
    Quit,
    Send(String),
}

pub fn parse(line: &str) -> Result<Option<CliCommand>> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return Ok(None);
    }
    if let Some(escaped) = line.strip_prefix("//") {
        return Ok(Some(CliCommand::Send(format!("/{escaped}"))));
    }
    let Some(command) = line.strip_prefix('/') else {
        return Ok(Some(CliCommand::Send(line.to_string())));
    };

    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (command, ""),
    };
    let parsed = match (name, arg) {
        ("register", "") | ("open", "") => bail!("/{name} needs a username"),
        ("register", user) => CliCommand::Register(user.to_string()),
        ("open", peer) => CliCommand::Open(peer.to_string()),
        ("close", _) => CliCommand::Close,
        ("users", _) => CliCommand::Users,
        ("logout", _) => CliCommand::Logout,
        ("help", _) => CliCommand::Help,
        ("quit" | "exit", _) => CliCommand::Quit,
        _ => bail!("unknown command '/{name}', try /help"),
    };
    Ok(Some(parsed))
}

#[cfg(test)]
#[path = "tests/commands_tests.rs"]
mod tests;
