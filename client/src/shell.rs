//! Line-oriented command parsing for the terminal UI.

use std::str::FromStr;
use thiserror::Error;

/// Help text listing every command
pub const HELP: &str = "\
Commands:
  add <title>    create a todo
  toggle <id>    flip a todo between open and completed
  rm <id>        delete a todo (alias: delete)
  refresh        fetch the list again
  list           show the list (alias: ls)
  help           show this help
  quit           leave (alias: exit)";

/// A parsed user command
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// `add <title>`
    Add(String),
    /// `toggle <id>`
    Toggle(i64),
    /// `rm <id>` / `delete <id>`
    Remove(i64),
    /// `refresh`
    Refresh,
    /// `list` / `ls`
    List,
    /// `help`
    Help,
    /// `quit` / `exit`
    Quit,
}

/// Errors from parsing a command line
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Blank line
    #[error("empty command")]
    Empty,

    /// First word is not a known command
    #[error("unknown command `{0}` (try `help`)")]
    Unknown(String),

    /// Command needs an argument that was not given
    #[error("`{command}` needs {argument}")]
    MissingArgument {
        /// Command name
        command: &'static str,
        /// Description of the missing argument
        argument: &'static str,
    },

    /// Argument is not a todo id
    #[error("`{0}` is not a todo id")]
    InvalidId(String),
}

fn parse_id(command: &'static str, rest: &str) -> Result<i64, CommandError> {
    if rest.is_empty() {
        return Err(CommandError::MissingArgument {
            command,
            argument: "a todo id",
        });
    }
    rest.parse()
        .map_err(|_| CommandError::InvalidId(rest.to_string()))
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(word, rest)| (word, rest.trim()));

        match word.to_ascii_lowercase().as_str() {
            "" => Err(CommandError::Empty),
            "add" if rest.is_empty() => Err(CommandError::MissingArgument {
                command: "add",
                argument: "a title",
            }),
            "add" => Ok(Self::Add(rest.to_string())),
            "toggle" => parse_id("toggle", rest).map(Self::Toggle),
            "rm" | "delete" => parse_id("rm", rest).map(Self::Remove),
            "refresh" => Ok(Self::Refresh),
            "list" | "ls" => Ok(Self::List),
            "help" | "?" => Ok(Self::Help),
            "quit" | "exit" => Ok(Self::Quit),
            _ => Err(CommandError::Unknown(word.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands_and_aliases() {
        assert_eq!("add buy milk".parse(), Ok(Command::Add("buy milk".into())));
        assert_eq!("  toggle 3 ".parse(), Ok(Command::Toggle(3)));
        assert_eq!("rm 5".parse(), Ok(Command::Remove(5)));
        assert_eq!("delete -12".parse(), Ok(Command::Remove(-12)));
        assert_eq!("ls".parse(), Ok(Command::List));
        assert_eq!("REFRESH".parse(), Ok(Command::Refresh));
        assert_eq!("exit".parse(), Ok(Command::Quit));
    }

    #[test]
    fn add_keeps_inner_whitespace() {
        assert_eq!(
            "add   walk  the dog  ".parse(),
            Ok(Command::Add("walk  the dog".into()))
        );
    }

    #[test]
    fn reports_bad_input() {
        assert_eq!("".parse::<Command>(), Err(CommandError::Empty));
        assert_eq!(
            "frobnicate".parse::<Command>(),
            Err(CommandError::Unknown("frobnicate".into()))
        );
        assert_eq!(
            "toggle".parse::<Command>(),
            Err(CommandError::MissingArgument {
                command: "toggle",
                argument: "a todo id"
            })
        );
        assert_eq!(
            "rm five".parse::<Command>(),
            Err(CommandError::InvalidId("five".into()))
        );
        assert!(matches!(
            "add   ".parse::<Command>(),
            Err(CommandError::MissingArgument { command: "add", .. })
        ));
    }
}
