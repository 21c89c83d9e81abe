//! Line commands read from stdin by the daemon.

use std::str::FromStr;

use crate::error::CommandParseError;
use crate::kernel::event::Command;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleInput {
    Command(Command),
    /// Report the focused tab as `(url, title)`. `None` clears it.
    Tab(Option<(String, String)>),
}

pub const HELP: &str = "\
commands:
  start <task>          begin monitoring
  stop | pause | resume
  status                print the current status
  tab <url> [title]     report the focused tab (bare `tab` clears it)
  phone mom <number>    set the escalation number
  phone me <number>     set your own number (fallback target)";

impl FromStr for ConsoleInput {
    type Err = CommandParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (head, rest) = match line.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (line, ""),
        };

        let input = match head.to_ascii_lowercase().as_str() {
            "" => return Err(CommandParseError::Empty),
            "start" => {
                if rest.is_empty() {
                    return Err(CommandParseError::MissingArgument("task"));
                }
                ConsoleInput::Command(Command::Start {
                    task: rest.to_string(),
                })
            }
            "stop" => ConsoleInput::Command(Command::Stop),
            "pause" => ConsoleInput::Command(Command::Pause),
            "resume" => ConsoleInput::Command(Command::Resume),
            "status" => ConsoleInput::Command(Command::Status),
            "tab" => {
                if rest.is_empty() {
                    ConsoleInput::Tab(None)
                } else {
                    let (url, title) = match rest.split_once(char::is_whitespace) {
                        Some((url, title)) => (url, title.trim()),
                        None => (rest, ""),
                    };
                    ConsoleInput::Tab(Some((url.to_string(), title.to_string())))
                }
            }
            "phone" => {
                let (who, number) = rest
                    .split_once(char::is_whitespace)
                    .map(|(who, number)| (who, number.trim()))
                    .unwrap_or((rest, ""));
                let number = number.to_string();
                match who.to_ascii_lowercase().as_str() {
                    "mom" => ConsoleInput::Command(Command::SetPhoneNumbers {
                        mom: Some(number),
                        yours: None,
                    }),
                    "me" | "mine" | "yours" => ConsoleInput::Command(Command::SetPhoneNumbers {
                        mom: None,
                        yours: Some(number),
                    }),
                    "" => return Err(CommandParseError::MissingArgument("mom|me")),
                    other => return Err(CommandParseError::Unknown(format!("phone {}", other))),
                }
            }
            other => return Err(CommandParseError::Unknown(other.to_string())),
        };
        Ok(input)
    }
}
