//! Line-oriented commands read from stdin, standing in for the selector and buttons of a UI.

use std::str::FromStr;

use futures::{StreamExt, future, stream};
use futures::stream::BoxStream;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::LinesStream;

use crate::vehicle::LineFilter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// `line <id>` or `line all`
    Line(LineFilter),
    Start,
    Stop,
    /// `plan <origin> -> <destination>`
    Plan { origin: String, destination: String },
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseCommandError {
    #[error("unknown command {0:?}; try line, start, stop, plan or quit")]
    Unknown(String),

    #[error("usage: plan <origin> -> <destination>")]
    PlanUsage,
}

impl FromStr for ConsoleCommand {
    type Err = ParseCommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (verb, rest) = s.split_once(char::is_whitespace).unwrap_or((s, ""));

        match verb.to_ascii_lowercase().as_str() {
            "line" => Ok(Self::Line(rest.parse().unwrap_or_default())),
            "start" => Ok(Self::Start),
            "stop" => Ok(Self::Stop),
            "plan" => {
                let (origin, destination) =
                    rest.split_once("->").ok_or(ParseCommandError::PlanUsage)?;
                Ok(Self::Plan {
                    origin: origin.trim().to_string(),
                    destination: destination.trim().to_string(),
                })
            }
            "quit" | "exit" => Ok(Self::Quit),
            _ => Err(ParseCommandError::Unknown(s.to_string())),
        }
    }
}

/// Commands typed on stdin. Blank lines are skipped.
///
/// Stays pending after EOF so a process started without a terminal keeps running.
pub fn stdin_commands() -> BoxStream<'static, Result<ConsoleCommand, ParseCommandError>> {
    let lines = LinesStream::new(BufReader::new(tokio::io::stdin()).lines());

    lines
        .take_while(|line| future::ready(line.is_ok()))
        .filter_map(|line| async move {
            let line = line.ok()?;
            (!line.trim().is_empty()).then(|| line.parse())
        })
        .chain(stream::pending())
        .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line_filter() {
        assert_eq!(
            "line L02".parse::<ConsoleCommand>(),
            Ok(ConsoleCommand::Line(LineFilter::Line("L02".to_string())))
        );
        assert_eq!("line all".parse::<ConsoleCommand>(), Ok(ConsoleCommand::Line(LineFilter::All)));
        assert_eq!("LINE".parse::<ConsoleCommand>(), Ok(ConsoleCommand::Line(LineFilter::All)));
    }

    #[test]
    fn test_parse_buttons() {
        assert_eq!(" start ".parse::<ConsoleCommand>(), Ok(ConsoleCommand::Start));
        assert_eq!("stop".parse::<ConsoleCommand>(), Ok(ConsoleCommand::Stop));
        assert_eq!("quit".parse::<ConsoleCommand>(), Ok(ConsoleCommand::Quit));
    }

    #[test]
    fn test_parse_plan() {
        assert_eq!(
            "plan Alta Vista -> Unare".parse::<ConsoleCommand>(),
            Ok(ConsoleCommand::Plan {
                origin: "Alta Vista".to_string(),
                destination: "Unare".to_string(),
            })
        );
        assert_eq!(
            "plan Alta Vista".parse::<ConsoleCommand>(),
            Err(ParseCommandError::PlanUsage)
        );
        assert!(matches!(
            "fly".parse::<ConsoleCommand>(),
            Err(ParseCommandError::Unknown(_))
        ));
    }
}
