//! Commands read from stdin.

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, bail};

use reelpress_core::ExecutionMode;

/// Help text printed at startup and for `help`.
pub const HELP: &str = "\
commands:
  start               start recording
  stop                stop recording and convert
  mode single|multi   reload the engine in the given mode
  reload              retry loading the engine
  status              print a status snapshot
  save <path>         write the last converted artifact
  metrics             print prometheus metrics
  help                show this help
  quit                stop and exit";

/// A parsed terminal command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    Mode(ExecutionMode),
    Reload,
    Status,
    Save(PathBuf),
    Metrics,
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.split_whitespace();
        let Some(name) = parts.next() else {
            bail!("empty command");
        };
        let arg = parts.next();
        if parts.next().is_some() {
            bail!("too many arguments for '{}'", name);
        }

        let command = match (name.to_ascii_lowercase().as_str(), arg) {
            ("start", None) => Command::Start,
            ("stop", None) => Command::Stop,
            ("mode", Some(mode)) => Command::Mode(parse_mode(mode)?),
            ("mode", None) => bail!("usage: mode single|multi"),
            ("reload", None) => Command::Reload,
            ("status", None) => Command::Status,
            ("save", Some(path)) => Command::Save(PathBuf::from(path)),
            ("save", None) => bail!("usage: save <path>"),
            ("metrics", None) => Command::Metrics,
            ("help" | "?", None) => Command::Help,
            ("quit" | "exit", None) => Command::Quit,
            (other, Some(_)) if is_known(other) => bail!("'{}' takes no argument", other),
            (other, _) => bail!("unknown command '{}'", other),
        };

        Ok(command)
    }
}

fn parse_mode(mode: &str) -> anyhow::Result<ExecutionMode> {
    match mode.to_ascii_lowercase().as_str() {
        "single" | "single-thread" | "st" => Ok(ExecutionMode::SingleThread),
        "multi" | "multi-thread" | "mt" => Ok(ExecutionMode::MultiThread),
        other => Err(anyhow!("unknown mode '{}', expected single or multi", other)),
    }
}

fn is_known(name: &str) -> bool {
    matches!(
        name,
        "start" | "stop" | "reload" | "status" | "metrics" | "help" | "?" | "quit" | "exit"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!("start".parse::<Command>().unwrap(), Command::Start);
        assert_eq!("  STOP ".parse::<Command>().unwrap(), Command::Stop);
        assert_eq!("status".parse::<Command>().unwrap(), Command::Status);
        assert_eq!("reload".parse::<Command>().unwrap(), Command::Reload);
        assert_eq!("metrics".parse::<Command>().unwrap(), Command::Metrics);
        assert_eq!("exit".parse::<Command>().unwrap(), Command::Quit);
        assert_eq!("?".parse::<Command>().unwrap(), Command::Help);
    }

    #[test]
    fn test_parse_mode() {
        assert_eq!(
            "mode multi".parse::<Command>().unwrap(),
            Command::Mode(ExecutionMode::MultiThread)
        );
        assert_eq!(
            "mode single-thread".parse::<Command>().unwrap(),
            Command::Mode(ExecutionMode::SingleThread)
        );
        assert!("mode".parse::<Command>().is_err());
        assert!("mode quad".parse::<Command>().is_err());
    }

    #[test]
    fn test_parse_save() {
        let command = assert_ok!("save out/clip.mp4".parse::<Command>());
        assert_eq!(command, Command::Save(PathBuf::from("out/clip.mp4")));
        assert_err!("save".parse::<Command>());
    }

    #[test]
    fn test_parse_errors() {
        assert!("".parse::<Command>().is_err());
        assert!("record".parse::<Command>().is_err());

        let err = "start now".parse::<Command>().unwrap_err();
        assert!(err.to_string().contains("takes no argument"));

        let err = "save a b".parse::<Command>().unwrap_err();
        assert!(err.to_string().contains("too many arguments"));
    }
}
