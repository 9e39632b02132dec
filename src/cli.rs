//! Command line parsing

use crate::config::Config;
use crate::{Result, VvspeakError};
use std::path::PathBuf;

pub const USAGE: &str = "\
Usage: vvspeak [OPTIONS]
       vvspeak [OPTIONS] send TEXT...

Speaks every message published on the topic socket.

Options:
  --config PATH       Config file (default ~/.vvspeak.cfg)
  --engine-dir PATH   Directory searched for VOICEVOX assets
  --vvm-file NAME     Voice model file name
  --style-id N        Default style id
  --topic NAME        Topic to subscribe or publish to
  --socket-dir PATH   Directory holding topic sockets
  --stdin             Also read one message per line from stdin
  --log-file PATH     Append log output to PATH
  -d, --debug         Debug logging
  -h, --help          Show this help
  -V, --version       Show version";

/// What the process was asked to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the daemon
    Run,
    /// Publish one message and exit
    Send(String),
    Help,
    Version,
}

/// Parsed command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub command: Command,
    pub config_path: Option<PathBuf>,
    pub debug: bool,
    pub log_file: Option<PathBuf>,
    pub stdin: bool,
    /// (section, key, value) applied on top of the config file
    overrides: Vec<(&'static str, &'static str, String)>,
}

impl Options {
    /// Parse arguments, not including the program name
    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut opts = Options {
            command: Command::Run,
            config_path: None,
            debug: false,
            log_file: None,
            stdin: false,
            overrides: Vec::new(),
        };
        let mut positional: Vec<String> = Vec::new();
        let mut args = args.into_iter().map(Into::into);

        while let Some(arg) = args.next() {
            if !positional.is_empty() {
                positional.push(arg);
                continue;
            }

            let (flag, inline) = match arg.split_once('=') {
                Some((flag, value)) if flag.starts_with("--") => {
                    (flag.to_string(), Some(value.to_string()))
                }
                _ => (arg.clone(), None),
            };
            let mut value = |name: &str| -> Result<String> {
                inline
                    .clone()
                    .or_else(|| args.next())
                    .ok_or_else(|| VvspeakError::Config(format!("{} requires a value", name)))
            };

            match flag.as_str() {
                "-h" | "--help" => opts.command = Command::Help,
                "-V" | "--version" => opts.command = Command::Version,
                "-d" | "--debug" => opts.debug = true,
                "--stdin" => opts.stdin = true,
                "--config" => opts.config_path = Some(PathBuf::from(value("--config")?)),
                "--log-file" => opts.log_file = Some(PathBuf::from(value("--log-file")?)),
                "--engine-dir" => opts
                    .overrides
                    .push(("engine", "root_dir", value("--engine-dir")?)),
                "--vvm-file" => opts
                    .overrides
                    .push(("engine", "vvm_file", value("--vvm-file")?)),
                "--style-id" => opts
                    .overrides
                    .push(("engine", "style_id", value("--style-id")?)),
                "--topic" => opts.overrides.push(("bus", "topic", value("--topic")?)),
                "--socket-dir" => opts
                    .overrides
                    .push(("bus", "socket_dir", value("--socket-dir")?)),
                other if other.starts_with('-') && other.len() > 1 => {
                    return Err(VvspeakError::Config(format!("Unknown option: {}", other)))
                }
                _ => positional.push(arg),
            }
        }

        if let Some((first, rest)) = positional.split_first() {
            match first.as_str() {
                "send" if !rest.is_empty() => opts.command = Command::Send(rest.join(" ")),
                "send" => {
                    return Err(VvspeakError::Config("send requires TEXT".to_string()))
                }
                other => {
                    return Err(VvspeakError::Config(format!("Unknown command: {}", other)))
                }
            }
        }

        Ok(opts)
    }

    /// Write command line overrides into `config`
    pub fn apply(&self, config: &mut Config) {
        for (section, key, value) in &self.overrides {
            config.set(section, key, value);
        }
    }
}
