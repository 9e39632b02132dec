//! External player backend
//!
//! Pipes each utterance as a WAV file into a player's stdin and waits for
//! the player to exit. The default `aplay -q -` comes with alsa-utils;
//! `paplay` or `pw-play -` work the same way.

use crate::audio::{encode_wav, PcmAudio, PlaybackSink};
use crate::{Result, VvspeakError};
use log::{debug, error};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Default player command line
pub const DEFAULT_PLAYER_COMMAND: &str = "aplay -q -";

/// Player run as a child process per utterance
#[derive(Debug, Clone)]
pub struct CommandSink {
    program: String,
    args: Vec<String>,
}

impl CommandSink {
    /// Parse a whitespace-separated command line
    pub fn new(command_line: &str) -> Result<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| VvspeakError::Config("Player command is empty".to_string()))?;

        Ok(Self {
            program,
            args: parts.collect(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Check that the player program exists
    pub fn probe(&self) -> Result<PathBuf> {
        find_program(&self.program).ok_or_else(|| {
            VvspeakError::Playback(format!("Player '{}' not found in PATH", self.program))
        })
    }
}

/// Resolve `program` the way a shell would
fn find_program(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }

    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|p| p.is_file())
}

impl PlaybackSink for CommandSink {
    fn play(&mut self, audio: &PcmAudio) -> Result<()> {
        let wav = encode_wav(audio)?;
        debug!(
            "Playing {:.2}s via {} ({} bytes)",
            audio.duration().as_secs_f64(),
            self.program,
            wav.len()
        );

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                error!("Failed to spawn {}: {}", self.program, e);
                VvspeakError::Playback(format!("Failed to start {}: {}", self.program, e))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            // A player that exits early closes the pipe; its exit status says why
            if let Err(e) = stdin.write_all(&wav) {
                if e.kind() != ErrorKind::BrokenPipe {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(VvspeakError::Playback(format!(
                        "Failed to write audio to {}: {}",
                        self.program, e
                    )));
                }
            }
        }

        let output = child.wait_with_output().map_err(|e| {
            VvspeakError::Playback(format!("Failed to wait for {}: {}", self.program, e))
        })?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(VvspeakError::Playback(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn audio() -> PcmAudio {
        PcmAudio {
            samples: vec![0, 1, 2, 3],
            sample_rate: 24_000,
            channels: 1,
        }
    }

    #[test]
    fn test_parse_command_line() {
        let sink = CommandSink::new("aplay  -q -").unwrap();
        assert_eq!(sink.program(), "aplay");
        assert_eq!(sink.args, ["-q".to_string(), "-".to_string()]);
    }

    #[test]
    fn test_empty_command_line() {
        assert!(matches!(CommandSink::new("   "), Err(VvspeakError::Config(_))));
    }

    #[test]
    fn test_probe_missing_program() {
        let sink = CommandSink::new("no-such-player-vvspeak -").unwrap();
        assert!(matches!(sink.probe(), Err(VvspeakError::Playback(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_play_through_cat() {
        let mut sink = CommandSink::new("cat").unwrap();
        assert!(sink.probe().is_ok());
        sink.play(&audio()).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_player_is_playback_error() {
        let mut sink = CommandSink::new("false").unwrap();
        match sink.play(&audio()) {
            Err(VvspeakError::Playback(msg)) => assert!(msg.contains("false")),
            other => panic!("expected playback error, got {:?}", other),
        }
    }
}
