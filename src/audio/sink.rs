//! Playback sink abstraction
//!
//! A sink plays one utterance and returns only once it has finished, so the
//! next utterance can never overlap it.

use super::PcmAudio;
use crate::{Result, VvspeakError};
use log::{debug, info, warn};
use std::str::FromStr;

/// Blocking audio output
pub trait PlaybackSink {
    /// Play `audio`, returning after playback has completed
    fn play(&mut self, audio: &PcmAudio) -> Result<()>;
}

impl<S: PlaybackSink + ?Sized> PlaybackSink for Box<S> {
    fn play(&mut self, audio: &PcmAudio) -> Result<()> {
        (**self).play(audio)
    }
}

/// Which playback backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackBackend {
    /// Output device if compiled in and present, else the external command
    #[default]
    Auto,
    /// Default output device via cpal
    Device,
    /// External player fed WAV on stdin
    Command,
}

impl FromStr for PlaybackBackend {
    type Err = VvspeakError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(PlaybackBackend::Auto),
            "device" => Ok(PlaybackBackend::Device),
            "command" => Ok(PlaybackBackend::Command),
            other => Err(VvspeakError::Config(format!(
                "Unknown playback backend '{}' (expected auto, device or command)",
                other
            ))),
        }
    }
}

/// Create a playback sink
///
/// **auto:**
/// 1. Output device (only with the `device` feature), falling back to the
///    player command for utterances the device cannot play
/// 2. External command (`player_command`)
pub fn create_sink(
    backend: PlaybackBackend,
    player_command: &str,
) -> Result<Box<dyn PlaybackSink>> {
    match backend {
        PlaybackBackend::Device => device_sink(),
        PlaybackBackend::Command => command_sink(player_command),
        PlaybackBackend::Auto => {
            match device_sink() {
                Ok(device) => {
                    let sink: Box<dyn PlaybackSink> = match command_sink(player_command) {
                        Ok(command) => Box::new(FallbackSink::new(device, command)),
                        Err(e) => {
                            debug!("No fallback for the output device: {}", e);
                            device
                        }
                    };
                    return Ok(sink);
                }
                Err(e) => info!("✗ Output device unavailable: {}", e),
            }

            info!("Trying player command '{}'...", player_command);
            command_sink(player_command).map_err(|e| {
                VvspeakError::Playback(format!(
                    "No playback backend available. Tried:\n\
                     1. Output device (build with --features device)\n\
                     2. Player command '{}' (install: sudo apt install alsa-utils)\n\
                     Error: {}",
                    player_command, e
                ))
            })
        }
    }
}

fn command_sink(player_command: &str) -> Result<Box<dyn PlaybackSink>> {
    use super::backends::command::CommandSink;

    let sink = CommandSink::new(player_command)?;
    let path = sink.probe()?;
    info!("✓ Using player command: {} ({})", sink.program(), path.display());
    Ok(Box::new(sink))
}

/// Plays through `primary`, retrying an utterance on `secondary` if that fails
pub struct FallbackSink {
    primary: Box<dyn PlaybackSink>,
    secondary: Box<dyn PlaybackSink>,
}

impl FallbackSink {
    pub fn new(primary: Box<dyn PlaybackSink>, secondary: Box<dyn PlaybackSink>) -> Self {
        Self { primary, secondary }
    }
}

impl PlaybackSink for FallbackSink {
    fn play(&mut self, audio: &PcmAudio) -> Result<()> {
        match self.primary.play(audio) {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!("Playback failed ({}), retrying with fallback", e);
                self.secondary.play(audio)
            }
        }
    }
}

/// Sink whose backend is created lazily
///
/// A backend that cannot be created now (no device, player not installed)
/// is retried on every utterance; until then each one fails with `Playback`.
pub struct DeferredSink {
    backend: PlaybackBackend,
    player_command: String,
    inner: Option<Box<dyn PlaybackSink>>,
}

impl DeferredSink {
    /// Try to create the backend now; failing is not an error yet
    pub fn new(backend: PlaybackBackend, player_command: &str) -> Self {
        let mut sink = Self {
            backend,
            player_command: player_command.to_string(),
            inner: None,
        };
        if let Err(e) = sink.ensure() {
            warn!("No playback backend yet, utterances will fail until one is available: {}", e);
        }
        sink
    }

    pub fn is_ready(&self) -> bool {
        self.inner.is_some()
    }

    fn ensure(&mut self) -> Result<&mut Box<dyn PlaybackSink>> {
        if self.inner.is_none() {
            self.inner = Some(create_sink(self.backend, &self.player_command)?);
        }
        self.inner
            .as_mut()
            .ok_or_else(|| VvspeakError::Playback("Playback backend missing".to_string()))
    }
}

impl PlaybackSink for DeferredSink {
    fn play(&mut self, audio: &PcmAudio) -> Result<()> {
        let sink = self.ensure().map_err(|e| match e {
            VvspeakError::Playback(_) => e,
            other => VvspeakError::Playback(other.to_string()),
        })?;
        sink.play(audio)
    }
}

#[cfg(feature = "device")]
fn device_sink() -> Result<Box<dyn PlaybackSink>> {
    use super::backends::device::DeviceSink;

    let sink = DeviceSink::new()?;
    info!("✓ Using output device: {}", sink.name());
    Ok(Box::new(sink))
}

#[cfg(not(feature = "device"))]
fn device_sink() -> Result<Box<dyn PlaybackSink>> {
    Err(VvspeakError::Config(
        "Built without the `device` feature".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_parse() {
        assert_eq!("auto".parse::<PlaybackBackend>().unwrap(), PlaybackBackend::Auto);
        assert_eq!("Device".parse::<PlaybackBackend>().unwrap(), PlaybackBackend::Device);
        assert_eq!(
            "command".parse::<PlaybackBackend>().unwrap(),
            PlaybackBackend::Command
        );
        assert!("speaker".parse::<PlaybackBackend>().is_err());
    }

    struct Scripted {
        fail: bool,
    }

    impl PlaybackSink for Scripted {
        fn play(&mut self, _audio: &PcmAudio) -> Result<()> {
            if self.fail {
                Err(VvspeakError::Playback("unsupported format".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn silence() -> PcmAudio {
        PcmAudio {
            samples: vec![0; 48],
            sample_rate: 24000,
            channels: 1,
        }
    }

    #[test]
    fn test_fallback_used_when_primary_fails() {
        let mut sink = FallbackSink::new(
            Box::new(Scripted { fail: true }),
            Box::new(Scripted { fail: false }),
        );
        assert!(sink.play(&silence()).is_ok());
    }

    #[test]
    fn test_fallback_error_when_both_fail() {
        let mut sink = FallbackSink::new(
            Box::new(Scripted { fail: true }),
            Box::new(Scripted { fail: true }),
        );
        assert!(matches!(sink.play(&silence()), Err(VvspeakError::Playback(_))));
    }

    #[test]
    fn test_deferred_sink_fails_each_utterance() {
        let mut sink = DeferredSink::new(PlaybackBackend::Command, "no-such-player-xyz -");
        assert!(!sink.is_ready());
        for _ in 0..2 {
            assert!(matches!(sink.play(&silence()), Err(VvspeakError::Playback(_))));
        }
        assert!(!sink.is_ready());
    }

    #[cfg(unix)]
    #[test]
    fn test_deferred_sink_ready_with_player() {
        let mut sink = DeferredSink::new(PlaybackBackend::Command, "cat");
        assert!(sink.is_ready());
        assert!(sink.play(&silence()).is_ok());
    }

    #[test]
    fn test_missing_player_command_rejected() {
        let result = create_sink(PlaybackBackend::Command, "/nonexistent/player -");
        assert!(result.is_err());
    }

    #[cfg(not(feature = "device"))]
    #[test]
    fn test_device_backend_requires_feature() {
        assert!(matches!(
            create_sink(PlaybackBackend::Device, "aplay -q -"),
            Err(VvspeakError::Config(_))
        ));
    }
}
