//! Audio decoding and playback

pub mod backends;
pub mod sink;
pub mod wav;

pub use sink::{create_sink, DeferredSink, FallbackSink, PlaybackBackend, PlaybackSink};
pub use wav::{decode_wav, encode_wav};

use std::time::Duration;

/// Interleaved 16-bit signed PCM
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcmAudio {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl PcmAudio {
    /// Number of frames (samples per channel)
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / usize::from(self.channels)
        }
    }

    /// Playback length
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / f64::from(self.sample_rate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration() {
        let audio = PcmAudio {
            samples: vec![0; 48_000],
            sample_rate: 24_000,
            channels: 2,
        };
        assert_eq!(audio.frames(), 24_000);
        assert_eq!(audio.duration(), Duration::from_secs(1));
    }

    #[test]
    fn test_degenerate_audio() {
        let audio = PcmAudio {
            samples: vec![0; 10],
            sample_rate: 0,
            channels: 0,
        };
        assert_eq!(audio.frames(), 0);
        assert_eq!(audio.duration(), Duration::ZERO);
    }
}
