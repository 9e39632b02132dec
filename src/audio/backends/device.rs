//! Output device backend using cpal
//!
//! Linux build note: you need ALSA development headers for `cpal`.
//! On Debian/Ubuntu:
//!   sudo apt-get install -y libasound2-dev pkg-config
//! Then build with `--features device`.

use crate::audio::{PcmAudio, PlaybackSink};
use crate::{Result, VvspeakError};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{
    FromSample, Sample, SampleFormat, SizedSample, StreamConfig, SupportedStreamConfigRange,
};
use log::debug;
use std::sync::mpsc;
use std::time::Duration;

/// Time left for the device buffer to drain after the last sample was handed over
const DRAIN_TAIL: Duration = Duration::from_millis(150);

/// Default output device of the default host
pub struct DeviceSink {
    device: cpal::Device,
    name: String,
}

impl DeviceSink {
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| VvspeakError::Playback("No output device available".to_string()))?;
        let name = device.name().unwrap_or_else(|_| "unknown".into());
        debug!("Selected output device: {}", name);

        Ok(Self { device, name })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Pick a sample format the device accepts at this rate and channel count
///
/// i16 is played as is, f32 is converted. Resampling is not attempted; a
/// device that supports neither fails the utterance, which lets the `auto`
/// backend hand it to the player command instead.
fn choose_format<I>(ranges: I, channels: u16, sample_rate: u32) -> Option<SampleFormat>
where
    I: IntoIterator<Item = SupportedStreamConfigRange>,
{
    let mut found = None;
    for range in ranges {
        if range.channels() != channels
            || range.min_sample_rate().0 > sample_rate
            || range.max_sample_rate().0 < sample_rate
        {
            continue;
        }
        match range.sample_format() {
            SampleFormat::I16 => return Some(SampleFormat::I16),
            SampleFormat::F32 => found = Some(SampleFormat::F32),
            _ => {}
        }
    }
    found
}

impl DeviceSink {
    fn play_as<T>(&self, config: &StreamConfig, audio: &PcmAudio) -> Result<()>
    where
        T: SizedSample + FromSample<i16> + Send + 'static,
    {
        let samples = audio.samples.clone();
        let mut pos = 0usize;
        let mut finished = false;

        let (done_tx, done_rx) = mpsc::channel::<std::result::Result<(), String>>();
        let err_tx = done_tx.clone();

        let stream = self
            .device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    for out in data.iter_mut() {
                        *out = match samples.get(pos) {
                            Some(&s) => {
                                pos += 1;
                                T::from_sample(s)
                            }
                            None => T::EQUILIBRIUM,
                        };
                    }
                    if pos >= samples.len() && !finished {
                        finished = true;
                        let _ = done_tx.send(Ok(()));
                    }
                },
                move |err| {
                    let _ = err_tx.send(Err(err.to_string()));
                },
                None,
            )
            .map_err(|e| {
                VvspeakError::Playback(format!(
                    "Failed to open {} at {} Hz x{}: {}",
                    self.name, audio.sample_rate, audio.channels, e
                ))
            })?;

        stream
            .play()
            .map_err(|e| VvspeakError::Playback(format!("Failed to start stream: {}", e)))?;

        let result = match done_rx.recv() {
            Ok(Ok(())) => {
                std::thread::sleep(DRAIN_TAIL);
                Ok(())
            }
            Ok(Err(e)) => Err(VvspeakError::Playback(format!("Stream error: {}", e))),
            Err(_) => Err(VvspeakError::Playback(
                "Stream closed unexpectedly".to_string(),
            )),
        };

        drop(stream);
        result
    }
}

impl PlaybackSink for DeviceSink {
    fn play(&mut self, audio: &PcmAudio) -> Result<()> {
        let ranges = self.device.supported_output_configs().map_err(|e| {
            VvspeakError::Playback(format!("Failed to query {}: {}", self.name, e))
        })?;
        let format = choose_format(ranges, audio.channels, audio.sample_rate).ok_or_else(|| {
            VvspeakError::Playback(format!(
                "{} cannot play {} Hz x{}",
                self.name, audio.sample_rate, audio.channels
            ))
        })?;
        debug!("Playing on {} as {:?}", self.name, format);

        let config = StreamConfig {
            channels: audio.channels,
            sample_rate: cpal::SampleRate(audio.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };
        match format {
            SampleFormat::I16 => self.play_as::<i16>(&config, audio),
            _ => self.play_as::<f32>(&config, audio),
        }
    }
}
