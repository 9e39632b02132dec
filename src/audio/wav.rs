//! WAV container conversion
//!
//! The engine returns WAV bytes. Playback wants 16-bit signed samples, so
//! anything else is converted on the way in. Sample rate and channel count
//! are kept as encoded.

use super::PcmAudio;
use crate::{Result, VvspeakError};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::io::Cursor;

/// Decode WAV bytes into interleaved 16-bit PCM
pub fn decode_wav(bytes: &[u8]) -> Result<PcmAudio> {
    let reader = WavReader::new(Cursor::new(bytes))
        .map_err(|e| VvspeakError::AudioDecode(format!("Invalid WAV data: {}", e)))?;
    let spec = reader.spec();

    let samples: Vec<i16> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Int, 16) => reader
            .into_samples::<i16>()
            .collect::<std::result::Result<_, _>>()?,
        (SampleFormat::Int, bits @ 1..=32) => {
            let shift = i32::from(bits) - 16;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| rescale_int(v, shift)))
                .collect::<std::result::Result<_, _>>()?
        }
        (SampleFormat::Float, 32) => reader
            .into_samples::<f32>()
            .map(|s| s.map(float_to_i16))
            .collect::<std::result::Result<_, _>>()?,
        (format, bits) => {
            return Err(VvspeakError::AudioDecode(format!(
                "Unsupported sample format {:?} with {} bits",
                format, bits
            )))
        }
    };

    if samples.is_empty() {
        return Err(VvspeakError::AudioDecode(
            "WAV data contains no samples".to_string(),
        ));
    }

    Ok(PcmAudio {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
    })
}

/// Encode PCM as a 16-bit WAV file in memory
pub fn encode_wav(audio: &PcmAudio) -> Result<Vec<u8>> {
    let spec = WavSpec {
        channels: audio.channels,
        sample_rate: audio.sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut wav_data = Vec::new();
    {
        let mut writer = WavWriter::new(Cursor::new(&mut wav_data), spec)
            .map_err(|e| VvspeakError::Playback(format!("Failed to create WAV writer: {}", e)))?;
        for &sample in &audio.samples {
            writer
                .write_sample(sample)
                .map_err(|e| VvspeakError::Playback(format!("Failed to write WAV sample: {}", e)))?;
        }
        writer
            .finalize()
            .map_err(|e| VvspeakError::Playback(format!("Failed to finalize WAV: {}", e)))?;
    }
    Ok(wav_data)
}

fn rescale_int(v: i32, shift: i32) -> i16 {
    if shift >= 0 {
        (v >> shift) as i16
    } else {
        (v << -shift) as i16
    }
}

fn float_to_i16(v: f32) -> i16 {
    (v.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}
