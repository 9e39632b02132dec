//! Speech synthesizer abstraction
//!
//! The pipeline only needs one capability from an engine: turn text in a
//! given style into encoded audio. Everything engine-specific stays behind
//! `SynthesisEngine`.

use crate::message::{StyleId, StyledText};
use crate::{Result, VvspeakError};
use log::debug;

/// Text-to-speech engine
pub trait SynthesisEngine {
    /// Synthesize `text` spoken in `style_id`, returning WAV bytes
    fn tts(&mut self, text: &str, style_id: StyleId) -> Result<Vec<u8>>;
}

impl<E: SynthesisEngine + ?Sized> SynthesisEngine for Box<E> {
    fn tts(&mut self, text: &str, style_id: StyleId) -> Result<Vec<u8>> {
        (**self).tts(text, style_id)
    }
}

/// Run one synthesis, reporting any engine failure as `Synthesis`
///
/// No retry: a failed call is returned to the caller as is.
pub fn synthesize(engine: &mut dyn SynthesisEngine, styled: &StyledText) -> Result<Vec<u8>> {
    debug!(
        "Synthesizing {} chars with style_id={}",
        styled.text.chars().count(),
        styled.style_id
    );

    engine
        .tts(&styled.text, styled.style_id)
        .map_err(|e| match e {
            err @ VvspeakError::Synthesis { .. } => err,
            other => VvspeakError::Synthesis {
                text: styled.text.clone(),
                style_id: styled.style_id,
                cause: other.to_string(),
            },
        })
}
