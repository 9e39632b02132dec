//! Speech synthesis

pub mod backends;
pub mod synth;

pub use backends::voicevox::{Acceleration, EngineOptions, VoicevoxEngine};
pub use synth::{synthesize, SynthesisEngine};
