//! Synthesis engine backends

// VOICEVOX core C API, loaded at runtime
pub mod voicevox;
