//! Error types for vvspeak

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// What kind of filesystem entry an asset search was looking for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    /// ONNX Runtime shared library used by the engine
    RuntimeLibrary,
    /// OpenJTalk dictionary directory
    Dictionary,
    /// `.vvm` voice model file
    VoiceModel,
    /// VOICEVOX core shared library
    CoreLibrary,
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AssetKind::RuntimeLibrary => "ONNX Runtime library",
            AssetKind::Dictionary => "OpenJTalk dictionary",
            AssetKind::VoiceModel => "voice model",
            AssetKind::CoreLibrary => "VOICEVOX core library",
        };
        f.write_str(name)
    }
}

/// Main error type for vvspeak
///
/// Startup variants (`AssetNotFound`, `EngineInit`, `Config`, `IniParse`) are
/// fatal. Per-message variants are logged by the pipeline and dropped.
#[derive(Error, Debug)]
pub enum VvspeakError {
    #[error("{kind} '{name}' not found under {}", root.display())]
    AssetNotFound {
        kind: AssetKind,
        root: PathBuf,
        name: String,
    },

    #[error("Engine initialization failed: {0}")]
    EngineInit(String),

    #[error("Empty message")]
    EmptyMessage,

    #[error("Empty text after style selector (style_id={style_id})")]
    EmptyText { style_id: u32 },

    #[error("Synthesis failed for style_id={style_id} text={text:?}: {cause}")]
    Synthesis {
        text: String,
        style_id: u32,
        cause: String,
    },

    #[error("Audio decode error: {0}")]
    AudioDecode(String),

    #[error("Playback error: {0}")]
    Playback(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("INI parse error: {0}")]
    IniParse(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for vvspeak operations
pub type Result<T> = std::result::Result<T, VvspeakError>;

impl From<String> for VvspeakError {
    fn from(s: String) -> Self {
        VvspeakError::Other(s)
    }
}

impl From<&str> for VvspeakError {
    fn from(s: &str) -> Self {
        VvspeakError::Other(s.to_string())
    }
}

impl From<hound::Error> for VvspeakError {
    fn from(e: hound::Error) -> Self {
        VvspeakError::AudioDecode(e.to_string())
    }
}
