//! vvspeak - message-driven VOICEVOX text-to-speech
//!
//! Receives text messages on a topic, synthesizes them with the VOICEVOX
//! core engine and plays them through the local sound device, one utterance
//! at a time.

pub mod assets;
pub mod audio;
pub mod bus;
pub mod cli;
pub mod config;
pub mod error;
pub mod message;
pub mod pipeline;
pub mod speech;
pub mod worker;

pub use error::{AssetKind, Result, VvspeakError};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_NAME: &str = "vvspeak";
