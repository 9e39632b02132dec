//! Playback backends

// External player process fed WAV on stdin
pub mod command;

// Default output device via cpal
#[cfg(feature = "device")]
pub mod device;
