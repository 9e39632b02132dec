//! Engine asset discovery
//!
//! The VOICEVOX engine needs four things on disk: the ONNX Runtime library,
//! the OpenJTalk dictionary directory, a voice model and the core library
//! itself. Their exact subpaths vary between distributions, so they are
//! searched for by name under the configured root.

pub mod locator;
pub mod tree;

pub use locator::{search, AssetLocator};
pub use tree::{DirectoryTree, EntryKind, MemoryTree, OsTree, TreeEntry};

use std::path::PathBuf;

/// ONNX Runtime library name shipped with VOICEVOX core 0.16
#[cfg(target_os = "linux")]
pub const DEFAULT_RUNTIME_LIBRARY: &str = "libvoicevox_onnxruntime.so.1.17.3";
#[cfg(target_os = "macos")]
pub const DEFAULT_RUNTIME_LIBRARY: &str = "libvoicevox_onnxruntime.1.17.3.dylib";
#[cfg(target_os = "windows")]
pub const DEFAULT_RUNTIME_LIBRARY: &str = "voicevox_onnxruntime.dll";
#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
pub const DEFAULT_RUNTIME_LIBRARY: &str = "libvoicevox_onnxruntime.so.1.17.3";

/// VOICEVOX core C API library name
#[cfg(target_os = "macos")]
pub const DEFAULT_CORE_LIBRARY: &str = "libvoicevox_core.dylib";
#[cfg(target_os = "windows")]
pub const DEFAULT_CORE_LIBRARY: &str = "voicevox_core.dll";
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
pub const DEFAULT_CORE_LIBRARY: &str = "libvoicevox_core.so";

/// OpenJTalk dictionary directory name
pub const DEFAULT_DICTIONARY_DIR: &str = "open_jtalk_dic_utf_8-1.11";

/// Voice model file name
pub const DEFAULT_VOICE_MODEL: &str = "0.vvm";

/// Names to search for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetNames {
    pub runtime_library: String,
    pub dictionary_dir: String,
    pub voice_model: String,
    pub core_library: String,
}

impl Default for AssetNames {
    fn default() -> Self {
        Self {
            runtime_library: DEFAULT_RUNTIME_LIBRARY.to_string(),
            dictionary_dir: DEFAULT_DICTIONARY_DIR.to_string(),
            voice_model: DEFAULT_VOICE_MODEL.to_string(),
            core_library: DEFAULT_CORE_LIBRARY.to_string(),
        }
    }
}

/// Resolved asset paths
///
/// Each path existed with the right kind when it was resolved. Nothing
/// guarantees it still does when the engine opens it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineAssets {
    pub runtime_library: PathBuf,
    pub dictionary_dir: PathBuf,
    pub voice_model: PathBuf,
    pub core_library: PathBuf,
}
