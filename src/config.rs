//! Configuration management
//!
//! Settings live in an INI file (`~/.vvspeak.cfg` by default) and are read
//! once at startup. Command line flags override individual keys before the
//! values are validated.

use crate::assets::{
    AssetNames, DEFAULT_CORE_LIBRARY, DEFAULT_DICTIONARY_DIR, DEFAULT_RUNTIME_LIBRARY,
    DEFAULT_VOICE_MODEL,
};
use crate::audio::backends::command::{CommandSink, DEFAULT_PLAYER_COMMAND};
use crate::audio::PlaybackBackend;
use crate::bus::SocketLimits;
use crate::message::StyleId;
use crate::speech::{Acceleration, EngineOptions};
use crate::{Result, VvspeakError};
use ini::Ini;
use log::{debug, info};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Engine root used when nothing is configured
pub const DEFAULT_ENGINE_ROOT: &str = "/voicevox_engine";

/// Topic messages are received on
pub const DEFAULT_TOPIC: &str = "tts_text";

/// Messages buffered between the transport and the worker
pub const DEFAULT_QUEUE_DEPTH: usize = 10;

/// Values the pipeline itself needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub engine_root_dir: PathBuf,
    pub voice_model_file_name: String,
    pub default_style_id: StyleId,
}

/// Application configuration
pub struct Config {
    /// INI configuration storage
    ini: Ini,

    /// File the configuration came from
    path: PathBuf,
}

impl Config {
    /// Load `~/.vvspeak.cfg`, creating it with defaults if it does not exist
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        debug!("Loading config from {:?}", path);

        if path.exists() {
            return Self::load_from(&path);
        }

        info!("Config file not found, creating default");
        let ini = Self::default_config();
        ini.write_to_file(&path)
            .map_err(|e| VvspeakError::IniParse(format!("Failed to write config: {}", e)))?;

        Ok(Self { ini, path })
    }

    /// Load an explicit config file, which must exist
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let ini = Ini::load_from_file(path).map_err(|e| {
            VvspeakError::IniParse(format!("Failed to load config {}: {}", path.display(), e))
        })?;

        Ok(Self {
            ini,
            path: path.to_path_buf(),
        })
    }

    /// Built-in defaults, not backed by a file
    pub fn defaults() -> Self {
        Self {
            ini: Self::default_config(),
            path: PathBuf::new(),
        }
    }

    fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".vvspeak.cfg")
    }

    /// Expose the config file path for display
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn default_config() -> Ini {
        let mut ini = Ini::new();

        ini.with_section(Some("engine"))
            .set("root_dir", DEFAULT_ENGINE_ROOT)
            .set("vvm_file", DEFAULT_VOICE_MODEL)
            .set("style_id", "0")
            .set("runtime_library", DEFAULT_RUNTIME_LIBRARY)
            .set("dictionary_dir", DEFAULT_DICTIONARY_DIR)
            .set("core_library", DEFAULT_CORE_LIBRARY)
            .set("acceleration", "auto")
            .set("cpu_threads", "0");

        ini.with_section(Some("bus"))
            .set("topic", DEFAULT_TOPIC)
            .set("socket_dir", "")
            .set("queue_depth", DEFAULT_QUEUE_DEPTH.to_string())
            .set(
                "max_message_bytes",
                SocketLimits::default().max_message_bytes.to_string(),
            )
            .set(
                "idle_timeout_secs",
                SocketLimits::default().idle_timeout.as_secs().to_string(),
            );

        ini.with_section(Some("playback"))
            .set("backend", "auto")
            .set("command", DEFAULT_PLAYER_COMMAND);

        ini
    }

    /// Get a string value from config
    pub fn get_string(&self, section: &str, key: &str, default: &str) -> String {
        self.ini
            .get_from(Some(section), key)
            .unwrap_or(default)
            .to_string()
    }

    /// Set a value in config
    pub fn set(&mut self, section: &str, key: &str, value: &str) {
        self.ini.with_section(Some(section)).set(key, value);
    }

    /// Parse a value, failing on anything that does not parse
    fn parse<T>(&self, section: &str, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.ini.get_from(Some(section), key).map(str::trim) {
            None | Some("") => Ok(default),
            Some(raw) => raw.parse().map_err(|e| {
                VvspeakError::Config(format!("Invalid {}.{} '{}': {}", section, key, raw, e))
            }),
        }
    }

    /// Directory searched for engine assets
    pub fn engine_root_dir(&self) -> PathBuf {
        PathBuf::from(self.get_string("engine", "root_dir", DEFAULT_ENGINE_ROOT))
    }

    /// Voice model file name, e.g. `0.vvm`
    pub fn voice_model_file(&self) -> String {
        self.get_string("engine", "vvm_file", DEFAULT_VOICE_MODEL)
    }

    /// Style used when a message has no `[n]` prefix
    pub fn default_style_id(&self) -> Result<StyleId> {
        self.parse("engine", "style_id", 0)
    }

    pub fn asset_names(&self) -> AssetNames {
        AssetNames {
            runtime_library: self.get_string("engine", "runtime_library", DEFAULT_RUNTIME_LIBRARY),
            dictionary_dir: self.get_string("engine", "dictionary_dir", DEFAULT_DICTIONARY_DIR),
            voice_model: self.voice_model_file(),
            core_library: self.get_string("engine", "core_library", DEFAULT_CORE_LIBRARY),
        }
    }

    pub fn engine_options(&self) -> Result<EngineOptions> {
        Ok(EngineOptions {
            acceleration: self.parse("engine", "acceleration", Acceleration::Auto)?,
            cpu_threads: self.parse("engine", "cpu_threads", 0)?,
        })
    }

    /// Topic name; also the socket file name
    pub fn topic(&self) -> Result<String> {
        let topic = self.get_string("bus", "topic", DEFAULT_TOPIC);
        let topic = topic.trim();
        if topic.is_empty() || topic.contains('/') || topic == "." || topic == ".." {
            return Err(VvspeakError::Config(format!(
                "Invalid bus.topic '{}': must be a plain name",
                topic
            )));
        }
        Ok(topic.to_string())
    }

    /// Directory holding topic sockets
    ///
    /// Falls back to the user runtime directory, then the temp directory.
    pub fn socket_dir(&self) -> PathBuf {
        let configured = self.get_string("bus", "socket_dir", "");
        if !configured.trim().is_empty() {
            return PathBuf::from(configured.trim());
        }
        dirs::runtime_dir().unwrap_or_else(std::env::temp_dir)
    }

    /// `<socket_dir>/<topic>.sock`
    pub fn socket_path(&self) -> Result<PathBuf> {
        Ok(self.socket_dir().join(format!("{}.sock", self.topic()?)))
    }

    pub fn queue_depth(&self) -> Result<usize> {
        let depth = self.parse("bus", "queue_depth", DEFAULT_QUEUE_DEPTH)?;
        if depth == 0 {
            return Err(VvspeakError::Config(
                "bus.queue_depth must be at least 1".to_string(),
            ));
        }
        Ok(depth)
    }

    /// Per-connection limits on the topic socket
    pub fn socket_limits(&self) -> Result<SocketLimits> {
        let defaults = SocketLimits::default();
        let max_message_bytes =
            self.parse("bus", "max_message_bytes", defaults.max_message_bytes)?;
        let idle_timeout_secs =
            self.parse("bus", "idle_timeout_secs", defaults.idle_timeout.as_secs())?;
        if max_message_bytes == 0 || idle_timeout_secs == 0 {
            return Err(VvspeakError::Config(
                "bus.max_message_bytes and bus.idle_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(SocketLimits {
            max_message_bytes,
            idle_timeout: Duration::from_secs(idle_timeout_secs),
        })
    }

    pub fn playback_backend(&self) -> Result<PlaybackBackend> {
        self.parse("playback", "backend", PlaybackBackend::Auto)
    }

    pub fn player_command(&self) -> String {
        self.get_string("playback", "command", DEFAULT_PLAYER_COMMAND)
    }

    pub fn pipeline_config(&self) -> Result<PipelineConfig> {
        Ok(PipelineConfig {
            engine_root_dir: self.engine_root_dir(),
            voice_model_file_name: self.voice_model_file(),
            default_style_id: self.default_style_id()?,
        })
    }

    /// Check every value that can be invalid
    pub fn validate(&self) -> Result<()> {
        self.default_style_id()?;
        self.engine_options()?;
        self.topic()?;
        self.queue_depth()?;
        self.socket_limits()?;
        if self.playback_backend()? != PlaybackBackend::Device {
            CommandSink::new(&self.player_command())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::defaults();
        assert_eq!(config.engine_root_dir(), PathBuf::from("/voicevox_engine"));
        assert_eq!(config.voice_model_file(), "0.vvm");
        assert_eq!(config.default_style_id().unwrap(), 0);
        assert_eq!(config.topic().unwrap(), "tts_text");
        assert_eq!(config.queue_depth().unwrap(), 10);
        assert_eq!(config.playback_backend().unwrap(), PlaybackBackend::Auto);
        assert_eq!(config.engine_options().unwrap(), EngineOptions::default());
        assert_eq!(config.asset_names(), AssetNames::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let mut config = Config::defaults();
        config.set("engine", "root_dir", "/opt/voicevox");
        config.set("engine", "style_id", "3");
        config.set("engine", "vvm_file", "12.vvm");

        let pipeline = config.pipeline_config().unwrap();
        assert_eq!(pipeline.engine_root_dir, PathBuf::from("/opt/voicevox"));
        assert_eq!(pipeline.default_style_id, 3);
        assert_eq!(pipeline.voice_model_file_name, "12.vvm");
        assert_eq!(config.asset_names().voice_model, "12.vvm");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = Config::defaults();
        config.set("engine", "style_id", "-1");
        assert!(matches!(config.validate(), Err(VvspeakError::Config(_))));

        let mut config = Config::defaults();
        config.set("bus", "queue_depth", "0");
        assert!(config.queue_depth().is_err());

        let mut config = Config::defaults();
        config.set("bus", "topic", "a/b");
        assert!(config.topic().is_err());

        let mut config = Config::defaults();
        config.set("playback", "backend", "speaker");
        assert!(config.validate().is_err());

        let mut config = Config::defaults();
        config.set("engine", "acceleration", "npu");
        assert!(config.engine_options().is_err());

        let mut config = Config::defaults();
        config.set("bus", "max_message_bytes", "0");
        assert!(config.validate().is_err());

        let mut config = Config::defaults();
        config.set("playback", "command", "   ");
        assert!(matches!(config.validate(), Err(VvspeakError::Config(_))));
        config.set("playback", "backend", "device");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_socket_limits() {
        let mut config = Config::defaults();
        assert_eq!(config.socket_limits().unwrap(), SocketLimits::default());

        config.set("bus", "max_message_bytes", "4096");
        config.set("bus", "idle_timeout_secs", "5");
        let limits = config.socket_limits().unwrap();
        assert_eq!(limits.max_message_bytes, 4096);
        assert_eq!(limits.idle_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_blank_value_uses_default() {
        let mut config = Config::defaults();
        config.set("engine", "style_id", "  ");
        assert_eq!(config.default_style_id().unwrap(), 0);
    }

    #[test]
    fn test_socket_path() {
        let mut config = Config::defaults();
        config.set("bus", "socket_dir", "/run/vv");
        config.set("bus", "topic", "speech");
        assert_eq!(
            config.socket_path().unwrap(),
            PathBuf::from("/run/vv/speech.sock")
        );
    }
}
