use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::audio_system::context::DEFAULT_REAPER_INTERVAL;
use crate::audio_system::registry::IdPolicy;
use crate::error::ConfigError;

/// Which backend effects are played through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Default output device
    #[default]
    Rodio,
    /// No output; for servers and tests
    Headless,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub backend: BackendKind,

    /// Directory bundled assets (`assets/...`) are read from
    pub asset_root: PathBuf,

    /// Writable directories searched before the bundle
    pub search_dirs: Vec<PathBuf>,

    /// How often finished effects are reaped
    pub reaper_interval_ms: u64,

    /// Initial effects volume (0.0 to 1.0)
    pub effects_volume: f32,

    pub id_policy: IdPolicy,

    /// Default tracing filter, overridden by `RUST_LOG`
    pub log_filter: String,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            asset_root: PathBuf::from("."),
            search_dirs: Vec::new(),
            reaper_interval_ms: DEFAULT_REAPER_INTERVAL.as_millis() as u64,
            effects_volume: 1.0,
            id_policy: IdPolicy::default(),
            log_filter: "info".to_string(),
        }
    }
}

impl AudioConfig {
    /// Load from `path`. Fields missing from the file keep their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;
        let config: AudioConfig =
            serde_json::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.display().to_string(),
                source: Box::new(e),
            })?;
        config.validate()?;

        tracing::info!("Loaded config from: {}", path.display());
        Ok(config)
    }

    /// Save as pretty-printed JSON, creating parent directories
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::DirectoryCreationFailed {
                path: parent.display().to_string(),
                source: e,
            })?;
        }

        let json = serde_json::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;
        fs::write(path, json).map_err(|e| ConfigError::SaveFailed {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;

        Ok(())
    }

    /// `<config dir>/sfx-bridge/config.json`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(dir.join("sfx-bridge").join("config.json"))
    }

    /// Load from the default path, writing defaults there if the file
    /// doesn't exist yet
    pub fn load_or_default() -> Result<Self, ConfigError> {
        let path = Self::default_path()?;
        Self::load_or_create(&path)
    }

    /// Load from `path`, writing defaults there if the file doesn't exist yet
    pub fn load_or_create(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            return Self::load(path);
        }

        let config = AudioConfig::default();
        config.save(path)?;
        tracing::info!("Created default config at: {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reaper_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "reaper_interval_ms must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.effects_volume) {
            return Err(ConfigError::Invalid(format!(
                "effects_volume must be within 0.0..=1.0, got {}",
                self.effects_volume
            )));
        }
        Ok(())
    }

    pub fn reaper_interval(&self) -> Duration {
        Duration::from_millis(self.reaper_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AudioConfig::default();
        assert_eq!(config.backend, BackendKind::Rodio);
        assert_eq!(config.reaper_interval(), Duration::from_millis(100));
        assert_eq!(config.effects_volume, 1.0);
        assert_eq!(config.id_policy, IdPolicy::ProcessUnique);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let json = r#"{ "backend": "headless", "id_policy": "reset_on_stop_all" }"#;
        let config: AudioConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.backend, BackendKind::Headless);
        assert_eq!(config.id_policy, IdPolicy::ResetOnStopAll);
        assert_eq!(config.reaper_interval_ms, 100);
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = AudioConfig::default();
        config.backend = BackendKind::Headless;
        config.effects_volume = 0.4;
        config.search_dirs = vec![PathBuf::from("/tmp/downloads")];
        config.save(&path).unwrap();

        let loaded = AudioConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_or_create_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let config = AudioConfig::load_or_create(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config, AudioConfig::default());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "reaper_interval_ms": 0 }"#).unwrap();
        assert!(matches!(
            AudioConfig::load(&path),
            Err(ConfigError::Invalid(_))
        ));

        let config = AudioConfig {
            effects_volume: 1.5,
            ..AudioConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            AudioConfig::load(&path),
            Err(ConfigError::LoadFailed { .. })
        ));
    }
}
