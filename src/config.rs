//! Settings file
//!
//! `~/.config/annoq/config.toml` (or an explicit path) holds the pipeline
//! options, provider orchestration knobs and optional phrase-table overrides.
//! Every key is optional; anything left out keeps its built-in default.

use crate::error::ConfigError;
use crate::pipeline::{ProcessingConfig, ProcessingOrchestrator};
use crate::provider::circuit::{CircuitBreaker, DEFAULT_COOLDOWN, DEFAULT_FAILURE_THRESHOLD};
use crate::provider::orchestrator::{ProviderOrchestrator, DEFAULT_ATTEMPT_TIMEOUT};
use crate::vocabulary::Vocabulary;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// Upper bound on a single provider call
    pub attempt_timeout_secs: u64,
    /// Consecutive failed calls before the breaker opens
    pub circuit_threshold: u32,
    /// Seconds before an open breaker allows a probe call; 0 keeps it open
    /// until a success or an explicit reset
    pub circuit_cooldown_secs: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            attempt_timeout_secs: DEFAULT_ATTEMPT_TIMEOUT.as_secs(),
            circuit_threshold: DEFAULT_FAILURE_THRESHOLD,
            circuit_cooldown_secs: DEFAULT_COOLDOWN.as_secs(),
        }
    }
}

impl ProviderSettings {
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }

    pub fn cooldown(&self) -> Option<Duration> {
        (self.circuit_cooldown_secs > 0).then(|| Duration::from_secs(self.circuit_cooldown_secs))
    }

    /// A fresh breaker sized from these settings, to be shared by every analysis call.
    pub fn circuit_breaker(&self) -> Arc<CircuitBreaker> {
        CircuitBreaker::shared(self.circuit_threshold, self.cooldown())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub processing: ProcessingConfig,
    pub provider: ProviderSettings,
    pub vocabulary: Vocabulary,
}

impl Settings {
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("annoq"))
    }

    pub fn default_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Load settings. An explicit path must exist and parse; the default
    /// location falls back to built-in defaults when missing or unreadable.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::load_from(path, true),
            None => match Self::default_path() {
                Some(path) => Self::load_from(&path, false),
                None => Ok(Self::default()),
            },
        }
    }

    fn load_from(path: &Path, required: bool) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if !required => {
                if err.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %path.display(), error = %err, "Could not read config, using defaults");
                }
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let settings: Settings = match toml::from_str(&content) {
            Ok(settings) => settings,
            Err(err) if !required => {
                tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    "Config file is corrupted, using defaults"
                );
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        settings.validate()?;
        tracing::debug!(path = %path.display(), "Loaded settings");
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.processing.validate()?;
        if self.provider.circuit_threshold == 0 {
            return Err(ConfigError::Invalid(
                "circuit_threshold must be at least 1".to_string(),
            ));
        }
        if self.provider.attempt_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "attempt_timeout_secs must be at least 1".to_string(),
            ));
        }
        for pattern in &self.vocabulary.research.citation_patterns {
            regex::Regex::new(pattern)?;
        }
        Ok(())
    }

    pub fn processing_orchestrator(&self) -> Result<ProcessingOrchestrator, ConfigError> {
        ProcessingOrchestrator::new(self.processing.clone(), self.vocabulary.clone())
    }

    /// Provider orchestrator with a fresh breaker and the configured
    /// per-attempt timeout. Vendor clients are registered by the caller.
    pub fn provider_orchestrator(&self) -> ProviderOrchestrator {
        ProviderOrchestrator::new(self.provider.circuit_breaker())
            .with_attempt_timeout(self.provider.attempt_timeout())
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Write the settings, replacing any existing file atomically.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = self.to_toml()?;
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(write_err)?;
        }

        let tmp_path = path.with_extension("toml.tmp");
        let mut file = fs::File::create(&tmp_path).map_err(write_err)?;
        file.write_all(content.as_bytes()).map_err(write_err)?;
        file.sync_all().map_err(write_err)?;
        if let Err(err) = fs::rename(&tmp_path, path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(write_err(err));
        }
        Ok(())
    }
}
