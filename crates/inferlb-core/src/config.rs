//! inferlb.toml configuration parser.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferlbConfig {
    pub policy: PolicyConfig,
    pub thresholds: Thresholds,
    pub selection: SelectionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Policy name: `default`, `least_queue`, `least` or `most`.
    pub name: String,
    /// Metric ranked by the `least` / `most` policies.
    pub target_metric: Option<String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            target_metric: None,
        }
    }
}

/// Load thresholds that shape the decision tree.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Waiting-queue size below which a pod is calm enough for adapter affinity.
    pub low_queue: usize,
    /// Waiting-queue ceiling for admitting sheddable requests.
    pub queue_critical: usize,
    /// KV-cache usage ceiling (exclusive) for admitting sheddable requests.
    pub kv_cache: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            low_queue: 50,
            queue_critical: 5,
            kv_cache: 0.8,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    pub mode: SelectionMode,
}

/// How selection filters build their tie set around the minimum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    /// Keep only pods exactly at the minimum.
    #[default]
    Strict,
    /// Keep pods within `(max - min) / n` of the minimum.
    Band,
}

impl InferlbConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        content.parse()
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let kv = self.thresholds.kv_cache;
        if !(kv > 0.0 && kv <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "thresholds.kv_cache must be in (0, 1], got {kv}"
            )));
        }
        if matches!(self.policy.name.as_str(), "least" | "most") && self.policy.target_metric.is_none() {
            return Err(ConfigError::Invalid(format!(
                "policy {:?} requires policy.target_metric",
                self.policy.name
            )));
        }
        Ok(())
    }
}

impl std::str::FromStr for InferlbConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let config: InferlbConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }
}
