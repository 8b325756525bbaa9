use crate::error::{Result, StoreError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the optional config file inside a data directory.
pub const CONFIG_FILE: &str = "sitestore.yaml";

/// Store configuration, read from `sitestore.yaml` when present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// How new record ids are generated
    pub id_strategy: IdStrategy,
    /// Write table files as 2-space indented JSON
    pub pretty: bool,
    /// Write through a temp file in the same directory, then rename over the target
    pub atomic_writes: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            id_strategy: IdStrategy::Ulid,
            pretty: true,
            atomic_writes: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdStrategy {
    #[default]
    Ulid,
    Uuid,
    Nanoid,
}

impl StoreConfig {
    /// Load `sitestore.yaml` from the data directory, falling back to defaults
    /// when the file does not exist.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(StoreConfig::default());
        }
        let content = std::fs::read_to_string(&path)?;
        parse_config_str(&content)
            .map_err(|e| StoreError::Config(format!("{}: {e}", path.display())))
    }
}

/// Parse a config YAML string. Missing keys take their defaults.
pub fn parse_config_str(content: &str) -> Result<StoreConfig> {
    if content.trim().is_empty() {
        return Ok(StoreConfig::default());
    }
    let config: StoreConfig = serde_yaml::from_str(content)?;
    Ok(config)
}
