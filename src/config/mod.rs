use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::plugins::scanner::ScanRules;
use crate::plugins::verified::VerifiedHashes;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub shell: ShellConfig,
    #[serde(default)]
    pub scanner: ScanRules,
    /// Plugin file names pinned to the SHA-256 of a reviewed version
    #[serde(default)]
    pub verified: VerifiedHashes,
}

/// Where plugins and persisted state live
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Plugin directory scanned on every reload
    pub extensions_dir: PathBuf,
    /// User alias overlay
    pub aliases_file: PathBuf,
    /// Diagnostic table of loaded plugins
    pub metadata_file: PathBuf,
    /// Line editor history
    pub history_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellConfig {
    #[serde(default = "default_prompt")]
    pub prompt: String,

    /// Maximum line editor history entries
    #[serde(default = "default_max_history")]
    pub max_history: usize,

    /// Offer the closest known command when a name is not found
    #[serde(default = "default_true")]
    pub suggest_similar: bool,
}

// Default value functions
fn default_prompt() -> String {
    "> ".to_string()
}

fn default_max_history() -> usize {
    1000
}

fn default_true() -> bool {
    true
}

impl PathsConfig {
    /// Every path placed under `root`
    pub fn rooted_at(root: &Path) -> Self {
        Self {
            extensions_dir: root.join("extensions"),
            aliases_file: root.join("aliases.json"),
            metadata_file: root.join("plugins.json"),
            history_file: root.join("history.txt"),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self::rooted_at(&data_dir())
    }
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            prompt: default_prompt(),
            max_history: default_max_history(),
            suggest_similar: true,
        }
    }
}

impl Config {
    /// Default configuration with all state kept under `root`
    pub fn rooted_at(root: &Path) -> Self {
        Self {
            paths: PathsConfig::rooted_at(root),
            ..Self::default()
        }
    }

    /// Load configuration from default location
    pub fn load_default() -> Result<Self> {
        let config_path = Self::default_config_path();

        if config_path.exists() {
            Self::load_from_file(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file {}", path.as_ref().display()))?;

        let config: Config =
            serde_yaml::from_str(&contents).context("Failed to parse config file")?;

        Ok(config)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = serde_yaml::to_string(self).context("Failed to serialize config")?;

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        fs::write(path.as_ref(), contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Get default configuration path
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        data_dir().join("config.yaml")
    }
}

/// `~/.crucible`, or `./.crucible` when there is no home directory
fn data_dir() -> PathBuf {
    dirs::home_dir()
        .map_or_else(|| PathBuf::from(".crucible"), |home| home.join(".crucible"))
}
