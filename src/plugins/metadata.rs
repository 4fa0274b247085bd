use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use super::api::Command;

/// Diagnostic side table of the plugins loaded by the last reload.
///
/// Nothing reads this back to make load decisions; it exists so `plugins`
/// can show what was loaded from where, including after a restart.
pub struct MetadataStore {
    path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginRecord {
    pub name: String,
    pub description: String,
    pub aliases: Vec<String>,
    pub author: String,
    pub version: String,
    pub source: PathBuf,
    pub loaded_at: DateTime<Utc>,
}

impl PluginRecord {
    /// Record for a command compiled from `source`
    pub fn for_command(command: &dyn Command, source: &Path) -> Self {
        let info = command.info();
        Self {
            name: info.name.clone(),
            description: info.description.clone(),
            aliases: info.aliases.clone(),
            author: info.author.clone(),
            version: info.version.clone(),
            source: source.to_path_buf(),
            loaded_at: Utc::now(),
        }
    }
}

impl MetadataStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Replace the table with `records`
    ///
    /// # Errors
    /// Returns an error if serialization fails or the file cannot be written
    pub fn save(&self, records: &[PluginRecord]) -> anyhow::Result<()> {
        let json =
            serde_json::to_string_pretty(records).context("Failed to serialize plugin metadata")?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).context("Failed to create metadata directory")?;
        }
        fs::write(&self.path, json).context("Failed to write plugin metadata")?;

        Ok(())
    }

    /// Read the table; a missing file is an empty table
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed
    pub fn load(&self) -> anyhow::Result<Vec<PluginRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let json = fs::read_to_string(&self.path).context("Failed to read plugin metadata")?;
        let records: Vec<PluginRecord> =
            serde_json::from_str(&json).context("Failed to parse plugin metadata")?;

        Ok(records)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}
