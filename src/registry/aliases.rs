//! User-defined alias overlay.
//!
//! Maps an alias to a canonical command name. It is consulted before the
//! registry itself, so an overlay alias wins over a registry key with the same
//! spelling. Every mutation is written to disk before returning.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::Result;

#[derive(Debug, Clone, Default)]
pub struct AliasOverlay {
    path: Option<PathBuf>,
    aliases: BTreeMap<String, String>,
}

impl AliasOverlay {
    /// Overlay that is never persisted
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load the overlay stored at `path`; a missing file is an empty overlay
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let aliases = if path.exists() {
            let json = fs::read_to_string(&path)?;
            serde_json::from_str::<BTreeMap<String, String>>(&json)?
                .into_iter()
                .map(|(alias, target)| (alias.to_lowercase(), target.to_lowercase()))
                .collect()
        } else {
            BTreeMap::new()
        };
        debug!("Loaded {} user aliases from {}", aliases.len(), path.display());
        Ok(Self {
            path: Some(path),
            aliases,
        })
    }

    /// Point `alias` at `canonical`, replacing any earlier mapping
    ///
    /// # Errors
    /// Returns an error if the overlay cannot be saved; the overlay is then
    /// left unchanged
    pub fn add(&mut self, canonical: &str, alias: &str) -> Result<()> {
        let mut next = self.aliases.clone();
        next.insert(alias.trim().to_lowercase(), canonical.trim().to_lowercase());
        self.commit(next)
    }

    /// Remove `alias`; returns whether it existed
    ///
    /// # Errors
    /// Returns an error if the overlay cannot be saved; the overlay is then
    /// left unchanged
    pub fn remove(&mut self, alias: &str) -> Result<bool> {
        let mut next = self.aliases.clone();
        if next.remove(&alias.trim().to_lowercase()).is_none() {
            return Ok(false);
        }
        self.commit(next)?;
        Ok(true)
    }

    /// Canonical name `alias` redirects to
    #[must_use]
    pub fn resolve(&self, alias: &str) -> Option<&str> {
        self.aliases
            .get(&alias.trim().to_lowercase())
            .map(String::as_str)
    }

    #[must_use]
    pub fn list_all(&self) -> &BTreeMap<String, String> {
        &self.aliases
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Persist `aliases`, then adopt them
    fn commit(&mut self, aliases: BTreeMap<String, String>) -> Result<()> {
        if let Some(path) = &self.path {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, serde_json::to_string_pretty(&aliases)?)?;
        }
        self.aliases = aliases;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_add_resolve_case_folded() {
        let mut overlay = AliasOverlay::in_memory();
        overlay.add("Help", "H").unwrap();
        assert_eq!(overlay.resolve("h"), Some("help"));
        assert_eq!(overlay.resolve("H"), Some("help"));
    }

    #[test]
    fn test_add_overwrites() {
        let mut overlay = AliasOverlay::in_memory();
        overlay.add("help", "x").unwrap();
        overlay.add("list", "x").unwrap();
        assert_eq!(overlay.resolve("x"), Some("list"));
        assert_eq!(overlay.list_all().len(), 1);
    }

    #[test]
    fn test_remove_reports_presence() {
        let mut overlay = AliasOverlay::in_memory();
        overlay.add("help", "x").unwrap();
        assert!(overlay.remove("X").unwrap());
        assert!(!overlay.remove("x").unwrap());
        assert_eq!(overlay.resolve("x"), None);
    }

    #[test]
    fn test_persists_across_loads() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("aliases.json");

        let mut overlay = AliasOverlay::load(&path).unwrap();
        overlay.add("list", "l").unwrap();
        overlay.add("help", "h").unwrap();
        overlay.remove("h").unwrap();

        let reloaded = AliasOverlay::load(&path).unwrap();
        assert_eq!(reloaded.resolve("l"), Some("list"));
        assert_eq!(reloaded.resolve("h"), None);
        assert_eq!(reloaded.path(), Some(path.as_path()));
    }

    #[test]
    fn test_failed_save_leaves_overlay_unchanged() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("aliases.json");

        let mut overlay = AliasOverlay::load(&path).unwrap();
        overlay.add("list", "l").unwrap();

        // A directory in place of the file makes every write fail
        fs::remove_file(&path).unwrap();
        fs::create_dir(&path).unwrap();

        assert!(overlay.add("help", "h").is_err());
        assert_eq!(overlay.resolve("h"), None);

        assert!(overlay.remove("l").is_err());
        assert_eq!(overlay.resolve("l"), Some("list"));
    }
}
