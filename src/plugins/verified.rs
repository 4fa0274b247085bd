//! Known-good plugin files, listed by file name and SHA-256.
//!
//! A plugin counts as verified only while its canonical file name is listed
//! and its current contents hash to the listed value. Editing a verified
//! plugin drops the mark; disabling it does not.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use super::fingerprint::Fingerprint;
use super::lifecycle::enabled_name;
use crate::error::Result;

/// File name to lowercase hex SHA-256
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VerifiedHashes(BTreeMap<String, String>);

impl VerifiedHashes {
    pub fn new<N, H>(entries: impl IntoIterator<Item = (N, H)>) -> Self
    where
        N: Into<String>,
        H: Into<String>,
    {
        Self(
            entries
                .into_iter()
                .map(|(name, hash)| (name.into(), hash.into()))
                .collect(),
        )
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Listed hash for a canonical file name, ignoring case
    #[must_use]
    pub fn expected(&self, file_name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(file_name))
            .map(|(_, hash)| hash.as_str())
    }

    /// Whether the plugin at `path` matches its listed hash. A disabled file
    /// is checked under its enabled name.
    ///
    /// # Errors
    /// Returns an error if a listed file cannot be read
    pub fn is_verified(&self, path: &Path) -> Result<bool> {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return Ok(false);
        };
        let canonical = enabled_name(name).unwrap_or(name);
        let Some(expected) = self.expected(canonical) else {
            return Ok(false);
        };

        let actual = Fingerprint::read(path)?.hash_hex();
        Ok(actual.eq_ignore_ascii_case(expected.trim()))
    }

    /// Verification mark for listings; unreadable files are left unmarked
    #[must_use]
    pub fn mark(&self, path: &Path) -> &'static str {
        if matches!(self.is_verified(path), Ok(true)) {
            " [verified]"
        } else {
            ""
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha2::{Digest, Sha256};
    use std::fs;
    use tempfile::tempdir;

    const SOURCE: &str = "return nil";

    fn hash_of(source: &str) -> String {
        hex::encode(Sha256::digest(source.as_bytes()))
    }

    #[test]
    fn test_listed_file_with_matching_hash() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ping.lua");
        fs::write(&path, SOURCE).unwrap();

        let hashes = VerifiedHashes::new([("Ping.lua", hash_of(SOURCE).to_uppercase())]);
        assert!(hashes.is_verified(&path).unwrap());
        assert_eq!(hashes.mark(&path), " [verified]");
    }

    #[test]
    fn test_edited_file_loses_mark() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ping.lua");
        fs::write(&path, "return 1").unwrap();

        let hashes = VerifiedHashes::new([("ping.lua", hash_of(SOURCE))]);
        assert!(!hashes.is_verified(&path).unwrap());
        assert_eq!(hashes.mark(&path), "");
    }

    #[test]
    fn test_disabled_file_checked_under_enabled_name() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ping.lua.disabled");
        fs::write(&path, SOURCE).unwrap();

        let hashes = VerifiedHashes::new([("ping.lua", hash_of(SOURCE))]);
        assert!(hashes.is_verified(&path).unwrap());
    }

    #[test]
    fn test_unlisted_file_is_never_read() {
        let hashes = VerifiedHashes::new([("ping.lua", hash_of(SOURCE))]);
        assert!(!hashes.is_verified(Path::new("/nonexistent/pong.lua")).unwrap());
        assert!(hashes.is_verified(Path::new("/nonexistent/ping.lua")).is_err());
        assert_eq!(hashes.mark(Path::new("/nonexistent/ping.lua")), "");
    }

    #[test]
    fn test_yaml_is_a_plain_map() {
        let hashes: VerifiedHashes = serde_yaml::from_str("ping.lua: abc123\n").unwrap();
        assert_eq!(hashes.expected("PING.LUA"), Some("abc123"));
        assert!(VerifiedHashes::default().is_empty());
    }
}
