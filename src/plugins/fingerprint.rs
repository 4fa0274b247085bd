//! Content fingerprints for plugin source files.
//!
//! A fingerprint is the file path, the SHA-256 of its full contents and its
//! modification time. Both the hash and the mtime have to match for a cached
//! artifact to be reused: renames performed by enable/disable can preserve or
//! reset the mtime depending on the platform, so the timestamp alone is not
//! trusted.

use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::Result;

/// Identity of one state of a source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    pub path: PathBuf,
    pub content_hash: [u8; 32],
    pub modified: SystemTime,
}

impl Fingerprint {
    /// Fingerprint bytes that were already read from `path`
    pub fn from_bytes(path: &Path, bytes: &[u8], modified: SystemTime) -> Self {
        Self {
            path: path.to_path_buf(),
            content_hash: Sha256::digest(bytes).into(),
            modified,
        }
    }

    /// Read `path` from disk and fingerprint its current state
    ///
    /// # Errors
    /// Returns an error if the file or its metadata cannot be read
    pub fn read(path: &Path) -> Result<Self> {
        let (fingerprint, _) = Self::read_with_contents(path)?;
        Ok(fingerprint)
    }

    /// Like [`Fingerprint::read`], also handing back the bytes so callers
    /// don't read the file twice
    ///
    /// # Errors
    /// Returns an error if the file or its metadata cannot be read
    pub fn read_with_contents(path: &Path) -> Result<(Self, Vec<u8>)> {
        let modified = fs::metadata(path)?.modified()?;
        let bytes = fs::read(path)?;
        Ok((Self::from_bytes(path, &bytes, modified), bytes))
    }

    /// Hex form of the content hash
    #[must_use]
    pub fn hash_hex(&self) -> String {
        hex::encode(self.content_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn test_same_contents_same_hash() {
        let now = SystemTime::now();
        let a = Fingerprint::from_bytes(Path::new("a.lua"), b"return nil", now);
        let b = Fingerprint::from_bytes(Path::new("a.lua"), b"return nil", now);
        assert_eq!(a, b);
        assert_eq!(a.hash_hex().len(), 64);
    }

    #[test]
    fn test_mtime_is_part_of_identity() {
        let now = SystemTime::now();
        let a = Fingerprint::from_bytes(Path::new("a.lua"), b"x", now);
        let b = Fingerprint::from_bytes(Path::new("a.lua"), b"x", now + Duration::from_secs(5));
        assert_ne!(a, b);
    }

    #[test]
    fn test_read_matches_from_bytes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ping.lua");
        fs::write(&path, "return nil").unwrap();

        let (fingerprint, bytes) = Fingerprint::read_with_contents(&path).unwrap();
        assert_eq!(bytes, b"return nil");
        assert_eq!(Fingerprint::read(&path).unwrap(), fingerprint);
    }

    #[test]
    fn test_read_missing_file_fails() {
        let dir = tempdir().unwrap();
        assert!(Fingerprint::read(&dir.path().join("missing.lua")).is_err());
    }
}
