//! Compiled artifact cache keyed by plugin path and validated by fingerprint.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::debug;

use super::api::Command;
use super::fingerprint::Fingerprint;

/// Commands produced by compiling one plugin file
#[derive(Clone)]
pub struct CompiledArtifact {
    pub fingerprint: Fingerprint,
    pub commands: Vec<Rc<dyn Command>>,
}

/// Hit and miss counters since the cache was created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Maps plugin paths to the artifact last compiled from them
#[derive(Default)]
pub struct ArtifactCache {
    entries: HashMap<PathBuf, CompiledArtifact>,
    hits: u64,
    misses: u64,
}

impl ArtifactCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached artifact for `path` if the file on disk is still exactly the
    /// one it was built from. Unreadable or missing files are misses.
    pub fn get(&mut self, path: &Path) -> Option<&CompiledArtifact> {
        match Fingerprint::read(path) {
            Ok(current) => self.lookup(&current),
            Err(_) => {
                self.misses += 1;
                None
            }
        }
    }

    /// Cached artifact whose stored fingerprint equals `current`
    pub fn lookup(&mut self, current: &Fingerprint) -> Option<&CompiledArtifact> {
        match self.entries.get(&current.path) {
            Some(artifact) if artifact.fingerprint == *current => {
                self.hits += 1;
                debug!("Artifact cache hit: {}", current.path.display());
                Some(artifact)
            }
            _ => {
                self.misses += 1;
                None
            }
        }
    }

    /// Store an artifact under the path recorded in its fingerprint
    pub fn put(&mut self, artifact: CompiledArtifact) {
        self.entries
            .insert(artifact.fingerprint.path.clone(), artifact);
    }

    /// Drop the entry for one path
    pub fn invalidate(&mut self, path: &Path) {
        self.entries.remove(path);
    }

    /// Drop entries for every path not in `live`
    pub fn retain_paths(&mut self, live: &HashSet<PathBuf>) {
        self.entries.retain(|path, _| live.contains(path));
    }

    /// Drop everything
    pub fn clear(&mut self) {
        if !self.entries.is_empty() {
            debug!("Clearing {} cached artifacts", self.entries.len());
        }
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            entries: self.entries.len(),
        }
    }
}
