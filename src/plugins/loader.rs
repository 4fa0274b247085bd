// Plugin loading pipeline:
// - Built-ins are registered before any plugin, so a broken plugin directory
//   can never take them away
// - Each file is fingerprinted once; unchanged files reuse their artifact
// - A failure in one file is logged and recorded, the batch always finishes
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::{debug, info, warn};

use super::api::Command;
use super::cache::{ArtifactCache, CompiledArtifact};
use super::compiler::{CompilationService, CompileError, PluginShape, SourceUnit};
use super::fingerprint::Fingerprint;
use super::metadata::{MetadataStore, PluginRecord};
use crate::error::{Error, Result};
use crate::registry::CommandRegistry;

/// Outcome of one full load cycle
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Plugin commands registered (built-ins not counted)
    pub commands: usize,
    pub cache_hits: usize,
    pub compiled: usize,
    pub failures: Vec<LoadFailure>,
}

/// A plugin file that could not be loaded
#[derive(Debug)]
pub struct LoadFailure {
    pub path: PathBuf,
    pub error: Error,
}

/// Discovers, compiles and registers plugin commands
pub struct PluginLoader {
    extensions_dir: PathBuf,
    cache: ArtifactCache,
    compiler: Box<dyn CompilationService>,
    metadata: MetadataStore,
}

impl PluginLoader {
    pub fn new(
        extensions_dir: impl Into<PathBuf>,
        compiler: Box<dyn CompilationService>,
        metadata: MetadataStore,
    ) -> Self {
        Self {
            extensions_dir: extensions_dir.into(),
            cache: ArtifactCache::new(),
            compiler,
            metadata,
        }
    }

    /// Rebuild `registry` from `builtins` plus every active plugin
    pub fn load_all(
        &mut self,
        registry: &mut CommandRegistry,
        builtins: &[Rc<dyn Command>],
    ) -> LoadReport {
        let mut report = LoadReport::default();

        registry.clear();
        for builtin in builtins {
            if let Err(e) = registry.register(Rc::clone(builtin)) {
                warn!("Skipping built-in command: {}", e);
            }
        }

        let files = match self.discover() {
            Ok(files) => files,
            Err(e) => {
                warn!(
                    "Cannot read extension directory {}: {}",
                    self.extensions_dir.display(),
                    e
                );
                report.failures.push(LoadFailure {
                    path: self.extensions_dir.clone(),
                    error: e,
                });
                return report;
            }
        };

        let live: HashSet<PathBuf> = files.iter().cloned().collect();
        self.cache.retain_paths(&live);

        let mut records = Vec::new();
        for path in files {
            let commands = match self.load_file(&path, &mut report) {
                Ok(commands) => commands,
                Err(e) => {
                    warn!("Error loading commands from {}: {}", path.display(), e);
                    self.cache.invalidate(&path);
                    report.failures.push(LoadFailure { path, error: e });
                    continue;
                }
            };

            for command in commands {
                match registry.register(Rc::clone(&command)) {
                    Ok(()) => {
                        records.push(PluginRecord::for_command(command.as_ref(), &path));
                        report.commands += 1;
                    }
                    Err(e) => {
                        warn!("Rejected command from {}: {}", path.display(), e);
                        report.failures.push(LoadFailure {
                            path: path.clone(),
                            error: e,
                        });
                    }
                }
            }
        }

        if let Err(e) = self.metadata.save(&records) {
            warn!("Failed to persist plugin metadata: {:#}", e);
        }

        info!(
            "Loaded {} plugin commands ({} cached, {} compiled, {} failed)",
            report.commands,
            report.cache_hits,
            report.compiled,
            report.failures.len()
        );
        report
    }

    fn load_file(&mut self, path: &Path, report: &mut LoadReport) -> Result<Vec<Rc<dyn Command>>> {
        let (fingerprint, bytes) = Fingerprint::read_with_contents(path)?;
        if let Some(artifact) = self.cache.lookup(&fingerprint) {
            report.cache_hits += 1;
            return Ok(artifact.commands.clone());
        }

        let shape = PluginShape::from_path(path).ok_or_else(|| Error::Compilation {
            path: path.to_path_buf(),
            message: "unknown plugin extension".to_string(),
        })?;
        let source = String::from_utf8(bytes).map_err(|e| Error::Compilation {
            path: path.to_path_buf(),
            message: format!("source is not valid UTF-8: {e}"),
        })?;
        debug!(
            "Compiling {} (sha256 {})",
            path.display(),
            fingerprint.hash_hex()
        );

        let commands = self
            .compiler
            .compile(&SourceUnit {
                path,
                source: &source,
                shape,
            })
            .map_err(|e| match e {
                CompileError::Compile(message) => Error::Compilation {
                    path: path.to_path_buf(),
                    message,
                },
                CompileError::Runtime(message) => Error::Runtime {
                    command: path
                        .file_name()
                        .map_or_else(String::new, |n| n.to_string_lossy().into_owned()),
                    message,
                },
            })?;
        report.compiled += 1;

        self.cache.put(CompiledArtifact {
            fingerprint,
            commands: commands.clone(),
        });
        Ok(commands)
    }

    /// Active plugin files in the extension directory, sorted.
    /// Creates the directory if it does not exist yet.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created or read
    pub fn discover(&self) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(&self.extensions_dir)?;

        let mut files = Vec::new();
        for entry in fs::read_dir(&self.extensions_dir)? {
            let path = entry?.path();
            if path.is_file() && PluginShape::from_path(&path).is_some() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    #[must_use]
    pub fn extensions_dir(&self) -> &Path {
        &self.extensions_dir
    }

    #[must_use]
    pub fn cache(&self) -> &ArtifactCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut ArtifactCache {
        &mut self.cache
    }

    #[must_use]
    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }
}
