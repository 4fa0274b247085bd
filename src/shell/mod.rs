//! The coordinating service object every command runs against.
//!
//! [`Shell`] owns the registry, the plugin loader and its artifact cache, the
//! extension lifecycle manager, the scanner and the console. All of it is
//! mutated from the REPL thread only.

pub mod builtins;
pub mod console;

use anyhow::{Context, Result};
use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use std::fs;
use std::rc::Rc;
use tracing::{debug, warn};

pub use console::Console;

use crate::config::Config;
use crate::error::Error;
use crate::plugins::api::Command;
use crate::plugins::compiler::{CompilationService, LuaCompiler};
use crate::plugins::lifecycle::ExtensionManager;
use crate::plugins::loader::{LoadReport, PluginLoader};
use crate::plugins::metadata::MetadataStore;
use crate::plugins::scanner::SecurityScanner;
use crate::registry::{AliasOverlay, CommandRegistry};

pub struct Shell {
    config: Config,
    registry: CommandRegistry,
    loader: PluginLoader,
    extensions: ExtensionManager,
    scanner: SecurityScanner,
    builtins: Vec<Rc<dyn Command>>,
    matcher: SkimMatcherV2,
    script_depth: usize,
    pub console: Console,
}

impl Shell {
    /// Shell backed by the Lua compiler, printing to stdout
    ///
    /// # Errors
    /// Returns an error if the data directories or the alias file cannot be
    /// read or created
    pub fn new(config: Config) -> Result<Self> {
        Self::with_compiler(config, Box::new(LuaCompiler::new()), Console::stdout())
    }

    /// Shell with an explicit compilation service and console.
    /// Plugins are not loaded until [`Shell::reload`] runs.
    ///
    /// # Errors
    /// Returns an error if the data directories or the alias file cannot be
    /// read or created
    pub fn with_compiler(
        config: Config,
        compiler: Box<dyn CompilationService>,
        console: Console,
    ) -> Result<Self> {
        let paths = &config.paths;
        fs::create_dir_all(&paths.extensions_dir).with_context(|| {
            format!(
                "Failed to create extension directory {}",
                paths.extensions_dir.display()
            )
        })?;

        let overlay = AliasOverlay::load(&paths.aliases_file).with_context(|| {
            format!("Failed to load aliases from {}", paths.aliases_file.display())
        })?;

        let loader = PluginLoader::new(
            &paths.extensions_dir,
            compiler,
            MetadataStore::new(&paths.metadata_file),
        );
        let extensions = ExtensionManager::new(&paths.extensions_dir);
        let scanner = SecurityScanner::new(config.scanner.clone());

        Ok(Self {
            registry: CommandRegistry::with_overlay(overlay),
            loader,
            extensions,
            scanner,
            builtins: builtins::all(),
            matcher: SkimMatcherV2::default(),
            script_depth: 0,
            console,
            config,
        })
    }

    /// Rebuild the registry from the built-ins and every active plugin.
    /// Per-file failures are printed and returned in the report.
    pub fn reload(&mut self) -> LoadReport {
        let report = self.loader.load_all(&mut self.registry, &self.builtins);
        for failure in &report.failures {
            self.console.warn(&format!(
                "Skipped {}: {}",
                failure.path.display(),
                failure.error
            ));
        }
        report
    }

    /// Reload from scratch, recompiling every plugin
    pub fn reload_clean(&mut self) -> LoadReport {
        self.loader.cache_mut().clear();
        self.reload()
    }

    /// Parse and execute one input line
    ///
    /// # Errors
    /// Returns [`Error::UnknownCommand`] if the first word does not resolve,
    /// otherwise whatever the command returns. A runtime fault raised by a
    /// plugin command also drops every cached artifact.
    pub fn dispatch(&mut self, line: &str) -> crate::Result<()> {
        let mut words = split_args(line).into_iter();
        let Some(name) = words.next() else {
            return Ok(());
        };
        let args: Vec<String> = words.collect();

        let Some(command) = self.registry.resolve(&name) else {
            return Err(Error::UnknownCommand {
                suggestion: self.closest_command(&name),
                name,
            });
        };

        let result = command.execute(self, &args);
        if let Err(e) = &result {
            if let Some(origin) = command.origin().filter(|_| e.is_runtime_fault()) {
                warn!(
                    "Plugin {} failed at runtime, clearing compiled artifact cache",
                    origin.display()
                );
                self.loader.cache_mut().clear();
            }
        }
        result
    }

    /// Dispatch `line` and print any error instead of returning it
    pub fn run_line(&mut self, line: &str) {
        if let Err(e) = self.dispatch(line) {
            self.console.error(&e.to_string());
        }
    }

    fn closest_command(&self, name: &str) -> Option<String> {
        if !self.config.shell.suggest_similar {
            return None;
        }
        let pattern = name.to_lowercase();
        let best = self
            .registry
            .keys()
            .filter_map(|key| {
                self.matcher
                    .fuzzy_match(key, &pattern)
                    .map(|score| (score, key))
            })
            .max_by(|a, b| a.0.cmp(&b.0).then_with(|| b.1.cmp(a.1)))
            .map(|(_, key)| key.to_string());
        debug!("Closest command to '{}': {:?}", name, best);
        best
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut CommandRegistry {
        &mut self.registry
    }

    #[must_use]
    pub fn loader(&self) -> &PluginLoader {
        &self.loader
    }

    pub fn loader_mut(&mut self) -> &mut PluginLoader {
        &mut self.loader
    }

    #[must_use]
    pub fn extensions(&self) -> &ExtensionManager {
        &self.extensions
    }

    #[must_use]
    pub fn scanner(&self) -> &SecurityScanner {
        &self.scanner
    }
}

/// Split on whitespace, keeping quoted runs together without their quotes
fn split_args(line: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut pending = false;

    for c in line.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                pending = true;
            }
            None if c.is_whitespace() => {
                if pending {
                    args.push(std::mem::take(&mut current));
                    pending = false;
                }
            }
            None => {
                current.push(c);
                pending = true;
            }
        }
    }
    if pending {
        args.push(current);
    }
    args
}
