//! Enable/disable plugin files by renaming them.
//!
//! An active plugin has its canonical name (`ping.lua`); an inactive one has
//! the disable marker appended (`ping.lua.disabled`) and is skipped by the
//! loader. Renaming is the only mutation performed here. The registry is left
//! alone: callers reload once a transition succeeds.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use tracing::info;

use super::compiler::PluginShape;
use crate::error::{Error, Result};

/// Suffix appended to inactive plugin files
pub const DISABLED_SUFFIX: &str = ".disabled";

pub struct ExtensionManager {
    extensions_dir: PathBuf,
}

impl ExtensionManager {
    pub fn new(extensions_dir: impl Into<PathBuf>) -> Self {
        Self {
            extensions_dir: extensions_dir.into(),
        }
    }

    #[must_use]
    pub fn extensions_dir(&self) -> &Path {
        &self.extensions_dir
    }

    /// Deactivate a plugin given its file name or command base name
    ///
    /// # Errors
    /// [`Error::NotFound`] when nothing matches, [`Error::AmbiguousMatch`]
    /// when several files match, [`Error::Conflict`] when the disabled name
    /// is already taken
    pub fn disable(&self, input: &str) -> Result<PathBuf> {
        let input = checked_name(input, "disable <name|file>")?;

        let source = if is_plugin_name(input) {
            let path = self.extensions_dir.join(input);
            if !path.is_file() {
                return Err(Error::NotFound(input.to_string()));
            }
            path
        } else {
            let matches: Vec<PathBuf> = self
                .list_active()?
                .into_iter()
                .filter(|path| base_name(path).eq_ignore_ascii_case(input))
                .collect();
            single_match(input, matches)?
        };

        let target = disabled_path(&source);
        rename_exclusive(&source, &target)?;
        info!("Disabled extension {}", file_name(&source));
        Ok(target)
    }

    /// Reactivate a plugin given its disabled file name or base name
    ///
    /// # Errors
    /// Same policy as [`ExtensionManager::disable`]
    pub fn enable(&self, input: &str) -> Result<PathBuf> {
        let input = checked_name(input, "enable <name|file>")?;

        let disabled = if enabled_name(input).is_some_and(is_plugin_name) {
            let path = self.extensions_dir.join(input);
            if !path.is_file() {
                return Err(Error::NotFound(input.to_string()));
            }
            path
        } else {
            let matches: Vec<PathBuf> = self
                .list_disabled()?
                .into_iter()
                .filter(|path| {
                    enabled_name(file_name(path))
                        .map(|name| base_name(Path::new(name)))
                        .is_some_and(|base| base.eq_ignore_ascii_case(input))
                })
                .collect();
            single_match(input, matches)?
        };

        let target = match enabled_name(file_name(&disabled)) {
            Some(name) => self.extensions_dir.join(name),
            None => return Err(Error::NotFound(input.to_string())),
        };
        rename_exclusive(&disabled, &target)?;
        info!("Enabled extension {}", file_name(&target));
        Ok(target)
    }

    /// Copy a plugin file from anywhere on disk into the extension directory.
    /// An extension already known under the same name, enabled or disabled,
    /// is never overwritten.
    ///
    /// # Errors
    /// [`Error::Usage`] when `source` is not a plugin file name,
    /// [`Error::NotFound`] when it does not exist, [`Error::Conflict`] when
    /// the name is taken
    pub fn import(&self, source: &Path) -> Result<PathBuf> {
        let name = source
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| is_plugin_name(n))
            .ok_or_else(|| {
                Error::Usage(format!(
                    "import <file> (expected a plugin file, got '{}')",
                    source.display()
                ))
            })?;
        if !source.is_file() {
            return Err(Error::NotFound(source.display().to_string()));
        }

        let taken = self
            .list_active()?
            .into_iter()
            .chain(self.list_disabled()?)
            .find(|path| {
                let existing = file_name(path);
                enabled_name(existing)
                    .unwrap_or(existing)
                    .eq_ignore_ascii_case(name)
            });
        if let Some(path) = taken {
            return Err(Error::Conflict(path));
        }

        fs::create_dir_all(&self.extensions_dir)?;
        let target = self.extensions_dir.join(name);
        let mut out = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
            .map_err(|e| match e.kind() {
                io::ErrorKind::AlreadyExists => Error::Conflict(target.clone()),
                _ => Error::Io(e),
            })?;
        io::copy(&mut File::open(source)?, &mut out)?;
        info!("Imported extension {} from {}", name, source.display());
        Ok(target)
    }

    /// Active plugin files, sorted
    ///
    /// # Errors
    /// Returns an error if the directory cannot be read
    pub fn list_active(&self) -> Result<Vec<PathBuf>> {
        self.list_where(|name| is_plugin_name(name))
    }

    /// Disabled plugin files, sorted
    ///
    /// # Errors
    /// Returns an error if the directory cannot be read
    pub fn list_disabled(&self) -> Result<Vec<PathBuf>> {
        self.list_where(|name| enabled_name(name).is_some_and(is_plugin_name))
    }

    fn list_where(&self, keep: impl Fn(&str) -> bool) -> Result<Vec<PathBuf>> {
        if !self.extensions_dir.exists() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in fs::read_dir(&self.extensions_dir)? {
            let path = entry?.path();
            if path.is_file() && keep(file_name(&path)) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

fn checked_name<'a>(input: &'a str, usage: &str) -> Result<&'a str> {
    let input = input.trim();
    if input.is_empty() {
        return Err(Error::Usage(usage.to_string()));
    }
    // Only bare file names; never walk out of the extension directory
    if Path::new(input).file_name().and_then(|n| n.to_str()) != Some(input) {
        return Err(Error::Usage(format!("{usage} (expected a file name, got '{input}')")));
    }
    Ok(input)
}

fn single_match(name: &str, mut matches: Vec<PathBuf>) -> Result<PathBuf> {
    match matches.len() {
        0 => Err(Error::NotFound(name.to_string())),
        1 => Ok(matches.remove(0)),
        _ => Err(Error::AmbiguousMatch {
            name: name.to_string(),
            candidates: matches.iter().map(|p| file_name(p).to_string()).collect(),
        }),
    }
}

fn rename_exclusive(from: &Path, to: &Path) -> Result<()> {
    if to.exists() {
        return Err(Error::Conflict(to.to_path_buf()));
    }
    fs::rename(from, to)?;
    Ok(())
}

fn is_plugin_name(name: &str) -> bool {
    PluginShape::from_path(Path::new(name)).is_some()
}

/// `ping.lua.disabled` -> `ping.lua`
pub(crate) fn enabled_name(name: &str) -> Option<&str> {
    let split = name.len().checked_sub(DISABLED_SUFFIX.len())?;
    let (head, tail) = (name.get(..split)?, name.get(split..)?);
    (tail.eq_ignore_ascii_case(DISABLED_SUFFIX) && !head.is_empty()).then_some(head)
}

fn disabled_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(DISABLED_SUFFIX);
    PathBuf::from(name)
}

fn base_name(path: &Path) -> &str {
    path.file_stem().and_then(|s| s.to_str()).unwrap_or_default()
}

fn file_name(path: &Path) -> &str {
    path.file_name().and_then(|s| s.to_str()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn manager_with(files: &[&str]) -> (tempfile::TempDir, ExtensionManager) {
        let dir = tempdir().unwrap();
        for file in files {
            fs::write(dir.path().join(file), "return nil").unwrap();
        }
        let manager = ExtensionManager::new(dir.path());
        (dir, manager)
    }

    #[test]
    fn test_enabled_name() {
        assert_eq!(enabled_name("ping.lua.disabled"), Some("ping.lua"));
        assert_eq!(enabled_name("ping.lua.DISABLED"), Some("ping.lua"));
        assert_eq!(enabled_name("ping.lua"), None);
        assert_eq!(enabled_name(".disabled"), None);
    }

    #[test]
    fn test_disable_by_name_then_enable() {
        let (dir, manager) = manager_with(&["ping.lua"]);

        let disabled = manager.disable("PING").unwrap();
        assert_eq!(disabled, dir.path().join("ping.lua.disabled"));
        assert!(!dir.path().join("ping.lua").exists());
        assert!(manager.list_active().unwrap().is_empty());

        let enabled = manager.enable("ping").unwrap();
        assert_eq!(enabled, dir.path().join("ping.lua"));
        assert!(enabled.exists());
        assert!(manager.list_disabled().unwrap().is_empty());
    }

    #[test]
    fn test_disable_by_file_name() {
        let (dir, manager) = manager_with(&["tools.luam"]);
        manager.disable("tools.luam").unwrap();
        assert!(dir.path().join("tools.luam.disabled").exists());

        manager.enable("tools.luam.disabled").unwrap();
        assert!(dir.path().join("tools.luam").exists());
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let (_dir, manager) = manager_with(&["ping.lua"]);
        assert!(matches!(manager.disable("pong.lua"), Err(Error::NotFound(_))));
        assert!(matches!(manager.disable("pong"), Err(Error::NotFound(_))));
        assert!(matches!(manager.enable("ping"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_ambiguous_disable_renames_nothing() {
        let (dir, manager) = manager_with(&["foo.lua", "foo.luam"]);

        match manager.disable("foo") {
            Err(Error::AmbiguousMatch { name, candidates }) => {
                assert_eq!(name, "foo");
                assert_eq!(candidates, vec!["foo.lua", "foo.luam"]);
            }
            other => panic!("expected ambiguity, got {other:?}"),
        }
        assert!(dir.path().join("foo.lua").exists());
        assert!(dir.path().join("foo.luam").exists());
    }

    #[test]
    fn test_ambiguous_enable() {
        let (_dir, manager) = manager_with(&["foo.lua.disabled", "foo.luam.disabled"]);
        assert!(matches!(
            manager.enable("foo"),
            Err(Error::AmbiguousMatch { .. })
        ));
    }

    #[test]
    fn test_conflict_keeps_both_files() {
        let (dir, manager) = manager_with(&["ping.lua", "ping.lua.disabled"]);
        assert!(matches!(manager.enable("ping"), Err(Error::Conflict(_))));
        assert!(dir.path().join("ping.lua").exists());
        assert!(dir.path().join("ping.lua.disabled").exists());
    }

    #[test]
    fn test_import_copies_into_extension_dir() {
        let (dir, manager) = manager_with(&[]);
        let outside = tempdir().unwrap();
        let source = outside.path().join("greet.lua");
        fs::write(&source, "return { name = 'greet' }").unwrap();

        let target = manager.import(&source).unwrap();
        assert_eq!(target, dir.path().join("greet.lua"));
        assert_eq!(
            fs::read_to_string(&target).unwrap(),
            "return { name = 'greet' }"
        );
        assert!(source.exists());
        assert_eq!(manager.list_active().unwrap(), vec![target]);
    }

    #[test]
    fn test_import_never_overwrites() {
        let (dir, manager) = manager_with(&["ping.lua", "pong.lua.disabled"]);
        let outside = tempdir().unwrap();
        for name in ["PING.lua", "pong.lua"] {
            let source = outside.path().join(name);
            fs::write(&source, "return 1").unwrap();
            assert!(matches!(manager.import(&source), Err(Error::Conflict(_))));
        }
        assert_eq!(
            fs::read_to_string(dir.path().join("ping.lua")).unwrap(),
            "return nil"
        );
        assert!(!dir.path().join("pong.lua").exists());
    }

    #[test]
    fn test_import_rejects_missing_and_foreign_files() {
        let (_dir, manager) = manager_with(&[]);
        let outside = tempdir().unwrap();
        let notes = outside.path().join("notes.txt");
        fs::write(&notes, "hi").unwrap();

        assert!(matches!(manager.import(&notes), Err(Error::Usage(_))));
        assert!(matches!(
            manager.import(&outside.path().join("ghost.lua")),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_rejects_paths_and_blank_input() {
        let (_dir, manager) = manager_with(&["ping.lua"]);
        assert!(matches!(manager.disable("../ping.lua"), Err(Error::Usage(_))));
        assert!(matches!(manager.disable("   "), Err(Error::Usage(_))));
    }

    #[test]
    fn test_listing_ignores_other_files() {
        let (_dir, manager) = manager_with(&["a.lua", "b.luam", "notes.txt", "c.lua.disabled", "d.txt.disabled"]);
        assert_eq!(manager.list_active().unwrap().len(), 2);
        assert_eq!(manager.list_disabled().unwrap().len(), 1);
    }
}
