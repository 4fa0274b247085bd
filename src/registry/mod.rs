//! Case-insensitive command registry with a user alias overlay.

pub mod aliases;

use std::collections::BTreeMap;
use std::rc::Rc;

use tracing::debug;

pub use aliases::AliasOverlay;

use crate::error::{Error, Result};
use crate::plugins::api::Command;

/// Name and alias bindings for every loaded command.
///
/// Keys are lower-cased. A later registration under an existing key replaces
/// the earlier binding outright; built-ins are registered first, so a plugin
/// can shadow them.
#[derive(Clone, Default)]
pub struct CommandRegistry {
    commands: BTreeMap<String, Rc<dyn Command>>,
    overlay: AliasOverlay,
}

impl CommandRegistry {
    /// Registry with an in-memory overlay
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_overlay(overlay: AliasOverlay) -> Self {
        Self {
            commands: BTreeMap::new(),
            overlay,
        }
    }

    /// Bind `command` under its name and every alias
    ///
    /// # Errors
    /// Returns [`Error::InvalidCommand`] if the command has no name
    pub fn register(&mut self, command: Rc<dyn Command>) -> Result<()> {
        let info = command.info();
        let name = info.key();
        if name.is_empty() {
            return Err(Error::InvalidCommand(
                "command name must not be empty".to_string(),
            ));
        }

        let aliases = info
            .aliases
            .iter()
            .map(|alias| alias.trim().to_lowercase())
            .filter(|alias| !alias.is_empty());

        for key in std::iter::once(name.clone()).chain(aliases) {
            if let Some(previous) = self.commands.insert(key.clone(), Rc::clone(&command)) {
                if !Rc::ptr_eq(&previous, &command) {
                    debug!(
                        "'{}' now resolves to {} (was {})",
                        key,
                        name,
                        previous.info().name
                    );
                }
            }
        }
        Ok(())
    }

    /// Look up a command by name or alias, overlay first
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<Rc<dyn Command>> {
        let key = name.trim().to_lowercase();
        let key = self.overlay.resolve(&key).map_or(key.clone(), str::to_string);
        self.commands.get(&key).cloned()
    }

    /// Whether the first word of `line` names a command
    #[must_use]
    pub fn is_valid(&self, line: &str) -> bool {
        line.split_whitespace()
            .next()
            .is_some_and(|word| self.resolve(word).is_some())
    }

    /// Every key starting with `prefix`, ascending
    #[must_use]
    pub fn suggest_prefix(&self, prefix: &str) -> Vec<String> {
        let prefix = prefix.to_lowercase();
        let mut keys: Vec<String> = self
            .commands
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .map(|(key, _)| key.clone())
            .collect();

        keys.extend(
            self.overlay
                .list_all()
                .iter()
                .filter(|(alias, target)| {
                    alias.starts_with(&prefix) && self.commands.contains_key(*target)
                })
                .map(|(alias, _)| alias.clone()),
        );
        keys.sort();
        keys.dedup();
        keys
    }

    /// Inline completion for `line`: the rest of its first suggestion
    #[must_use]
    pub fn ghost_suffix(&self, line: &str) -> Option<String> {
        if line.is_empty() || line.contains(char::is_whitespace) {
            return None;
        }
        let first = self.suggest_prefix(line).into_iter().next()?;
        let suffix = first.get(line.len()..)?;
        (!suffix.is_empty()).then(|| suffix.to_string())
    }

    /// One entry per command, sorted by name
    #[must_use]
    pub fn list_distinct(&self) -> Vec<Rc<dyn Command>> {
        let mut distinct: BTreeMap<String, Rc<dyn Command>> = BTreeMap::new();

        // The binding under a command's own name is the live one
        for (key, command) in &self.commands {
            if *key == command.info().key() {
                distinct.insert(key.clone(), Rc::clone(command));
            }
        }
        for command in self.commands.values() {
            distinct
                .entry(command.info().key())
                .or_insert_with(|| Rc::clone(command));
        }

        distinct.into_values().collect()
    }

    /// Every bound key (names and aliases)
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.commands.keys().map(String::as_str)
    }

    /// Drop all bindings; the overlay is kept
    pub fn clear(&mut self) {
        self.commands.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    #[must_use]
    pub fn overlay(&self) -> &AliasOverlay {
        &self.overlay
    }

    pub fn overlay_mut(&mut self) -> &mut AliasOverlay {
        &mut self.overlay
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::api::CommandInfo;
    use crate::shell::Shell;
    use proptest::prelude::*;

    struct Stub(CommandInfo);

    impl Command for Stub {
        fn info(&self) -> &CommandInfo {
            &self.0
        }

        fn execute(&self, _shell: &mut Shell, _args: &[String]) -> Result<()> {
            Ok(())
        }
    }

    fn stub(name: &str, aliases: &[&str]) -> Rc<dyn Command> {
        Rc::new(Stub(CommandInfo::builtin(name, "stub", aliases, None)))
    }

    #[test]
    fn test_register_and_resolve() {
        let mut registry = CommandRegistry::new();
        registry.register(stub("List", &["ls", "DIR"])).unwrap();

        assert_eq!(registry.resolve("list").unwrap().info().name, "List");
        assert_eq!(registry.resolve("LS").unwrap().info().name, "List");
        assert_eq!(registry.resolve("dir").unwrap().info().name, "List");
        assert!(registry.resolve("missing").is_none());
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut registry = CommandRegistry::new();
        let result = registry.register(stub("  ", &[]));
        assert!(matches!(result, Err(Error::InvalidCommand(_))));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_register_is_idempotent() {
        let mut registry = CommandRegistry::new();
        let command = stub("help", &["?"]);
        registry.register(Rc::clone(&command)).unwrap();
        let keys_once: Vec<String> = registry.keys().map(str::to_string).collect();

        registry.register(command).unwrap();
        let keys_twice: Vec<String> = registry.keys().map(str::to_string).collect();

        assert_eq!(keys_once, keys_twice);
        assert_eq!(registry.list_distinct().len(), 1);
    }

    #[test]
    fn test_last_registration_wins() {
        let mut registry = CommandRegistry::new();
        registry.register(stub("time", &["t"])).unwrap();
        registry.register(stub("tail", &["t"])).unwrap();

        assert_eq!(registry.resolve("t").unwrap().info().name, "tail");
        assert_eq!(registry.resolve("time").unwrap().info().name, "time");
    }

    #[test]
    fn test_overlay_beats_registry_key() {
        let mut registry = CommandRegistry::new();
        registry.register(stub("list", &["x"])).unwrap();
        registry.register(stub("help", &[])).unwrap();
        registry.overlay_mut().add("help", "x").unwrap();

        assert_eq!(registry.resolve("x").unwrap().info().name, "help");
    }

    #[test]
    fn test_overlay_to_missing_command() {
        let mut registry = CommandRegistry::new();
        registry.overlay_mut().add("ghost", "g").unwrap();
        assert!(registry.resolve("g").is_none());
        assert!(registry.suggest_prefix("g").is_empty());
    }

    #[test]
    fn test_is_valid_uses_first_token() {
        let mut registry = CommandRegistry::new();
        registry.register(stub("scan", &[])).unwrap();

        assert!(registry.is_valid("scan plugin.lua"));
        assert!(registry.is_valid("  SCAN\tplugin.lua"));
        assert!(!registry.is_valid("scanner"));
        assert!(!registry.is_valid(""));
    }

    #[test]
    fn test_suggest_prefix_sorted() {
        let mut registry = CommandRegistry::new();
        registry.register(stub("help", &[])).unwrap();
        registry.register(stub("hello", &[])).unwrap();
        registry.register(stub("list", &[])).unwrap();

        assert_eq!(registry.suggest_prefix("he"), vec!["hello", "help"]);
        assert_eq!(registry.suggest_prefix("HE"), vec!["hello", "help"]);
        assert!(registry.suggest_prefix("z").is_empty());
    }

    #[test]
    fn test_suggest_includes_overlay_aliases() {
        let mut registry = CommandRegistry::new();
        registry.register(stub("list", &[])).unwrap();
        registry.overlay_mut().add("list", "lst").unwrap();

        assert_eq!(registry.suggest_prefix("l"), vec!["list", "lst"]);
    }

    #[test]
    fn test_ghost_suffix() {
        let mut registry = CommandRegistry::new();
        registry.register(stub("help", &[])).unwrap();
        registry.register(stub("hello", &[])).unwrap();

        assert_eq!(registry.ghost_suffix("he").as_deref(), Some("llo"));
        assert_eq!(registry.ghost_suffix("help"), None);
        assert_eq!(registry.ghost_suffix("help me"), None);
        assert_eq!(registry.ghost_suffix(""), None);
    }

    #[test]
    fn test_list_distinct_dedups_aliases() {
        let mut registry = CommandRegistry::new();
        registry.register(stub("list", &["ls", "dir"])).unwrap();
        registry.register(stub("help", &["?"])).unwrap();

        let names: Vec<String> = registry
            .list_distinct()
            .iter()
            .map(|c| c.info().name.clone())
            .collect();
        assert_eq!(names, vec!["help", "list"]);
    }

    #[test]
    fn test_clear_keeps_overlay() {
        let mut registry = CommandRegistry::new();
        registry.register(stub("list", &[])).unwrap();
        registry.overlay_mut().add("list", "l").unwrap();
        registry.clear();

        assert!(registry.is_empty());
        assert_eq!(registry.overlay().resolve("l"), Some("list"));
    }

    proptest! {
        #[test]
        fn prop_resolve_ignores_case(name in "[a-z][a-z0-9_]{0,11}", alias in "[a-z]{1,6}") {
            let mut registry = CommandRegistry::new();
            registry.register(stub(&name, &[&alias])).unwrap();

            prop_assert!(registry.resolve(&name.to_uppercase()).is_some());
            prop_assert!(registry.resolve(&alias.to_uppercase()).is_some());
            let line = format!("{} arg", name.to_uppercase());
            prop_assert!(registry.is_valid(&line));
        }
    }
}
