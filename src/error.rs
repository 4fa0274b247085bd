//! Error taxonomy for plugin loading, lifecycle, registry and scanning.

use std::path::PathBuf;

/// Result alias used throughout the library
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the plugin core and the built-in commands
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Plugin source failed to parse, compile or satisfy the command contract
    #[error("failed to compile {}: {message}", path.display())]
    Compilation { path: PathBuf, message: String },

    /// A plugin raised an error while evaluating or executing
    #[error("command '{command}' failed: {message}")]
    Runtime { command: String, message: String },

    #[error("'{0}' was not found")]
    NotFound(String),

    #[error("unknown command '{name}'{}", suggestion.as_ref().map(|s| format!("; did you mean '{s}'?")).unwrap_or_default())]
    UnknownCommand {
        name: String,
        suggestion: Option<String>,
    },

    /// More than one extension file matches a name; nothing was changed
    #[error("multiple extensions match '{name}': {}; specify the file name", candidates.join(", "))]
    AmbiguousMatch {
        name: String,
        candidates: Vec<String>,
    },

    #[error("{} already exists", .0.display())]
    Conflict(PathBuf),

    #[error("cannot scan {}: {message}", path.display())]
    ScanParse { path: PathBuf, message: String },

    /// Registry misuse, e.g. a command without a name
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    #[error("usage: {0}")]
    Usage(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// True for failures raised by plugin code rather than by the host
    #[must_use]
    pub fn is_runtime_fault(&self) -> bool {
        matches!(self, Self::Runtime { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ambiguous_message_lists_candidates() {
        let err = Error::AmbiguousMatch {
            name: "foo".to_string(),
            candidates: vec!["foo.lua".to_string(), "foo.luam".to_string()],
        };
        let message = err.to_string();
        assert!(message.contains("foo.lua, foo.luam"));
        assert!(message.contains("specify the file name"));
    }

    #[test]
    fn test_runtime_fault_classification() {
        let runtime = Error::Runtime {
            command: "ping".to_string(),
            message: "boom".to_string(),
        };
        assert!(runtime.is_runtime_fault());
        assert!(!Error::NotFound("x".to_string()).is_runtime_fault());
    }
}
