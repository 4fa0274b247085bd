/// Command contract shared by built-ins and plugins
use std::path::Path;

use crate::error::Result;
use crate::shell::Shell;

/// Command trait that every built-in and plugin command implements
pub trait Command {
    /// Descriptive metadata (name, aliases, author, ...)
    fn info(&self) -> &CommandInfo;

    /// Source file the command was compiled from, `None` for built-ins
    fn origin(&self) -> Option<&Path> {
        None
    }

    /// Run the command against the shell that dispatched it
    ///
    /// # Errors
    /// Returns an error if the command fails; plugin failures surface as
    /// [`crate::Error::Runtime`]
    fn execute(&self, shell: &mut Shell, args: &[String]) -> Result<()>;
}

/// Command metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInfo {
    pub name: String,
    pub description: String,
    pub aliases: Vec<String>,
    pub author: String,
    pub version: String,
    pub usage: Option<String>,
}

impl CommandInfo {
    /// Metadata for a command shipped with the shell itself
    pub fn builtin(name: &str, description: &str, aliases: &[&str], usage: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            aliases: aliases.iter().map(|a| (*a).to_string()).collect(),
            author: "System".to_string(),
            version: "1.0".to_string(),
            usage: usage.map(str::to_string),
        }
    }

    /// Case-folded key the command is registered under
    #[must_use]
    pub fn key(&self) -> String {
        self.name.trim().to_lowercase()
    }
}
