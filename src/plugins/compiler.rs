//! Dynamic compilation of plugin sources into command objects.
//!
//! The loader only sees [`CompilationService`]. The shipped implementation,
//! [`LuaCompiler`], evaluates each plugin in its own Lua state and wraps the
//! returned tables as [`Command`]s.
//!
//! Snippet plugins (`.lua`) return one command table or nil:
//!
//! ```lua
//! return {
//!     name = "ping",
//!     description = "Replies with pong",
//!     aliases = { "p" },
//!     execute = function(self, args) shell.print("pong") end,
//! }
//! ```
//!
//! Declaration plugins (`.luam`) return a module table. Every entry that is a
//! command table, or that has a `new` constructor returning one, becomes a
//! command; other entries are ignored.

use mlua::{Function, Lua, RegistryKey, Table, Value};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::debug;

use super::api::{Command, CommandInfo};
use crate::error::{Error, Result};
use crate::shell::Shell;

/// Source extension for snippet plugins
pub const SCRIPT_EXTENSION: &str = "lua";
/// Source extension for declaration (module) plugins
pub const MODULE_EXTENSION: &str = "luam";

/// The two accepted plugin layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginShape {
    /// Top-level statements whose final value is a single command
    Snippet,
    /// A module declaring any number of commands
    Declaration,
}

impl PluginShape {
    /// Shape implied by the file extension, `None` for non-plugin files
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        if ext.eq_ignore_ascii_case(SCRIPT_EXTENSION) {
            Some(Self::Snippet)
        } else if ext.eq_ignore_ascii_case(MODULE_EXTENSION) {
            Some(Self::Declaration)
        } else {
            None
        }
    }
}

/// One plugin file handed to the compiler
#[derive(Debug, Clone, Copy)]
pub struct SourceUnit<'a> {
    pub path: &'a Path,
    pub source: &'a str,
    pub shape: PluginShape,
}

/// Compilation failures, split by when they happened
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    /// Syntax errors and contract violations
    #[error("{0}")]
    Compile(String),
    /// The plugin raised while being evaluated
    #[error("{0}")]
    Runtime(String),
}

/// Turns plugin source into command objects
pub trait CompilationService {
    /// Compile and evaluate `unit`
    ///
    /// # Errors
    /// Returns [`CompileError::Compile`] for diagnostics and
    /// [`CompileError::Runtime`] when evaluation throws
    fn compile(&self, unit: &SourceUnit<'_>) -> std::result::Result<Vec<Rc<dyn Command>>, CompileError>;
}

#[derive(Debug, Clone, Copy)]
enum OutputKind {
    Info,
    Error,
    Debug,
}

type OutputBuffer = Rc<RefCell<Vec<(OutputKind, String)>>>;

/// Lua-backed compilation service
#[derive(Debug, Default, Clone, Copy)]
pub struct LuaCompiler;

impl LuaCompiler {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl CompilationService for LuaCompiler {
    fn compile(&self, unit: &SourceUnit<'_>) -> std::result::Result<Vec<Rc<dyn Command>>, CompileError> {
        let lua = Rc::new(Lua::new());
        let output = OutputBuffer::default();
        install_host_api(&lua, &output).map_err(|e| CompileError::Runtime(e.to_string()))?;

        let chunk_name = unit
            .path
            .file_name()
            .map_or_else(|| unit.path.display().to_string(), |n| n.to_string_lossy().into_owned());
        let chunk = lua
            .load(unit.source)
            .set_name(format!("@{chunk_name}"))
            .into_function()
            .map_err(|e| CompileError::Compile(e.to_string()))?;

        let value: Value = chunk
            .call(())
            .map_err(|e| CompileError::Runtime(e.to_string()))?;

        let tables = match unit.shape {
            PluginShape::Snippet => snippet_command(value)?,
            PluginShape::Declaration => declared_commands(value)?,
        };

        let mut commands: Vec<Rc<dyn Command>> = Vec::with_capacity(tables.len());
        for table in tables {
            let command = LuaCommand::new(&lua, &output, unit.path, table)
                .map_err(|e| CompileError::Compile(e.to_string()))?;
            commands.push(Rc::new(command));
        }
        Ok(commands)
    }
}

/// Expose the `shell` table plugins print through
fn install_host_api(lua: &Lua, output: &OutputBuffer) -> mlua::Result<()> {
    let api = lua.create_table()?;
    for (name, kind) in [
        ("print", OutputKind::Info),
        ("error", OutputKind::Error),
        ("debug", OutputKind::Debug),
    ] {
        let buffer = Rc::clone(output);
        let function = lua.create_function(move |_, message: String| {
            buffer.borrow_mut().push((kind, message));
            Ok(())
        })?;
        api.set(name, function)?;
    }
    api.set("version", env!("CARGO_PKG_VERSION"))?;
    lua.globals().set("shell", api)?;
    Ok(())
}

fn snippet_command(value: Value<'_>) -> std::result::Result<Vec<Table<'_>>, CompileError> {
    match value {
        Value::Nil => Ok(Vec::new()),
        Value::Table(table) if is_command_table(&table) => Ok(vec![table]),
        Value::Table(_) => Err(CompileError::Compile(
            "returned table does not implement the command contract (needs `name` and `execute`)"
                .to_string(),
        )),
        other => Err(CompileError::Compile(format!(
            "snippet must return a command table, got {}",
            other.type_name()
        ))),
    }
}

fn declared_commands(value: Value<'_>) -> std::result::Result<Vec<Table<'_>>, CompileError> {
    let Value::Table(module) = value else {
        return Err(CompileError::Compile(format!(
            "module must return a table of command declarations, got {}",
            value.type_name()
        )));
    };

    let mut entries = Vec::new();
    for pair in module.pairs::<Value, Value>() {
        let (key, value) = pair.map_err(|e| CompileError::Runtime(e.to_string()))?;
        if let Value::Table(declaration) = value {
            entries.push((key_label(&key), declaration));
        }
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let mut commands = Vec::new();
    for (label, declaration) in entries {
        if is_command_table(&declaration) {
            commands.push(declaration);
            continue;
        }
        // Class-style declarations provide a constructor instead
        let Ok(Value::Function(constructor)) = declaration.get::<_, Value>("new") else {
            debug!("Skipping non-command declaration '{}'", label);
            continue;
        };
        let instance: Value = constructor
            .call(declaration.clone())
            .map_err(|e| CompileError::Runtime(format!("{label}.new: {e}")))?;
        match instance {
            Value::Table(instance) if is_command_table(&instance) => commands.push(instance),
            _ => debug!("Constructor of '{}' did not produce a command", label),
        }
    }
    Ok(commands)
}

fn is_command_table(table: &Table<'_>) -> bool {
    let has_name = matches!(
        table.get::<_, Option<String>>("name"),
        Ok(Some(name)) if !name.trim().is_empty()
    );
    has_name && matches!(table.get::<_, Value>("execute"), Ok(Value::Function(_)))
}

fn key_label(key: &Value<'_>) -> String {
    match key {
        Value::String(s) => s.to_string_lossy().into_owned(),
        Value::Integer(i) => format!("{i:08}"),
        other => other.type_name().to_string(),
    }
}

fn read_info(table: &Table<'_>) -> mlua::Result<CommandInfo> {
    Ok(CommandInfo {
        name: table.get::<_, String>("name")?.trim().to_string(),
        description: table
            .get::<_, Option<String>>("description")?
            .unwrap_or_default(),
        aliases: table
            .get::<_, Option<Vec<String>>>("aliases")?
            .unwrap_or_default(),
        author: table
            .get::<_, Option<String>>("author")?
            .unwrap_or_else(|| "Unknown".to_string()),
        version: table
            .get::<_, Option<String>>("version")?
            .unwrap_or_else(|| "1.0".to_string()),
        usage: table.get::<_, Option<String>>("usage")?,
    })
}

/// A command backed by a table living in a plugin's Lua state
struct LuaCommand {
    info: CommandInfo,
    origin: PathBuf,
    lua: Rc<Lua>,
    instance: RegistryKey,
    output: OutputBuffer,
}

impl LuaCommand {
    fn new(lua: &Rc<Lua>, output: &OutputBuffer, origin: &Path, table: Table<'_>) -> mlua::Result<Self> {
        let info = read_info(&table)?;
        let instance = lua.create_registry_value(table)?;
        Ok(Self {
            info,
            origin: origin.to_path_buf(),
            lua: Rc::clone(lua),
            instance,
            output: Rc::clone(output),
        })
    }

    fn fault(&self, err: &mlua::Error) -> Error {
        Error::Runtime {
            command: self.info.name.clone(),
            message: err.to_string(),
        }
    }

    fn flush_output(&self, shell: &mut Shell) {
        let pending: Vec<_> = self.output.borrow_mut().drain(..).collect();
        for (kind, message) in pending {
            match kind {
                OutputKind::Info => shell.console.line(&message),
                OutputKind::Error => shell.console.error(&message),
                OutputKind::Debug => shell.console.debug(&message),
            }
        }
    }
}

impl Command for LuaCommand {
    fn info(&self) -> &CommandInfo {
        &self.info
    }

    fn origin(&self) -> Option<&Path> {
        Some(&self.origin)
    }

    fn execute(&self, shell: &mut Shell, args: &[String]) -> Result<()> {
        let instance: Table = self
            .lua
            .registry_value(&self.instance)
            .map_err(|e| self.fault(&e))?;
        let execute: Function = instance.get("execute").map_err(|e| self.fault(&e))?;

        self.output.borrow_mut().clear();
        let result = execute.call::<_, Value>((instance, args.to_vec()));
        self.flush_output(shell);

        match result {
            Ok(Value::String(text)) => {
                shell.console.line(&text.to_string_lossy());
                Ok(())
            }
            Ok(_) => Ok(()),
            Err(e) => Err(self.fault(&e)),
        }
    }
}
