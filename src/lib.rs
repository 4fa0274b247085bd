//! Crucible - an interactive shell whose command set comes from Lua plugins
//!
//! Plugins are compiled on demand, cached across reloads while their content
//! fingerprint is unchanged, and registered next to the built-in commands.
//!
//! # Modules
//!
//! - [`plugins`]: Compilation, artifact cache, loader, lifecycle and scanner
//! - [`registry`]: Case-insensitive command registry and user aliases
//! - [`shell`]: The coordinating service object and built-in commands
//! - [`config`]: Configuration management and serialization
//! - [`terminal`]: Interactive line-editing loop
//! - [`ui`]: Line editor completion, hints and highlighting
//! - [`error`]: Library error type

pub mod config;
pub mod error;
pub mod plugins;
pub mod registry;
pub mod shell;
pub mod terminal;
pub mod ui;

pub use error::{Error, Result};
