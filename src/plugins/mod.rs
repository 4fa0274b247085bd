// Plugin system: Lua sources compiled into shell commands
// - Fingerprint-validated artifact cache across reloads
// - Enable/disable by atomic rename
// - Advisory static scan of plugin sources
// - Hash-pinned verification marks
pub mod api;
pub mod cache;
pub mod compiler;
pub mod fingerprint;
pub mod lifecycle;
pub mod loader;
pub mod metadata;
pub mod scanner;
pub mod verified;

pub use api::{Command, CommandInfo};
pub use compiler::{CompilationService, CompileError, LuaCompiler, PluginShape, SourceUnit};
pub use lifecycle::ExtensionManager;
pub use loader::{LoadReport, PluginLoader};
pub use scanner::{ScanReport, ScanRules, SecurityScanner};
pub use verified::VerifiedHashes;
