//! Commands shipped with the shell itself.
//!
//! Built-ins are registered before any plugin on every reload, so a plugin
//! may shadow one but a broken plugin directory never removes them.

use chrono::Local;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Instant;

use super::Shell;
use crate::error::{Error, Result};
use crate::plugins::api::{Command, CommandInfo};
use crate::plugins::compiler::SCRIPT_EXTENSION;
use crate::plugins::lifecycle::DISABLED_SUFFIX;
use crate::plugins::scanner::ScanReport;

/// Nested `script` invocations allowed before giving up
const MAX_SCRIPT_DEPTH: usize = 8;

static COMMAND_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9_-]{0,63}$").expect("command name pattern is valid")
});

type Handler = fn(&mut Shell, &[String]) -> Result<()>;

struct Builtin {
    info: CommandInfo,
    run: Handler,
}

impl Command for Builtin {
    fn info(&self) -> &CommandInfo {
        &self.info
    }

    fn execute(&self, shell: &mut Shell, args: &[String]) -> Result<()> {
        (self.run)(shell, args)
    }
}

fn builtin(
    name: &str,
    description: &str,
    aliases: &[&str],
    usage: Option<&str>,
    run: Handler,
) -> Rc<dyn Command> {
    Rc::new(Builtin {
        info: CommandInfo::builtin(name, description, aliases, usage),
        run,
    })
}

/// Every built-in command
#[must_use]
pub fn all() -> Vec<Rc<dyn Command>> {
    vec![
        builtin("help", "Show available commands or details for one", &["?"], Some("help [command]"), help),
        builtin("list", "List commands and disabled extensions", &["ls", "dir"], None, list),
        builtin("reload", "Reload all extensions", &[], Some("reload [--clean]"), reload),
        builtin("enable", "Enable a disabled extension", &[], Some("enable <name|file>"), enable),
        builtin("disable", "Disable an extension", &[], Some("disable <name|file>"), disable),
        builtin(
            "alias",
            "Manage user aliases",
            &[],
            Some("alias add <command> <alias> | alias remove <alias> | alias list"),
            alias,
        ),
        builtin("scan", "Scan extensions for sensitive calls", &[], Some("scan [file]"), scan),
        builtin("plugins", "Show metadata of loaded plugins", &[], None, plugins),
        builtin("new", "Create a new extension from a template", &["template"], Some("new <name>"), new_extension),
        builtin("import", "Copy a plugin file into the extension directory", &[], Some("import <file>"), import),
        builtin("time", "Show the current local time", &[], None, time),
        builtin("debug", "Run a command with timing and argument dump", &[], Some("debug <command> [args...]"), debug),
        builtin("script", "Run commands from a file", &["batch", "run"], Some("script <file>"), script),
        builtin("clear", "Clear the screen", &["cls"], None, clear),
    ]
}

fn usage_error(shell: &Shell, name: &str) -> Error {
    let usage = shell
        .registry()
        .resolve(name)
        .and_then(|c| c.info().usage.clone())
        .unwrap_or_else(|| name.to_string());
    Error::Usage(usage)
}

fn help(shell: &mut Shell, args: &[String]) -> Result<()> {
    if let Some(name) = args.first() {
        let command = shell
            .registry()
            .resolve(name)
            .ok_or_else(|| Error::NotFound(name.clone()))?;
        let info = command.info();

        shell.console.heading(&info.name);
        shell.console.line(&format!("  {}", info.description));
        if let Some(usage) = &info.usage {
            shell.console.line(&format!("  Usage: {usage}"));
        }
        if !info.aliases.is_empty() {
            shell.console.line(&format!("  Aliases: {}", info.aliases.join(", ")));
        }
        shell
            .console
            .line(&format!("  Author: {}  Version: {}", info.author, info.version));
        if let Some(origin) = command.origin() {
            shell.console.line(&format!("  Source: {}", origin.display()));
        }
        return Ok(());
    }

    shell.console.heading("Available commands:");
    for command in shell.registry().list_distinct() {
        let info = command.info();
        let aliases = if info.aliases.is_empty() {
            String::new()
        } else {
            format!(" ({})", info.aliases.join(", "))
        };
        shell
            .console
            .line(&format!("  {:<12}{} - {}", info.name, aliases, info.description));
    }
    shell.console.line("Type 'help <command>' for details.");
    Ok(())
}

fn list(shell: &mut Shell, _args: &[String]) -> Result<()> {
    let commands = shell.registry().list_distinct();
    shell.console.heading(&format!("{} commands:", commands.len()));
    for command in commands {
        let (source, mark) = match command.origin() {
            Some(origin) => (display_name(origin), shell.config().verified.mark(origin)),
            None => ("built-in".to_string(), ""),
        };
        shell
            .console
            .line(&format!("  {:<16}[{}]{}", command.info().name, source, mark));
    }

    let disabled = shell.extensions().list_disabled()?;
    if !disabled.is_empty() {
        shell.console.heading("Disabled extensions:");
        for path in disabled {
            let mark = shell.config().verified.mark(&path);
            shell
                .console
                .line(&format!("  {}{}", display_name(&path), mark));
        }
    }
    Ok(())
}

fn reload(shell: &mut Shell, args: &[String]) -> Result<()> {
    let report = match args.first().map(String::as_str) {
        None => shell.reload(),
        Some("--clean") => shell.reload_clean(),
        Some(_) => return Err(usage_error(shell, "reload")),
    };
    shell.console.success(&format!(
        "Loaded {} plugin commands ({} compiled, {} cached, {} failed)",
        report.commands,
        report.compiled,
        report.cache_hits,
        report.failures.len()
    ));
    Ok(())
}

fn enable(shell: &mut Shell, args: &[String]) -> Result<()> {
    let [name] = args else {
        return Err(usage_error(shell, "enable"));
    };
    let path = shell.extensions().enable(name)?;
    shell.reload();
    shell
        .console
        .success(&format!("Enabled {}", display_name(&path)));
    Ok(())
}

fn disable(shell: &mut Shell, args: &[String]) -> Result<()> {
    let [name] = args else {
        return Err(usage_error(shell, "disable"));
    };
    let path = shell.extensions().disable(name)?;
    shell.reload();
    shell
        .console
        .success(&format!("Disabled {}", display_name(&path)));
    Ok(())
}

fn alias(shell: &mut Shell, args: &[String]) -> Result<()> {
    match args {
        [action, command, alias] if action == "add" => {
            let target = shell
                .registry()
                .resolve(command)
                .ok_or_else(|| Error::NotFound(command.clone()))?;
            let canonical = target.info().key();
            shell.registry_mut().overlay_mut().add(&canonical, alias)?;
            shell
                .console
                .success(&format!("'{alias}' now runs '{canonical}'"));
        }
        [action, alias] if action == "remove" => {
            if !shell.registry_mut().overlay_mut().remove(alias)? {
                return Err(Error::NotFound(alias.clone()));
            }
            shell.console.success(&format!("Removed alias '{alias}'"));
        }
        [action] if action == "list" => {
            let entries: Vec<(String, String)> = shell
                .registry()
                .overlay()
                .list_all()
                .iter()
                .map(|(a, c)| (a.clone(), c.clone()))
                .collect();
            if entries.is_empty() {
                shell.console.line("No aliases defined");
            }
            for (alias, canonical) in entries {
                shell.console.line(&format!("  {alias} -> {canonical}"));
            }
        }
        _ => return Err(usage_error(shell, "alias")),
    }
    Ok(())
}

fn scan(shell: &mut Shell, args: &[String]) -> Result<()> {
    match args {
        [] => scan_all(shell),
        [file] => {
            let path = resolve_plugin_path(shell, file);
            let report = shell.scanner().scan(&path)?;
            print_report(shell, &report);
            Ok(())
        }
        _ => Err(usage_error(shell, "scan")),
    }
}

/// Scan every active extension; a file that cannot be scanned is reported
/// and the pass moves on
fn scan_all(shell: &mut Shell) -> Result<()> {
    let targets = shell.extensions().list_active()?;
    if targets.is_empty() {
        shell.console.line("No extensions to scan");
        return Ok(());
    }

    for path in targets {
        match shell.scanner().scan(&path) {
            Ok(report) => print_report(shell, &report),
            Err(e) => shell.console.error(&e.to_string()),
        }
    }
    Ok(())
}

/// A bare file name that does not exist relative to the working directory is
/// looked up in the extension directory
fn resolve_plugin_path(shell: &Shell, file: &str) -> PathBuf {
    let given = PathBuf::from(file);
    if given.exists() {
        return given;
    }
    let in_extensions = shell.extensions().extensions_dir().join(file);
    if in_extensions.exists() {
        in_extensions
    } else {
        given
    }
}

fn import(shell: &mut Shell, args: &[String]) -> Result<()> {
    let [source] = args else {
        return Err(usage_error(shell, "import"));
    };
    let lowered = source.to_ascii_lowercase();
    if lowered.starts_with("http://") || lowered.starts_with("https://") {
        return Err(Error::Usage(
            "import <file> (download the plugin first; URLs are not fetched)".to_string(),
        ));
    }

    let path = shell.extensions().import(Path::new(source))?;
    shell.reload();
    shell
        .console
        .success(&format!("Imported {}", display_name(&path)));
    Ok(())
}

fn print_report(shell: &mut Shell, report: &ScanReport) {
    let name = display_name(&report.path);
    if report.is_clean() {
        shell.console.success(&format!("{name}: no issues found"));
        return;
    }
    shell
        .console
        .warn(&format!("{name}: {} potential issue(s)", report.issue_count()));
    for finding in &report.findings {
        shell
            .console
            .line(&format!("  [{:?}] {}", finding.kind, finding.fragment));
    }
}

fn plugins(shell: &mut Shell, _args: &[String]) -> Result<()> {
    let records = match shell.loader().metadata().load() {
        Ok(records) => records,
        Err(e) => {
            shell
                .console
                .error(&format!("Cannot read plugin metadata: {e:#}"));
            return Ok(());
        }
    };
    if records.is_empty() {
        shell.console.line("No plugins loaded");
    } else {
        shell.console.heading("Loaded plugins:");
    }
    for record in records {
        let mark = shell.config().verified.mark(&record.source);
        shell.console.line(&format!(
            "  {} v{} by {} ({}) loaded {}{}",
            record.name,
            record.version,
            record.author,
            display_name(&record.source),
            record.loaded_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S"),
            mark
        ));
    }

    let stats = shell.loader().cache().stats();
    shell.console.debug(&format!(
        "Artifact cache: {} entries, {} hits, {} misses",
        stats.entries, stats.hits, stats.misses
    ));
    Ok(())
}

fn new_extension(shell: &mut Shell, args: &[String]) -> Result<()> {
    let [name] = args else {
        return Err(usage_error(shell, "new"));
    };
    if !COMMAND_NAME.is_match(name) {
        return Err(Error::Usage(format!(
            "'{name}' is not a valid command name (letters, digits, '-' and '_', starting with a letter)"
        )));
    }

    let file_name = format!("{}.{SCRIPT_EXTENSION}", name.to_lowercase());
    let dir = shell.extensions().extensions_dir().to_path_buf();
    let path = dir.join(&file_name);
    let disabled = dir.join(format!("{file_name}{DISABLED_SUFFIX}"));
    for existing in [&path, &disabled] {
        if existing.exists() {
            return Err(Error::Conflict(existing.clone()));
        }
    }

    fs::create_dir_all(&dir)?;
    fs::write(&path, template(name))?;
    shell.reload();
    shell
        .console
        .success(&format!("Created {}", path.display()));
    Ok(())
}

fn template(name: &str) -> String {
    format!(
        r#"-- {name}: edit this file, then run `reload`
return {{
    name = "{name}",
    description = "Describe what {name} does",
    aliases = {{}},
    author = "Unknown",
    version = "1.0",
    usage = "{name} [args...]",

    execute = function(self, args)
        shell.print("Hello from {name}! Arguments: " .. table.concat(args, " "))
    end,
}}
"#
    )
}

fn time(shell: &mut Shell, _args: &[String]) -> Result<()> {
    let now = Local::now();
    shell
        .console
        .line(&now.format("%Y-%m-%d %H:%M:%S %Z").to_string());
    Ok(())
}

fn debug(shell: &mut Shell, args: &[String]) -> Result<()> {
    let Some((name, rest)) = args.split_first() else {
        return Err(usage_error(shell, "debug"));
    };

    shell
        .console
        .debug(&format!("Command: {name}"));
    shell
        .console
        .debug(&format!("Arguments: {}", serde_json::to_string(rest)?));

    let line = std::iter::once(name)
        .chain(rest)
        .map(|word| quote(word.as_str()))
        .collect::<Vec<_>>()
        .join(" ");
    let started = Instant::now();
    let result = shell.dispatch(&line);
    shell.console.debug(&format!(
        "Finished in {:.3} ms ({})",
        started.elapsed().as_secs_f64() * 1000.0,
        if result.is_ok() { "ok" } else { "failed" }
    ));
    result
}

/// Re-quote a word so it survives another round of argument splitting
fn quote(word: &str) -> String {
    if !word.is_empty() && !word.contains(|c: char| c.is_whitespace() || c == '"' || c == '\'') {
        return word.to_string();
    }
    if word.contains('"') {
        format!("'{word}'")
    } else {
        format!("\"{word}\"")
    }
}

fn script(shell: &mut Shell, args: &[String]) -> Result<()> {
    let [file] = args else {
        return Err(usage_error(shell, "script"));
    };
    if shell.script_depth >= MAX_SCRIPT_DEPTH {
        return Err(Error::Usage(format!(
            "scripts nested deeper than {MAX_SCRIPT_DEPTH} levels"
        )));
    }
    let contents = fs::read_to_string(file).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::NotFound(file.clone()),
        _ => Error::Io(e),
    })?;

    shell.script_depth += 1;
    for line in contents.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        shell.console.debug(&format!("> {line}"));
        shell.run_line(line);
    }
    shell.script_depth -= 1;
    Ok(())
}

fn clear(shell: &mut Shell, _args: &[String]) -> Result<()> {
    shell.console.clear_screen()?;
    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}
