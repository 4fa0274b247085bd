//! Interactive read-eval loop
//!
//! Reads one line at a time with rustyline, dispatches it through the
//! [`Shell`] and refreshes the editor helper so completion and highlighting
//! see reloads and alias changes immediately.

use anyhow::{Context, Result};
use crossterm::style::Stylize;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{CompletionType, Config as EditorConfig, EditMode, Editor};
use std::fs;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::shell::Shell;
use crate::ui::ShellHelper;

pub struct Terminal {
    shell: Shell,
    editor: Editor<ShellHelper, DefaultHistory>,
}

impl Terminal {
    /// Build the shell and the line editor
    ///
    /// # Errors
    /// Returns an error if the shell state or the editor cannot be set up
    pub fn new(config: Config) -> Result<Self> {
        let editor_config = EditorConfig::builder()
            .max_history_size(config.shell.max_history)
            .context("Invalid history size")?
            .history_ignore_dups(true)
            .context("Invalid history settings")?
            .completion_type(CompletionType::List)
            .edit_mode(EditMode::Emacs)
            .build();

        let shell = Shell::new(config)?;
        let mut editor: Editor<ShellHelper, DefaultHistory> =
            Editor::with_config(editor_config).context("Failed to create line editor")?;
        editor.set_helper(Some(ShellHelper::new(shell.registry())));

        let history = &shell.config().paths.history_file;
        if history.exists() {
            if let Err(e) = editor.load_history(history) {
                warn!("Failed to load history from {}: {}", history.display(), e);
            }
        }

        Ok(Self { shell, editor })
    }

    /// Load plugins and run until `exit`, Ctrl-C or Ctrl-D
    ///
    /// # Errors
    /// Returns an error if reading from the terminal fails
    pub fn run(&mut self) -> Result<()> {
        let report = self.shell.reload();
        info!(
            "Ready: {} commands registered, {} plugin commands",
            self.shell.registry().list_distinct().len(),
            report.commands
        );
        self.refresh_helper();

        println!(
            "{} {} - type 'help' for commands, 'exit' to quit",
            "crucible".cyan().bold(),
            env!("CARGO_PKG_VERSION")
        );

        let prompt = self.shell.config().shell.prompt.clone();
        loop {
            match self.editor.readline(&prompt) {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    if let Err(e) = self.editor.add_history_entry(line) {
                        debug!("History entry dropped: {}", e);
                    }
                    if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
                        break;
                    }

                    self.shell.run_line(line);
                    self.refresh_helper();
                }
                Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
                Err(e) => return Err(e).context("Failed to read input"),
            }
        }

        self.save_history();
        Ok(())
    }

    fn refresh_helper(&mut self) {
        if let Some(helper) = self.editor.helper_mut() {
            helper.refresh(self.shell.registry());
        }
    }

    fn save_history(&mut self) {
        let history = self.shell.config().paths.history_file.clone();
        if let Some(parent) = history.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                warn!("Failed to create {}: {}", parent.display(), e);
                return;
            }
        }
        if let Err(e) = self.editor.save_history(&history) {
            warn!("Failed to save history to {}: {}", history.display(), e);
        }
    }
}
