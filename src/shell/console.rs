//! Styled line output for the interactive shell.

use crossterm::cursor::MoveTo;
use crossterm::execute;
use crossterm::style::Stylize;
use crossterm::terminal::{Clear, ClearType};
use std::io::{self, Write};

enum Sink {
    Stdout,
    /// Plain text lines kept for inspection
    Capture(Vec<String>),
}

/// Where command output goes
pub struct Console {
    sink: Sink,
}

impl Console {
    #[must_use]
    pub fn stdout() -> Self {
        Self { sink: Sink::Stdout }
    }

    /// Console that records lines instead of printing them
    #[must_use]
    pub fn capture() -> Self {
        Self {
            sink: Sink::Capture(Vec::new()),
        }
    }

    pub fn line(&mut self, message: &str) {
        self.emit(message, |m| m.to_string());
    }

    pub fn success(&mut self, message: &str) {
        self.emit(message, |m| m.green().to_string());
    }

    pub fn warn(&mut self, message: &str) {
        self.emit(message, |m| m.yellow().to_string());
    }

    pub fn error(&mut self, message: &str) {
        self.emit(message, |m| format!("Error: {m}").red().to_string());
    }

    pub fn debug(&mut self, message: &str) {
        self.emit(message, |m| m.dark_grey().to_string());
    }

    pub fn heading(&mut self, message: &str) {
        self.emit(message, |m| m.cyan().bold().to_string());
    }

    /// Clear the screen and home the cursor; a no-op when capturing
    ///
    /// # Errors
    /// Returns an error if the terminal cannot be written to
    pub fn clear_screen(&mut self) -> io::Result<()> {
        match self.sink {
            Sink::Stdout => execute!(io::stdout(), Clear(ClearType::All), MoveTo(0, 0)),
            Sink::Capture(_) => Ok(()),
        }
    }

    /// Drain captured lines; always empty for stdout
    pub fn take_lines(&mut self) -> Vec<String> {
        match &mut self.sink {
            Sink::Capture(lines) => std::mem::take(lines),
            Sink::Stdout => Vec::new(),
        }
    }

    fn emit(&mut self, message: &str, style: impl Fn(&str) -> String) {
        match &mut self.sink {
            Sink::Stdout => {
                let mut out = io::stdout().lock();
                // A closed stdout leaves nowhere to report to
                let _ = writeln!(out, "{}", style(message));
            }
            Sink::Capture(lines) => lines.push(message.to_string()),
        }
    }
}
