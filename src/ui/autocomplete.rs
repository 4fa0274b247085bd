use crossterm::style::Stylize;
use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Helper};
use std::borrow::Cow;

use crate::registry::CommandRegistry;

/// Line editor helper: command completion, ghost hints and a green/red
/// leading token.
///
/// Holds a snapshot of the registry; call [`ShellHelper::refresh`] after
/// every dispatched line so reloads and alias changes show up.
pub struct ShellHelper {
    registry: CommandRegistry,
}

impl ShellHelper {
    #[must_use]
    pub fn new(registry: &CommandRegistry) -> Self {
        Self {
            registry: registry.clone(),
        }
    }

    pub fn refresh(&mut self, registry: &CommandRegistry) {
        self.registry = registry.clone();
    }
}

/// Byte range of the first word in `line`
fn first_word(line: &str) -> (usize, usize) {
    let start = line.len() - line.trim_start().len();
    let end = line[start..]
        .find(char::is_whitespace)
        .map_or(line.len(), |i| start + i);
    (start, end)
}

impl Completer for ShellHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let (start, end) = first_word(line);
        // Only the command name is completed
        if pos < start || pos > end {
            return Ok((pos, Vec::new()));
        }

        let candidates = self
            .registry
            .suggest_prefix(&line[start..pos])
            .into_iter()
            .map(|key| Pair {
                display: key.clone(),
                replacement: key,
            })
            .collect();
        Ok((start, candidates))
    }
}

impl Hinter for ShellHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        if pos < line.len() {
            return None;
        }
        self.registry.ghost_suffix(line)
    }
}

impl Highlighter for ShellHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        let (start, end) = first_word(line);
        if start == end {
            return Cow::Borrowed(line);
        }

        let word = &line[start..end];
        let styled = if self.registry.resolve(word).is_some() {
            word.green()
        } else {
            word.red()
        };
        Cow::Owned(format!("{}{}{}", &line[..start], styled, &line[end..]))
    }

    fn highlight_hint<'h>(&self, hint: &'h str) -> Cow<'h, str> {
        Cow::Owned(hint.dark_grey().to_string())
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        // Validity can change with any keystroke
        true
    }
}

impl Validator for ShellHelper {}

impl Helper for ShellHelper {}
