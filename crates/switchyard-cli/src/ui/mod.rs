//! Terminal helpers shared by the commands and the menu.

pub mod menu;
pub mod progress;

use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::error::CliResult;

/// Ask a yes/no question; anything but `y`/`yes` is no.
pub fn confirm(question: &str) -> CliResult<bool> {
    let mut editor = DefaultEditor::new()?;
    let prompt = format!("{} [y/N] ", question.yellow());
    match editor.readline(&prompt) {
        Ok(answer) => Ok(is_yes(&answer)),
        Err(ReadlineError::Interrupted | ReadlineError::Eof) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Shorten `text` to `max` characters, marking the cut with `...`.
pub fn truncate(text: &str, max: usize) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max {
        return flat;
    }
    let cut: String = flat.chars().take(max.saturating_sub(3)).collect();
    format!("{cut}...")
}

pub fn heading(text: &str) {
    println!("{}", text.bold());
    println!("{}", "=".repeat(text.chars().count()));
}
