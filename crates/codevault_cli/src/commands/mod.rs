//! CLI command implementations.

pub mod code;
pub mod dump_wal;
pub mod inspect;
pub mod settings;
pub mod snippets;
pub mod transfer;

use clap::ValueEnum;
use serde::Serialize;
use std::io::Read;
use std::path::Path;

/// Result type shared by the commands.
pub type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Human-readable text.
    Text,
    /// Pretty-printed JSON.
    Json,
}

/// Writes command results in the selected format.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    format: Format,
}

impl Output {
    /// Creates an output in `format`.
    pub fn new(format: Format) -> Self {
        Self { format }
    }

    /// Prints `value` as JSON, or runs `text` for text output.
    pub fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce()) -> CliResult {
        match self.format {
            Format::Json => println!("{}", serde_json::to_string_pretty(value)?),
            Format::Text => text(),
        }
        Ok(())
    }
}

/// Reads command input from a file, or from stdin when no file is given.
pub fn read_input(input: Option<&Path>) -> CliResult<String> {
    match input {
        Some(path) => Ok(std::fs::read_to_string(path)?),
        None => {
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text)?;
            Ok(text)
        }
    }
}

/// Shortens `text` to its first line, capped at `max` characters.
pub fn preview(text: &str, max: usize) -> String {
    let line = text.lines().next().unwrap_or("");
    let mut short: String = line.chars().take(max).collect();
    if short.len() < line.len() || text.contains('\n') {
        short.push_str("...");
    }
    short
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_truncates() {
        assert_eq!(preview("short", 10), "short");
        assert_eq!(preview("a long line", 4), "a lo...");
        assert_eq!(preview("one\ntwo", 10), "one...");
        assert_eq!(preview("", 10), "");
    }

    #[test]
    fn reads_input_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("code.js");
        std::fs::write(&path, "print(1)").unwrap();
        assert_eq!(read_input(Some(&path)).unwrap(), "print(1)");
    }
}
