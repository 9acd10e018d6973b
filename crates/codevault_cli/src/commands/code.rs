//! Document and history commands.

use super::{preview, read_input, CliResult, Output};
use codevault_core::{CodeVault, SaveOptions};
use serde_json::json;
use std::path::PathBuf;

/// Arguments of the `save` command.
#[derive(Debug)]
pub struct SaveArgs {
    pub filename: String,
    pub input: Option<PathBuf>,
    pub message: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
    pub auto: bool,
    pub force: bool,
    pub no_history: bool,
}

impl SaveArgs {
    fn options(&self) -> SaveOptions {
        let mut options = SaveOptions::new()
            .filename(&self.filename)
            .auto(self.auto)
            .skip_if_unchanged(!self.force)
            .log_history(!self.no_history);
        options.message = self.message.clone();
        options.description = self.description.clone();
        options.author = self.author.clone();
        options
    }
}

/// Runs the save command.
pub fn save(vault: &CodeVault, lang: &str, args: SaveArgs, out: &Output) -> CliResult {
    let code = read_input(args.input.as_deref())?;
    let record = vault
        .save_code(lang, &code, &args.options())?
        .ok_or("language must not be empty")?;
    out.emit(&record, || {
        println!("{} saved at version {}", record.id, record.version);
    })
}

/// Runs the load command.
pub fn load(vault: &CodeVault, lang: &str, filename: &str, out: &Output) -> CliResult {
    let code = vault
        .load_code(lang, filename)?
        .ok_or("language and filename must not be empty")?;
    out.emit(&json!({ "lang": lang, "filename": filename, "code": code }), || {
        print!("{code}");
    })
}

/// Runs the list command.
pub fn list(vault: &CodeVault, lang: Option<&str>, out: &Output) -> CliResult {
    let records = vault.list_code(lang)?;
    out.emit(&records, || {
        if records.is_empty() {
            println!("No documents");
        }
        for record in &records {
            println!(
                "{:<24} v{:<4} {:>6} chars  {}",
                record.id,
                record.version,
                record.code.chars().count(),
                record.author
            );
        }
    })
}

/// Runs the history command.
pub fn history(
    vault: &CodeVault,
    lang: &str,
    filename: Option<&str>,
    limit: usize,
    out: &Output,
) -> CliResult {
    let entries = vault.get_history(lang, filename, limit)?;
    out.emit(&entries, || {
        if entries.is_empty() {
            println!("No history");
        }
        for entry in &entries {
            println!(
                "#{:<6} {}:{} v{:<4} {:>13}  {:>4} lines  {}",
                entry.id.unwrap_or_default(),
                entry.lang,
                entry.filename,
                entry.version,
                entry.timestamp,
                entry.lines,
                preview(&entry.message, 40)
            );
        }
    })
}

/// Runs the restore command.
pub fn restore(vault: &CodeVault, id: u64, out: &Output) -> CliResult {
    let entry = vault
        .restore_from_history(id)?
        .ok_or_else(|| format!("no history entry #{id}"))?;
    let record = vault.get_code_record(&entry.lang, &entry.filename)?;
    out.emit(&record, || {
        if let Some(record) = &record {
            println!(
                "{} restored from version {} as version {}",
                record.id, entry.version, record.version
            );
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::Format;

    #[test]
    fn save_args_map_to_options() {
        let args = SaveArgs {
            filename: "a".into(),
            input: None,
            message: Some("m".into()),
            description: None,
            author: Some("ada".into()),
            auto: true,
            force: true,
            no_history: false,
        };
        let options = args.options();
        assert_eq!(options.filename.as_deref(), Some("a"));
        assert!(!options.skip_if_unchanged);
        assert!(options.log_history);
        assert!(options.auto);
        assert_eq!(options.author.as_deref(), Some("ada"));
    }

    #[test]
    fn commands_run_against_a_vault() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("a.js");
        std::fs::write(&input, "print(1)").unwrap();

        let vault = CodeVault::open(&dir.path().join("store")).unwrap();
        let out = Output::new(Format::Json);
        let args = SaveArgs {
            filename: "a".into(),
            input: Some(input),
            message: None,
            description: None,
            author: None,
            auto: false,
            force: false,
            no_history: false,
        };
        save(&vault, "js", args, &out).unwrap();
        load(&vault, "js", "a", &out).unwrap();
        list(&vault, None, &out).unwrap();
        history(&vault, "js", Some("a"), 5, &out).unwrap();
        restore(&vault, 1, &out).unwrap();

        assert_eq!(vault.get_code_record("js", "a").unwrap().unwrap().version, 2);
        assert!(restore(&vault, 99, &out).is_err());
    }
}
