//! Export and import commands.

use super::{CliResult, Output};
use codevault_core::CodeVault;
use serde_json::json;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Runs the export command.
///
/// Writes to `output`, or to stdout when no file is given. The export is
/// always JSON.
pub fn export(vault: &CodeVault, output: Option<&Path>) -> CliResult {
    match output {
        Some(path) => {
            let mut writer = BufWriter::new(File::create(path)?);
            vault.export_to_writer(&mut writer)?;
            writer.flush()?;
            tracing::info!(path = %path.display(), "exported vault");
        }
        None => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            vault.export_to_writer(&mut lock)?;
            writeln!(lock)?;
        }
    }
    Ok(())
}

/// Runs the import command.
pub fn import(vault: &CodeVault, input: &Path, out: &Output) -> CliResult {
    let reader = BufReader::new(File::open(input)?);
    vault.import_from_reader(reader)?;
    let stats = vault.get_stats()?;
    out.emit(
        &json!({ "imported": input.display().to_string(), "stats": stats }),
        || {
            println!(
                "Imported {} documents, {} history entries, {} snippets, {} settings",
                stats.code.count, stats.history.count, stats.snippets.count, stats.settings.count
            );
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::Format;
    use codevault_core::SaveOptions;

    #[test]
    fn export_file_imports_into_another_vault() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("export.json");

        let source = CodeVault::open_in_memory().unwrap();
        source
            .save_code("py", "print(1)", &SaveOptions::new())
            .unwrap();
        export(&source, Some(&file)).unwrap();

        let target = CodeVault::open_in_memory().unwrap();
        import(&target, &file, &Output::new(Format::Json)).unwrap();
        assert_eq!(
            target.load_code("py", "main").unwrap().as_deref(),
            Some("print(1)")
        );
    }

    #[test]
    fn import_of_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let vault = CodeVault::open_in_memory().unwrap();
        let out = Output::new(Format::Text);
        assert!(import(&vault, &dir.path().join("missing.json"), &out).is_err());
    }
}
