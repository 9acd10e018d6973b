//! Snippet library commands.

use super::{preview, read_input, CliResult, Output};
use codevault_core::CodeVault;
use serde_json::json;
use std::path::Path;

/// Runs the snippet-add command.
pub fn add(
    vault: &CodeVault,
    lang: &str,
    name: &str,
    input: Option<&Path>,
    tags: Vec<String>,
    out: &Output,
) -> CliResult {
    let code = read_input(input)?;
    let id = vault
        .save_snippet(lang, name, &code, tags)?
        .ok_or("language must not be empty")?;
    out.emit(&json!({ "id": id }), || println!("Snippet #{id} added"))
}

/// Runs the snippets command.
pub fn list(vault: &CodeVault, lang: &str, out: &Output) -> CliResult {
    let snippets = vault.get_snippets_by_language(lang)?;
    out.emit(&snippets, || {
        if snippets.is_empty() {
            println!("No snippets for {lang}");
        }
        for snippet in &snippets {
            let tags: Vec<&str> = snippet.tags.iter().map(String::as_str).collect();
            println!(
                "#{:<6} {:<24} used {:>4}x  [{}]  {}",
                snippet.id.unwrap_or_default(),
                snippet.name,
                snippet.usage_count,
                tags.join(", "),
                preview(&snippet.code, 40)
            );
        }
    })
}

/// Runs the snippet-use command.
pub fn use_snippet(vault: &CodeVault, id: u64, out: &Output) -> CliResult {
    let count = vault
        .increment_snippet_usage(id)?
        .ok_or_else(|| format!("no snippet #{id}"))?;
    let snippet = vault.get_snippet(id)?;
    out.emit(&snippet, || {
        if let Some(snippet) = &snippet {
            print!("{}", snippet.code);
        }
    })?;
    tracing::debug!(id, count, "snippet used");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::Format;

    #[test]
    fn add_list_and_use() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("loop.js");
        std::fs::write(&input, "for (;;) {}").unwrap();

        let vault = CodeVault::open_in_memory().unwrap();
        let out = Output::new(Format::Json);
        add(&vault, "js", "loop", Some(&input), vec!["basics".into()], &out).unwrap();
        list(&vault, "js", &out).unwrap();
        use_snippet(&vault, 1, &out).unwrap();

        assert_eq!(vault.get_snippet(1).unwrap().unwrap().usage_count, 1);
        assert!(use_snippet(&vault, 42, &out).is_err());
        assert!(add(&vault, "", "x", Some(&input), Vec::new(), &out).is_err());
    }
}
