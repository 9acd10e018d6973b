//! Stats and checkpoint commands.

use super::{CliResult, Output};
use codevault_core::{CodeVault, CollectionStats};
use serde::Serialize;

/// Checkpoint result.
#[derive(Debug, Serialize)]
pub struct CheckpointResult {
    /// Sequence number covered by the checkpoint.
    pub sequence: u64,
    /// WAL size in bytes before the checkpoint.
    pub wal_before: u64,
    /// WAL size in bytes after the checkpoint.
    pub wal_after: u64,
}

/// Runs the stats command.
pub fn stats(vault: &CodeVault, out: &Output) -> CliResult {
    let stats = vault.get_stats()?;
    out.emit(&stats, || {
        println!("CodeVault Statistics");
        println!("====================");
        println!();
        println!("Store:     {} (v{})", vault.store_name(), vault.version());
        print_collection("Settings", &stats.settings);
        print_collection("Code", &stats.code);
        print_collection("History", &stats.history);
        print_collection("Snippets", &stats.snippets);
        println!();
        println!("Total size: {} chars", stats.total_size);
    })
}

/// Runs the checkpoint command.
pub fn checkpoint(vault: &CodeVault, out: &Output) -> CliResult {
    let wal_before = vault.database().wal_size()?;
    let sequence = vault.checkpoint()?;
    let result = CheckpointResult {
        sequence: sequence.as_u64(),
        wal_before,
        wal_after: vault.database().wal_size()?,
    };
    out.emit(&result, || {
        println!(
            "Checkpoint at sequence {}: WAL {} -> {}",
            result.sequence,
            format_size(result.wal_before),
            format_size(result.wal_after)
        );
    })
}

fn print_collection(label: &str, stats: &CollectionStats) {
    println!(
        "{:<10} {:>6} records  {:>10} chars",
        format!("{label}:"),
        stats.count,
        stats.size
    );
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.2} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::Format;
    use codevault_core::SaveOptions;

    #[test]
    fn format_size_units() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.00 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.00 MB");
    }

    #[test]
    fn stats_and_checkpoint_run() {
        let dir = tempfile::tempdir().unwrap();
        let vault = CodeVault::open(dir.path()).unwrap();
        for i in 0..5 {
            vault
                .save_code("js", &format!("v{i}"), &SaveOptions::new())
                .unwrap();
        }
        let out = Output::new(Format::Text);
        stats(&vault, &out).unwrap();
        checkpoint(&vault, &out).unwrap();
        assert_eq!(vault.get_history("js", None, 50).unwrap().len(), 5);
    }
}
