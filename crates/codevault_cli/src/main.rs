//! CodeVault CLI
//!
//! Command-line access to a CodeVault store.
//!
//! # Commands
//!
//! - `save`, `load`, `list`, `history`, `restore` - code documents
//! - `snippet-add`, `snippets`, `snippet-use` - snippet library
//! - `setting-get`, `setting-set` - settings
//! - `export`, `import` - whole-store interchange
//! - `stats`, `checkpoint`, `dump-wal` - maintenance and debugging

mod commands;

use clap::{Parser, Subcommand};
use codevault_core::{CodeVault, DEFAULT_HISTORY_LIMIT};
use commands::{Format, Output};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// CodeVault command-line tools.
#[derive(Parser)]
#[command(name = "codevault")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the vault directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(global = true, short, long, default_value = "text")]
    format: Format,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Save a new version of a document (code is read from stdin unless --input is given)
    Save {
        /// Language identifier
        lang: String,

        /// Document name
        #[arg(default_value = "main")]
        filename: String,

        /// Read the code from this file
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// History message
        #[arg(short, long)]
        message: Option<String>,

        /// Description stored on the record
        #[arg(short, long)]
        description: Option<String>,

        /// Author of this version
        #[arg(short, long)]
        author: Option<String>,

        /// Mark the save as an auto-save
        #[arg(long)]
        auto: bool,

        /// Write a new version even if the code is unchanged
        #[arg(long)]
        force: bool,

        /// Do not append a history entry
        #[arg(long)]
        no_history: bool,
    },

    /// Print the current code of a document
    Load {
        /// Language identifier
        lang: String,

        /// Document name
        #[arg(default_value = "main")]
        filename: String,
    },

    /// List documents
    List {
        /// Only this language
        lang: Option<String>,
    },

    /// Show the newest history entries
    History {
        /// Language identifier
        lang: String,

        /// Only this document
        filename: Option<String>,

        /// Maximum number of entries
        #[arg(short, long, default_value_t = DEFAULT_HISTORY_LIMIT)]
        limit: usize,
    },

    /// Make a history entry the current version of its document
    Restore {
        /// History entry id
        id: u64,
    },

    /// Add a snippet (code is read from stdin unless --input is given)
    SnippetAdd {
        /// Language identifier
        lang: String,

        /// Snippet name
        name: String,

        /// Read the code from this file
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Tags (repeatable)
        #[arg(short, long)]
        tag: Vec<String>,
    },

    /// List the snippets of a language
    Snippets {
        /// Language identifier
        lang: String,
    },

    /// Record one use of a snippet
    SnippetUse {
        /// Snippet id
        id: u64,
    },

    /// Read a setting
    SettingGet {
        /// Setting key
        key: String,
    },

    /// Write a setting (the value is parsed as JSON, falling back to a string)
    SettingSet {
        /// Setting key
        key: String,

        /// Setting value
        value: String,
    },

    /// Export the whole vault as JSON
    Export {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Replace the whole vault with a JSON export
    Import {
        /// Export file to read
        input: PathBuf,
    },

    /// Show record counts and sizes
    Stats,

    /// Compact the write-ahead log
    Checkpoint,

    /// Dump WAL records for debugging
    DumpWal {
        /// Maximum number of records to dump
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries command output.
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let out = Output::new(cli.format);

    let path = match cli.command {
        Commands::Version => {
            println!("CodeVault CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("CodeVault Core v{}", codevault_core::VERSION);
            return Ok(());
        }
        Commands::DumpWal { limit } => {
            let path = cli.path.ok_or("Vault path required for dump-wal")?;
            return commands::dump_wal::run(&path, limit, &out);
        }
        _ => cli.path.ok_or("Vault path required (--path)")?,
    };

    let vault = CodeVault::open(&path)?;

    match cli.command {
        Commands::Save {
            lang,
            filename,
            input,
            message,
            description,
            author,
            auto,
            force,
            no_history,
        } => {
            let options = commands::code::SaveArgs {
                filename,
                input,
                message,
                description,
                author,
                auto,
                force,
                no_history,
            };
            commands::code::save(&vault, &lang, options, &out)?;
        }
        Commands::Load { lang, filename } => commands::code::load(&vault, &lang, &filename, &out)?,
        Commands::List { lang } => commands::code::list(&vault, lang.as_deref(), &out)?,
        Commands::History {
            lang,
            filename,
            limit,
        } => commands::code::history(&vault, &lang, filename.as_deref(), limit, &out)?,
        Commands::Restore { id } => commands::code::restore(&vault, id, &out)?,
        Commands::SnippetAdd {
            lang,
            name,
            input,
            tag,
        } => commands::snippets::add(&vault, &lang, &name, input.as_deref(), tag, &out)?,
        Commands::Snippets { lang } => commands::snippets::list(&vault, &lang, &out)?,
        Commands::SnippetUse { id } => commands::snippets::use_snippet(&vault, id, &out)?,
        Commands::SettingGet { key } => commands::settings::get(&vault, &key, &out)?,
        Commands::SettingSet { key, value } => commands::settings::set(&vault, &key, &value, &out)?,
        Commands::Export { output } => commands::transfer::export(&vault, output.as_deref())?,
        Commands::Import { input } => commands::transfer::import(&vault, &input, &out)?,
        Commands::Stats => commands::inspect::stats(&vault, &out)?,
        Commands::Checkpoint => commands::inspect::checkpoint(&vault, &out)?,
        Commands::DumpWal { .. } | Commands::Version => {}
    }

    vault.close()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_save_with_options() {
        let cli = Cli::try_parse_from([
            "codevault", "--path", "store", "save", "js", "a", "-m", "msg", "--force",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Save { ref lang, ref filename, force: true, .. } if lang == "js" && filename == "a"
        ));
    }

    #[test]
    fn json_format_flag() {
        let cli = Cli::try_parse_from(["codevault", "stats", "--format", "json"]).unwrap();
        assert_eq!(cli.format, Format::Json);
    }
}
