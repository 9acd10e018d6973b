//! Settings commands.

use super::{CliResult, Output};
use codevault_core::CodeVault;
use serde_json::{json, Value};

/// Parses a command-line value as JSON, falling back to a plain string.
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Runs the setting-get command.
pub fn get(vault: &CodeVault, key: &str, out: &Output) -> CliResult {
    let value = vault.get_setting(key)?;
    out.emit(&json!({ "key": key, "value": value }), || match &value {
        Some(value) => println!("{value}"),
        None => println!("{key} is not set"),
    })
}

/// Runs the setting-set command.
pub fn set(vault: &CodeVault, key: &str, raw: &str, out: &Output) -> CliResult {
    let value = parse_value(raw);
    if !vault.save_setting(key, value.clone())? {
        return Err("setting key must not be empty".into());
    }
    out.emit(&json!({ "key": key, "value": value }), || {
        println!("{key} = {value}");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::Format;

    #[test]
    fn values_parse_as_json_or_text() {
        assert_eq!(parse_value("14"), json!(14));
        assert_eq!(parse_value("true"), json!(true));
        assert_eq!(parse_value("{\"a\":1}"), json!({ "a": 1 }));
        assert_eq!(parse_value("dark"), json!("dark"));
    }

    #[test]
    fn set_then_get() {
        let vault = CodeVault::open_in_memory().unwrap();
        let out = Output::new(Format::Text);
        set(&vault, "theme", "dark", &out).unwrap();
        get(&vault, "theme", &out).unwrap();
        assert_eq!(vault.get_setting("theme").unwrap(), Some(json!("dark")));
        assert!(set(&vault, "", "1", &out).is_err());
    }
}
