//! Record types stored in the vault's collections.
//!
//! Every type serializes with camelCase field names; those JSON shapes are
//! also the export format.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// A user setting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Setting {
    /// Setting name (primary key).
    pub key: String,
    /// Any JSON value.
    pub value: Value,
}

/// The current text of one code document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeRecord {
    /// `lang:filename`.
    pub id: String,
    /// Language identifier.
    pub lang: String,
    /// Document name within the language.
    pub filename: String,
    /// Document text.
    pub code: String,
    /// Last write, epoch milliseconds.
    #[serde(default)]
    pub updated_at: i64,
    /// Starts at 1 and grows by one per changing save.
    #[serde(default)]
    pub version: u64,
    /// Who wrote this version.
    #[serde(default)]
    pub author: String,
    /// Free-form note for this version.
    #[serde(default)]
    pub description: String,
}

impl CodeRecord {
    /// Builds the primary key of a document.
    #[must_use]
    pub fn make_id(lang: &str, filename: &str) -> String {
        format!("{lang}:{filename}")
    }
}

/// An immutable snapshot written by a save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// Assigned by the store on insert.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    /// Language identifier.
    pub lang: String,
    /// Document name within the language.
    pub filename: String,
    /// Document version this entry records.
    pub version: u64,
    /// Document text as saved.
    pub code: String,
    /// Save message.
    #[serde(default)]
    pub message: String,
    /// Save time, epoch milliseconds.
    pub timestamp: i64,
    /// Length of `code` in characters.
    pub size: usize,
    /// Number of lines in `code`.
    pub lines: usize,
}

impl HistoryEntry {
    /// Snapshots `record` as it was just saved.
    pub(crate) fn snapshot(record: &CodeRecord, message: String) -> Self {
        Self {
            id: None,
            lang: record.lang.clone(),
            filename: record.filename.clone(),
            version: record.version,
            code: record.code.clone(),
            message,
            timestamp: record.updated_at,
            size: char_len(&record.code),
            lines: line_count(&record.code),
        }
    }
}

/// A reusable code fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snippet {
    /// Assigned by the store on insert.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    /// Language identifier.
    pub lang: String,
    /// Display name.
    pub name: String,
    /// Snippet text.
    pub code: String,
    /// Tags, sorted and de-duplicated.
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Creation time, epoch milliseconds.
    pub created_at: i64,
    /// Times the snippet was inserted.
    #[serde(default)]
    pub usage_count: u64,
}

/// Options for [`CodeVault::save_code`](crate::CodeVault::save_code).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOptions {
    /// Document name; `"main"` when unset or empty.
    pub filename: Option<String>,
    /// History message; derived from the other options when unset.
    pub message: Option<String>,
    /// Stored on the record and used as the fallback message.
    pub description: Option<String>,
    /// `"user"` when unset.
    pub author: Option<String>,
    /// Marks an editor auto-save.
    pub auto: bool,
    /// Return the existing record untouched when the code is identical.
    pub skip_if_unchanged: bool,
    /// Append a history entry with the save.
    pub log_history: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            filename: None,
            message: None,
            description: None,
            author: None,
            auto: false,
            skip_if_unchanged: true,
            log_history: true,
        }
    }
}

impl SaveOptions {
    /// Creates options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the document name.
    #[must_use]
    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Sets the history message.
    #[must_use]
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the author.
    #[must_use]
    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Marks the save as an auto-save.
    #[must_use]
    pub const fn auto(mut self, value: bool) -> Self {
        self.auto = value;
        self
    }

    /// Sets whether identical code skips the write.
    #[must_use]
    pub const fn skip_if_unchanged(mut self, value: bool) -> Self {
        self.skip_if_unchanged = value;
        self
    }

    /// Sets whether the save appends a history entry.
    #[must_use]
    pub const fn log_history(mut self, value: bool) -> Self {
        self.log_history = value;
        self
    }

    pub(crate) fn resolved_filename(&self) -> &str {
        self.filename
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or("main")
    }

    /// Message fallback: explicit message, then a non-empty description,
    /// then "Auto-save" or "Saved".
    pub(crate) fn resolved_message(&self) -> String {
        if let Some(message) = &self.message {
            return message.clone();
        }
        match self.description.as_deref() {
            Some(description) if !description.is_empty() => description.to_string(),
            _ if self.auto => "Auto-save".to_string(),
            _ => "Saved".to_string(),
        }
    }
}

/// Number of lines in `code`; an empty document has one.
pub(crate) fn line_count(code: &str) -> usize {
    code.split('\n').count()
}

/// Length of `code` in Unicode scalar values.
pub(crate) fn char_len(code: &str) -> usize {
    code.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn message_fallback_order() {
        assert_eq!(SaveOptions::new().resolved_message(), "Saved");
        assert_eq!(SaveOptions::new().auto(true).resolved_message(), "Auto-save");
        assert_eq!(
            SaveOptions::new().description("").auto(true).resolved_message(),
            "Auto-save"
        );
        assert_eq!(
            SaveOptions::new().description("fix").auto(true).resolved_message(),
            "fix"
        );
        assert_eq!(
            SaveOptions::new().description("fix").message("msg").resolved_message(),
            "msg"
        );
    }

    #[test]
    fn size_and_lines() {
        assert_eq!(line_count(""), 1);
        assert_eq!(line_count("a\nb\n"), 3);
        assert_eq!(char_len("héllo"), 5);
    }

    #[test]
    fn records_use_camel_case() {
        let record = CodeRecord {
            id: CodeRecord::make_id("js", "a"),
            lang: "js".into(),
            filename: "a".into(),
            code: "x".into(),
            updated_at: 5,
            version: 1,
            author: "user".into(),
            description: String::new(),
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["id"], json!("js:a"));
        assert_eq!(value["updatedAt"], json!(5));
    }

    #[test]
    fn unassigned_ids_are_omitted() {
        let snippet = Snippet {
            id: None,
            lang: "js".into(),
            name: "log".into(),
            code: "console.log()".into(),
            tags: ["b".to_string(), "a".to_string()].into_iter().collect(),
            created_at: 0,
            usage_count: 0,
        };
        let value = serde_json::to_value(&snippet).unwrap();
        assert!(value.get("id").is_none());
        assert_eq!(value["tags"], json!(["a", "b"]));
        assert_eq!(value["usageCount"], json!(0));
    }
}
