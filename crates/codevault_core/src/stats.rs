//! Vault statistics.

use crate::error::CoreResult;
use crate::model::char_len;
use crate::transaction::{Transaction, TransactionMode};
use crate::vault::CodeVault;
use serde::Serialize;
use serde_json::Value;

/// Record count and approximate size of one collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CollectionStats {
    /// Number of records.
    pub count: usize,
    /// Approximate size in characters.
    pub size: usize,
}

/// Statistics for the whole vault.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    /// Settings; size is the serialized length of each record.
    pub settings: CollectionStats,
    /// Code documents; size is the length of their code.
    pub code: CollectionStats,
    /// History entries; size is the length of their code.
    pub history: CollectionStats,
    /// Snippets; size is the length of their code.
    pub snippets: CollectionStats,
    /// Sum of the four sizes.
    pub total_size: usize,
}

fn measure(
    txn: &Transaction<'_>,
    collection: &str,
    size_of: impl Fn(&Value) -> usize,
) -> CoreResult<CollectionStats> {
    let records = txn.get_all(collection)?;
    Ok(CollectionStats {
        count: records.len(),
        size: records.iter().map(size_of).sum(),
    })
}

fn code_size(record: &Value) -> usize {
    record.get("code").and_then(Value::as_str).map_or(0, char_len)
}

fn json_size(record: &Value) -> usize {
    char_len(&record.to_string())
}

impl CodeVault {
    /// Counts and sizes every collection from one consistent snapshot.
    pub fn get_stats(&self) -> CoreResult<Stats> {
        let names = &self.names;
        self.db
            .transact(&names.all(), TransactionMode::ReadOnly, |txn| {
                let settings = measure(txn, &names.settings, json_size)?;
                let code = measure(txn, &names.code, code_size)?;
                let history = measure(txn, &names.history, code_size)?;
                let snippets = measure(txn, &names.snippets, code_size)?;
                Ok(Stats {
                    settings,
                    code,
                    history,
                    snippets,
                    total_size: settings.size + code.size + history.size + snippets.size,
                })
            })
    }
}
