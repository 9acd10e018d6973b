//! Export and import of a whole vault.
//!
//! An export is one JSON document holding every record of the four
//! collections in primary-key order. Importing a document replaces the
//! vault's contents wholesale inside a single transaction: either every
//! collection ends up holding exactly the imported records, or nothing
//! changes.

use crate::error::{CoreError, CoreResult};
use crate::model::{CodeRecord, HistoryEntry, Setting, Snippet};
use crate::transaction::TransactionMode;
use crate::vault::CodeVault;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{Read, Write};

/// Export header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportMeta {
    /// Store the export was taken from.
    pub store_name: String,
    /// Its schema version.
    pub version: u32,
    /// Export time, epoch milliseconds.
    pub exported_at: i64,
}

/// Full contents of a vault.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportDocument {
    /// Export header.
    pub meta: ExportMeta,
    /// Setting records.
    #[serde(default)]
    pub settings: Vec<Value>,
    /// Code records.
    #[serde(default)]
    pub code: Vec<Value>,
    /// History records.
    #[serde(default)]
    pub history: Vec<Value>,
    /// Snippet records.
    #[serde(default)]
    pub snippets: Vec<Value>,
}

/// Reads one collection's records out of an import document.
///
/// A missing or non-array member counts as empty.
fn records<'v>(data: &'v Value, field: &str) -> &'v [Value] {
    data.get(field)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Checks one imported record; `index` is its position in the document.
type Validator = fn(usize, &Value) -> CoreResult<()>;

fn decode<T: DeserializeOwned>(collection: &str, index: usize, record: &Value) -> CoreResult<T> {
    T::deserialize(record).map_err(|e| {
        CoreError::transaction_aborted(format!("{collection}[{index}] is malformed: {e}"))
    })
}

fn check_setting(index: usize, record: &Value) -> CoreResult<()> {
    decode::<Setting>("settings", index, record).map(drop)
}

fn check_code(index: usize, record: &Value) -> CoreResult<()> {
    let code: CodeRecord = decode("code", index, record)?;
    let expected = CodeRecord::make_id(&code.lang, &code.filename);
    if code.id != expected {
        return Err(CoreError::transaction_aborted(format!(
            "code[{index}] has id {:?}, expected {expected:?}",
            code.id
        )));
    }
    Ok(())
}

fn check_history(index: usize, record: &Value) -> CoreResult<()> {
    decode::<HistoryEntry>("history", index, record).map(drop)
}

fn check_snippet(index: usize, record: &Value) -> CoreResult<()> {
    decode::<Snippet>("snippets", index, record).map(drop)
}

impl CodeVault {
    /// Captures every record of the vault.
    ///
    /// All four collections are read in one transaction, so the export is a
    /// consistent snapshot.
    pub fn export_database(&self) -> CoreResult<ExportDocument> {
        let names = &self.names;
        let (settings, code, history, snippets) =
            self.db
                .transact(&names.all(), TransactionMode::ReadOnly, |txn| {
                    Ok((
                        txn.get_all(&names.settings)?,
                        txn.get_all(&names.code)?,
                        txn.get_all(&names.history)?,
                        txn.get_all(&names.snippets)?,
                    ))
                })?;

        let document = ExportDocument {
            meta: ExportMeta {
                store_name: self.store_name(),
                version: self.version(),
                exported_at: self.now(),
            },
            settings,
            code,
            history,
            snippets,
        };
        tracing::info!(
            settings = document.settings.len(),
            code = document.code.len(),
            history = document.history.len(),
            snippets = document.snippets.len(),
            "vault exported"
        );
        Ok(document)
    }

    /// Replaces the vault's contents with an exported document.
    ///
    /// Every collection is cleared and the provided records are stored
    /// unchanged, keys included. Each record must load as its collection's
    /// record type, and a code record's id must be `lang:filename`. A record
    /// that fails either check or cannot be stored aborts the import and
    /// leaves the vault as it was.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if `data` is null or not an object
    /// - `TransactionAborted` if any record is rejected
    pub fn import_database(&self, data: &Value) -> CoreResult<()> {
        if !data.is_object() {
            return Err(CoreError::invalid_input(if data.is_null() {
                "no data to import".to_string()
            } else {
                "import data must be a JSON object".to_string()
            }));
        }

        let names = &self.names;
        let plan: [(&str, &[Value], Validator); 4] = [
            (names.settings.as_str(), records(data, "settings"), check_setting),
            (names.code.as_str(), records(data, "code"), check_code),
            (names.history.as_str(), records(data, "history"), check_history),
            (names.snippets.as_str(), records(data, "snippets"), check_snippet),
        ];

        self.db
            .transact(&names.all(), TransactionMode::ReadWrite, |txn| {
                for (collection, _, _) in &plan {
                    txn.clear(collection)?;
                }
                for (collection, records, check) in &plan {
                    for (index, record) in records.iter().enumerate() {
                        check(index, record)?;
                        txn.put(collection, record.clone())?;
                    }
                }
                Ok(())
            })?;

        tracing::info!(
            settings = plan[0].1.len(),
            code = plan[1].1.len(),
            history = plan[2].1.len(),
            snippets = plan[3].1.len(),
            "vault imported"
        );
        Ok(())
    }

    /// Writes an export as pretty-printed JSON.
    pub fn export_to_writer<W: Write>(&self, writer: W) -> CoreResult<()> {
        let document = self.export_database()?;
        serde_json::to_writer_pretty(writer, &document)?;
        Ok(())
    }

    /// Imports a JSON export read from `reader`.
    pub fn import_from_reader<R: Read>(&self, reader: R) -> CoreResult<()> {
        let data: Value = serde_json::from_reader(reader)?;
        self.import_database(&data)
    }
}
