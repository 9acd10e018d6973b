//! Revision history.

use crate::code::{document_history_range, find_code, next_version};
use crate::composite_key;
use crate::error::CoreResult;
use crate::index::{Direction, KeyRange};
use crate::model::{CodeRecord, HistoryEntry};
use crate::schema::{HISTORY_BY_LANG_FILENAME_TIMESTAMP, HISTORY_BY_LANG_TIMESTAMP};
use crate::transaction::TransactionMode;
use crate::types::RecordKey;
use crate::vault::CodeVault;

/// Picks the index and range covering a language or one of its documents.
fn history_scan(lang: &str, filename: Option<&str>) -> (&'static str, KeyRange) {
    match filename {
        Some(filename) => (
            HISTORY_BY_LANG_FILENAME_TIMESTAMP,
            document_history_range(lang, filename),
        ),
        None => (
            HISTORY_BY_LANG_TIMESTAMP,
            KeyRange::inclusive(composite_key![lang, i64::MIN], composite_key![lang, i64::MAX]),
        ),
    }
}

impl CodeVault {
    /// Returns the newest history entries of a language, or of one document.
    ///
    /// Entries come newest first (equal timestamps: last written first) and
    /// the index scan stops after `limit` of them. An empty `lang` yields
    /// nothing.
    pub fn get_history(
        &self,
        lang: &str,
        filename: Option<&str>,
        limit: usize,
    ) -> CoreResult<Vec<HistoryEntry>> {
        if lang.is_empty() {
            return Ok(Vec::new());
        }
        let (index, range) = history_scan(lang, filename);
        self.db
            .scan_index_as(&self.names.history, index, &range, Direction::Reverse, Some(limit))
    }

    /// Looks up one history entry.
    pub fn get_history_entry(&self, id: u64) -> CoreResult<Option<HistoryEntry>> {
        self.db.get_as(&self.names.history, &RecordKey::Int(id))
    }

    /// Makes a past revision the current version of its document.
    ///
    /// The document gets the snapshot's code as a new version, authored by
    /// `"restore"`. The restore itself is not logged to history. Returns the
    /// entry restored from, or `None` if no entry has that id.
    pub fn restore_from_history(&self, id: u64) -> CoreResult<Option<HistoryEntry>> {
        let names = &self.names;
        let restored = self.db.transact(
            &[names.code.as_str(), names.history.as_str()],
            TransactionMode::ReadWrite,
            |txn| {
                let Some(entry) = txn.get_as::<HistoryEntry>(&names.history, &RecordKey::Int(id))? else {
                    return Ok(None);
                };
                let current = find_code(txn, &names.code, &entry.lang, &entry.filename)?;
                let version = match current {
                    Some(record) => next_version(&record)?,
                    None => 1,
                };

                let record = CodeRecord {
                    id: CodeRecord::make_id(&entry.lang, &entry.filename),
                    lang: entry.lang.clone(),
                    filename: entry.filename.clone(),
                    code: entry.code.clone(),
                    updated_at: self.now(),
                    version,
                    author: "restore".to_string(),
                    description: format!("Restored from version {}", entry.version),
                };
                txn.put_as(&names.code, &record)?;
                Ok(Some((entry, version)))
            },
        )?;

        Ok(restored.map(|(entry, version)| {
            tracing::info!(
                history_id = id,
                lang = %entry.lang,
                filename = %entry.filename,
                from = entry.version,
                to = version,
                "restored from history"
            );
            entry
        }))
    }

    /// Deletes the history of a language, or of one document.
    ///
    /// Returns how many entries were removed.
    pub fn clear_history(&self, lang: &str, filename: Option<&str>) -> CoreResult<usize> {
        if lang.is_empty() {
            return Ok(0);
        }
        let (index, range) = history_scan(lang, filename);
        let history = self.names.history.as_str();
        let removed = self.db.transact(&[history], TransactionMode::ReadWrite, |txn| {
            let entries: Vec<HistoryEntry> =
                txn.scan_index_as(history, index, &range, Direction::Forward, None)?;
            let mut removed = 0;
            for id in entries.into_iter().filter_map(|entry| entry.id) {
                if txn.delete(history, &RecordKey::Int(id))? {
                    removed += 1;
                }
            }
            Ok(removed)
        })?;
        tracing::debug!(lang, ?filename, removed, "history cleared");
        Ok(removed)
    }
}
