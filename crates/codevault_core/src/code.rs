//! Versioned code documents.

use crate::composite_key;
use crate::error::{CoreError, CoreResult};
use crate::index::{Direction, KeyRange};
use crate::model::{CodeRecord, HistoryEntry, SaveOptions};
use crate::schema::{CODE_BY_LANG_FILENAME, HISTORY_BY_LANG_FILENAME_TIMESTAMP};
use crate::transaction::{Transaction, TransactionMode};
use crate::types::RecordKey;
use crate::vault::CodeVault;

/// Finds the document for (lang, filename) through the unique index.
pub(crate) fn find_code(
    txn: &Transaction<'_>,
    collection: &str,
    lang: &str,
    filename: &str,
) -> CoreResult<Option<CodeRecord>> {
    let hits: Vec<CodeRecord> = txn.scan_index_as(
        collection,
        CODE_BY_LANG_FILENAME,
        &KeyRange::only(composite_key![lang, filename]),
        Direction::Forward,
        Some(1),
    )?;
    Ok(hits.into_iter().next())
}

/// Version that follows `record`'s current one.
pub(crate) fn next_version(record: &CodeRecord) -> CoreResult<u64> {
    record.version.checked_add(1).ok_or_else(|| {
        CoreError::invalid_operation(format!("{} has no version after {}", record.id, record.version))
    })
}

/// Every history entry of one document, oldest first.
pub(crate) fn document_history_range(lang: &str, filename: &str) -> KeyRange {
    KeyRange::inclusive(
        composite_key![lang, filename, i64::MIN],
        composite_key![lang, filename, i64::MAX],
    )
}

impl CodeVault {
    /// Loads the text of a document.
    ///
    /// Returns `None` if `lang` or `filename` is empty and an empty string
    /// if the document was never saved.
    pub fn load_code(&self, lang: &str, filename: &str) -> CoreResult<Option<String>> {
        if lang.is_empty() || filename.is_empty() {
            return Ok(None);
        }
        let record = self.get_code_record(lang, filename)?;
        Ok(Some(record.map(|r| r.code).unwrap_or_default()))
    }

    /// Loads the full record of a document.
    pub fn get_code_record(&self, lang: &str, filename: &str) -> CoreResult<Option<CodeRecord>> {
        if lang.is_empty() || filename.is_empty() {
            return Ok(None);
        }
        self.db
            .transact(&[self.names.code.as_str()], TransactionMode::ReadOnly, |txn| {
                find_code(txn, &self.names.code, lang, filename)
            })
    }

    /// Saves a new version of a document.
    ///
    /// The version check, the record write and the history entry run in
    /// one transaction over the code and history collections. When
    /// `skip_if_unchanged` is set and the stored code is identical, the
    /// stored record is returned and nothing is written.
    ///
    /// Returns `None` without writing if `lang` is empty.
    pub fn save_code(
        &self,
        lang: &str,
        code: &str,
        options: &SaveOptions,
    ) -> CoreResult<Option<CodeRecord>> {
        if lang.is_empty() {
            return Ok(None);
        }
        let filename = options.resolved_filename();
        let names = &self.names;

        let (record, written) = self.db.transact(
            &[names.code.as_str(), names.history.as_str()],
            TransactionMode::ReadWrite,
            |txn| {
                let existing = find_code(txn, &names.code, lang, filename)?;
                if let Some(existing) = existing {
                    if options.skip_if_unchanged && existing.code == code {
                        return Ok((existing, false));
                    }
                    let version = next_version(&existing)?;
                    return self.write_version(txn, options, lang, filename, code, version);
                }
                self.write_version(txn, options, lang, filename, code, 1)
            },
        )?;

        if written {
            tracing::debug!(id = %record.id, version = record.version, "code saved");
        } else {
            tracing::debug!(id = %record.id, version = record.version, "code unchanged, save skipped");
        }
        Ok(Some(record))
    }

    fn write_version(
        &self,
        txn: &mut Transaction<'_>,
        options: &SaveOptions,
        lang: &str,
        filename: &str,
        code: &str,
        version: u64,
    ) -> CoreResult<(CodeRecord, bool)> {
        let record = CodeRecord {
            id: CodeRecord::make_id(lang, filename),
            lang: lang.to_string(),
            filename: filename.to_string(),
            code: code.to_string(),
            updated_at: self.now(),
            version,
            author: options.author.clone().unwrap_or_else(|| "user".to_string()),
            description: options.description.clone().unwrap_or_default(),
        };
        txn.put_as(&self.names.code, &record)?;
        if options.log_history {
            let entry = HistoryEntry::snapshot(&record, options.resolved_message());
            txn.add_as(&self.names.history, &entry)?;
        }
        Ok((record, true))
    }

    /// Lists documents, optionally of one language in filename order.
    pub fn list_code(&self, lang: Option<&str>) -> CoreResult<Vec<CodeRecord>> {
        match lang {
            None => self.db.get_all_as(&self.names.code),
            Some(lang) => self.db.scan_index_as(
                &self.names.code,
                CODE_BY_LANG_FILENAME,
                &KeyRange::prefix(composite_key![lang]),
                Direction::Forward,
                None,
            ),
        }
    }

    /// Deletes a document, and with `purge_history` its history too.
    ///
    /// Returns whether the document existed.
    pub fn delete_code(&self, lang: &str, filename: &str, purge_history: bool) -> CoreResult<bool> {
        if lang.is_empty() || filename.is_empty() {
            return Ok(false);
        }
        let names = &self.names;
        let (existed, purged) = self.db.transact(
            &[names.code.as_str(), names.history.as_str()],
            TransactionMode::ReadWrite,
            |txn| {
                let existed = match find_code(txn, &names.code, lang, filename)? {
                    Some(record) => txn.delete(&names.code, &RecordKey::text(record.id))?,
                    None => false,
                };

                let mut purged = 0;
                if purge_history {
                    let entries: Vec<HistoryEntry> = txn.scan_index_as(
                        &names.history,
                        HISTORY_BY_LANG_FILENAME_TIMESTAMP,
                        &document_history_range(lang, filename),
                        Direction::Forward,
                        None,
                    )?;
                    for id in entries.into_iter().filter_map(|entry| entry.id) {
                        if txn.delete(&names.history, &RecordKey::Int(id))? {
                            purged += 1;
                        }
                    }
                }
                Ok((existed, purged))
            },
        )?;

        tracing::debug!(lang, filename, existed, purged, "code deleted");
        Ok(existed)
    }
}
