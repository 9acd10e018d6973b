//! Snippet library.

use crate::composite_key;
use crate::error::{CoreError, CoreResult};
use crate::index::{Direction, KeyRange};
use crate::model::Snippet;
use crate::schema::{SNIPPETS_BY_LANG, SNIPPETS_BY_LANG_NAME};
use crate::transaction::TransactionMode;
use crate::types::RecordKey;
use crate::vault::CodeVault;

impl CodeVault {
    /// Adds a snippet with a usage count of zero.
    ///
    /// Returns the assigned id, or `None` without writing if `lang` is
    /// empty.
    pub fn save_snippet<I, S>(
        &self,
        lang: &str,
        name: &str,
        code: &str,
        tags: I,
    ) -> CoreResult<Option<u64>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if lang.is_empty() {
            return Ok(None);
        }
        let snippet = Snippet {
            id: None,
            lang: lang.to_string(),
            name: name.to_string(),
            code: code.to_string(),
            tags: tags.into_iter().map(Into::into).collect(),
            created_at: self.now(),
            usage_count: 0,
        };
        let key = self.db.add_as(&self.names.snippets, &snippet)?;
        let id = key
            .as_int()
            .ok_or_else(|| CoreError::invalid_format(format!("snippet key {key} is not numeric")))?;
        tracing::debug!(id, lang, name, "snippet saved");
        Ok(Some(id))
    }

    /// Looks up one snippet.
    pub fn get_snippet(&self, id: u64) -> CoreResult<Option<Snippet>> {
        self.db.get_as(&self.names.snippets, &RecordKey::Int(id))
    }

    /// All snippets of a language in insertion order.
    pub fn get_snippets_by_language(&self, lang: &str) -> CoreResult<Vec<Snippet>> {
        if lang.is_empty() {
            return Ok(Vec::new());
        }
        self.db.scan_index_as(
            &self.names.snippets,
            SNIPPETS_BY_LANG,
            &KeyRange::only(composite_key![lang]),
            Direction::Forward,
            None,
        )
    }

    /// Finds the oldest snippet of a language with the given name.
    pub fn find_snippet(&self, lang: &str, name: &str) -> CoreResult<Option<Snippet>> {
        let hits: Vec<Snippet> = self.db.scan_index_as(
            &self.names.snippets,
            SNIPPETS_BY_LANG_NAME,
            &KeyRange::only(composite_key![lang, name]),
            Direction::Forward,
            Some(1),
        )?;
        Ok(hits.into_iter().next())
    }

    /// Adds one to a snippet's usage count.
    ///
    /// Read and write happen in one transaction. Returns the new count, or
    /// `None` if the snippet does not exist.
    pub fn increment_snippet_usage(&self, id: u64) -> CoreResult<Option<u64>> {
        let snippets = self.names.snippets.as_str();
        self.db
            .transact(&[snippets], TransactionMode::ReadWrite, |txn| {
                let Some(mut snippet) = txn.get_as::<Snippet>(snippets, &RecordKey::Int(id))? else {
                    return Ok(None);
                };
                snippet.usage_count = snippet.usage_count.checked_add(1).ok_or_else(|| {
                    CoreError::invalid_operation(format!("usage count of snippet {id} is saturated"))
                })?;
                txn.put_as(snippets, &snippet)?;
                Ok(Some(snippet.usage_count))
            })
    }

    /// Deletes a snippet. Returns whether it existed.
    pub fn delete_snippet(&self, id: u64) -> CoreResult<bool> {
        self.db.delete(&self.names.snippets, &RecordKey::Int(id))
    }
}

#[cfg(test)]
mod tests {
    use crate::error::CoreError;
    use crate::vault::CodeVault;
    use serde_json::json;
    use std::collections::BTreeSet;

    #[test]
    fn save_and_query_by_language() {
        let vault = CodeVault::open_in_memory().unwrap();
        let a = vault.save_snippet("js", "log", "console.log()", ["debug"]).unwrap().unwrap();
        let b = vault.save_snippet("py", "log", "print()", ["debug"]).unwrap().unwrap();
        let c = vault
            .save_snippet("js", "loop", "for (;;) {}", Vec::<String>::new())
            .unwrap()
            .unwrap();
        assert!(a < b && b < c);

        let js: Vec<u64> = vault
            .get_snippets_by_language("js")
            .unwrap()
            .into_iter()
            .filter_map(|s| s.id)
            .collect();
        assert_eq!(js, vec![a, c]);
        assert!(vault.get_snippets_by_language("").unwrap().is_empty());
    }

    #[test]
    fn tags_are_a_sorted_set() {
        let vault = CodeVault::open_in_memory().unwrap();
        let id = vault
            .save_snippet("js", "x", "x", ["b", "a", "b"])
            .unwrap()
            .unwrap();
        let snippet = vault.get_snippet(id).unwrap().unwrap();
        let expected: BTreeSet<String> = ["a", "b"].iter().map(|s| s.to_string()).collect();
        assert_eq!(snippet.tags, expected);
        assert_eq!(snippet.usage_count, 0);
    }

    #[test]
    fn empty_lang_is_ignored() {
        let vault = CodeVault::open_in_memory().unwrap();
        assert_eq!(vault.save_snippet("", "x", "x", ["t"]).unwrap(), None);
        assert_eq!(vault.database().count("snippets").unwrap(), 0);
    }

    #[test]
    fn usage_only_increases() {
        let vault = CodeVault::open_in_memory().unwrap();
        let id = vault.save_snippet("js", "x", "x", ["t"]).unwrap().unwrap();
        assert_eq!(vault.increment_snippet_usage(id).unwrap(), Some(1));
        assert_eq!(vault.increment_snippet_usage(id).unwrap(), Some(2));
        assert_eq!(vault.get_snippet(id).unwrap().unwrap().usage_count, 2);
        assert_eq!(vault.increment_snippet_usage(id + 100).unwrap(), None);
    }

    #[test]
    fn saturated_usage_count_is_an_error() {
        let vault = CodeVault::open_in_memory().unwrap();
        vault
            .import_database(&json!({"snippets": [{
                "id": 7, "lang": "js", "name": "x", "code": "x",
                "createdAt": 0, "usageCount": u64::MAX,
            }]}))
            .unwrap();

        assert!(matches!(
            vault.increment_snippet_usage(7),
            Err(CoreError::InvalidOperation { .. })
        ));
        assert_eq!(vault.get_snippet(7).unwrap().unwrap().usage_count, u64::MAX);
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        let vault = CodeVault::open_in_memory().unwrap();
        let id = vault.save_snippet("js", "x", "x", ["t"]).unwrap().unwrap();

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..25 {
                        vault.increment_snippet_usage(id).unwrap();
                    }
                });
            }
        });
        assert_eq!(vault.get_snippet(id).unwrap().unwrap().usage_count, 100);
    }

    #[test]
    fn find_and_delete() {
        let vault = CodeVault::open_in_memory().unwrap();
        let id = vault.save_snippet("js", "log", "x", ["t"]).unwrap().unwrap();
        assert_eq!(vault.find_snippet("js", "log").unwrap().unwrap().id, Some(id));
        assert!(vault.find_snippet("js", "nope").unwrap().is_none());
        assert!(vault.delete_snippet(id).unwrap());
        assert!(!vault.delete_snippet(id).unwrap());
    }
}
