//! Index definitions.

use serde::{Deserialize, Serialize};

/// Definition of a secondary index.
///
/// Stored in the manifest as part of its collection's schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    /// Index name, unique within its collection.
    pub name: String,
    /// Indexed fields in key order.
    pub fields: Vec<String>,
    /// Whether two records may share a key.
    #[serde(default)]
    pub unique: bool,
}

impl IndexSpec {
    /// Creates a non-unique index over `fields`.
    pub fn new<I, S>(name: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            fields: fields.into_iter().map(Into::into).collect(),
            unique: false,
        }
    }

    /// Marks the index as unique.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}
