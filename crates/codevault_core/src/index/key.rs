//! Index key types.

use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use std::ops::Bound;

/// A single indexable field value.
///
/// Values of different kinds order as `Bool < Int < Text`. Nulls, floats,
/// arrays and objects are not indexable.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IndexValue {
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// String.
    Text(String),
}

impl IndexValue {
    /// Converts a JSON value, returning `None` for non-indexable values.
    #[must_use]
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Number(n) => n.as_i64().map(Self::Int),
            Value::String(s) => Some(Self::Text(s.clone())),
            _ => None,
        }
    }
}

impl From<&str> for IndexValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for IndexValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&String> for IndexValue {
    fn from(s: &String) -> Self {
        Self::Text(s.clone())
    }
}

impl From<i64> for IndexValue {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<bool> for IndexValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl fmt::Display for IndexValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s:?}"),
        }
    }
}

/// Tuple of field values forming one index key.
///
/// Composite keys are ordered lexicographically by component; a key that is
/// a strict prefix of another sorts first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct CompositeKey(pub Vec<IndexValue>);

impl CompositeKey {
    /// Creates a composite key from its components.
    pub fn new(values: impl IntoIterator<Item = IndexValue>) -> Self {
        Self(values.into_iter().collect())
    }

    /// Extracts the key for `fields` from a record.
    ///
    /// Returns `None` if any field is missing or not indexable, in which case
    /// the record is left out of the index. Field names may be dotted paths
    /// into nested objects.
    #[must_use]
    pub fn extract(record: &Value, fields: &[String]) -> Option<Self> {
        fields
            .iter()
            .map(|field| lookup_path(record, field).and_then(IndexValue::from_json))
            .collect::<Option<Vec<_>>>()
            .map(Self)
    }

    /// Returns the components.
    #[must_use]
    pub fn values(&self) -> &[IndexValue] {
        &self.0
    }

    /// Returns true if `prefix` is a leading run of this key's components.
    #[must_use]
    pub fn starts_with(&self, prefix: &CompositeKey) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl PartialOrd for CompositeKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CompositeKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{value}")?;
        }
        write!(f, "]")
    }
}

/// Builds a [`CompositeKey`] from heterogeneous values.
///
/// ```rust,ignore
/// let key = composite_key!["js", "main", i64::MIN];
/// ```
#[macro_export]
macro_rules! composite_key {
    ($($value:expr),* $(,)?) => {
        $crate::CompositeKey(vec![$($crate::IndexValue::from($value)),*])
    };
}

pub(crate) fn lookup_path<'v>(record: &'v Value, path: &str) -> Option<&'v Value> {
    path.split('.').try_fold(record, |value, part| value.get(part))
}

/// Scan direction over an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Ascending key order.
    #[default]
    Forward,
    /// Descending key order.
    Reverse,
}

/// A range of composite keys to scan.
#[derive(Debug, Clone)]
pub struct KeyRange {
    pub(crate) lower: Bound<CompositeKey>,
    pub(crate) upper: Bound<CompositeKey>,
    pub(crate) prefix: Option<CompositeKey>,
}

impl KeyRange {
    /// Every key.
    #[must_use]
    pub fn all() -> Self {
        Self::new(Bound::Unbounded, Bound::Unbounded)
    }

    /// Keys between `lower` and `upper` with explicit bounds.
    #[must_use]
    pub fn new(lower: Bound<CompositeKey>, upper: Bound<CompositeKey>) -> Self {
        Self {
            lower,
            upper,
            prefix: None,
        }
    }

    /// Keys in `lower..=upper`.
    #[must_use]
    pub fn inclusive(lower: CompositeKey, upper: CompositeKey) -> Self {
        Self::new(Bound::Included(lower), Bound::Included(upper))
    }

    /// Exactly one key.
    #[must_use]
    pub fn only(key: CompositeKey) -> Self {
        Self::inclusive(key.clone(), key)
    }

    /// Keys whose leading components equal `prefix`.
    #[must_use]
    pub fn prefix(prefix: CompositeKey) -> Self {
        Self {
            lower: Bound::Included(prefix.clone()),
            upper: Bound::Unbounded,
            prefix: Some(prefix),
        }
    }

    /// Returns true if `key` falls inside the range.
    #[must_use]
    pub fn contains(&self, key: &CompositeKey) -> bool {
        let above = match &self.lower {
            Bound::Included(lo) => key >= lo,
            Bound::Excluded(lo) => key > lo,
            Bound::Unbounded => true,
        };
        let below = match &self.upper {
            Bound::Included(hi) => key <= hi,
            Bound::Excluded(hi) => key < hi,
            Bound::Unbounded => true,
        };
        above && below && self.prefix.as_ref().map_or(true, |p| key.starts_with(p))
    }

    /// Returns true if no key can satisfy the bounds.
    ///
    /// `BTreeMap::range` panics on such bounds, so scans check this first.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match (&self.lower, &self.upper) {
            (Bound::Included(lo), Bound::Included(hi)) => lo > hi,
            (Bound::Included(lo), Bound::Excluded(hi))
            | (Bound::Excluded(lo), Bound::Included(hi))
            | (Bound::Excluded(lo), Bound::Excluded(hi)) => lo >= hi,
            _ => false,
        }
    }

    pub(crate) fn bounds(&self) -> (Bound<CompositeKey>, Bound<CompositeKey>) {
        (self.lower.clone(), self.upper.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn value_kinds_order() {
        assert!(IndexValue::Bool(true) < IndexValue::Int(i64::MIN));
        assert!(IndexValue::Int(i64::MAX) < IndexValue::Text(String::new()));
    }

    #[test]
    fn prefix_sorts_first() {
        let short = composite_key!["js"];
        let long = composite_key!["js", "a"];
        assert!(short < long);
        assert!(long < composite_key!["py"]);
        assert!(long.starts_with(&short));
    }

    #[test]
    fn extract_skips_missing_and_unindexable() {
        let fields = vec!["lang".to_string(), "timestamp".to_string()];
        let record = json!({"lang": "js", "timestamp": 5});
        assert_eq!(
            CompositeKey::extract(&record, &fields),
            Some(composite_key!["js", 5i64])
        );
        assert_eq!(CompositeKey::extract(&json!({"lang": "js"}), &fields), None);
        assert_eq!(
            CompositeKey::extract(&json!({"lang": "js", "timestamp": null}), &fields),
            None
        );
        assert_eq!(
            CompositeKey::extract(&json!({"lang": "js", "timestamp": 1.5}), &fields),
            None
        );
    }

    #[test]
    fn extract_dotted_path() {
        let record = json!({"meta": {"owner": "ada"}});
        assert_eq!(
            CompositeKey::extract(&record, &["meta.owner".to_string()]),
            Some(composite_key!["ada"])
        );
    }

    #[test]
    fn inverted_range_is_empty() {
        let range = KeyRange::inclusive(composite_key![5i64], composite_key![1i64]);
        assert!(range.is_empty());
        let half_open = KeyRange::new(
            Bound::Included(composite_key![1i64]),
            Bound::Excluded(composite_key![1i64]),
        );
        assert!(half_open.is_empty());
        assert!(!KeyRange::only(composite_key![1i64]).is_empty());
    }

    #[test]
    fn range_contains() {
        let range = KeyRange::inclusive(
            composite_key!["js", i64::MIN],
            composite_key!["js", i64::MAX],
        );
        assert!(range.contains(&composite_key!["js", 0i64]));
        assert!(!range.contains(&composite_key!["py", 0i64]));
        assert!(KeyRange::prefix(composite_key!["js"]).contains(&composite_key!["js", "x"]));
        assert!(!KeyRange::prefix(composite_key!["js"]).contains(&composite_key!["jsx"]));
    }
}
