//! Secondary indexes.
//!
//! Every index is an ordered map from a [`CompositeKey`] (one value per
//! indexed field) to the primary keys of the records holding it. Indexes are
//! maintained in memory and rebuilt from records on open, so they are never
//! persisted separately.
//!
//! ## Example
//!
//! ```rust,ignore
//! use codevault_core::{composite_key, Direction, KeyRange};
//!
//! // Newest ten history entries of js/main
//! let range = KeyRange::inclusive(
//!     composite_key!["js", "main", i64::MIN],
//!     composite_key!["js", "main", i64::MAX],
//! );
//! let entries = db.scan_index("history", "lang_filename_timestamp", &range, Direction::Reverse, Some(10))?;
//! ```

mod btree;
mod key;
mod spec;

pub use btree::BTreeIndex;
pub use key::{CompositeKey, Direction, IndexValue, KeyRange};
pub use spec::IndexSpec;
