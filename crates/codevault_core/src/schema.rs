//! The vault's collections and indexes.

use crate::collection::CollectionSchema;
use crate::error::CoreResult;
use crate::index::IndexSpec;
use crate::upgrade::SchemaBuilder;
use crate::vault::CollectionNames;

/// Store name used when none is given.
pub const DEFAULT_STORE_NAME: &str = "codevault";

/// Schema version this crate creates.
pub const SCHEMA_VERSION: u32 = 1;

/// History entries returned when no limit is given.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

pub(crate) const CODE_BY_LANG_FILENAME: &str = "lang_filename";
pub(crate) const HISTORY_BY_LANG: &str = "lang";
pub(crate) const HISTORY_BY_LANG_TIMESTAMP: &str = "lang_timestamp";
pub(crate) const HISTORY_BY_LANG_FILENAME_TIMESTAMP: &str = "lang_filename_timestamp";
pub(crate) const SNIPPETS_BY_LANG: &str = "lang";
pub(crate) const SNIPPETS_BY_LANG_NAME: &str = "lang_name";

/// Declares the four vault collections.
///
/// Existing collections and indexes are left alone, so running this against
/// an initialized store plans nothing.
pub fn bootstrap(builder: &mut SchemaBuilder<'_>, names: &CollectionNames) -> CoreResult<()> {
    builder.create_collection(CollectionSchema::new(&names.settings, "key"));

    builder.create_collection(CollectionSchema::new(&names.code, "id"));
    builder.create_index(
        &names.code,
        IndexSpec::new(CODE_BY_LANG_FILENAME, ["lang", "filename"]).unique(),
    )?;

    builder.create_collection(CollectionSchema::new(&names.history, "id").auto_increment());
    builder.create_index(&names.history, IndexSpec::new(HISTORY_BY_LANG, ["lang"]))?;
    builder.create_index(
        &names.history,
        IndexSpec::new(HISTORY_BY_LANG_TIMESTAMP, ["lang", "timestamp"]),
    )?;
    builder.create_index(
        &names.history,
        IndexSpec::new(
            HISTORY_BY_LANG_FILENAME_TIMESTAMP,
            ["lang", "filename", "timestamp"],
        ),
    )?;

    builder.create_collection(CollectionSchema::new(&names.snippets, "id").auto_increment());
    builder.create_index(&names.snippets, IndexSpec::new(SNIPPETS_BY_LANG, ["lang"]))?;
    builder.create_index(
        &names.snippets,
        IndexSpec::new(SNIPPETS_BY_LANG_NAME, ["lang", "name"]),
    )?;

    Ok(())
}
