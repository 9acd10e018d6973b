//! Collections: named record sets with a primary key and secondary indexes.

mod catalog;
mod schema;
mod store;

pub use catalog::Catalog;
pub use schema::CollectionSchema;
pub use store::CollectionStore;
