//! # To-Do Shared
//!
//! This crate defines the data structures shared by the item store, the search
//! index client and the sync coordinator: the [`Item`] entity, its projection
//! into the search index ([`SearchIndexEntry`]) and the result of a search
//! query ([`ItemSearchResults`]).

pub mod types;

pub use types::item::{normalize_tags, Item, ItemDocument, ItemKey};
pub use types::search_entry::SearchIndexEntry;
pub use types::search_result::{FacetCount, ItemSearchResults};
