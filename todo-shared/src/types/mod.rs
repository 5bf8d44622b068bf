//! Core data structures used across the searchable to-do crates.

pub mod item;
pub mod search_entry;
pub mod search_result;

pub use item::{Item, ItemDocument, ItemKey};
pub use search_entry::SearchIndexEntry;
pub use search_result::{FacetCount, ItemSearchResults};
