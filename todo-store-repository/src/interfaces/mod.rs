//! This module defines and re-exports the interfaces for the item store.
//! It serves as a central point for accessing traits related to data interaction.
mod item_store;
mod sync_state;

pub use item_store::ItemStore;
pub use sync_state::{SyncCommit, SyncLease, SyncState, SyncStateRepository};
