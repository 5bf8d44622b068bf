//! Error types for the item store repository.
//! Consolidates and re-exports error types for item and sync-state operations.
mod item_store;
mod sync_state;

pub use item_store::ItemStoreError;
pub use sync_state::SyncStateError;
