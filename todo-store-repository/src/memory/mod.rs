//! In-memory implementations of the store interfaces.
//!
//! Used by tests across the workspace and by `STORE_BACKEND=memory` local runs.
mod item_store;
mod sync_state;

pub use item_store::InMemoryItemStore;
pub use sync_state::InMemorySyncStateRepository;
