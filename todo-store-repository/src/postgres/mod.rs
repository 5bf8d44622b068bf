//! PostgreSQL implementations of the store interfaces.
mod item_store;
mod sync_state;

pub use item_store::PostgresItemStore;
pub use sync_state::{PostgresSyncStateRepository, MIGRATOR};
