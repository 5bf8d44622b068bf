use async_trait::async_trait;
use todo_shared::{Item, ItemDocument, ItemKey};

use crate::errors::ItemStoreError;
use crate::filter::ItemFilter;
use crate::partition::PartitionKeyPath;

/// CRUD access to the partitioned item collection.
///
/// The first call to any operation lazily provisions the backing collection.
/// Provisioning is single-flight: concurrent first callers await one shared
/// initialization, and the result is memoized for the lifetime of the store.
/// Every operation is bounded by the store's configured deadline and fails
/// with [`ItemStoreError::Timeout`] when it is exceeded.
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Provision the backing collection if it has not been provisioned yet.
    ///
    /// Called implicitly by every other operation; exposed for eager use at startup.
    async fn ensure_collection(&self) -> Result<(), ItemStoreError>;

    /// Return the first item matching the filter, if any.
    async fn get(&self, filter: &ItemFilter) -> Result<Option<Item>, ItemStoreError>;

    /// Return every item matching the filter, in no particular order.
    async fn find(&self, filter: &ItemFilter) -> Result<Vec<Item>, ItemStoreError>;

    /// Point read by id and partition key.
    ///
    /// # Returns
    ///
    /// * `Ok(Item)` - The stored item
    /// * `Err(ItemStoreError::NotFound)` - If no document has this address
    async fn get_by_id(&self, id: &str, partition_key: &str) -> Result<Item, ItemStoreError>;

    /// Store a new item.
    ///
    /// # Returns
    ///
    /// * `Ok(Item)` - The stored item
    /// * `Err(ItemStoreError::Conflict)` - If the id already exists in the item's partition
    async fn create(&self, item: &Item) -> Result<Item, ItemStoreError>;

    /// Replace the document with the given id. The partition is derived from the item.
    ///
    /// # Returns
    ///
    /// * `Ok(Item)` - The stored replacement
    /// * `Err(ItemStoreError::NotFound)` - If no such document exists
    /// * `Err(ItemStoreError::ValidationError)` - If `item.id` differs from `id`
    async fn update(&self, id: &str, item: &Item) -> Result<Item, ItemStoreError>;

    /// Delete the document with the given address.
    ///
    /// Not idempotent: deleting an absent document fails with `NotFound`.
    async fn delete(&self, id: &str, partition_key: &str) -> Result<(), ItemStoreError>;

    /// Documents whose modification timestamp is strictly greater than
    /// `watermark`, ordered by ascending timestamp.
    async fn changed_since(&self, watermark: i64) -> Result<Vec<ItemDocument>, ItemStoreError>;

    /// Addresses of every live document.
    async fn list_keys(&self) -> Result<Vec<ItemKey>, ItemStoreError>;

    /// The partition key path the collection was configured with.
    fn partition_key_path(&self) -> &PartitionKeyPath;
}
