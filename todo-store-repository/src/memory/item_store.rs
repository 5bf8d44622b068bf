use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use todo_shared::{Item, ItemDocument, ItemKey};
use tokio::sync::{OnceCell, RwLock};
use tracing::debug;

use crate::config::DEFAULT_OPERATION_TIMEOUT;
use crate::errors::ItemStoreError;
use crate::filter::ItemFilter;
use crate::interfaces::ItemStore;
use crate::partition::PartitionKeyPath;

#[derive(Debug, Clone)]
struct StoredItem {
    item: Item,
    ts: i64,
}

/// Item store kept entirely in process memory.
///
/// Behaves like the PostgreSQL store: point operations are addressed by
/// `(id, partition_key)`, creates conflict, replaces and deletes of absent
/// documents fail with `NotFound`, and every write stamps a strictly
/// increasing modification timestamp.
pub struct InMemoryItemStore {
    documents: RwLock<BTreeMap<ItemKey, StoredItem>>,
    partition_key_path: PartitionKeyPath,
    provisioned: OnceCell<()>,
    provision_count: AtomicUsize,
    provision_delay: Duration,
    operation_timeout: Duration,
    clock: AtomicI64,
    unavailable: AtomicBool,
}

impl Default for InMemoryItemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryItemStore {
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(BTreeMap::new()),
            partition_key_path: PartitionKeyPath::default(),
            provisioned: OnceCell::new(),
            provision_count: AtomicUsize::new(0),
            provision_delay: Duration::ZERO,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
            clock: AtomicI64::new(0),
            unavailable: AtomicBool::new(false),
        }
    }

    pub fn with_partition_key_path(mut self, path: &str) -> Result<Self, ItemStoreError> {
        self.partition_key_path = PartitionKeyPath::parse(path)?;
        Ok(self)
    }

    /// Make provisioning take the given time, to exercise concurrent first calls.
    pub fn with_provision_delay(mut self, delay: Duration) -> Self {
        self.provision_delay = delay;
        self
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Number of times the collection was provisioned.
    pub fn provision_count(&self) -> usize {
        self.provision_count.load(Ordering::SeqCst)
    }

    /// Simulate an outage: while set, every operation fails with a connection error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }

    fn next_ts(&self) -> i64 {
        let now = Utc::now().timestamp_micros();
        let previous = self
            .clock
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or(now);
        now.max(previous + 1)
    }

    async fn ready(&self) -> Result<(), ItemStoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ItemStoreError::connection("in-memory store is unavailable"));
        }
        let provision = self.provisioned.get_or_init(|| async {
            if !self.provision_delay.is_zero() {
                tokio::time::sleep(self.provision_delay).await;
            }
            self.provision_count.fetch_add(1, Ordering::SeqCst);
            debug!("In-memory item collection provisioned");
        });
        match tokio::time::timeout(self.operation_timeout, provision).await {
            Ok(_) => Ok(()),
            Err(_) => Err(ItemStoreError::Timeout(self.operation_timeout)),
        }
    }
}

#[async_trait]
impl ItemStore for InMemoryItemStore {
    async fn ensure_collection(&self) -> Result<(), ItemStoreError> {
        self.ready().await
    }

    async fn get(&self, filter: &ItemFilter) -> Result<Option<Item>, ItemStoreError> {
        self.ready().await?;
        let documents = self.documents.read().await;
        Ok(documents
            .values()
            .find(|stored| filter.matches(&stored.item))
            .map(|stored| stored.item.clone()))
    }

    async fn find(&self, filter: &ItemFilter) -> Result<Vec<Item>, ItemStoreError> {
        self.ready().await?;
        let documents = self.documents.read().await;
        Ok(documents
            .values()
            .filter(|stored| filter.matches(&stored.item))
            .map(|stored| stored.item.clone())
            .collect())
    }

    async fn get_by_id(&self, id: &str, partition_key: &str) -> Result<Item, ItemStoreError> {
        self.ready().await?;
        let documents = self.documents.read().await;
        documents
            .get(&ItemKey::new(id, partition_key))
            .map(|stored| stored.item.clone())
            .ok_or_else(|| ItemStoreError::not_found(id, partition_key))
    }

    async fn create(&self, item: &Item) -> Result<Item, ItemStoreError> {
        self.ready().await?;
        let key = ItemKey::new(item.id.clone(), self.partition_key_path.extract(item)?);
        let mut documents = self.documents.write().await;
        if documents.contains_key(&key) {
            return Err(ItemStoreError::conflict(key.id, key.partition_key));
        }
        let ts = self.next_ts();
        documents.insert(
            key,
            StoredItem {
                item: item.clone(),
                ts,
            },
        );
        Ok(item.clone())
    }

    async fn update(&self, id: &str, item: &Item) -> Result<Item, ItemStoreError> {
        if item.id != id {
            return Err(ItemStoreError::validation(format!(
                "item id '{}' does not match target id '{}'",
                item.id, id
            )));
        }
        self.ready().await?;
        let key = ItemKey::new(id, self.partition_key_path.extract(item)?);
        let mut documents = self.documents.write().await;
        let ts = self.next_ts();
        match documents.get_mut(&key) {
            Some(stored) => {
                stored.item = item.clone();
                stored.ts = ts.max(stored.ts + 1);
                Ok(item.clone())
            }
            None => Err(ItemStoreError::not_found(key.id, key.partition_key)),
        }
    }

    async fn delete(&self, id: &str, partition_key: &str) -> Result<(), ItemStoreError> {
        self.ready().await?;
        let mut documents = self.documents.write().await;
        documents
            .remove(&ItemKey::new(id, partition_key))
            .map(|_| ())
            .ok_or_else(|| ItemStoreError::not_found(id, partition_key))
    }

    async fn changed_since(&self, watermark: i64) -> Result<Vec<ItemDocument>, ItemStoreError> {
        self.ready().await?;
        let documents = self.documents.read().await;
        let mut changed: Vec<ItemDocument> = documents
            .iter()
            .filter(|(_, stored)| stored.ts > watermark)
            .map(|(key, stored)| ItemDocument {
                item: stored.item.clone(),
                partition_key: key.partition_key.clone(),
                ts: stored.ts,
            })
            .collect();
        changed.sort_by_key(|document| document.ts);
        Ok(changed)
    }

    async fn list_keys(&self) -> Result<Vec<ItemKey>, ItemStoreError> {
        self.ready().await?;
        Ok(self.documents.read().await.keys().cloned().collect())
    }

    fn partition_key_path(&self) -> &PartitionKeyPath {
        &self.partition_key_path
    }
}
