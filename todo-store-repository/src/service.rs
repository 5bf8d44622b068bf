//! Item store service implementation.
//!
//! This module provides the high-level API that request handlers use. It
//! validates input, normalizes items and resolves partition keys before
//! delegating to an [`ItemStore`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use todo_shared::{normalize_tags, Item};
use uuid::Uuid;

use crate::errors::ItemStoreError;
use crate::filter::ItemFilter;
use crate::interfaces::ItemStore;

/// Maximum title length, in characters.
pub const MAX_TITLE_LENGTH: usize = 256;

/// Maximum number of tags on one item.
pub const MAX_TAGS: usize = 32;

/// User-supplied item fields for create and replace.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ItemDraft {
    /// Optional explicit id for creates. A UUID is generated when absent.
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default, alias = "isComplete")]
    pub completed: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// The main service for working with to-do items.
///
/// Wraps an `Arc<dyn ItemStore>` so that request handlers and the sync
/// coordinator can share one store instance.
pub struct ItemStoreService {
    store: Arc<dyn ItemStore>,
}

impl ItemStoreService {
    pub fn new(store: Arc<dyn ItemStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> Arc<dyn ItemStore> {
        Arc::clone(&self.store)
    }

    fn validate_id(id: &str) -> Result<(), ItemStoreError> {
        if id.trim().is_empty() {
            return Err(ItemStoreError::validation("id is required"));
        }
        if id.contains('/') || id.contains('\\') || id.contains('?') || id.contains('#') {
            return Err(ItemStoreError::validation(format!(
                "id '{}' may not contain '/', '\\', '?' or '#'",
                id
            )));
        }
        Ok(())
    }

    fn build_item(id: String, draft: ItemDraft) -> Result<Item, ItemStoreError> {
        Self::validate_id(&id)?;

        let title = draft.title.trim().to_string();
        if title.is_empty() {
            return Err(ItemStoreError::validation("title is required"));
        }
        if title.chars().count() > MAX_TITLE_LENGTH {
            return Err(ItemStoreError::validation(format!(
                "title exceeds {} characters",
                MAX_TITLE_LENGTH
            )));
        }

        let tags = normalize_tags(draft.tags);
        if tags.len() > MAX_TAGS {
            return Err(ItemStoreError::validation(format!(
                "at most {} tags are allowed",
                MAX_TAGS
            )));
        }

        Ok(Item {
            id,
            title,
            description: draft.description,
            due_date: draft.due_date,
            completed: draft.completed,
            tags,
        })
    }

    /// Resolve the partition key for a point operation.
    ///
    /// When the collection is partitioned by `/id` the key may be omitted.
    fn resolve_partition_key(
        &self,
        id: &str,
        partition_key: Option<&str>,
    ) -> Result<String, ItemStoreError> {
        match partition_key {
            Some(key) if !key.is_empty() => Ok(key.to_string()),
            _ if self.store.partition_key_path().as_str() == "/id" => Ok(id.to_string()),
            _ => Err(ItemStoreError::validation(format!(
                "a partition key is required for collections partitioned by '{}'",
                self.store.partition_key_path().as_str()
            ))),
        }
    }

    /// Validate a draft and store it as a new item.
    pub async fn create(&self, draft: ItemDraft) -> Result<Item, ItemStoreError> {
        let id = draft
            .id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let item = Self::build_item(id, draft)?;
        self.store.create(&item).await
    }

    pub async fn get(
        &self,
        id: &str,
        partition_key: Option<&str>,
    ) -> Result<Item, ItemStoreError> {
        Self::validate_id(id)?;
        let partition_key = self.resolve_partition_key(id, partition_key)?;
        self.store.get_by_id(id, &partition_key).await
    }

    /// Replace an item with the draft's fields. The draft id, if any, must match.
    pub async fn replace(&self, id: &str, draft: ItemDraft) -> Result<Item, ItemStoreError> {
        if let Some(draft_id) = draft.id.as_deref() {
            if draft_id != id {
                return Err(ItemStoreError::validation(format!(
                    "body id '{}' does not match path id '{}'",
                    draft_id, id
                )));
            }
        }
        let item = Self::build_item(id.to_string(), draft)?;
        self.store.update(id, &item).await
    }

    /// Mark an item as completed.
    pub async fn complete(
        &self,
        id: &str,
        partition_key: Option<&str>,
    ) -> Result<Item, ItemStoreError> {
        let mut item = self.get(id, partition_key).await?;
        if item.completed {
            return Ok(item);
        }
        item.complete();
        self.store.update(id, &item).await
    }

    pub async fn delete(&self, id: &str, partition_key: Option<&str>) -> Result<(), ItemStoreError> {
        Self::validate_id(id)?;
        let partition_key = self.resolve_partition_key(id, partition_key)?;
        self.store.delete(id, &partition_key).await
    }

    pub async fn find(&self, filter: &ItemFilter) -> Result<Vec<Item>, ItemStoreError> {
        self.store.find(filter).await
    }

    pub async fn find_first(&self, filter: &ItemFilter) -> Result<Option<Item>, ItemStoreError> {
        self.store.get(filter).await
    }
}
