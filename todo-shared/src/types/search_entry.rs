//! Search index entry types.
//!
//! This module defines the projection of an [`Item`] into the search index
//! schema. Field names match the index definition (`dueDate`, `isComplete`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::types::item::Item;

/// Denormalized projection of an item as stored in the search index.
///
/// `id` is the index key; `title`, `description` and `tags` are searchable;
/// `dueDate` and `tags` are facetable; `isComplete` is stored only. The search
/// service returns `null` for unset fields, which deserializes to the default.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchIndexEntry {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_complete: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl SearchIndexEntry {
    /// Convert the entry back into the projected item fields.
    pub fn into_item(self) -> Item {
        Item {
            id: self.id,
            title: self.title,
            description: self.description,
            due_date: self.due_date,
            completed: self.is_complete,
            tags: self.tags,
        }
    }
}

impl From<&Item> for SearchIndexEntry {
    fn from(item: &Item) -> Self {
        Self {
            id: item.id.clone(),
            title: item.title.clone(),
            description: item.description.clone(),
            due_date: item.due_date,
            is_complete: item.completed,
            tags: item.tags.clone(),
        }
    }
}
