//! Item types for the document store.
//!
//! An [`Item`] is the single writable entity of the application. The store
//! persists it as a JSON document; the field names on the wire follow the
//! document layout (`dueDate`, `isComplete`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A to-do item as stored in the item store.
///
/// # Fields
///
/// - `id`: Unique, stable identifier. Together with the partition key it
///   addresses the document for point reads and writes.
/// - `title`: Short display text (primary search and suggest field)
/// - `description`: Free-form body text
/// - `due_date`: Optional due timestamp
/// - `completed`: Completion flag, stored as `isComplete`
/// - `tags`: Ordered set of labels
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(rename = "isComplete", default)]
    pub completed: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Item {
    /// Create a new, incomplete item with a freshly generated id.
    ///
    /// # Example
    ///
    /// ```
    /// use todo_shared::Item;
    ///
    /// let item = Item::new("Buy milk").with_tags(["groceries", "groceries", " home "]);
    /// assert_eq!(item.tags, vec!["groceries".to_string(), "home".to_string()]);
    /// assert!(!item.completed);
    /// ```
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            description: String::new(),
            due_date: None,
            completed: false,
            tags: Vec::new(),
        }
    }

    /// Replace the generated id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_due_date(mut self, due_date: DateTime<Utc>) -> Self {
        self.due_date = Some(due_date);
        self
    }

    /// Set the tags, keeping first occurrences in order.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = normalize_tags(tags.into_iter().map(Into::into));
        self
    }

    /// Mark the item as done.
    pub fn complete(&mut self) {
        self.completed = true;
    }

    /// Whether the item carries the given tag, compared by Unicode lowercase
    /// as the PostgreSQL store's `lower()` does.
    pub fn has_tag(&self, tag: &str) -> bool {
        let wanted = tag.to_lowercase();
        self.tags.iter().any(|t| t.to_lowercase() == wanted)
    }
}

/// Trim tags, drop blank ones and remove duplicates while preserving the
/// position and spelling of the first occurrence. Tags differing only in
/// case are duplicates.
pub fn normalize_tags<I>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut normalized: Vec<String> = Vec::new();
    let mut seen: Vec<String> = Vec::new();
    for tag in tags {
        let trimmed = tag.trim();
        if trimmed.is_empty() {
            continue;
        }
        let key = trimmed.to_lowercase();
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        normalized.push(trimmed.to_string());
    }
    normalized
}

/// Address of a stored document: item id plus partition key value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemKey {
    pub id: String,
    pub partition_key: String,
}

impl ItemKey {
    pub fn new(id: impl Into<String>, partition_key: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            partition_key: partition_key.into(),
        }
    }
}

/// A stored item together with its store metadata.
///
/// `ts` is the store's modification timestamp (`_ts`) in microseconds. It
/// strictly increases for a document on every write and drives the
/// high-water-mark change detection of the sync coordinator.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemDocument {
    pub item: Item,
    pub partition_key: String,
    pub ts: i64,
}

impl ItemDocument {
    pub fn key(&self) -> ItemKey {
        ItemKey::new(self.item.id.clone(), self.partition_key.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_item_serializes_with_document_field_names() {
        let item = Item::new("Buy milk")
            .with_id("1")
            .with_due_date(Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap());

        let json = serde_json::to_value(&item).unwrap();

        assert_eq!(json["id"], "1");
        assert_eq!(json["isComplete"], false);
        assert!(json["dueDate"].is_string());
        assert!(json.get("completed").is_none());
        assert!(json.get("due_date").is_none());
    }

    #[test]
    fn test_item_deserializes_with_missing_optional_fields() {
        let item: Item = serde_json::from_str(r#"{"id":"a","title":"Walk dog"}"#).unwrap();

        assert_eq!(item.title, "Walk dog");
        assert_eq!(item.description, "");
        assert!(item.due_date.is_none());
        assert!(!item.completed);
        assert!(item.tags.is_empty());
    }

    #[test]
    fn test_normalize_tags_keeps_first_occurrence_order() {
        let tags = normalize_tags(
            ["work", " home", "", "work", "errands", "home "]
                .into_iter()
                .map(String::from),
        );

        assert_eq!(tags, vec!["work", "home", "errands"]);
    }

    #[test]
    fn test_has_tag_ignores_case() {
        let item = Item::new("x").with_tags(["Groceries"]);
        assert!(item.has_tag("groceries"));
        assert!(!item.has_tag("work"));
    }

    #[test]
    fn test_tag_case_folding_covers_non_ascii() {
        let item = Item::new("x").with_tags(["Études", "ÖL"]);
        assert!(item.has_tag("études"));
        assert!(item.has_tag("öl"));
        assert!(!item.has_tag("etudes"));
    }

    #[test]
    fn test_normalize_tags_merges_case_variants() {
        let tags = normalize_tags(
            ["Work", "work", "WORK ", "Café", "CAFÉ"]
                .into_iter()
                .map(String::from),
        );

        assert_eq!(tags, vec!["Work", "Café"]);
    }

    #[test]
    fn test_complete_sets_flag() {
        let mut item = Item::new("x");
        item.complete();
        assert!(item.completed);
    }
}
