//! Partition key path handling.

use serde_json::Value;
use todo_shared::Item;

use crate::errors::ItemStoreError;

/// A partition key path such as `/id`, interpreted as a JSON pointer into the
/// serialized item document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionKeyPath(String);

impl PartitionKeyPath {
    /// Parse a partition key path.
    ///
    /// The path must start with `/` and name at least one segment.
    pub fn parse(path: &str) -> Result<Self, ItemStoreError> {
        if !path.starts_with('/') || path.len() < 2 {
            return Err(ItemStoreError::validation(format!(
                "partition key path '{}' must start with '/' and name a field",
                path
            )));
        }
        if path.split('/').skip(1).any(|segment| segment.is_empty()) {
            return Err(ItemStoreError::validation(format!(
                "partition key path '{}' contains an empty segment",
                path
            )));
        }
        if path.contains('\'') {
            return Err(ItemStoreError::validation(format!(
                "partition key path '{}' may not contain quotes",
                path
            )));
        }
        Ok(Self(path.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Extract the partition key value from an item.
    ///
    /// Strings are used verbatim; numbers and booleans use their JSON text.
    /// Missing values, nulls, arrays and objects are rejected.
    pub fn extract(&self, item: &Item) -> Result<String, ItemStoreError> {
        let document = serde_json::to_value(item)?;
        match document.pointer(&self.0) {
            Some(Value::String(value)) if !value.is_empty() => Ok(value.clone()),
            Some(Value::Number(value)) => Ok(value.to_string()),
            Some(Value::Bool(value)) => Ok(value.to_string()),
            Some(_) => Err(ItemStoreError::validation(format!(
                "value at partition key path '{}' is not a scalar",
                self.0
            ))),
            None => Err(ItemStoreError::validation(format!(
                "item {} has no value at partition key path '{}'",
                item.id, self.0
            ))),
        }
    }
}

impl Default for PartitionKeyPath {
    fn default() -> Self {
        Self(crate::config::DEFAULT_PARTITION_KEY_PATH.to_string())
    }
}
