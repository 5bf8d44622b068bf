//! Configuration types for the item store.

use std::time::Duration;

use crate::errors::ItemStoreError;

/// Default database (schema) name.
pub const DEFAULT_DATABASE: &str = "todo";

/// Default collection (table) name.
pub const DEFAULT_COLLECTION: &str = "items";

/// Default partition key path. Items are partitioned by their own id.
pub const DEFAULT_PARTITION_KEY_PATH: &str = "/id";

/// Default deadline for a single store operation.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Coordinates of the item collection.
///
/// `database` and `collection` become a PostgreSQL schema and table; both must
/// be plain identifiers (ASCII letters, digits, underscores).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub database: String,
    pub collection: String,
    /// JSON pointer into the item document that yields the partition key value.
    /// Fixed when the collection is first created.
    pub partition_key_path: String,
    /// Deadline applied to every store operation, including lazy provisioning.
    pub operation_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database: DEFAULT_DATABASE.to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
            partition_key_path: DEFAULT_PARTITION_KEY_PATH.to_string(),
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }
}

impl StoreConfig {
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
            ..Self::default()
        }
    }

    pub fn with_partition_key_path(mut self, path: impl Into<String>) -> Self {
        self.partition_key_path = path.into();
        self
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Check that database and collection names are usable identifiers.
    pub fn validate(&self) -> Result<(), ItemStoreError> {
        validate_identifier("database", &self.database)?;
        validate_identifier("collection", &self.collection)?;
        Ok(())
    }
}

fn validate_identifier(field_name: &str, value: &str) -> Result<(), ItemStoreError> {
    if value.is_empty() || value.len() > 63 {
        return Err(ItemStoreError::validation(format!(
            "{} name must be between 1 and 63 characters",
            field_name
        )));
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(ItemStoreError::validation(format!(
            "{} name '{}' may only contain ASCII letters, digits and underscores",
            field_name, value
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = StoreConfig::default();
        assert_eq!(config.database, "todo");
        assert_eq!(config.collection, "items");
        assert_eq!(config.partition_key_path, "/id");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_quoted_identifiers() {
        let config = StoreConfig::new("todo", "items\"; DROP TABLE x; --");
        assert!(matches!(
            config.validate(),
            Err(ItemStoreError::ValidationError(_))
        ));
    }

    #[test]
    fn test_rejects_empty_database() {
        let config = StoreConfig::new("", "items");
        assert!(config.validate().is_err());
    }
}
