//! PostgreSQL implementation of the item store.
//!
//! Each collection is a table inside a schema named after the database. Items
//! are stored as JSONB documents keyed by `(partition_key, id)`. The `_ts`
//! column holds the modification timestamp in microseconds since the epoch and
//! is strictly increased on every write of a document.

use std::future::Future;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use todo_shared::{Item, ItemDocument, ItemKey};
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument};

use crate::config::StoreConfig;
use crate::errors::ItemStoreError;
use crate::filter::ItemFilter;
use crate::interfaces::ItemStore;
use crate::partition::PartitionKeyPath;

/// Current wall-clock time in epoch microseconds, evaluated per statement row.
const NOW_MICROS: &str = "(extract(epoch from clock_timestamp()) * 1000000)::bigint";

/// PostgreSQL-backed item store.
///
/// The collection table is created lazily on first use. The partition key path
/// is recorded as a table comment when the table is created; opening an
/// existing collection with a different path fails with
/// [`ItemStoreError::ProvisioningError`].
pub struct PostgresItemStore {
    pool: PgPool,
    config: StoreConfig,
    partition_key_path: PartitionKeyPath,
    /// Fully quoted `"schema"."table"` name.
    table: String,
    provisioned: OnceCell<()>,
}

impl PostgresItemStore {
    /// Creates a store on top of an existing pool.
    ///
    /// # Returns
    ///
    /// * `Ok(PostgresItemStore)` - Store ready for use; the collection is provisioned on first call
    /// * `Err(ItemStoreError::ValidationError)` - If names or the partition key path are malformed
    pub fn new(pool: PgPool, config: StoreConfig) -> Result<Self, ItemStoreError> {
        config.validate()?;
        let partition_key_path = PartitionKeyPath::parse(&config.partition_key_path)?;
        let table = format!("\"{}\".\"{}\"", config.database, config.collection);

        Ok(Self {
            pool,
            config,
            partition_key_path,
            table,
            provisioned: OnceCell::new(),
        })
    }

    /// Connects to PostgreSQL and creates a store.
    pub async fn connect(database_url: &str, config: StoreConfig) -> Result<Self, ItemStoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .acquire_timeout(config.operation_timeout)
            .connect(database_url)
            .await
            .map_err(|e| ItemStoreError::connection(e.to_string()))?;

        info!(
            database = %config.database,
            collection = %config.collection,
            "Connected to PostgreSQL item store"
        );

        Self::new(pool, config)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run an operation under the configured deadline.
    async fn with_deadline<T, F>(&self, operation: F) -> Result<T, ItemStoreError>
    where
        F: Future<Output = Result<T, ItemStoreError>>,
    {
        let deadline = self.config.operation_timeout;
        match tokio::time::timeout(deadline, operation).await {
            Ok(result) => result,
            Err(_) => Err(ItemStoreError::Timeout(deadline)),
        }
    }

    async fn ensure_provisioned(&self) -> Result<(), ItemStoreError> {
        self.provisioned
            .get_or_try_init(|| self.provision())
            .await
            .map(|_| ())
    }

    async fn provision(&self) -> Result<(), ItemStoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!(
            "CREATE SCHEMA IF NOT EXISTS \"{}\"",
            self.config.database
        ))
        .execute(&mut *tx)
        .await?;

        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id TEXT NOT NULL,
                partition_key TEXT NOT NULL,
                body JSONB NOT NULL,
                _ts BIGINT NOT NULL,
                PRIMARY KEY (partition_key, id)
            )",
            self.table
        ))
        .execute(&mut *tx)
        .await?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS \"{}_ts_idx\" ON {} (_ts)",
            self.config.collection, self.table
        ))
        .execute(&mut *tx)
        .await?;

        let expected = format!("partition_key_path={}", self.partition_key_path.as_str());
        let recorded: Option<String> =
            sqlx::query_scalar("SELECT obj_description(to_regclass($1), 'pg_class')")
                .bind(&self.table)
                .fetch_one(&mut *tx)
                .await?;

        match recorded {
            None => {
                // COMMENT does not accept bind parameters; the path was validated
                // to contain no quotes.
                sqlx::query(&format!(
                    "COMMENT ON TABLE {} IS '{}'",
                    self.table, expected
                ))
                .execute(&mut *tx)
                .await?;
            }
            Some(recorded) if recorded == expected => {}
            Some(recorded) => {
                return Err(ItemStoreError::provisioning(format!(
                    "collection {} was created with {}, configured {}",
                    self.table, recorded, expected
                )));
            }
        }

        tx.commit().await?;

        info!(
            table = %self.table,
            partition_key_path = %self.partition_key_path.as_str(),
            "Item collection provisioned"
        );
        Ok(())
    }
}

#[async_trait]
impl ItemStore for PostgresItemStore {
    async fn ensure_collection(&self) -> Result<(), ItemStoreError> {
        self.with_deadline(self.ensure_provisioned()).await
    }

    #[instrument(skip(self), fields(table = %self.table))]
    async fn get(&self, filter: &ItemFilter) -> Result<Option<Item>, ItemStoreError> {
        self.with_deadline(async {
            self.ensure_provisioned().await?;

            let mut builder =
                QueryBuilder::<Postgres>::new(format!("SELECT body FROM {} WHERE ", self.table));
            filter.push_sql(&mut builder);
            builder.push(" LIMIT 1");

            let row: Option<Json<Item>> = builder
                .build_query_scalar()
                .fetch_optional(&self.pool)
                .await?;
            Ok(row.map(|Json(item)| item))
        })
        .await
    }

    #[instrument(skip(self), fields(table = %self.table))]
    async fn find(&self, filter: &ItemFilter) -> Result<Vec<Item>, ItemStoreError> {
        self.with_deadline(async {
            self.ensure_provisioned().await?;

            let mut builder =
                QueryBuilder::<Postgres>::new(format!("SELECT body FROM {} WHERE ", self.table));
            filter.push_sql(&mut builder);

            let rows: Vec<Json<Item>> = builder
                .build_query_scalar()
                .fetch_all(&self.pool)
                .await?;
            debug!(count = rows.len(), "Items found");
            Ok(rows.into_iter().map(|Json(item)| item).collect())
        })
        .await
    }

    async fn get_by_id(&self, id: &str, partition_key: &str) -> Result<Item, ItemStoreError> {
        self.with_deadline(async {
            self.ensure_provisioned().await?;

            let sql = format!(
                "SELECT body FROM {} WHERE partition_key = $1 AND id = $2",
                self.table
            );
            let row: Option<Json<Item>> = sqlx::query_scalar(&sql)
                .bind(partition_key)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

            row.map(|Json(item)| item)
                .ok_or_else(|| ItemStoreError::not_found(id, partition_key))
        })
        .await
    }

    async fn create(&self, item: &Item) -> Result<Item, ItemStoreError> {
        self.with_deadline(async {
            self.ensure_provisioned().await?;
            let partition_key = self.partition_key_path.extract(item)?;

            let sql = format!(
                "INSERT INTO {} (id, partition_key, body, _ts) VALUES ($1, $2, $3, {}) \
                 ON CONFLICT (partition_key, id) DO NOTHING RETURNING _ts",
                self.table, NOW_MICROS
            );
            let inserted: Option<i64> = sqlx::query_scalar(&sql)
                .bind(&item.id)
                .bind(&partition_key)
                .bind(Json(item))
                .fetch_optional(&self.pool)
                .await?;

            match inserted {
                Some(ts) => {
                    debug!(id = %item.id, partition_key = %partition_key, ts, "Item created");
                    Ok(item.clone())
                }
                None => Err(ItemStoreError::conflict(&item.id, partition_key)),
            }
        })
        .await
    }

    async fn update(&self, id: &str, item: &Item) -> Result<Item, ItemStoreError> {
        if item.id != id {
            return Err(ItemStoreError::validation(format!(
                "item id '{}' does not match target id '{}'",
                item.id, id
            )));
        }

        self.with_deadline(async {
            self.ensure_provisioned().await?;
            let partition_key = self.partition_key_path.extract(item)?;

            let sql = format!(
                "UPDATE {} SET body = $3, _ts = GREATEST({}, _ts + 1) \
                 WHERE partition_key = $1 AND id = $2 RETURNING _ts",
                self.table, NOW_MICROS
            );
            let updated: Option<i64> = sqlx::query_scalar(&sql)
                .bind(&partition_key)
                .bind(id)
                .bind(Json(item))
                .fetch_optional(&self.pool)
                .await?;

            match updated {
                Some(ts) => {
                    debug!(id = %id, partition_key = %partition_key, ts, "Item replaced");
                    Ok(item.clone())
                }
                None => Err(ItemStoreError::not_found(id, partition_key)),
            }
        })
        .await
    }

    async fn delete(&self, id: &str, partition_key: &str) -> Result<(), ItemStoreError> {
        self.with_deadline(async {
            self.ensure_provisioned().await?;

            let sql = format!(
                "DELETE FROM {} WHERE partition_key = $1 AND id = $2 RETURNING id",
                self.table
            );
            let deleted: Option<String> = sqlx::query_scalar(&sql)
                .bind(partition_key)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

            if deleted.is_none() {
                return Err(ItemStoreError::not_found(id, partition_key));
            }
            debug!(id = %id, partition_key = %partition_key, "Item deleted");
            Ok(())
        })
        .await
    }

    async fn changed_since(&self, watermark: i64) -> Result<Vec<ItemDocument>, ItemStoreError> {
        self.with_deadline(async {
            self.ensure_provisioned().await?;

            let sql = format!(
                "SELECT body, partition_key, _ts FROM {} WHERE _ts > $1 ORDER BY _ts ASC",
                self.table
            );
            let rows: Vec<(Json<Item>, String, i64)> = sqlx::query_as(&sql)
                .bind(watermark)
                .fetch_all(&self.pool)
                .await?;

            Ok(rows
                .into_iter()
                .map(|(Json(item), partition_key, ts)| ItemDocument {
                    item,
                    partition_key,
                    ts,
                })
                .collect())
        })
        .await
    }

    async fn list_keys(&self) -> Result<Vec<ItemKey>, ItemStoreError> {
        self.with_deadline(async {
            self.ensure_provisioned().await?;

            let sql = format!("SELECT id, partition_key FROM {}", self.table);
            let rows: Vec<(String, String)> =
                sqlx::query_as(&sql).fetch_all(&self.pool).await?;

            Ok(rows
                .into_iter()
                .map(|(id, partition_key)| ItemKey { id, partition_key })
                .collect())
        })
        .await
    }

    fn partition_key_path(&self) -> &PartitionKeyPath {
        &self.partition_key_path
    }
}
