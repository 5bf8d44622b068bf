//! PostgreSQL implementation of the sync state repository.
//!
//! Stores the coordinator watermark in `sync_meta` and the ledger of indexed
//! projections in `sync_ledger`. Both tables are created by the migrations in
//! `src/postgres/migrations`.

use async_trait::async_trait;
use sqlx::migrate::Migrator;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;

use crate::errors::SyncStateError;
use crate::interfaces::{SyncCommit, SyncLease, SyncState, SyncStateRepository};

/// Embedded migrations for the sync state tables.
pub static MIGRATOR: Migrator = sqlx::migrate!("src/postgres/migrations");

/// Prefix of the advisory lock keys taken by `try_acquire`.
const LEASE_NAMESPACE: &str = "todo-sync:";

/// Lease held through a transaction-scoped advisory lock.
///
/// The lock ends with the transaction, so a crashed holder's connection
/// frees it too.
struct AdvisoryLease {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl SyncLease for AdvisoryLease {
    async fn release(self: Box<Self>) -> Result<(), SyncStateError> {
        let lease = *self;
        lease.tx.commit().await?;
        Ok(())
    }
}

/// PostgreSQL-backed sync state repository.
///
/// `commit_cycle` writes the watermark and the ledger delta in one transaction,
/// so a failed commit leaves the previous cycle's state untouched.
/// `try_acquire` takes an advisory lock per coordinator id, shared by every
/// process on the same database.
pub struct PostgresSyncStateRepository {
    pool: PgPool,
}

impl PostgresSyncStateRepository {
    /// Creates a repository and applies pending migrations.
    pub async fn new(pool: PgPool) -> Result<Self, SyncStateError> {
        MIGRATOR.run(&pool).await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl SyncStateRepository for PostgresSyncStateRepository {
    async fn try_acquire(
        &self,
        coordinator_id: &str,
    ) -> Result<Option<Box<dyn SyncLease>>, SyncStateError> {
        let mut tx = self.pool.begin().await?;
        let acquired: bool =
            sqlx::query_scalar("SELECT pg_try_advisory_xact_lock(hashtext($1))")
                .bind(format!("{LEASE_NAMESPACE}{coordinator_id}"))
                .fetch_one(&mut *tx)
                .await?;

        if !acquired {
            tx.rollback().await?;
            debug!(coordinator_id = %coordinator_id, "Sync lease held elsewhere");
            return Ok(None);
        }
        Ok(Some(Box::new(AdvisoryLease { tx })))
    }

    async fn load(&self, coordinator_id: &str) -> Result<SyncState, SyncStateError> {
        let watermark: Option<i64> =
            sqlx::query_scalar("SELECT watermark FROM sync_meta WHERE id = $1")
                .bind(coordinator_id)
                .fetch_optional(&self.pool)
                .await?;

        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT item_id, content_hash FROM sync_ledger WHERE coordinator_id = $1",
        )
        .bind(coordinator_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(SyncState {
            watermark: watermark.unwrap_or(0),
            ledger: rows.into_iter().collect(),
        })
    }

    async fn commit_cycle(
        &self,
        coordinator_id: &str,
        commit: &SyncCommit,
    ) -> Result<(), SyncStateError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO sync_meta (id, watermark, updated_at) VALUES ($1, $2, now()) \
             ON CONFLICT (id) DO UPDATE \
             SET watermark = GREATEST(sync_meta.watermark, EXCLUDED.watermark), updated_at = now()",
        )
        .bind(coordinator_id)
        .bind(commit.watermark)
        .execute(&mut *tx)
        .await?;

        if !commit.upserted.is_empty() {
            let (ids, hashes): (Vec<String>, Vec<String>) =
                commit.upserted.iter().cloned().unzip();
            sqlx::query(
                r#"
                INSERT INTO sync_ledger (coordinator_id, item_id, content_hash)
                SELECT $1, t.item_id, t.content_hash
                FROM UNNEST($2::text[], $3::text[]) AS t(item_id, content_hash)
                ON CONFLICT (coordinator_id, item_id)
                DO UPDATE SET content_hash = EXCLUDED.content_hash
                "#,
            )
            .bind(coordinator_id)
            .bind(&ids)
            .bind(&hashes)
            .execute(&mut *tx)
            .await?;
        }

        if !commit.removed.is_empty() {
            sqlx::query(
                "DELETE FROM sync_ledger WHERE coordinator_id = $1 AND item_id = ANY($2::text[])",
            )
            .bind(coordinator_id)
            .bind(&commit.removed)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        debug!(
            coordinator_id = %coordinator_id,
            watermark = commit.watermark,
            upserted = commit.upserted.len(),
            removed = commit.removed.len(),
            "Sync cycle committed"
        );
        Ok(())
    }

    async fn clear(&self, coordinator_id: &str) -> Result<(), SyncStateError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM sync_ledger WHERE coordinator_id = $1")
            .bind(coordinator_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM sync_meta WHERE id = $1")
            .bind(coordinator_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}
