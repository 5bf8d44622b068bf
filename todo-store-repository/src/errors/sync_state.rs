use thiserror::Error;

#[derive(Debug, Error)]
/// Represents errors that can occur while reading or committing sync state.
///
/// A failed commit leaves the previously committed watermark and ledger in place.
pub enum SyncStateError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("Sync state unavailable: {0}")]
    Unavailable(String),
}
