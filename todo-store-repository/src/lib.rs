//! # To-Do Store Repository
//!
//! This crate provides the item store abstraction for the searchable to-do
//! service: CRUD access to a partitioned document collection, the change scans
//! used by the sync coordinator, and persistence of the coordinator's
//! watermark and ledger. It includes a PostgreSQL implementation and an
//! in-memory implementation for tests and local runs.

pub mod config;
pub mod errors;
pub mod filter;
pub mod interfaces;
pub mod memory;
pub mod partition;
pub mod postgres;
pub mod service;

pub use config::StoreConfig;
pub use errors::{ItemStoreError, SyncStateError};
pub use filter::ItemFilter;
pub use interfaces::{ItemStore, SyncCommit, SyncLease, SyncState, SyncStateRepository};
pub use memory::{InMemoryItemStore, InMemorySyncStateRepository};
pub use partition::PartitionKeyPath;
pub use postgres::{PostgresItemStore, PostgresSyncStateRepository};
pub use service::{ItemDraft, ItemStoreService};
