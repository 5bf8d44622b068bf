//! # To-Do Sync
//!
//! Keeps the search index consistent with the item store when the search
//! service does not pull from the store itself.
//!
//! ## Architecture
//!
//! Each cycle follows the Scanner-Processor-Loader pattern:
//!
//! 1. **Scanner**: Reads documents changed since the watermark and the live key set
//! 2. **Processor**: Diffs projections against the ledger of indexed content
//! 3. **Loader**: Upserts and deletes index entries
//! 4. **Coordinator**: Serializes cycles, commits the watermark and ledger,
//!    and schedules cycles on an interval or on demand
//!
//! ## Modules
//!
//! - [`scanner`]: Change scans over the item store
//! - [`processor`]: Classification of scanned documents
//! - [`loader`]: Writes into the search index
//! - [`coordinator`]: Cycle lifecycle and scheduling
//! - [`errors`]: Error types for the sync pipeline

pub mod coordinator;
pub mod errors;
pub mod loader;
pub mod processor;
pub mod scanner;

pub use coordinator::{CoordinatorConfig, CycleReport, SyncCoordinator, SyncHandle, SyncPhase, SyncStats};
pub use errors::SyncError;
