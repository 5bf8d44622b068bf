//! Processor module for the sync coordinator.
//!
//! Compares scanned documents against the ledger of indexed projections.

mod diff_processor;

pub use diff_processor::{fingerprint, DiffProcessor, PendingUpsert, SyncPlan};
