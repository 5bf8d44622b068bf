//! # To-Do Search Repository
//!
//! This crate provides traits and implementations for interacting with the
//! search index of the searchable to-do service. It includes definitions for
//! errors, the provider interface, a concrete implementation for a versioned
//! search REST API, an in-memory implementation, and idempotent provisioning
//! of the index, data source and indexer definitions.

pub mod config;
pub mod errors;
pub mod interfaces;
pub mod memory;
pub mod provisioning;
pub mod rest;
pub mod service;
pub mod types;

pub use config::{DataSourceConfig, SearchIndexServiceConfig, SearchResourceNames, SearchServiceConfig};
pub use errors::SearchIndexError;
pub use interfaces::SearchIndexProvider;
pub use memory::InMemorySearchProvider;
pub use provisioning::{ProvisioningReport, SearchProvisioner};
pub use rest::RestSearchProvider;
pub use service::SearchIndexService;
pub use types::{BatchOperationResult, BatchOperationSummary, ResourceKind};
