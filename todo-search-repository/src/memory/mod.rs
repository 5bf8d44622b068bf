//! In-memory search index used by tests and local runs.

mod provider;

pub use provider::InMemorySearchProvider;
