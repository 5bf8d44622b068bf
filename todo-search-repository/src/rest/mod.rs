//! REST implementation of the search index provider.
//!
//! Targets a search service exposing a versioned REST surface: every request
//! carries an `api-key` header and an `api-version` query parameter.

pub mod definitions;
mod provider;
mod responses;

pub use provider::RestSearchProvider;
