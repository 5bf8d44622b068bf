//! Search result types.
//!
//! This module defines the response structure returned from a full-text query.

use serde::{Deserialize, Serialize};

use crate::types::item::Item;

/// A single facet bucket: a value (tag or day) and the number of matching items.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FacetCount {
    pub value: String,
    pub count: u64,
}

impl FacetCount {
    pub fn new(value: impl Into<String>, count: u64) -> Self {
        Self {
            value: value.into(),
            count,
        }
    }
}

/// Complete search response with matches and facet tables.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ItemSearchResults {
    /// Total number of matching documents.
    /// May be greater than the number of returned items due to the result limit.
    pub total_count: u64,

    /// The matched items, in the order returned by the search service.
    pub items: Vec<Item>,

    /// Tag -> number of matching items.
    pub tag_counts: Vec<FacetCount>,

    /// Due-date day bucket -> number of matching items.
    pub date_counts: Vec<FacetCount>,
}

impl ItemSearchResults {
    /// Create an empty search response.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Count for a tag facet, if the tag appeared among the matches.
    pub fn tag_count(&self, tag: &str) -> Option<u64> {
        self.tag_counts
            .iter()
            .find(|facet| facet.value == tag)
            .map(|facet| facet.count)
    }
}
