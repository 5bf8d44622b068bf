//! Item predicates.
//!
//! An [`ItemFilter`] is evaluated directly against items by the in-memory store
//! and translated into a SQL condition over the JSONB document body by the
//! PostgreSQL store. Both translations use two-valued logic: a missing field
//! never matches a leaf predicate, and `Not` of such a leaf matches.

use chrono::{DateTime, Utc};
use sqlx::{Postgres, QueryBuilder};
use todo_shared::Item;

/// A filter predicate over items.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ItemFilter {
    /// Matches every item.
    #[default]
    All,
    /// Exact id match.
    Id(String),
    /// Completion flag equals the value.
    Completed(bool),
    /// Item carries the tag (case-insensitive).
    HasTag(String),
    /// Title contains the text (case-insensitive).
    TitleContains(String),
    /// Due date strictly before the instant. Items without a due date never match.
    DueBefore(DateTime<Utc>),
    /// Due date strictly after the instant. Items without a due date never match.
    DueAfter(DateTime<Utc>),
    /// All nested filters match. An empty list matches everything.
    And(Vec<ItemFilter>),
    /// Any nested filter matches. An empty list matches nothing.
    Or(Vec<ItemFilter>),
    Not(Box<ItemFilter>),
}

impl ItemFilter {
    pub fn and(self, other: ItemFilter) -> Self {
        match self {
            ItemFilter::And(mut filters) => {
                filters.push(other);
                ItemFilter::And(filters)
            }
            filter => ItemFilter::And(vec![filter, other]),
        }
    }

    pub fn or(self, other: ItemFilter) -> Self {
        match self {
            ItemFilter::Or(mut filters) => {
                filters.push(other);
                ItemFilter::Or(filters)
            }
            filter => ItemFilter::Or(vec![filter, other]),
        }
    }

    pub fn negate(self) -> Self {
        ItemFilter::Not(Box::new(self))
    }

    /// Evaluate the filter against an item.
    pub fn matches(&self, item: &Item) -> bool {
        match self {
            ItemFilter::All => true,
            ItemFilter::Id(id) => item.id == *id,
            ItemFilter::Completed(completed) => item.completed == *completed,
            ItemFilter::HasTag(tag) => item.has_tag(tag),
            ItemFilter::TitleContains(text) => item
                .title
                .to_lowercase()
                .contains(&text.to_lowercase()),
            ItemFilter::DueBefore(instant) => item.due_date.is_some_and(|due| due < *instant),
            ItemFilter::DueAfter(instant) => item.due_date.is_some_and(|due| due > *instant),
            ItemFilter::And(filters) => filters.iter().all(|f| f.matches(item)),
            ItemFilter::Or(filters) => filters.iter().any(|f| f.matches(item)),
            ItemFilter::Not(filter) => !filter.matches(item),
        }
    }

    /// Append this filter as a SQL condition over the `body` JSONB column.
    pub(crate) fn push_sql(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        match self {
            ItemFilter::All => {
                builder.push("TRUE");
            }
            ItemFilter::Id(id) => {
                builder.push("COALESCE(id = ");
                builder.push_bind(id.clone());
                builder.push(", FALSE)");
            }
            ItemFilter::Completed(completed) => {
                builder.push("COALESCE((body->>'isComplete')::boolean, FALSE) = ");
                builder.push_bind(*completed);
            }
            ItemFilter::HasTag(tag) => {
                builder.push(
                    "EXISTS (SELECT 1 FROM jsonb_array_elements_text(\
                     COALESCE(body->'tags', '[]'::jsonb)) AS t(tag) WHERE lower(t.tag) = lower(",
                );
                builder.push_bind(tag.clone());
                builder.push("))");
            }
            ItemFilter::TitleContains(text) => {
                builder.push("COALESCE(strpos(lower(body->>'title'), lower(");
                builder.push_bind(text.clone());
                builder.push(")) > 0, FALSE)");
            }
            ItemFilter::DueBefore(instant) => {
                builder.push("COALESCE((body->>'dueDate')::timestamptz < ");
                builder.push_bind(*instant);
                builder.push(", FALSE)");
            }
            ItemFilter::DueAfter(instant) => {
                builder.push("COALESCE((body->>'dueDate')::timestamptz > ");
                builder.push_bind(*instant);
                builder.push(", FALSE)");
            }
            ItemFilter::And(filters) => Self::push_joined(builder, filters, " AND ", "TRUE"),
            ItemFilter::Or(filters) => Self::push_joined(builder, filters, " OR ", "FALSE"),
            ItemFilter::Not(filter) => {
                builder.push("NOT (");
                filter.push_sql(builder);
                builder.push(")");
            }
        }
    }

    fn push_joined(
        builder: &mut QueryBuilder<'_, Postgres>,
        filters: &[ItemFilter],
        separator: &str,
        empty: &str,
    ) {
        if filters.is_empty() {
            builder.push(empty);
            return;
        }
        builder.push("(");
        for (i, filter) in filters.iter().enumerate() {
            if i > 0 {
                builder.push(separator);
            }
            filter.push_sql(builder);
        }
        builder.push(")");
    }
}
