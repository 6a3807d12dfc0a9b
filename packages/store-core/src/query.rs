//! Query builder.
//!
//! A query is pure data: the builder records filters, ordering, and limits,
//! and the backend evaluates them. Field values are JSON so one builder
//! serves every collection.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single field filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Filter {
    /// Field equals value
    Eq { field: String, value: Value },
    /// Field is greater than or equal to value (string fields compare
    /// lexicographically, which is what RFC 3339 timestamps rely on)
    Gte { field: String, value: Value },
}

/// Sort direction for an ordered query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// A query against one collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// Target collection name
    pub collection: String,
    /// Conjunctive filters (all must match)
    pub filters: Vec<Filter>,
    /// Optional ordering field and direction
    pub order: Option<(String, SortOrder)>,
    /// Maximum number of rows to return
    pub limit: Option<usize>,
}

impl Query {
    /// Starts a query against the named collection.
    pub fn select(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }

    /// Adds an equality filter.
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    /// Adds a greater-than-or-equal filter.
    pub fn gte(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Gte {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    /// Orders results ascending by the given field.
    pub fn order_asc(mut self, field: impl Into<String>) -> Self {
        self.order = Some((field.into(), SortOrder::Ascending));
        self
    }

    /// Orders results descending by the given field.
    pub fn order_desc(mut self, field: impl Into<String>) -> Self {
        self.order = Some((field.into(), SortOrder::Descending));
        self
    }

    /// Caps the number of rows returned.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builder_accumulates_clauses() {
        let query = Query::select("waitlist")
            .gte("created_at", "2025-01-01T00:00:00Z")
            .eq("country", "Kenya")
            .order_desc("created_at")
            .limit(10);

        assert_eq!(query.collection, "waitlist");
        assert_eq!(query.filters.len(), 2);
        assert_eq!(
            query.order,
            Some(("created_at".to_string(), SortOrder::Descending))
        );
        assert_eq!(query.limit, Some(10));
        assert_eq!(
            query.filters[1],
            Filter::Eq {
                field: "country".to_string(),
                value: json!("Kenya"),
            }
        );
    }
}
