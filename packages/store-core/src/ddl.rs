//! DDL wire vocabulary.
//!
//! Provisioning recipes are sequences of structured statements shipped to
//! the backend through the `exec_ddl` procedure. Every statement carries
//! if-not-exists / create-or-replace semantics so repeated provisioning of
//! an already-present collection succeeds without duplicating anything.

use serde::{Deserialize, Serialize};

/// Column value types supported by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Text,
    Boolean,
    Timestamp,
    Json,
}

/// One column definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ColumnType,
    /// Inserts without this column are rejected
    #[serde(default)]
    pub required: bool,
    /// Inserts duplicating an existing value in this column are rejected
    #[serde(default)]
    pub unique: bool,
}

impl ColumnSpec {
    /// An optional column of the given type.
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
            required: false,
            unique: false,
        }
    }

    /// Marks the column as required on insert.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Marks the column as unique across the collection.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// Collection shape: name plus column definitions.
///
/// Server-managed columns (`id`, `created_at`) are implicit; recipes list
/// only application columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSpec {
    pub name: String,
    pub columns: Vec<ColumnSpec>,
}

/// Access-policy action classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyAction {
    Select,
    Insert,
    Update,
    Delete,
    All,
}

/// One DDL-equivalent statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DdlStatement {
    /// Create the collection if it does not exist
    CreateCollection { spec: CollectionSpec },
    /// Add a column if the collection lacks it (migration path)
    AddColumn {
        collection: String,
        column: ColumnSpec,
    },
    /// Create a named index if it does not exist
    CreateIndex {
        collection: String,
        name: String,
        column: String,
        descending: bool,
    },
    /// Create or replace a named access policy
    CreatePolicy {
        collection: String,
        name: String,
        action: PolicyAction,
        role: String,
    },
    /// Enable row-level security for the collection
    EnableRowSecurity { collection: String },
}
