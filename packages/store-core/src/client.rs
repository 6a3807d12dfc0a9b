//! Record-store capability trait.
//!
//! The data-access layers depend only on this shape, never on a concrete
//! backend. Implementations classify their failures into [`StoreError`]
//! before returning, so callers never inspect raw error payloads.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::StoreError;
use crate::query::Query;

/// Procedure that installs other procedures. Always available on every
/// backend, so the execute capability can be bootstrapped without
/// depending on itself.
pub const INSTALL_PROCEDURE: &str = "install_procedure";
/// Procedure that applies DDL statements. Must be installed first.
pub const EXEC_DDL: &str = "exec_ddl";
/// Procedure that refreshes the remote query-planner cache.
pub const REFRESH_SCHEMA_CACHE: &str = "refresh_schema_cache";

/// Row-level change kinds delivered over a change feed.
///
/// Only inserts are published today; the enum leaves room for the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Inserted,
}

/// One row-level change notification.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    /// Collection the change occurred in
    pub collection: String,
    pub kind: ChangeKind,
    /// The affected row as stored (server-assigned fields included)
    pub row: Value,
}

/// Metadata for one stored file object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageObject {
    pub path: String,
    pub size: usize,
}

/// Capability set over a remote structured-record service.
///
/// # Invariants
/// - `insert` returns the stored row, including the server-assigned `id`
///   and `created_at` fields.
/// - Errors are classified into [`StoreError`] variants at this boundary;
///   no caller re-inspects message text.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Evaluates a query and returns matching rows.
    async fn query(&self, query: &Query) -> Result<Vec<Value>, StoreError>;

    /// Inserts one row and returns it as stored.
    async fn insert(&self, collection: &str, row: Value) -> Result<Value, StoreError>;

    /// Updates rows matching the query's filters with the given fields,
    /// returning the number of rows touched.
    async fn update(&self, query: &Query, fields: Value) -> Result<usize, StoreError>;

    /// Deletes rows matching the query's filters, returning the number of
    /// rows removed.
    async fn delete(&self, query: &Query) -> Result<usize, StoreError>;

    /// Invokes a named remote procedure.
    async fn rpc(&self, procedure: &str, args: Value) -> Result<Value, StoreError>;

    /// Opens an INSERT change feed for the collection.
    async fn subscribe(
        &self,
        collection: &str,
    ) -> Result<broadcast::Receiver<ChangeEvent>, StoreError>;

    /// Lists objects in a storage bucket.
    async fn storage_list(&self, bucket: &str) -> Result<Vec<StorageObject>, StoreError>;

    /// Uploads an object into a storage bucket.
    async fn storage_upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
    ) -> Result<(), StoreError>;

    /// Removes an object from a storage bucket.
    async fn storage_remove(&self, bucket: &str, path: &str) -> Result<(), StoreError>;

    /// Returns the public URL for an object.
    fn storage_public_url(&self, bucket: &str, path: &str) -> String;
}
