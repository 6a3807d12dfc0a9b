//! In-memory reference backend.
//!
//! Implements the full [`RecordStore`] capability set against process-local
//! state: collections with typed column specs, unique-column enforcement,
//! server-assigned ids and timestamps, per-collection change feeds, a
//! procedure registry gating the DDL and cache-refresh rpcs, and simple
//! storage buckets. Scripted fault injection lets the resilience layers be
//! tested against transient and unknown failures.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio::sync::broadcast;

use crate::client::{
    ChangeEvent, ChangeKind, RecordStore, StorageObject, EXEC_DDL, INSTALL_PROCEDURE,
    REFRESH_SCHEMA_CACHE,
};
use crate::ddl::{CollectionSpec, DdlStatement};
use crate::error::StoreError;
use crate::query::{Filter, Query, SortOrder};

/// Capacity of each per-collection change-feed channel.
const FEED_CAPACITY: usize = 64;

#[derive(Debug)]
struct Collection {
    spec: CollectionSpec,
    rows: Vec<Value>,
    indexes: HashSet<String>,
    policies: HashMap<String, Value>,
    row_security: bool,
}

#[derive(Debug)]
struct Bucket {
    public: bool,
    objects: BTreeMap<String, Vec<u8>>,
}

#[derive(Debug, Default)]
struct Inner {
    collections: HashMap<String, Collection>,
    procedures: HashSet<String>,
    buckets: HashMap<String, Bucket>,
    next_id: u64,
    cache_refreshes: u64,
    query_faults: HashMap<String, VecDeque<StoreError>>,
    rpc_faults: HashMap<String, VecDeque<StoreError>>,
}

/// In-memory record store.
pub struct MemoryStore {
    inner: Mutex<Inner>,
    feeds: Mutex<HashMap<String, broadcast::Sender<ChangeEvent>>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Creates an empty store: no collections, no procedures installed.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            feeds: Mutex::new(HashMap::new()),
        }
    }

    /// Returns true if the collection has been created.
    pub fn has_collection(&self, name: &str) -> bool {
        self.inner.lock().collections.contains_key(name)
    }

    /// Returns true if the named procedure is installed.
    pub fn procedure_installed(&self, name: &str) -> bool {
        self.inner.lock().procedures.contains(name)
    }

    /// Number of rows currently stored in a collection (0 if missing).
    pub fn row_count(&self, name: &str) -> usize {
        self.inner
            .lock()
            .collections
            .get(name)
            .map(|c| c.rows.len())
            .unwrap_or(0)
    }

    /// Number of schema-cache refreshes performed so far.
    pub fn cache_refresh_count(&self) -> u64 {
        self.inner.lock().cache_refreshes
    }

    /// Sorted list of created collection names.
    pub fn collection_names(&self) -> Vec<String> {
        let inner = self.inner.lock();
        let mut names: Vec<String> = inner.collections.keys().cloned().collect();
        names.sort();
        names
    }

    /// Creates a storage bucket.
    pub fn create_bucket(&self, name: &str, public: bool) {
        self.inner.lock().buckets.insert(
            name.to_string(),
            Bucket {
                public,
                objects: BTreeMap::new(),
            },
        );
    }

    /// Scripts the next query against `collection` to fail with `error`.
    /// Multiple injections queue up and are consumed in order.
    pub fn inject_query_error(&self, collection: &str, error: StoreError) {
        self.inner
            .lock()
            .query_faults
            .entry(collection.to_string())
            .or_default()
            .push_back(error);
    }

    /// Scripts the next invocation of `procedure` to fail with `error`.
    pub fn inject_rpc_error(&self, procedure: &str, error: StoreError) {
        self.inner
            .lock()
            .rpc_faults
            .entry(procedure.to_string())
            .or_default()
            .push_back(error);
    }

    fn apply_statement(inner: &mut Inner, statement: DdlStatement) {
        match statement {
            DdlStatement::CreateCollection { spec } => {
                // If-not-exists: re-creating leaves the existing shape alone
                inner
                    .collections
                    .entry(spec.name.clone())
                    .or_insert_with(|| Collection {
                        spec,
                        rows: Vec::new(),
                        indexes: HashSet::new(),
                        policies: HashMap::new(),
                        row_security: false,
                    });
            }
            DdlStatement::AddColumn { collection, column } => {
                if let Some(coll) = inner.collections.get_mut(&collection) {
                    if !coll.spec.columns.iter().any(|c| c.name == column.name) {
                        coll.spec.columns.push(column);
                    }
                }
            }
            DdlStatement::CreateIndex {
                collection, name, ..
            } => {
                if let Some(coll) = inner.collections.get_mut(&collection) {
                    coll.indexes.insert(name);
                }
            }
            DdlStatement::CreatePolicy {
                collection,
                name,
                action,
                role,
            } => {
                if let Some(coll) = inner.collections.get_mut(&collection) {
                    // Create-or-replace by policy name
                    coll.policies
                        .insert(name, json!({ "action": action, "role": role }));
                }
            }
            DdlStatement::EnableRowSecurity { collection } => {
                if let Some(coll) = inner.collections.get_mut(&collection) {
                    coll.row_security = true;
                }
            }
        }
    }

    fn matches(row: &Value, filter: &Filter) -> bool {
        match filter {
            Filter::Eq { field, value } => row.get(field).unwrap_or(&Value::Null) == value,
            Filter::Gte { field, value } => {
                let actual = row.get(field).unwrap_or(&Value::Null);
                compare_values(actual, value).map(|o| o.is_ge()).unwrap_or(false)
            }
        }
    }
}

/// Orders two JSON scalars of the same kind. Strings compare
/// lexicographically, which RFC 3339 UTC timestamps rely on.
fn compare_values(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    match (a, b) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

#[async_trait::async_trait]
impl RecordStore for MemoryStore {
    async fn query(&self, query: &Query) -> Result<Vec<Value>, StoreError> {
        let mut inner = self.inner.lock();

        if let Some(queue) = inner.query_faults.get_mut(&query.collection) {
            if let Some(error) = queue.pop_front() {
                return Err(error);
            }
        }

        let collection = inner
            .collections
            .get(&query.collection)
            .ok_or_else(|| StoreError::not_found(&query.collection))?;

        let mut rows: Vec<Value> = collection
            .rows
            .iter()
            .filter(|row| query.filters.iter().all(|f| Self::matches(row, f)))
            .cloned()
            .collect();

        if let Some((field, order)) = &query.order {
            rows.sort_by(|a, b| {
                let ordering = compare_values(
                    a.get(field).unwrap_or(&Value::Null),
                    b.get(field).unwrap_or(&Value::Null),
                )
                .unwrap_or(std::cmp::Ordering::Equal);
                match order {
                    SortOrder::Ascending => ordering,
                    SortOrder::Descending => ordering.reverse(),
                }
            });
        }

        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }

        Ok(rows)
    }

    async fn insert(&self, collection: &str, row: Value) -> Result<Value, StoreError> {
        let stored = {
            let mut inner = self.inner.lock();
            inner.next_id += 1;
            let id = format!("{}-{}", collection, inner.next_id);

            let coll = inner
                .collections
                .get_mut(collection)
                .ok_or_else(|| StoreError::not_found(collection))?;

            let mut fields: Map<String, Value> = match row {
                Value::Object(map) => map,
                other => {
                    return Err(StoreError::unknown(format!(
                        "insert payload must be an object, got {other}"
                    )))
                }
            };

            for column in &coll.spec.columns {
                let value = fields.get(&column.name).unwrap_or(&Value::Null);
                if column.required && value.is_null() {
                    return Err(StoreError::unknown(format!(
                        "column '{}' is required",
                        column.name
                    )));
                }
                if column.unique && !value.is_null() {
                    let duplicate = coll
                        .rows
                        .iter()
                        .any(|r| r.get(&column.name).unwrap_or(&Value::Null) == value);
                    if duplicate {
                        return Err(StoreError::Unique {
                            column: column.name.clone(),
                        });
                    }
                }
            }

            fields.insert("id".to_string(), json!(id));
            // Seed data may carry an explicit created_at; otherwise the
            // server stamps the row
            if !fields.contains_key("created_at") {
                let now = OffsetDateTime::now_utc()
                    .format(&Rfc3339)
                    .unwrap_or_default();
                fields.insert("created_at".to_string(), json!(now));
            }

            let stored = Value::Object(fields);
            coll.rows.push(stored.clone());
            stored
        };

        let feeds = self.feeds.lock();
        if let Some(sender) = feeds.get(collection) {
            // No receivers is fine; the feed is best-effort
            let _ = sender.send(ChangeEvent {
                collection: collection.to_string(),
                kind: ChangeKind::Inserted,
                row: stored.clone(),
            });
        }

        Ok(stored)
    }

    async fn update(&self, query: &Query, fields: Value) -> Result<usize, StoreError> {
        let mut inner = self.inner.lock();
        let collection = inner
            .collections
            .get_mut(&query.collection)
            .ok_or_else(|| StoreError::not_found(&query.collection))?;

        let patch = match fields {
            Value::Object(map) => map,
            other => {
                return Err(StoreError::unknown(format!(
                    "update payload must be an object, got {other}"
                )))
            }
        };

        let mut touched = 0;
        for row in collection.rows.iter_mut() {
            if query.filters.iter().all(|f| Self::matches(row, f)) {
                if let Value::Object(map) = row {
                    for (key, value) in &patch {
                        map.insert(key.clone(), value.clone());
                    }
                    touched += 1;
                }
            }
        }
        Ok(touched)
    }

    async fn delete(&self, query: &Query) -> Result<usize, StoreError> {
        let mut inner = self.inner.lock();
        let collection = inner
            .collections
            .get_mut(&query.collection)
            .ok_or_else(|| StoreError::not_found(&query.collection))?;

        let before = collection.rows.len();
        collection
            .rows
            .retain(|row| !query.filters.iter().all(|f| Self::matches(row, f)));
        Ok(before - collection.rows.len())
    }

    async fn rpc(&self, procedure: &str, args: Value) -> Result<Value, StoreError> {
        let mut inner = self.inner.lock();

        if let Some(queue) = inner.rpc_faults.get_mut(procedure) {
            if let Some(error) = queue.pop_front() {
                return Err(error);
            }
        }

        match procedure {
            INSTALL_PROCEDURE => {
                let name = args
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| StoreError::unknown("install_procedure requires a name"))?;
                // Idempotent: re-installing is a no-op
                inner.procedures.insert(name.to_string());
                Ok(json!({ "installed": name }))
            }
            EXEC_DDL => {
                if !inner.procedures.contains(EXEC_DDL) {
                    return Err(StoreError::not_found(EXEC_DDL));
                }
                let statements: Vec<DdlStatement> =
                    serde_json::from_value(args.get("statements").cloned().unwrap_or_default())
                        .map_err(|e| StoreError::unknown(format!("malformed DDL payload: {e}")))?;
                for statement in statements {
                    Self::apply_statement(&mut inner, statement);
                }
                Ok(Value::Null)
            }
            REFRESH_SCHEMA_CACHE => {
                if !inner.procedures.contains(REFRESH_SCHEMA_CACHE) {
                    return Err(StoreError::not_found(REFRESH_SCHEMA_CACHE));
                }
                inner.cache_refreshes += 1;
                Ok(json!(format!(
                    "schema cache refreshed ({})",
                    inner.cache_refreshes
                )))
            }
            other => Err(StoreError::not_found(other)),
        }
    }

    async fn subscribe(
        &self,
        collection: &str,
    ) -> Result<broadcast::Receiver<ChangeEvent>, StoreError> {
        if !self.has_collection(collection) {
            return Err(StoreError::not_found(collection));
        }
        let mut feeds = self.feeds.lock();
        let sender = feeds
            .entry(collection.to_string())
            .or_insert_with(|| broadcast::channel(FEED_CAPACITY).0);
        Ok(sender.subscribe())
    }

    async fn storage_list(&self, bucket: &str) -> Result<Vec<StorageObject>, StoreError> {
        let inner = self.inner.lock();
        let bucket_data = inner
            .buckets
            .get(bucket)
            .ok_or_else(|| StoreError::not_found(bucket))?;
        if !bucket_data.public {
            return Err(StoreError::PermissionDenied {
                reason: format!("bucket '{bucket}' denies anonymous listing"),
            });
        }
        Ok(bucket_data
            .objects
            .iter()
            .map(|(path, bytes)| StorageObject {
                path: path.clone(),
                size: bytes.len(),
            })
            .collect())
    }

    async fn storage_upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let bucket_data = inner
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| StoreError::not_found(bucket))?;
        bucket_data.objects.insert(path.to_string(), bytes);
        Ok(())
    }

    async fn storage_remove(&self, bucket: &str, path: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let bucket_data = inner
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| StoreError::not_found(bucket))?;
        bucket_data
            .objects
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(path))
    }

    fn storage_public_url(&self, bucket: &str, path: &str) -> String {
        format!("memory://{bucket}/{path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ddl::{ColumnSpec, ColumnType};

    fn waitlist_spec() -> CollectionSpec {
        CollectionSpec {
            name: "waitlist".to_string(),
            columns: vec![
                ColumnSpec::new("name", ColumnType::Text).required(),
                ColumnSpec::new("email", ColumnType::Text).required().unique(),
                ColumnSpec::new("country", ColumnType::Text),
            ],
        }
    }

    async fn store_with_waitlist() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .rpc(INSTALL_PROCEDURE, json!({ "name": EXEC_DDL }))
            .await
            .unwrap();
        store
            .rpc(
                EXEC_DDL,
                json!({
                    "statements": [DdlStatement::CreateCollection { spec: waitlist_spec() }]
                }),
            )
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn query_missing_collection_is_not_found() {
        let store = MemoryStore::new();
        let err = store.query(&Query::select("waitlist")).await.unwrap_err();
        assert_eq!(err, StoreError::not_found("waitlist"));
    }

    #[tokio::test]
    async fn exec_ddl_requires_installation() {
        let store = MemoryStore::new();
        let err = store
            .rpc(EXEC_DDL, json!({ "statements": [] }))
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::not_found(EXEC_DDL));
    }

    #[tokio::test]
    async fn insert_assigns_id_and_timestamp() {
        let store = store_with_waitlist().await;
        let row = store
            .insert("waitlist", json!({ "name": "Ada", "email": "ada@example.org" }))
            .await
            .unwrap();
        assert!(row["id"].as_str().unwrap().starts_with("waitlist-"));
        assert!(row["created_at"].as_str().unwrap().contains('T'));
    }

    #[tokio::test]
    async fn duplicate_email_is_unique_violation() {
        let store = store_with_waitlist().await;
        store
            .insert("waitlist", json!({ "name": "Ada", "email": "ada@example.org" }))
            .await
            .unwrap();
        let err = store
            .insert("waitlist", json!({ "name": "Ada L", "email": "ada@example.org" }))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            StoreError::Unique {
                column: "email".to_string()
            }
        );
    }

    #[tokio::test]
    async fn gte_and_order_desc_on_timestamps() {
        let store = store_with_waitlist().await;
        for (name, email, stamp) in [
            ("Old", "old@example.org", "2024-01-01T00:00:00Z"),
            ("Mid", "mid@example.org", "2025-06-01T00:00:00Z"),
            ("New", "new@example.org", "2026-01-01T00:00:00Z"),
        ] {
            store
                .insert(
                    "waitlist",
                    json!({ "name": name, "email": email, "created_at": stamp }),
                )
                .await
                .unwrap();
        }

        let rows = store
            .query(
                &Query::select("waitlist")
                    .gte("created_at", "2025-01-01T00:00:00Z")
                    .order_desc("created_at"),
            )
            .await
            .unwrap();
        let names: Vec<&str> = rows.iter().map(|r| r["name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["New", "Mid"]);
    }

    #[tokio::test]
    async fn repeated_create_collection_keeps_shape() {
        let store = store_with_waitlist().await;
        store
            .insert("waitlist", json!({ "name": "Ada", "email": "a@example.org" }))
            .await
            .unwrap();

        // Second create must neither error nor clear rows
        store
            .rpc(
                EXEC_DDL,
                json!({
                    "statements": [DdlStatement::CreateCollection { spec: waitlist_spec() }]
                }),
            )
            .await
            .unwrap();
        assert_eq!(store.row_count("waitlist"), 1);
    }

    #[tokio::test]
    async fn change_feed_delivers_inserts() {
        let store = store_with_waitlist().await;
        let mut feed = store.subscribe("waitlist").await.unwrap();
        store
            .insert("waitlist", json!({ "name": "Ada", "email": "a@example.org" }))
            .await
            .unwrap();
        let event = feed.recv().await.unwrap();
        assert_eq!(event.kind, ChangeKind::Inserted);
        assert_eq!(event.row["name"], "Ada");
    }

    #[tokio::test]
    async fn injected_fault_fires_once() {
        let store = store_with_waitlist().await;
        store.inject_query_error("waitlist", StoreError::transient("connection reset"));

        let err = store.query(&Query::select("waitlist")).await.unwrap_err();
        assert!(err.is_transient());
        // Fault consumed; subsequent queries succeed
        assert!(store.query(&Query::select("waitlist")).await.is_ok());
    }

    #[tokio::test]
    async fn private_bucket_denies_listing() {
        let store = MemoryStore::new();
        store.create_bucket("gallery", false);
        let err = store.storage_list("gallery").await.unwrap_err();
        assert!(matches!(err, StoreError::PermissionDenied { .. }));
    }
}
