//! On-demand schema provisioner.
//!
//! Given a collection name with a registered recipe, issues the minimal
//! remote operations to bring the collection into existence. Table recipes
//! are gated behind the `exec_ddl` capability; the capability itself is
//! bootstrapped through the always-available `install_procedure` path, so
//! there is no self-dependency. All failure modes return `false` without
//! raising, and nothing on this path logs at error severity.

use std::sync::Arc;

use serde_json::{json, Value};
use store_core::{
    Query, RecordStore, StoreError, EXEC_DDL, INSTALL_PROCEDURE, REFRESH_SCHEMA_CACHE,
};

use crate::safe_query::{safe_query, SafeQueryOptions};
use crate::schema::{self, Recipe, LOGS_COLLECTION};

/// Provisioner bound to one store client.
///
/// Constructed by the composition root and shared by reference; owns no
/// state beyond the client handle.
pub struct SchemaProvisioner<S: RecordStore + 'static> {
    store: Arc<S>,
}

impl<S: RecordStore + 'static> SchemaProvisioner<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// The underlying store client.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Brings a known collection into existence.
    ///
    /// Returns `false` without raising when the name has no registered
    /// recipe, when the execute capability cannot be bootstrapped, or when
    /// the remote operation fails. Repeated calls for an already-provisioned
    /// collection succeed without duplicating indexes or policies (the DDL
    /// statements carry if-not-exists semantics).
    pub async fn ensure_collection_exists(&self, name: &str) -> bool {
        let recipe = match schema::recipe_for(name) {
            Some(recipe) => recipe,
            None => {
                tracing::debug!(collection = name, "no schema registered; provisioning skipped");
                return false;
            }
        };

        match recipe {
            Recipe::Capability { procedure } => self.ensure_capability(procedure).await,
            Recipe::Table { statements } => {
                if !self.ensure_capability(EXEC_DDL).await {
                    return false;
                }

                let args = json!({ "statements": statements });
                match self.store.rpc(EXEC_DDL, args.clone()).await {
                    Ok(_) => {}
                    Err(StoreError::NotFound { name: missing }) if missing == EXEC_DDL => {
                        // Capability reported missing despite the bootstrap
                        // (stale remote cache); bootstrap once more and
                        // retry the original operation once
                        if !self.ensure_capability(EXEC_DDL).await {
                            return false;
                        }
                        if let Err(err) = self.store.rpc(EXEC_DDL, args).await {
                            tracing::debug!(
                                collection = name,
                                error = %err,
                                "provisioning retry failed"
                            );
                            return false;
                        }
                    }
                    Err(err) => {
                        tracing::debug!(collection = name, error = %err, "provisioning failed");
                        return false;
                    }
                }

                self.spawn_cache_refresh();
                self.log_event("collection_created", json!({ "collection": name }))
                    .await;
                true
            }
        }
    }

    /// Lightweight existence probe: a limit-1 query against the collection.
    ///
    /// `NotFound` means the collection is missing; any other failure
    /// (permissions, transient network) is treated as "exists" to avoid
    /// false negatives.
    pub async fn collection_exists(&self, name: &str) -> bool {
        match self.store.query(&Query::select(name).limit(1)).await {
            Ok(_) => true,
            Err(StoreError::NotFound { .. }) => false,
            Err(_) => true,
        }
    }

    /// Asks the backend to refresh its query-planner cache. Best-effort:
    /// failure logs at warn level and returns `false`.
    pub async fn refresh_schema_cache(&self) -> bool {
        match self.store.rpc(REFRESH_SCHEMA_CACHE, Value::Null).await {
            Ok(ack) => {
                tracing::debug!(?ack, "schema cache refreshed");
                true
            }
            Err(err) => {
                tracing::warn!(error = %err, "schema cache refresh failed");
                false
            }
        }
    }

    /// Appends an operational log event to `_logs`. Logging must never
    /// break the caller: auto-create and error logging are both off, and
    /// the outcome is discarded.
    pub async fn log_event(&self, event: &str, details: Value) {
        let store = Arc::clone(&self.store);
        let row = json!({ "event": event, "details": details });
        let options = SafeQueryOptions::with_fallback(Value::Null)
            .create_if_missing(false)
            .log_errors(false);
        let _ = safe_query(
            self,
            LOGS_COLLECTION,
            || {
                let store = Arc::clone(&store);
                let row = row.clone();
                async move { store.insert(LOGS_COLLECTION, row).await }
            },
            options,
        )
        .await;
    }

    async fn ensure_capability(&self, procedure: &str) -> bool {
        match self
            .store
            .rpc(INSTALL_PROCEDURE, json!({ "name": procedure }))
            .await
        {
            Ok(_) => true,
            Err(err) => {
                tracing::debug!(procedure, error = %err, "capability bootstrap failed");
                false
            }
        }
    }

    /// Fire-and-forget cache refresh after a successful provisioning,
    /// as an explicit background task with bounded error handling.
    fn spawn_cache_refresh(&self) {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            if let Err(err) = store.rpc(REFRESH_SCHEMA_CACHE, Value::Null).await {
                tracing::warn!(error = %err, "background schema cache refresh failed");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use store_core::MemoryStore;

    #[tokio::test]
    async fn unknown_collection_is_a_silent_no_op() {
        let store = Arc::new(MemoryStore::new());
        let provisioner = SchemaProvisioner::new(Arc::clone(&store));
        assert!(!provisioner.ensure_collection_exists("giraffes").await);
        assert!(store.collection_names().is_empty());
    }

    #[tokio::test]
    async fn provisions_collection_and_capability_in_one_call() {
        let store = Arc::new(MemoryStore::new());
        let provisioner = SchemaProvisioner::new(Arc::clone(&store));

        assert!(provisioner.ensure_collection_exists(schema::WAITLIST).await);
        assert!(store.has_collection(schema::WAITLIST));
        assert!(store.procedure_installed(EXEC_DDL));
    }

    #[tokio::test]
    async fn provisioning_twice_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let provisioner = SchemaProvisioner::new(Arc::clone(&store));

        assert!(provisioner.ensure_collection_exists(schema::WAITLIST).await);
        store
            .insert(
                schema::WAITLIST,
                json!({ "name": "Ada", "email": "ada@example.org" }),
            )
            .await
            .unwrap();

        assert!(provisioner.ensure_collection_exists(schema::WAITLIST).await);
        assert_eq!(store.row_count(schema::WAITLIST), 1);
    }

    #[tokio::test]
    async fn capability_bootstrap_failure_returns_false() {
        let store = Arc::new(MemoryStore::new());
        store.inject_rpc_error(INSTALL_PROCEDURE, StoreError::transient("connection reset"));
        let provisioner = SchemaProvisioner::new(Arc::clone(&store));

        assert!(!provisioner.ensure_collection_exists(schema::WAITLIST).await);
        assert!(!store.has_collection(schema::WAITLIST));
    }

    #[tokio::test]
    async fn stale_capability_report_is_retried_once() {
        let store = Arc::new(MemoryStore::new());
        // First exec_ddl call reports the capability missing even though the
        // bootstrap succeeded; the provisioner must re-bootstrap and retry
        store.inject_rpc_error(EXEC_DDL, StoreError::not_found(EXEC_DDL));
        let provisioner = SchemaProvisioner::new(Arc::clone(&store));

        assert!(provisioner.ensure_collection_exists(schema::WAITLIST).await);
        assert!(store.has_collection(schema::WAITLIST));
    }

    #[tokio::test]
    async fn existence_probe_distinguishes_not_found() {
        let store = Arc::new(MemoryStore::new());
        let provisioner = SchemaProvisioner::new(Arc::clone(&store));

        assert!(!provisioner.collection_exists(schema::WAITLIST).await);
        provisioner.ensure_collection_exists(schema::WAITLIST).await;
        assert!(provisioner.collection_exists(schema::WAITLIST).await);

        // Non-NotFound failures must not read as "missing"
        store.inject_query_error(schema::WAITLIST, StoreError::transient("timeout"));
        assert!(provisioner.collection_exists(schema::WAITLIST).await);
    }
}
