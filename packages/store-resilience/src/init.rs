//! Database initialization.
//!
//! Run once at application start: bootstraps the metadata collection,
//! applies pending migrations against the stored schema version, brings
//! every required collection into existence, verifies access policies, and
//! refreshes the remote schema cache. Every step is contained: a failed
//! initialization degrades to lazy provisioning on first query rather than
//! aborting the application.

use serde_json::json;
use store_core::{Query, RecordStore, EXEC_DDL};

use crate::provisioner::SchemaProvisioner;
use crate::safe_query::{safe_query, SafeQueryOptions};
use crate::schema::{
    self, CURRENT_SCHEMA_VERSION, META_COLLECTION, REQUIRED_COLLECTIONS,
};

/// What an initialization pass actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InitReport {
    /// Collections created by this pass (0 on a warm start)
    pub collections_created: usize,
    /// Schema version after the pass
    pub schema_version: u32,
    /// Migration steps applied by this pass
    pub migrations_applied: usize,
}

/// Initializes the database. Never fails; the report says what happened.
pub async fn initialize_database<S: RecordStore + 'static>(
    provisioner: &SchemaProvisioner<S>,
) -> InitReport {
    // Metadata collection first: provisioning it also bootstraps the
    // exec_ddl capability the rest of the pass relies on
    provisioner.ensure_collection_exists(META_COLLECTION).await;

    let stored_version = current_schema_version(provisioner).await;
    let mut migrations_applied = 0;
    if stored_version < CURRENT_SCHEMA_VERSION {
        let mut reached_version = stored_version;
        let mut halted = false;
        for migration in schema::migrations()
            .iter()
            .filter(|m| m.version > stored_version)
        {
            let args = json!({ "statements": migration.statements });
            match provisioner.store().rpc(EXEC_DDL, args).await {
                Ok(_) => {
                    migrations_applied += 1;
                    reached_version = migration.version;
                    provisioner
                        .log_event(
                            "migration_applied",
                            json!({
                                "version": migration.version,
                                "description": migration.description,
                            }),
                        )
                        .await;
                }
                Err(err) => {
                    // Later steps may build on this one; stop here and hold
                    // the marker back so the next pass retries from it
                    tracing::warn!(
                        version = migration.version,
                        description = migration.description,
                        error = %err,
                        "migration failed; schema version held back"
                    );
                    halted = true;
                    break;
                }
            }
        }

        // Marker only moves forward, and only past applied steps; with every
        // pending step applied it lands on the current version even when the
        // registry has no step for some intermediate number
        let target_version = if halted {
            reached_version
        } else {
            CURRENT_SCHEMA_VERSION
        };
        if target_version > stored_version {
            set_schema_version(provisioner, target_version).await;
            provisioner
                .log_event(
                    "schema_upgraded",
                    json!({ "from": stored_version, "to": target_version }),
                )
                .await;
        }
    }

    let mut collections_created = 0;
    for name in REQUIRED_COLLECTIONS {
        let created = if schema::is_capability(name) {
            // Capabilities are not queryable; installation is idempotent
            // and never counts as a created collection
            provisioner.ensure_collection_exists(name).await;
            false
        } else if provisioner.collection_exists(name).await {
            false
        } else {
            provisioner.ensure_collection_exists(name).await
        };
        if created {
            collections_created += 1;
        }
    }

    verify_policies(provisioner).await;
    provisioner.refresh_schema_cache().await;

    provisioner
        .log_event(
            "database_initialized",
            json!({
                "collections_created": collections_created,
                "schema_version": CURRENT_SCHEMA_VERSION,
            }),
        )
        .await;

    if collections_created > 0 {
        tracing::info!(
            collections_created,
            schema_version = CURRENT_SCHEMA_VERSION,
            "database initialized"
        );
    }

    InitReport {
        collections_created,
        schema_version: CURRENT_SCHEMA_VERSION,
        migrations_applied,
    }
}

/// Reads the schema-version marker. Absence (or anything unreadable) is
/// version 0.
pub async fn current_schema_version<S: RecordStore + 'static>(
    provisioner: &SchemaProvisioner<S>,
) -> u32 {
    let store = provisioner.store().clone();
    let rows = safe_query(
        provisioner,
        META_COLLECTION,
        || {
            let store = store.clone();
            async move {
                store
                    .query(
                        &Query::select(META_COLLECTION)
                            .eq("key", "schema_version")
                            .limit(1),
                    )
                    .await
            }
        },
        SafeQueryOptions::with_fallback(Vec::new())
            .create_if_missing(false)
            .log_errors(false),
    )
    .await
    .unwrap_or_default();

    rows.first()
        .and_then(|row| row.get("value"))
        .and_then(|value| value.as_str())
        .and_then(|value| value.parse().ok())
        .unwrap_or(0)
}

async fn set_schema_version<S: RecordStore + 'static>(
    provisioner: &SchemaProvisioner<S>,
    version: u32,
) {
    let store = provisioner.store();
    let marker = Query::select(META_COLLECTION).eq("key", "schema_version");
    let patch = json!({ "value": version.to_string() });

    match store.update(&marker, patch).await {
        Ok(0) => {
            let row = json!({ "key": "schema_version", "value": version.to_string() });
            if let Err(err) = store.insert(META_COLLECTION, row).await {
                tracing::warn!(version, error = %err, "failed to write schema version marker");
            }
        }
        Ok(_) => {}
        Err(err) => {
            tracing::warn!(version, error = %err, "failed to update schema version marker");
        }
    }
}

async fn verify_policies<S: RecordStore + 'static>(provisioner: &SchemaProvisioner<S>) {
    let args = json!({ "statements": schema::policy_statements() });
    if let Err(err) = provisioner.store().rpc(EXEC_DDL, args).await {
        // Policies are re-verified on every start; a miss here is recovered
        // by the next pass
        tracing::debug!(error = %err, "policy verification failed");
    }
}
