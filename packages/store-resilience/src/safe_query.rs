//! Resilient query executor.
//!
//! The central error-containment boundary of the system: every failure mode
//! resolves to the caller-supplied fallback value, with one deliberate
//! exception: transient network-class failures are re-raised so the
//! retry-with-backoff layer above can handle them. Callers wrapping
//! `safe_query` in [`crate::retry_with_backoff`] can treat the combination
//! as "always succeeds, possibly with empty data" until retries are
//! exhausted.

use std::future::Future;

use store_core::{RecordStore, StoreError};

use crate::provisioner::SchemaProvisioner;

/// Options controlling [`safe_query`] behavior.
#[derive(Debug, Clone)]
pub struct SafeQueryOptions<T> {
    /// Provision the collection and retry once on a not-found failure
    pub create_if_missing: bool,
    /// Value returned when the query cannot be satisfied
    pub fallback: T,
    /// Log unexpected errors at error severity
    pub log_errors: bool,
    /// Apply file-storage error semantics instead of table semantics
    pub storage: bool,
}

impl<T: Default> Default for SafeQueryOptions<T> {
    fn default() -> Self {
        Self::with_fallback(T::default())
    }
}

impl<T> SafeQueryOptions<T> {
    /// Default options with an explicit fallback value.
    pub fn with_fallback(fallback: T) -> Self {
        Self {
            create_if_missing: true,
            fallback,
            log_errors: true,
            storage: false,
        }
    }

    pub fn create_if_missing(mut self, enabled: bool) -> Self {
        self.create_if_missing = enabled;
        self
    }

    pub fn log_errors(mut self, enabled: bool) -> Self {
        self.log_errors = enabled;
        self
    }

    pub fn storage(mut self, enabled: bool) -> Self {
        self.storage = enabled;
        self
    }
}

/// Executes one store operation with contained failure handling.
///
/// - Table semantics: a not-found failure is expected. When
///   `create_if_missing` is set, the collection is provisioned and the
///   operation re-invoked exactly once; any failure on that path resolves
///   to the fallback without error-level logging.
/// - Storage semantics: not-found and permission-denied resolve to the
///   fallback silently.
/// - Transient failures propagate as `Err` for the retry layer.
/// - Anything else logs one structured error-level event (when
///   `log_errors`) and resolves to the fallback.
pub async fn safe_query<S, T, F, Fut>(
    provisioner: &SchemaProvisioner<S>,
    collection: &str,
    thunk: F,
    options: SafeQueryOptions<T>,
) -> Result<T, StoreError>
where
    S: RecordStore + 'static,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    match thunk().await {
        Ok(data) => Ok(data),
        Err(StoreError::NotFound { .. }) if options.storage => Ok(options.fallback),
        Err(StoreError::NotFound { .. }) => {
            if options.create_if_missing
                && Box::pin(provisioner.ensure_collection_exists(collection)).await
            {
                match thunk().await {
                    Ok(data) => return Ok(data),
                    Err(err) => {
                        // Expected during recovery; never an error-level event
                        tracing::debug!(
                            collection,
                            error = %err,
                            "query retry after provisioning failed"
                        );
                    }
                }
            }
            Ok(options.fallback)
        }
        Err(StoreError::PermissionDenied { .. }) if options.storage => Ok(options.fallback),
        Err(err @ StoreError::Transient { .. }) => {
            tracing::debug!(collection, error = %err, "transient store failure");
            Err(err)
        }
        Err(StoreError::Unknown {
            code,
            status,
            message,
            details,
            hint,
        }) => {
            if options.log_errors {
                tracing::error!(
                    collection,
                    ?code,
                    ?status,
                    error_message = %message,
                    ?details,
                    ?hint,
                    storage = options.storage,
                    "unexpected store error"
                );
            }
            Ok(options.fallback)
        }
        Err(err) => {
            if options.log_errors {
                tracing::error!(collection, error = %err, "unexpected store error");
            }
            Ok(options.fallback)
        }
    }
}
