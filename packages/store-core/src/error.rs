//! Store error taxonomy.
//!
//! Every backend classifies its failures into this closed set exactly once,
//! at the adapter boundary. Callers match on variants instead of sniffing
//! message substrings or numeric codes.

use thiserror::Error;

/// Errors returned by record-store operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Collection or remote procedure does not exist
    #[error("'{name}' does not exist")]
    NotFound { name: String },

    /// Access-policy denial (includes storage-bucket 403s)
    #[error("Permission denied: {reason}")]
    PermissionDenied { reason: String },

    /// Network-class failure that may succeed on retry
    #[error("Transient failure: {detail}")]
    Transient { detail: String },

    /// Unique-constraint violation on insert
    #[error("Unique constraint violated on column '{column}'")]
    Unique { column: String },

    /// Any other remote failure, with the structured fields the backend
    /// reported
    #[error("Store error{}: {message}", code.as_deref().map(|c| format!(" [{c}]")).unwrap_or_default())]
    Unknown {
        code: Option<String>,
        status: Option<u16>,
        message: String,
        details: Option<String>,
        hint: Option<String>,
    },
}

impl StoreError {
    /// Shorthand for a missing collection or procedure.
    pub fn not_found(name: impl Into<String>) -> Self {
        StoreError::NotFound { name: name.into() }
    }

    /// Shorthand for a transient network-class failure.
    pub fn transient(detail: impl Into<String>) -> Self {
        StoreError::Transient {
            detail: detail.into(),
        }
    }

    /// Shorthand for an unclassified failure carrying only a message.
    pub fn unknown(message: impl Into<String>) -> Self {
        StoreError::Unknown {
            code: None,
            status: None,
            message: message.into(),
            details: None,
            hint: None,
        }
    }

    /// Returns true for failures worth retrying at the backoff layer.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient { .. })
    }
}
