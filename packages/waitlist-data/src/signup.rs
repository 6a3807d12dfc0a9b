//! Public signup path.
//!
//! The one write the unauthenticated surface performs. Input is
//! sanitized before storage, a missing table is provisioned on demand,
//! and a duplicate email is reported as its own outcome rather than an
//! error.

use serde_json::json;

use store_core::{RecordStore, StoreError};
use store_resilience::{SchemaProvisioner, WAITLIST};

use crate::entry::{sanitize_text, WaitlistEntry};

/// New signup as submitted from the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub country: Option<String>,
    pub phone: Option<String>,
}

/// Result of a signup attempt, as shown to the visitor.
#[derive(Debug, Clone, PartialEq)]
pub enum SignupOutcome {
    /// The entry was stored
    Joined(WaitlistEntry),
    /// The email is already on the list
    AlreadyJoined,
    /// The attempt failed for a reason the visitor can be told about
    Failed(String),
}

fn clean_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| sanitize_text(&v))
        .filter(|v| !v.is_empty())
}

/// Submits one signup. Never returns `Err`: every failure mode collapses
/// into a [`SignupOutcome`] the form can render.
pub async fn submit_signup<S: RecordStore + 'static>(
    provisioner: &SchemaProvisioner<S>,
    request: SignupRequest,
) -> SignupOutcome {
    let name = sanitize_text(&request.name);
    let email = sanitize_text(&request.email).to_lowercase();
    if name.is_empty() || email.is_empty() {
        return SignupOutcome::Failed("name and email are required".to_string());
    }

    let row = json!({
        "name": name,
        "email": email,
        "country": clean_optional(request.country),
        "phone": clean_optional(request.phone),
    });

    let store = provisioner.store();
    match store.insert(WAITLIST, row.clone()).await {
        Ok(stored) => decode_outcome(&stored),
        Err(StoreError::NotFound { .. }) => {
            // First-ever signup: create the table and retry once
            provisioner.ensure_collection_exists(WAITLIST).await;
            match store.insert(WAITLIST, row).await {
                Ok(stored) => decode_outcome(&stored),
                Err(err) => failed(err),
            }
        }
        Err(err) => failed(err),
    }
}

fn decode_outcome(stored: &serde_json::Value) -> SignupOutcome {
    match WaitlistEntry::from_row(stored) {
        Some(entry) => SignupOutcome::Joined(entry),
        None => SignupOutcome::Failed("signup stored but could not be read back".to_string()),
    }
}

fn failed(err: StoreError) -> SignupOutcome {
    match err {
        StoreError::Unique { .. } => SignupOutcome::AlreadyJoined,
        other => {
            tracing::error!(error = %other, "signup failed");
            SignupOutcome::Failed("could not join the waitlist, please try again".to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use store_core::MemoryStore;

    use super::*;

    fn harness() -> SchemaProvisioner<MemoryStore> {
        SchemaProvisioner::new(Arc::new(MemoryStore::new()))
    }

    fn request(name: &str, email: &str) -> SignupRequest {
        SignupRequest {
            name: name.to_string(),
            email: email.to_string(),
            country: None,
            phone: None,
        }
    }

    #[tokio::test]
    async fn first_signup_provisions_the_table() {
        let provisioner = harness();

        let outcome = submit_signup(&provisioner, request("Ada", "Ada@Example.org")).await;
        match outcome {
            SignupOutcome::Joined(entry) => {
                // Email is normalized to lowercase on the way in
                assert_eq!(entry.email, "ada@example.org");
            }
            other => panic!("expected joined, got {other:?}"),
        }
        assert!(provisioner.store().has_collection(WAITLIST));
    }

    #[tokio::test]
    async fn duplicate_email_reports_already_joined() {
        let provisioner = harness();
        submit_signup(&provisioner, request("Ada", "ada@example.org")).await;

        let outcome = submit_signup(&provisioner, request("Ada Again", "ada@example.org")).await;
        assert_eq!(outcome, SignupOutcome::AlreadyJoined);
    }

    #[tokio::test]
    async fn blank_input_is_rejected_before_storage() {
        let provisioner = harness();
        let outcome = submit_signup(&provisioner, request("   ", "ada@example.org")).await;
        assert!(matches!(outcome, SignupOutcome::Failed(_)));
        assert!(!provisioner.store().has_collection(WAITLIST));
    }

    #[tokio::test]
    async fn markup_is_stripped_from_all_fields() {
        let provisioner = harness();
        let outcome = submit_signup(
            &provisioner,
            SignupRequest {
                name: "<b>Ada</b>".to_string(),
                email: "ada@example.org".to_string(),
                country: Some("<Kenya>".to_string()),
                phone: Some("  ".to_string()),
            },
        )
        .await;

        match outcome {
            SignupOutcome::Joined(entry) => {
                assert_eq!(entry.name, "bAda/b");
                assert_eq!(entry.country.as_deref(), Some("Kenya"));
                assert_eq!(entry.phone, None);
            }
            other => panic!("expected joined, got {other:?}"),
        }
    }
}
