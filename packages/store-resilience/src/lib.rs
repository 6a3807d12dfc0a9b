//! Resilience layer over the record-store capability set.
//!
//! Provides the schema registry and on-demand provisioner, the resilient
//! query executor that contains failures into fallback values, the bounded
//! retry-with-backoff executor, and the database initialization routine
//! (schema versioning, migrations, access policies).

pub mod init;
pub mod provisioner;
pub mod retry;
pub mod safe_query;
pub mod schema;

pub use init::{initialize_database, InitReport};
pub use provisioner::SchemaProvisioner;
pub use retry::{retry_with_backoff, DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS};
pub use safe_query::{safe_query, SafeQueryOptions};
pub use schema::{
    Migration, Recipe, BLOGS, CURRENT_SCHEMA_VERSION, LOGS_COLLECTION, MEMBERS, META_COLLECTION,
    NEWSLETTER_SUBSCRIBERS, WAITLIST,
};
