//! Record-store capability set and reference backend.
//!
//! Defines the capability trait consumed by the resilience and view-model
//! layers, the closed error taxonomy classified at the adapter boundary,
//! the query builder and DDL wire vocabulary, and an in-memory backend
//! implementing the full capability set.

pub mod client;
pub mod ddl;
pub mod error;
pub mod memory;
pub mod query;

pub use client::{
    ChangeEvent, ChangeKind, RecordStore, StorageObject, EXEC_DDL, INSTALL_PROCEDURE,
    REFRESH_SCHEMA_CACHE,
};
pub use ddl::{CollectionSpec, ColumnSpec, ColumnType, DdlStatement, PolicyAction};
pub use error::StoreError;
pub use memory::MemoryStore;
pub use query::{Filter, Query, SortOrder};
