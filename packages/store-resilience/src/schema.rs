//! Schema registry.
//!
//! Provisioning recipes for every collection the application queries with
//! auto-create enabled, the schema version constant, versioned migrations,
//! and the default access policies. A collection name without a recipe here
//! makes provisioning a silent no-op.

use store_core::{
    CollectionSpec, ColumnSpec, ColumnType, DdlStatement, PolicyAction, EXEC_DDL,
    REFRESH_SCHEMA_CACHE,
};

/// Version the registry describes. The `_meta` marker is compared against
/// this to decide whether migrations run.
pub const CURRENT_SCHEMA_VERSION: u32 = 2;

/// Reserved metadata collection holding the schema-version marker.
pub const META_COLLECTION: &str = "_meta";
/// Append-only operational log events.
pub const LOGS_COLLECTION: &str = "_logs";
pub const WAITLIST: &str = "waitlist";
pub const NEWSLETTER_SUBSCRIBERS: &str = "newsletter_subscribers";
pub const BLOGS: &str = "blogs";
pub const MEMBERS: &str = "members";

/// Collections the initialization routine brings into existence, in
/// creation order. `_meta` is bootstrapped separately, before any of these.
pub const REQUIRED_COLLECTIONS: [&str; 7] = [
    LOGS_COLLECTION,
    EXEC_DDL,
    REFRESH_SCHEMA_CACHE,
    WAITLIST,
    NEWSLETTER_SUBSCRIBERS,
    BLOGS,
    MEMBERS,
];

/// How a collection is brought into existence.
#[derive(Debug, Clone)]
pub enum Recipe {
    /// Remote procedure installed through the always-available
    /// `install_procedure` path
    Capability { procedure: &'static str },
    /// Ordinary collection created through the `exec_ddl` capability
    Table { statements: Vec<DdlStatement> },
}

/// One versioned migration step.
#[derive(Debug, Clone)]
pub struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub statements: Vec<DdlStatement>,
}

/// Migrations applied when the stored schema version is older than
/// [`CURRENT_SCHEMA_VERSION`]. Fresh deployments get the final shape
/// directly from the recipes; these only upgrade pre-existing data.
pub fn migrations() -> Vec<Migration> {
    vec![Migration {
        version: 2,
        description: "add optional phone column to waitlist",
        statements: vec![DdlStatement::AddColumn {
            collection: WAITLIST.to_string(),
            column: ColumnSpec::new("phone", ColumnType::Text),
        }],
    }]
}

/// Default access policies verified (and re-created if missing) at
/// initialization. Create-or-replace semantics make this idempotent.
pub fn policy_statements() -> Vec<DdlStatement> {
    vec![
        DdlStatement::CreatePolicy {
            collection: WAITLIST.to_string(),
            name: "waitlist_read_authenticated".to_string(),
            action: PolicyAction::Select,
            role: "authenticated".to_string(),
        },
        DdlStatement::CreatePolicy {
            collection: WAITLIST.to_string(),
            name: "waitlist_insert_authenticated".to_string(),
            action: PolicyAction::Insert,
            role: "authenticated".to_string(),
        },
        DdlStatement::CreatePolicy {
            collection: BLOGS.to_string(),
            name: "blogs_read_published".to_string(),
            action: PolicyAction::Select,
            role: "anonymous".to_string(),
        },
        DdlStatement::CreatePolicy {
            collection: BLOGS.to_string(),
            name: "blogs_manage_authenticated".to_string(),
            action: PolicyAction::All,
            role: "authenticated".to_string(),
        },
    ]
}

/// Returns the provisioning recipe for a known collection name, or `None`
/// for names the registry does not cover.
pub fn recipe_for(name: &str) -> Option<Recipe> {
    match name {
        EXEC_DDL => Some(Recipe::Capability {
            procedure: EXEC_DDL,
        }),
        REFRESH_SCHEMA_CACHE => Some(Recipe::Capability {
            procedure: REFRESH_SCHEMA_CACHE,
        }),
        META_COLLECTION => Some(table_recipe(
            CollectionSpec {
                name: META_COLLECTION.to_string(),
                columns: vec![
                    ColumnSpec::new("key", ColumnType::Text).required().unique(),
                    ColumnSpec::new("value", ColumnType::Text),
                ],
            },
            &[("idx_meta_key", "key", false)],
        )),
        LOGS_COLLECTION => Some(table_recipe(
            CollectionSpec {
                name: LOGS_COLLECTION.to_string(),
                columns: vec![
                    ColumnSpec::new("event", ColumnType::Text).required(),
                    ColumnSpec::new("details", ColumnType::Json),
                ],
            },
            &[
                ("idx_logs_event", "event", false),
                ("idx_logs_created_at", "created_at", true),
            ],
        )),
        WAITLIST => Some(table_recipe(
            CollectionSpec {
                name: WAITLIST.to_string(),
                columns: vec![
                    ColumnSpec::new("name", ColumnType::Text).required(),
                    ColumnSpec::new("email", ColumnType::Text).required().unique(),
                    ColumnSpec::new("country", ColumnType::Text),
                    ColumnSpec::new("phone", ColumnType::Text),
                ],
            },
            &[
                ("idx_waitlist_email", "email", false),
                ("idx_waitlist_created_at", "created_at", true),
            ],
        )),
        NEWSLETTER_SUBSCRIBERS => Some(table_recipe(
            CollectionSpec {
                name: NEWSLETTER_SUBSCRIBERS.to_string(),
                columns: vec![
                    ColumnSpec::new("email", ColumnType::Text).required().unique(),
                    ColumnSpec::new("is_active", ColumnType::Boolean),
                ],
            },
            &[
                ("idx_newsletter_email", "email", false),
                ("idx_newsletter_active", "is_active", false),
            ],
        )),
        BLOGS => Some(table_recipe(
            CollectionSpec {
                name: BLOGS.to_string(),
                columns: vec![
                    ColumnSpec::new("title", ColumnType::Text).required(),
                    ColumnSpec::new("excerpt", ColumnType::Text),
                    ColumnSpec::new("content", ColumnType::Text),
                    ColumnSpec::new("featured_image", ColumnType::Text),
                    ColumnSpec::new("author", ColumnType::Text),
                    ColumnSpec::new("published", ColumnType::Boolean),
                    ColumnSpec::new("updated_at", ColumnType::Timestamp),
                ],
            },
            &[
                ("idx_blogs_published", "published", false),
                ("idx_blogs_created_at", "created_at", true),
            ],
        )),
        MEMBERS => Some(table_recipe(
            CollectionSpec {
                name: MEMBERS.to_string(),
                columns: vec![
                    ColumnSpec::new("email", ColumnType::Text).required().unique(),
                    ColumnSpec::new("role", ColumnType::Text),
                ],
            },
            &[("idx_members_email", "email", false)],
        )),
        _ => None,
    }
}

/// Returns true if the name denotes a capability pseudo-collection rather
/// than a queryable collection.
pub fn is_capability(name: &str) -> bool {
    matches!(recipe_for(name), Some(Recipe::Capability { .. }))
}

fn table_recipe(spec: CollectionSpec, indexes: &[(&str, &str, bool)]) -> Recipe {
    let collection = spec.name.clone();
    let mut statements = vec![DdlStatement::CreateCollection { spec }];
    for (name, column, descending) in indexes {
        statements.push(DdlStatement::CreateIndex {
            collection: collection.clone(),
            name: name.to_string(),
            column: column.to_string(),
            descending: *descending,
        });
    }
    statements.push(DdlStatement::EnableRowSecurity {
        collection: collection.clone(),
    });
    Recipe::Table { statements }
}
