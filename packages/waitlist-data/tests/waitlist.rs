//! End-to-end tests over the waitlist pipeline: initialize, seed, fetch
//! through the resilient stack, merge live inserts, filter, and export.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use store_core::{MemoryStore, RecordStore};
use store_resilience::{initialize_database, SchemaProvisioner, WAITLIST};
use time::macros::{date, datetime};
use waitlist_data::{
    FeedSignal, FetchStatus, SignupOutcome, SignupRequest, WaitlistFeed, WaitlistView,
    submit_signup,
};

async fn harness() -> (Arc<MemoryStore>, SchemaProvisioner<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let provisioner = SchemaProvisioner::new(Arc::clone(&store));
    initialize_database(&provisioner).await;
    (store, provisioner)
}

async fn seed(store: &MemoryStore, name: &str, email: &str, country: Option<&str>, at: &str) {
    store
        .insert(
            WAITLIST,
            json!({
                "name": name,
                "email": email,
                "country": country,
                "created_at": at,
            }),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn refresh_loads_the_window_newest_first() {
    let (store, provisioner) = harness().await;
    seed(&store, "Alice", "alice@example.org", Some("Kenya"), "2026-06-01T09:00:00Z").await;
    seed(&store, "Bob", "bob@example.org", Some("Brazil"), "2026-08-01T09:00:00Z").await;
    // Outside the 365-day window, must not be loaded
    seed(&store, "Old", "old@example.org", None, "2024-01-01T09:00:00Z").await;

    let mut view = WaitlistView::new();
    view.refresh_with(
        &provisioner,
        datetime!(2026-08-24 12:00:00 UTC),
        3,
        Duration::from_millis(5),
    )
    .await;

    assert_eq!(*view.status(), FetchStatus::Ready);
    let names: Vec<&str> = view.entries().iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["Bob", "Alice"]);
}

#[tokio::test]
async fn filter_count_matches_export_row_count() {
    let (store, provisioner) = harness().await;
    for i in 0..7 {
        let country = if i % 2 == 0 { Some("Kenya") } else { Some("Brazil") };
        seed(
            &store,
            &format!("User {i}"),
            &format!("user{i}@example.org"),
            country,
            "2026-08-01T09:00:00Z",
        )
        .await;
    }

    let mut view = WaitlistView::new();
    view.refresh_with(
        &provisioner,
        datetime!(2026-08-24 12:00:00 UTC),
        3,
        Duration::from_millis(5),
    )
    .await;
    view.set_country_filter("Kenya");

    let filtered = view.filtered().len();
    assert_eq!(filtered, 4);

    // Export covers the filtered list, never just the current page
    let file = view.export_json(date!(2026 - 08 - 24));
    let rows: Vec<serde_json::Value> = serde_json::from_str(&file.contents).unwrap();
    assert_eq!(rows.len(), filtered);
    assert!(rows.iter().all(|r| r["country"] == "Kenya"));

    let csv = view.export_csv(date!(2026 - 08 - 24));
    assert_eq!(csv.contents.lines().count(), filtered + 1);
}

#[tokio::test]
async fn live_inserts_merge_in_arrival_order_without_refetch() {
    let (store, provisioner) = harness().await;
    seed(&store, "Base", "base@example.org", None, "2026-08-20T09:00:00Z").await;

    let mut view = WaitlistView::new();
    view.refresh_with(
        &provisioner,
        datetime!(2026-08-24 12:00:00 UTC),
        3,
        Duration::from_millis(5),
    )
    .await;
    let mut feed = WaitlistFeed::open(&store).await.unwrap();

    for i in 1..=3 {
        store
            .insert(
                WAITLIST,
                json!({ "name": format!("Live {i}"), "email": format!("live{i}@example.org") }),
            )
            .await
            .unwrap();
    }

    let mut now = datetime!(2026-08-24 12:01:00 UTC);
    for _ in 0..3 {
        match feed.next().await {
            Some(FeedSignal::Insert(entry)) => {
                view.apply_insert(entry, now);
                now += time::Duration::seconds(1);
            }
            other => panic!("expected insert, got {other:?}"),
        }
    }

    // Newest delivery sits on top, base row stays last; still Ready
    let names: Vec<&str> = view.entries().iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["Live 3", "Live 2", "Live 1", "Base"]);
    assert_eq!(*view.status(), FetchStatus::Ready);
}

#[tokio::test]
async fn signup_flows_through_to_the_admin_view() {
    let (_store, provisioner) = harness().await;

    let outcome = submit_signup(
        &provisioner,
        SignupRequest {
            name: "Ada".to_string(),
            email: "ada@example.org".to_string(),
            country: Some("Kenya".to_string()),
            phone: None,
        },
    )
    .await;
    assert!(matches!(outcome, SignupOutcome::Joined(_)));

    let mut view = WaitlistView::new();
    view.refresh_with(
        &provisioner,
        time::OffsetDateTime::now_utc(),
        3,
        Duration::from_millis(5),
    )
    .await;

    assert_eq!(view.entries().len(), 1);
    assert_eq!(view.entries()[0].email, "ada@example.org");
}

#[tokio::test]
async fn exhausted_retries_surface_as_error_state() {
    let (store, provisioner) = harness().await;
    seed(&store, "Ada", "ada@example.org", None, "2026-08-20T09:00:00Z").await;
    for _ in 0..3 {
        store.inject_query_error(WAITLIST, store_core::StoreError::transient("connection refused"));
    }

    let mut view = WaitlistView::new();
    view.refresh_with(
        &provisioner,
        datetime!(2026-08-24 12:00:00 UTC),
        3,
        Duration::from_millis(2),
    )
    .await;

    assert!(matches!(view.status(), FetchStatus::Error(_)));
    assert!(view.entries().is_empty());

    // Next refresh recovers once the store is healthy again
    view.refresh_with(
        &provisioner,
        datetime!(2026-08-24 12:05:00 UTC),
        3,
        Duration::from_millis(2),
    )
    .await;
    assert_eq!(*view.status(), FetchStatus::Ready);
    assert_eq!(view.entries().len(), 1);
}
