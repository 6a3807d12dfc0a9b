//! Live insert feed for the waitlist.
//!
//! Wraps the store's broadcast change feed, decoding rows into entries
//! and collapsing channel conditions into signals the view-model can act
//! on without knowing the transport.

use std::sync::Arc;

use tokio::sync::broadcast;

use store_core::{ChangeEvent, ChangeKind, RecordStore, StoreError};
use store_resilience::WAITLIST;

use crate::entry::WaitlistEntry;

/// Feed lifecycle as surfaced to the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionStatus {
    /// Subscription requested, not yet confirmed
    Pending,
    Subscribed,
    /// Feed ended normally; a new subscription is required
    Closed,
    /// Subscription failed; live updates are unavailable
    Errored,
}

/// What the view should do with one feed wakeup.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedSignal {
    /// Merge one new entry into the list
    Insert(WaitlistEntry),
    /// Events were dropped; the window must be refetched
    Resync,
}

/// An open insert subscription on the waitlist collection.
///
/// Dropping the feed tears the subscription down; the underlying
/// receiver is released with it.
#[derive(Debug)]
pub struct WaitlistFeed {
    receiver: broadcast::Receiver<ChangeEvent>,
    status: SubscriptionStatus,
}

impl WaitlistFeed {
    /// Opens the feed. Returns `Err` with an [`SubscriptionStatus::Errored`]
    /// outcome when the store refuses the subscription.
    pub async fn open<S: RecordStore>(store: &Arc<S>) -> Result<Self, StoreError> {
        let receiver = store.subscribe(WAITLIST).await?;
        Ok(Self {
            receiver,
            status: SubscriptionStatus::Subscribed,
        })
    }

    pub fn status(&self) -> SubscriptionStatus {
        self.status
    }

    /// Waits for the next actionable signal.
    ///
    /// Malformed rows are skipped with a warning. A lagged channel maps
    /// to [`FeedSignal::Resync`] since dropped events cannot be replayed.
    /// `None` means the feed is closed and will produce nothing further.
    pub async fn next(&mut self) -> Option<FeedSignal> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if event.kind != ChangeKind::Inserted {
                        continue;
                    }
                    match WaitlistEntry::from_row(&event.row) {
                        Some(entry) => return Some(FeedSignal::Insert(entry)),
                        None => continue,
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "insert feed lagged, requesting resync");
                    return Some(FeedSignal::Resync);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    self.status = SubscriptionStatus::Closed;
                    return None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use store_core::MemoryStore;
    use store_resilience::SchemaProvisioner;

    use super::*;

    async fn harness() -> (Arc<MemoryStore>, WaitlistFeed) {
        let store = Arc::new(MemoryStore::new());
        let provisioner = SchemaProvisioner::new(Arc::clone(&store));
        provisioner.ensure_collection_exists(WAITLIST).await;
        let feed = WaitlistFeed::open(&store).await.unwrap();
        (store, feed)
    }

    #[tokio::test]
    async fn inserts_arrive_as_decoded_entries() {
        let (store, mut feed) = harness().await;
        assert_eq!(feed.status(), SubscriptionStatus::Subscribed);

        store
            .insert(
                WAITLIST,
                json!({ "name": "Ada", "email": "ada@example.org" }),
            )
            .await
            .unwrap();

        match feed.next().await {
            Some(FeedSignal::Insert(entry)) => {
                assert_eq!(entry.name, "Ada");
                assert!(!entry.id.is_empty());
            }
            other => panic!("expected insert signal, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn feed_delivers_inserts_in_order() {
        let (store, mut feed) = harness().await;

        for i in 0..3 {
            store
                .insert(
                    WAITLIST,
                    json!({ "name": format!("User {i}"), "email": format!("u{i}@example.org") }),
                )
                .await
                .unwrap();
        }

        let mut names = Vec::new();
        for _ in 0..3 {
            match feed.next().await {
                Some(FeedSignal::Insert(entry)) => names.push(entry.name),
                other => panic!("expected insert signal, got {other:?}"),
            }
        }
        assert_eq!(names, vec!["User 0", "User 1", "User 2"]);
    }
}
