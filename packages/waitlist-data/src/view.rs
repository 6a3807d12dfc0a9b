//! Waitlist view-model.
//!
//! Sole owner of the in-memory record window: fetches it through the
//! retry + resilient-query stack, merges live insert events, derives the
//! filtered/paginated views and aggregate stats, and tracks which entries
//! are new since the operator's last visit.
//!
//! Fetch status moves `Idle -> Loading -> Ready | Error`; `Ready` may
//! return to `Loading` on explicit refresh, and live inserts never leave
//! `Ready`. Stale in-flight fetches are discarded by generation: a
//! completion only applies when its generation is still the latest issued.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use time::format_description::well_known::Rfc3339;
use time::{Duration, OffsetDateTime};

use store_core::{Query, RecordStore, StoreError};
use store_resilience::{
    retry_with_backoff, safe_query, SafeQueryOptions, SchemaProvisioner, DEFAULT_BASE_DELAY,
    DEFAULT_MAX_ATTEMPTS, WAITLIST,
};

use crate::entry::{sanitize_text, WaitlistEntry, CREATED_AT_FIELD};
use crate::export::{export_csv, export_json, ExportFile};
use crate::feed::SubscriptionStatus;
use crate::prefs::ViewPrefs;

/// Entries shown per page.
pub const PAGE_SIZE: usize = 50;

/// How far back the fetch window reaches.
pub const RETENTION_WINDOW: Duration = Duration::days(365);

/// How long a newly rendered entry stays highlighted before it is
/// auto-marked seen.
pub const SEEN_GRACE: Duration = Duration::seconds(3);

/// Fetch lifecycle state. `Error` and an empty `Ready` list are distinct
/// and must never render identically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchStatus {
    Idle,
    Loading,
    Ready,
    Error(String),
}

/// Aggregate figures over the full fetched window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitlistStats {
    pub total_signups: usize,
    pub unique_countries: usize,
    pub this_month: usize,
}

/// View-model for the waitlist admin list.
#[derive(Debug)]
pub struct WaitlistView {
    entries: Vec<WaitlistEntry>,
    status: FetchStatus,
    last_updated: Option<OffsetDateTime>,
    issued_generation: u64,
    page: usize,
    search: String,
    country: String,
    subscription: SubscriptionStatus,
    last_visit: Option<OffsetDateTime>,
    seen: BTreeSet<String>,
    pending_seen: HashMap<String, OffsetDateTime>,
}

impl Default for WaitlistView {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitlistView {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            status: FetchStatus::Idle,
            last_updated: None,
            issued_generation: 0,
            page: 1,
            search: String::new(),
            country: String::new(),
            subscription: SubscriptionStatus::Pending,
            last_visit: None,
            seen: BTreeSet::new(),
            pending_seen: HashMap::new(),
        }
    }

    /// Restores UI state persisted across reloads. Record data always
    /// comes from the store, never from preferences.
    pub fn with_prefs(prefs: ViewPrefs) -> Self {
        let mut view = Self::new();
        view.search = prefs.search;
        view.country = prefs.country;
        view.page = prefs.page.max(1);
        view.last_visit = prefs.last_visit;
        view.seen = prefs.seen_ids;
        view
    }

    /// Snapshot for persistence; stamps `now` as the visit being left.
    pub fn snapshot_prefs(&self, now: OffsetDateTime) -> ViewPrefs {
        ViewPrefs {
            last_visit: Some(now),
            seen_ids: self.seen.clone(),
            search: self.search.clone(),
            country: self.country.clone(),
            page: self.page,
        }
    }

    // --- fetch lifecycle ---

    /// Marks a fetch as in flight and returns its generation token.
    pub fn begin_refresh(&mut self) -> u64 {
        self.issued_generation += 1;
        self.status = FetchStatus::Loading;
        self.issued_generation
    }

    /// Applies a fetch result, unless a newer fetch has been issued since
    /// `generation`, in which case the stale result is discarded. Returns
    /// whether the result was applied.
    pub fn complete_refresh(
        &mut self,
        generation: u64,
        now: OffsetDateTime,
        result: Result<Vec<WaitlistEntry>, StoreError>,
    ) -> bool {
        if generation != self.issued_generation {
            tracing::debug!(
                generation,
                latest = self.issued_generation,
                "discarding stale fetch result"
            );
            return false;
        }
        match result {
            Ok(entries) => {
                self.entries = entries;
                self.status = FetchStatus::Ready;
                self.last_updated = Some(now);
            }
            Err(err) => {
                // Distinct error state: never silently show stale data
                self.entries.clear();
                self.status = FetchStatus::Error(err.to_string());
            }
        }
        true
    }

    /// Full refresh cycle with the default retry budget.
    pub async fn refresh<S: RecordStore + 'static>(
        &mut self,
        provisioner: &SchemaProvisioner<S>,
        now: OffsetDateTime,
    ) {
        self.refresh_with(provisioner, now, DEFAULT_MAX_ATTEMPTS, DEFAULT_BASE_DELAY)
            .await;
    }

    /// Refresh with an explicit retry budget.
    pub async fn refresh_with<S: RecordStore + 'static>(
        &mut self,
        provisioner: &SchemaProvisioner<S>,
        now: OffsetDateTime,
        max_attempts: u32,
        base_delay: StdDuration,
    ) {
        let generation = self.begin_refresh();
        let result = fetch_window(provisioner, now, max_attempts, base_delay).await;
        self.complete_refresh(generation, now, result);
    }

    // --- live updates ---

    /// Merges one live insert event. Deduplicates by id (a refresh may
    /// already contain the row) and never touches fetch status.
    pub fn apply_insert(&mut self, entry: WaitlistEntry, now: OffsetDateTime) {
        if self.entries.iter().any(|e| e.id == entry.id) {
            return;
        }
        self.entries.insert(0, entry);
        self.last_updated = Some(now);
    }

    pub fn set_subscription_status(&mut self, status: SubscriptionStatus) {
        self.subscription = status;
    }

    // --- filters and pagination ---

    /// Updates the search term; a change resets pagination.
    pub fn set_search(&mut self, term: impl Into<String>) {
        let term = term.into();
        if term != self.search {
            self.search = term;
            self.page = 1;
        }
    }

    /// Updates the country filter; a change resets pagination.
    pub fn set_country_filter(&mut self, country: impl Into<String>) {
        let country = country.into();
        if country != self.country {
            self.country = country;
            self.page = 1;
        }
    }

    /// Entries matching the active search term and country filter.
    pub fn filtered(&self) -> Vec<&WaitlistEntry> {
        let needle = self.search.to_lowercase();
        self.entries
            .iter()
            .filter(|entry| {
                let matches_search = needle.is_empty()
                    || sanitize_text(&entry.name).to_lowercase().contains(&needle)
                    || sanitize_text(&entry.email).to_lowercase().contains(&needle);
                let matches_country = self.country.is_empty()
                    || entry.country.as_deref() == Some(self.country.as_str());
                matches_search && matches_country
            })
            .collect()
    }

    pub fn total_pages(&self) -> usize {
        self.filtered().len().div_ceil(PAGE_SIZE).max(1)
    }

    /// The current page of the filtered list.
    pub fn page_slice(&self) -> Vec<&WaitlistEntry> {
        let filtered = self.filtered();
        let page = self.page.clamp(1, self.total_pages());
        let start = (page - 1) * PAGE_SIZE;
        filtered.into_iter().skip(start).take(PAGE_SIZE).collect()
    }

    /// Moves to `page`, clamped to the valid range for the filtered list.
    pub fn go_to_page(&mut self, page: usize) {
        self.page = page.clamp(1, self.total_pages());
    }

    pub fn next_page(&mut self) {
        self.go_to_page(self.page + 1);
    }

    pub fn prev_page(&mut self) {
        self.go_to_page(self.page.saturating_sub(1));
    }

    // --- derived aggregates ---

    pub fn stats(&self, now: OffsetDateTime) -> WaitlistStats {
        let unique_countries = self
            .entries
            .iter()
            .filter_map(|e| e.country.as_deref())
            .filter(|c| !c.is_empty())
            .collect::<BTreeSet<_>>()
            .len();
        let this_month = self
            .entries
            .iter()
            .filter(|e| {
                e.created_at.month() == now.month() && e.created_at.year() == now.year()
            })
            .count();
        WaitlistStats {
            total_signups: self.entries.len(),
            unique_countries,
            this_month,
        }
    }

    /// Sorted distinct countries for the filter dropdown.
    pub fn unique_countries(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter_map(|e| e.country.clone())
            .filter(|c| !c.is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    // --- new-since-last-visit ---

    /// Entries created after the persisted last visit and not yet seen.
    pub fn new_since_last_visit(&self) -> Vec<&WaitlistEntry> {
        let Some(last_visit) = self.last_visit else {
            return Vec::new();
        };
        self.entries
            .iter()
            .filter(|e| e.created_at > last_visit && !self.seen.contains(&e.id))
            .collect()
    }

    /// Starts the seen-grace timer for every currently-new entry.
    pub fn note_rendered(&mut self, now: OffsetDateTime) {
        let ids: Vec<String> = self
            .new_since_last_visit()
            .iter()
            .map(|e| e.id.clone())
            .collect();
        for id in ids {
            self.pending_seen.entry(id).or_insert(now);
        }
    }

    /// Promotes entries whose grace timer has expired to seen.
    pub fn tick(&mut self, now: OffsetDateTime) {
        let expired: Vec<String> = self
            .pending_seen
            .iter()
            .filter(|(_, rendered)| now - **rendered >= SEEN_GRACE)
            .map(|(id, _)| id.clone())
            .collect();
        for id in expired {
            self.pending_seen.remove(&id);
            self.seen.insert(id);
        }
    }

    pub fn mark_seen(&mut self, id: impl Into<String>) {
        let id = id.into();
        self.pending_seen.remove(&id);
        self.seen.insert(id);
    }

    // --- export ---

    /// CSV export of the filtered (not merely paginated) list.
    pub fn export_csv(&self, today: time::Date) -> ExportFile {
        export_csv(&self.filtered(), today)
    }

    /// JSON export of the filtered (not merely paginated) list.
    pub fn export_json(&self, today: time::Date) -> ExportFile {
        export_json(&self.filtered(), today)
    }

    // --- accessors ---

    pub fn entries(&self) -> &[WaitlistEntry] {
        &self.entries
    }

    pub fn status(&self) -> &FetchStatus {
        &self.status
    }

    pub fn last_updated(&self) -> Option<OffsetDateTime> {
        self.last_updated
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn country_filter(&self) -> &str {
        &self.country
    }

    pub fn subscription_status(&self) -> SubscriptionStatus {
        self.subscription
    }
}

/// Fetches the trailing retention window of waitlist entries, newest
/// first, through retry-with-backoff around the resilient executor.
/// The only error that can surface is a transient failure that outlived
/// the retry budget.
pub async fn fetch_window<S: RecordStore + 'static>(
    provisioner: &SchemaProvisioner<S>,
    now: OffsetDateTime,
    max_attempts: u32,
    base_delay: StdDuration,
) -> Result<Vec<WaitlistEntry>, StoreError> {
    let lower_bound = (now - RETENTION_WINDOW)
        .format(&Rfc3339)
        .map_err(|err| StoreError::unknown(format!("window bound formatting: {err}")))?;

    let rows = retry_with_backoff(
        || {
            let store = Arc::clone(provisioner.store());
            let lower_bound = lower_bound.clone();
            async move {
                safe_query(
                    provisioner,
                    WAITLIST,
                    move || {
                        let store = Arc::clone(&store);
                        let query = Query::select(WAITLIST)
                            .gte(CREATED_AT_FIELD, lower_bound.clone())
                            .order_desc(CREATED_AT_FIELD);
                        async move { store.query(&query).await }
                    },
                    SafeQueryOptions::with_fallback(Vec::new()),
                )
                .await
            }
        },
        max_attempts,
        base_delay,
    )
    .await?;

    Ok(WaitlistEntry::decode_rows(&rows))
}
