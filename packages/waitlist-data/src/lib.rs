//! Waitlist data layer.
//!
//! Owns the lifecycle of fetching, live-updating, deriving, and exporting
//! a windowed list of waitlist signups: the view-model with its derived
//! filtered/paginated views and stats, the change-feed wrapper, CSV/JSON
//! export, locally persisted view preferences, and the public signup path.

pub mod entry;
pub mod export;
pub mod feed;
pub mod prefs;
pub mod signup;
pub mod view;

pub use entry::{format_date, sanitize_text, WaitlistEntry};
pub use export::{export_csv, export_json, ExportFile, BRAND};
pub use feed::{FeedSignal, SubscriptionStatus, WaitlistFeed};
pub use prefs::{PrefsError, PrefsFile, ViewPrefs};
pub use signup::{submit_signup, SignupOutcome, SignupRequest};
pub use view::{FetchStatus, WaitlistStats, WaitlistView, PAGE_SIZE};
