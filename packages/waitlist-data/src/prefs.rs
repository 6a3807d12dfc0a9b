//! Locally persisted view preferences.
//!
//! UI state only: last visit, seen ids, filters, page. Record data is
//! never persisted here; a missing or corrupt file degrades to defaults.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

/// Filename the preferences are stored under.
pub const PREFS_FILE: &str = "waitlist-view.json";

/// Failure while persisting preferences. Loading never fails; only
/// saving surfaces an error.
#[derive(Debug, Error)]
pub enum PrefsError {
    #[error("failed to write prefs at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode prefs for {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Persisted view state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewPrefs {
    /// When the operator last left the view; drives new-entry highlights
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_visit: Option<OffsetDateTime>,
    /// Entry ids already acknowledged as seen
    pub seen_ids: BTreeSet<String>,
    pub search: String,
    pub country: String,
    pub page: usize,
}

impl Default for ViewPrefs {
    fn default() -> Self {
        Self {
            last_visit: None,
            seen_ids: BTreeSet::new(),
            search: String::new(),
            country: String::new(),
            page: 1,
        }
    }
}

/// Handle on the preferences file inside a state directory.
#[derive(Debug, Clone)]
pub struct PrefsFile {
    path: PathBuf,
}

impl PrefsFile {
    pub fn at(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(PREFS_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads preferences, falling back to defaults when the file is
    /// missing or unreadable. Corruption is logged, never fatal.
    pub fn load(&self) -> ViewPrefs {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return ViewPrefs::default();
            }
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "failed to read view prefs");
                return ViewPrefs::default();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(prefs) => prefs,
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "corrupt view prefs, using defaults");
                ViewPrefs::default()
            }
        }
    }

    /// Writes preferences, creating the parent directory if needed.
    pub fn save(&self, prefs: &ViewPrefs) -> Result<(), PrefsError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| PrefsError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let body = serde_json::to_string_pretty(prefs).map_err(|source| PrefsError::Encode {
            path: self.path.clone(),
            source,
        })?;
        fs::write(&self.path, body).map_err(|source| PrefsError::Io {
            path: self.path.clone(),
            source,
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let prefs = PrefsFile::at(dir.path()).load();
        assert_eq!(prefs, ViewPrefs::default());
        assert_eq!(prefs.page, 1);
    }

    #[test]
    fn corrupt_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let file = PrefsFile::at(dir.path());
        std::fs::write(file.path(), "{not json").unwrap();
        assert_eq!(file.load(), ViewPrefs::default());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let file = PrefsFile::at(dir.path());

        let mut prefs = ViewPrefs::default();
        prefs.last_visit = Some(datetime!(2026-08-24 12:00:00 UTC));
        prefs.seen_ids.insert("waitlist-7".to_string());
        prefs.search = "ada".to_string();
        prefs.country = "Kenya".to_string();
        prefs.page = 3;

        file.save(&prefs).unwrap();
        assert_eq!(file.load(), prefs);
    }

    #[test]
    fn unknown_fields_do_not_break_loading() {
        let dir = tempfile::tempdir().unwrap();
        let file = PrefsFile::at(dir.path());
        std::fs::write(file.path(), r#"{ "page": 2, "futureField": true }"#).unwrap();
        assert_eq!(file.load().page, 2);
    }
}
