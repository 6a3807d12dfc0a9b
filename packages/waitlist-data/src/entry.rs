//! Waitlist record type and text utilities.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::OffsetDateTime;

/// Field the fetch window and ordering key off.
pub const CREATED_AT_FIELD: &str = "created_at";

/// One waitlist signup as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitlistEntry {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl WaitlistEntry {
    /// Decodes one store row. `None` (with a warn log) for rows that do
    /// not match the expected shape.
    pub fn from_row(row: &Value) -> Option<Self> {
        match serde_json::from_value(row.clone()) {
            Ok(entry) => Some(entry),
            Err(err) => {
                tracing::warn!(error = %err, "skipping malformed waitlist row");
                None
            }
        }
    }

    /// Decodes a batch of rows, skipping malformed ones.
    pub fn decode_rows(rows: &[Value]) -> Vec<Self> {
        rows.iter().filter_map(Self::from_row).collect()
    }
}

/// Strips `<` and `>` from user-supplied text and trims whitespace.
/// Applied to every string field before display or export; rich-content
/// surfaces elsewhere render raw markup, so list fields must never carry
/// angle brackets.
pub fn sanitize_text(text: &str) -> String {
    text.chars()
        .filter(|c| *c != '<' && *c != '>')
        .collect::<String>()
        .trim()
        .to_string()
}

const DISPLAY_DATE: &[FormatItem<'static>] = format_description!(
    "[month repr:short] [day padding:none], [year], [hour repr:12 padding:zero]:[minute] [period]"
);

/// Human-readable timestamp for list display and CSV export,
/// e.g. `Aug 24, 2026, 02:05 PM`.
pub fn format_date(timestamp: OffsetDateTime) -> String {
    timestamp
        .format(&DISPLAY_DATE)
        .unwrap_or_else(|_| timestamp.to_string())
}
