//! CSV and JSON export of the waitlist.
//!
//! Exports operate on the already-filtered list, so what the operator
//! sees is what they download. Every text field passes through the
//! sanitizer before it is written out.

use serde::Serialize;
use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::Date;

use crate::entry::{format_date, sanitize_text, WaitlistEntry};

/// Brand slug used in export filenames.
pub const BRAND: &str = "biovance";

const MISSING_COUNTRY: &str = "Not specified";

/// A named export payload ready to hand to the download surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
    pub filename: String,
    pub contents: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonRow {
    name: String,
    email: String,
    country: String,
    /// Human-readable join date, matching the list display
    date_joined: String,
    /// Machine-readable RFC 3339 timestamp
    signup_date: String,
}

fn country_label(entry: &WaitlistEntry) -> String {
    match entry.country.as_deref() {
        Some(country) if !country.is_empty() => sanitize_text(country),
        _ => MISSING_COUNTRY.to_string(),
    }
}

fn csv_field(text: &str) -> String {
    format!("\"{}\"", text.replace('"', "\"\""))
}

fn export_filename(today: Date, extension: &str) -> String {
    format!("{BRAND}-waitlist-{today}.{extension}")
}

/// Renders the given entries as CSV, one row per entry.
pub fn export_csv(entries: &[&WaitlistEntry], today: Date) -> ExportFile {
    let mut contents = String::from("Name,Email,Country,Date Joined\n");
    for entry in entries {
        let row = [
            csv_field(&sanitize_text(&entry.name)),
            csv_field(&sanitize_text(&entry.email)),
            csv_field(&country_label(entry)),
            csv_field(&format_date(entry.created_at)),
        ];
        contents.push_str(&row.join(","));
        contents.push('\n');
    }
    ExportFile {
        filename: export_filename(today, "csv"),
        contents,
    }
}

/// Renders the given entries as a pretty-printed JSON array.
pub fn export_json(entries: &[&WaitlistEntry], today: Date) -> ExportFile {
    let rows: Vec<JsonRow> = entries
        .iter()
        .map(|entry| JsonRow {
            name: sanitize_text(&entry.name),
            email: sanitize_text(&entry.email),
            country: country_label(entry),
            date_joined: format_date(entry.created_at),
            signup_date: entry
                .created_at
                .format(&Rfc3339)
                .unwrap_or_else(|_| entry.created_at.to_string()),
        })
        .collect();
    // serde_json pretty output on a Vec of serializable rows cannot fail
    let contents =
        serde_json::to_string_pretty(&rows).unwrap_or_else(|_| Value::Array(Vec::new()).to_string());
    ExportFile {
        filename: export_filename(today, "json"),
        contents,
    }
}
