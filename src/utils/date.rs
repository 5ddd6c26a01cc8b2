// src/utils/date.rs

//! Date normalization and day-range filtering.
//!
//! Listing pages mix `2024年01月15日` and `2024-01-15` date styles; everything
//! is normalized to ISO `YYYY-MM-DD` so dates compare lexicographically.

use chrono::{Days, NaiveDate};
use regex::Regex;

use crate::models::Document;

/// Normalize a date string to `YYYY-MM-DD`.
///
/// `2024年1月15日` becomes `2024-01-15`; already-ISO input passes through.
/// Anything unrecognized is returned as-is.
pub fn normalize_date(date_str: &str) -> String {
    let value = date_str.trim();
    if value.is_empty() {
        return String::new();
    }

    let cn = Regex::new(r"^(\d{4})年(\d{1,2})月(\d{1,2})日$").expect("static regex");
    if let Some(caps) = cn.captures(value) {
        return format!("{}-{:0>2}-{:0>2}", &caps[1], &caps[2], &caps[3]);
    }

    value.to_string()
}

/// Extract a publish date from a document URL of the form `/tYYYYMMDD_...`.
pub fn extract_date_from_url(url: &str) -> String {
    let pattern = Regex::new(r"/t(\d{4})(\d{2})(\d{2})_").expect("static regex");
    match pattern.captures(url) {
        Some(caps) => format!("{}-{}-{}", &caps[1], &caps[2], &caps[3]),
        None => String::new(),
    }
}

/// Keep only documents published within the last `days` days of `today`.
///
/// Documents without a publish date are dropped (they cannot be placed in
/// the window). `days == 0` disables the filter.
pub fn filter_recent(documents: &[Document], days: u64, today: NaiveDate) -> Vec<Document> {
    if days == 0 {
        return documents.to_vec();
    }

    let cutoff = today
        .checked_sub_days(Days::new(days))
        .unwrap_or(NaiveDate::MIN);
    let cutoff_str = cutoff.format("%Y-%m-%d").to_string();

    documents
        .iter()
        .filter(|doc| {
            let pub_date = doc.publish_date.trim();
            if pub_date.is_empty() {
                log::debug!("Skipping document without date: {} {}", doc.doc_number, doc.title);
                return false;
            }
            pub_date >= cutoff_str.as_str()
        })
        .cloned()
        .collect()
}
