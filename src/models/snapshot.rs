// src/models/snapshot.rs

//! Persisted monitor state.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Document;

/// Point-in-time state of every monitored category.
///
/// Serialized as `last_check` plus one top-level key per category id, each
/// holding that category's records in listing order:
///
/// ```json
/// {
///   "last_check": "2026-08-07T02:15:00Z",
///   "13": [ { "title": "…", "url": "…", … } ],
///   "14": [ … ]
/// }
/// ```
///
/// Within one category, `url` is unique. A `BTreeMap` keeps category keys
/// in a stable order so consecutive snapshots diff cleanly in git.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    /// When the last successful run persisted this state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_check: Option<DateTime<Utc>>,

    /// Records per category id
    #[serde(flatten)]
    pub categories: BTreeMap<String, Vec<Document>>,
}

impl Snapshot {
    /// Records for one category; empty slice if the category is unknown.
    pub fn documents(&self, category_id: &str) -> &[Document] {
        self.categories
            .get(category_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Replace one category's records.
    pub fn set_documents(&mut self, category_id: impl Into<String>, documents: Vec<Document>) {
        self.categories.insert(category_id.into(), documents);
    }

    /// Total record count across all categories.
    pub fn total_documents(&self) -> usize {
        self.categories.values().map(Vec::len).sum()
    }

    /// Number of categories holding at least one record.
    pub fn category_count(&self) -> usize {
        self.categories.len()
    }

    /// Record the URL of a downloaded PDF on the matching document.
    pub fn annotate_pdf(&mut self, category_id: &str, url: &str, pdf_url: &str) {
        if let Some(documents) = self.categories.get_mut(category_id) {
            if let Some(doc) = documents.iter_mut().find(|d| d.url == url) {
                doc.pdf_url = pdf_url.to_string();
                doc.has_pdf = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(url: &str, title: &str) -> Document {
        Document {
            title: title.to_string(),
            url: url.to_string(),
            category_id: "13".to_string(),
            ..Document::default()
        }
    }

    #[test]
    fn test_json_layout_has_top_level_category_keys() {
        let mut snapshot = Snapshot::default();
        snapshot.last_check = Some("2026-08-07T02:15:00Z".parse().unwrap());
        snapshot.set_documents("13", vec![doc("https://www.caac.gov.cn/a.html", "规章A")]);

        let value: serde_json::Value = serde_json::to_value(&snapshot).unwrap();
        assert!(value.get("last_check").is_some());
        assert!(value.get("13").unwrap().is_array());
        assert!(value.get("documents").is_none());
    }

    #[test]
    fn test_last_check_omitted_when_never_saved() {
        let snapshot = Snapshot::default();
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(!json.contains("last_check"));
    }

    #[test]
    fn test_round_trip_preserves_non_ascii() {
        let mut snapshot = Snapshot::default();
        snapshot.set_documents(
            "14",
            vec![doc("https://www.caac.gov.cn/b.html", "关于印发《规范性文件》的通知")],
        );

        let json = serde_json::to_string_pretty(&snapshot).unwrap();
        // serde_json leaves non-ASCII unescaped, keeping the file diffable
        assert!(json.contains("关于印发"));

        let restored: Snapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, snapshot);
    }

    #[test]
    fn test_documents_unknown_category_is_empty() {
        let snapshot = Snapshot::default();
        assert!(snapshot.documents("13").is_empty());
    }

    #[test]
    fn test_annotate_pdf() {
        let mut snapshot = Snapshot::default();
        snapshot.set_documents("13", vec![doc("https://www.caac.gov.cn/a.html", "规章A")]);

        snapshot.annotate_pdf(
            "13",
            "https://www.caac.gov.cn/a.html",
            "https://www.caac.gov.cn/a.pdf",
        );

        let updated = &snapshot.documents("13")[0];
        assert!(updated.has_pdf);
        assert_eq!(updated.pdf_url, "https://www.caac.gov.cn/a.pdf");
    }

    #[test]
    fn test_total_documents() {
        let mut snapshot = Snapshot::default();
        snapshot.set_documents("13", vec![doc("https://a", "A")]);
        snapshot.set_documents("14", vec![doc("https://b", "B"), doc("https://c", "C")]);
        assert_eq!(snapshot.total_documents(), 3);
        assert_eq!(snapshot.category_count(), 2);
    }
}
