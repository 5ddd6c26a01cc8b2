// src/pipeline/detect.rs

//! Change detection between the stored snapshot and a fresh fetch.
//!
//! Classification is per category: a record is Added when its URL is new,
//! Updated when the URL is known but the content fingerprint differs, and
//! Unchanged otherwise. Records that disappeared from the listing are kept
//! (the site paginates; absence is not deletion) unless pruning is
//! explicitly requested.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::models::{Document, category_display_name};

/// Options for a diff pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiffOptions {
    /// Drop previous records absent from the current fetch
    pub prune_missing: bool,
}

/// An in-place edit to an already-seen document.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentUpdate {
    /// Record as stored in the previous snapshot
    pub previous: Document,
    /// Record as freshly fetched
    pub current: Document,
}

/// Result of diffing one category.
#[derive(Debug, Clone, Default)]
pub struct CategoryDiff {
    /// New documents, in fetch order
    pub added: Vec<Document>,
    /// Edited documents, in fetch order
    pub updated: Vec<DocumentUpdate>,
    /// The record set to persist: current records replace their
    /// counterparts by URL, previous-only records are carried forward
    pub merged: Vec<Document>,
}

impl CategoryDiff {
    /// Check if there are any changes.
    pub fn has_changes(&self) -> bool {
        !self.added.is_empty() || !self.updated.is_empty()
    }

    /// Get the total number of changes.
    pub fn change_count(&self) -> usize {
        self.added.len() + self.updated.len()
    }
}

/// Diff one category's fresh fetch against its stored records.
pub fn diff_category(
    previous: &[Document],
    current: &[Document],
    options: DiffOptions,
) -> CategoryDiff {
    let prev_by_url: HashMap<&str, &Document> = previous
        .iter()
        .rev()
        .map(|doc| (doc.url.as_str(), doc))
        .collect();

    let mut diff = CategoryDiff::default();
    let mut seen_urls: HashSet<&str> = HashSet::new();

    for doc in current {
        // A listing occasionally repeats an entry; keep the first occurrence.
        if !seen_urls.insert(doc.url.as_str()) {
            continue;
        }

        match prev_by_url.get(doc.url.as_str()) {
            None => diff.added.push(doc.clone()),
            Some(known) if known.fingerprint() != doc.fingerprint() => {
                diff.updated.push(DocumentUpdate {
                    previous: (*known).clone(),
                    current: doc.clone(),
                });
            }
            Some(_) => {}
        }
        diff.merged.push(doc.clone());
    }

    if !options.prune_missing {
        for doc in previous {
            if !seen_urls.contains(doc.url.as_str()) {
                diff.merged.push(doc.clone());
            }
        }
    }

    diff
}

/// Changes for one category, as carried in the run report.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryChanges {
    pub category_id: String,
    pub category_name: String,
    pub added: Vec<Document>,
    pub updated: Vec<DocumentUpdate>,
}

impl CategoryChanges {
    pub fn new(category_id: impl Into<String>, added: Vec<Document>, updated: Vec<DocumentUpdate>) -> Self {
        let category_id = category_id.into();
        Self {
            category_name: category_display_name(&category_id),
            category_id,
            added,
            updated,
        }
    }
}

/// Aggregated change report for one run, in category fetch order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChangeReport {
    pub categories: Vec<CategoryChanges>,
}

impl ChangeReport {
    pub fn push(&mut self, changes: CategoryChanges) {
        if !changes.added.is_empty() || !changes.updated.is_empty() {
            self.categories.push(changes);
        }
    }

    pub fn has_changes(&self) -> bool {
        self.total_count() > 0
    }

    pub fn added_count(&self) -> usize {
        self.categories.iter().map(|c| c.added.len()).sum()
    }

    pub fn updated_count(&self) -> usize {
        self.categories.iter().map(|c| c.updated.len()).sum()
    }

    pub fn total_count(&self) -> usize {
        self.added_count() + self.updated_count()
    }

    /// All added documents as one flat list, in report order.
    pub fn all_added(&self) -> Vec<&Document> {
        self.categories
            .iter()
            .flat_map(|c| c.added.iter())
            .collect()
    }
}
