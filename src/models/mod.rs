// src/models/mod.rs

//! Domain models for the monitor application.

mod category;
mod document;
mod snapshot;

pub use category::{Category, CATEGORIES, category_display_name, find_category};
pub use document::{Document, FINGERPRINT_FIELD_COUNT};
pub use snapshot::Snapshot;
