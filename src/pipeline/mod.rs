//! Pipeline entry points for monitor operations.
//!
//! - `detect`: change classification between snapshot and fresh fetch
//! - `run`: the fetch → detect → act → persist cycle

pub mod detect;
pub mod run;

pub use detect::{
    CategoryChanges, CategoryDiff, ChangeReport, DiffOptions, DocumentUpdate, diff_category,
};
pub use run::{RunOptions, RunSummary, run};
