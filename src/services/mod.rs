//! Service layer for the monitor application.
//!
//! This module contains the external collaborators of the core:
//! - Document listing fetch (`DocumentSource` / `CaacSource`)
//! - PDF attachment download (`PdfDownloader`)
//! - Notification dispatch (`Notifier`)

mod download;
pub mod notify;
mod source;

pub use download::{DownloadedPdf, PdfDownloader};
pub use notify::{NotificationMessage, Notifier, NotifyOutcome};
pub use source::{CaacSource, DocumentSource, parse_listing};
