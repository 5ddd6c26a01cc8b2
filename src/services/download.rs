// src/services/download.rs

//! PDF attachment detection and download.
//!
//! Detail pages carry attachments in an inconsistent markup; the finder
//! prefers links near an "附件" label and falls back to any `.pdf` link.
//! Download failures are per-document: the caller logs and moves on.

use std::path::{Path, PathBuf};

use scraper::{Html, Selector};

use crate::error::{AppError, Result};
use crate::models::Document;
use crate::utils::{resolve_url, RetryPolicy};

/// Reject downloads smaller than this; the site serves tiny HTML error
/// bodies with a 200 status.
const MIN_PDF_BYTES: usize = 1024;

/// A PDF fetched to local disk.
#[derive(Debug, Clone)]
pub struct DownloadedPdf {
    /// Where the file was written
    pub path: PathBuf,
    /// Resolved attachment URL
    pub pdf_url: String,
}

/// Downloads PDF attachments for newly reported documents.
pub struct PdfDownloader {
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl PdfDownloader {
    pub fn new(client: reqwest::Client, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }

    /// Fetch the document's detail page, locate its PDF attachment and
    /// download it into `dir`. Returns `None` when the document has no
    /// usable attachment.
    pub async fn fetch_pdf(&self, document: &Document, dir: &Path) -> Result<Option<DownloadedPdf>> {
        log::info!(
            "Checking PDF: [{}] {} {}",
            document.category,
            document.doc_number,
            document.title
        );

        let page = self
            .retry
            .run("Detail page fetch", || async {
                self.client
                    .get(&document.url)
                    .send()
                    .await?
                    .error_for_status()?
                    .text()
                    .await
            })
            .await
            .map_err(|e| AppError::fetch(&document.category, e))?;

        let Some(pdf_url) = find_pdf_link(&page, &document.url) else {
            log::debug!("No PDF found: {}", document.url);
            return Ok(None);
        };

        log::info!("Downloading PDF: {pdf_url}");
        let bytes = self
            .retry
            .run("PDF download", || async {
                self.client
                    .get(&pdf_url)
                    .send()
                    .await?
                    .error_for_status()?
                    .bytes()
                    .await
            })
            .await
            .map_err(|e| AppError::fetch(&document.category, e))?;

        if bytes.len() < MIN_PDF_BYTES {
            log::warn!("Downloaded file too small ({} bytes), skipping", bytes.len());
            return Ok(None);
        }

        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(document.pdf_filename());
        tokio::fs::write(&path, &bytes).await?;

        log::info!("PDF saved: {} ({:.1} KB)", path.display(), bytes.len() as f64 / 1024.0);
        Ok(Some(DownloadedPdf { path, pdf_url }))
    }
}

/// Locate the PDF attachment link on a detail page.
///
/// Links inside an element whose text mentions "附件" win over a bare
/// `.pdf` link elsewhere on the page.
pub fn find_pdf_link(html: &str, page_url: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let link_sel = Selector::parse("a[href]").ok()?;

    let pdf_links: Vec<(String, String)> = document
        .select(&link_sel)
        .filter_map(|a| {
            let href = a.value().attr("href")?;
            if !href.to_ascii_lowercase().ends_with(".pdf") {
                return None;
            }
            let context = a
                .parent()
                .and_then(scraper::ElementRef::wrap)
                .map(|p| p.text().collect::<String>())
                .unwrap_or_default();
            Some((href.to_string(), context))
        })
        .collect();

    let href = pdf_links
        .iter()
        .find(|(_, context)| context.contains("附件"))
        .or_else(|| pdf_links.first())
        .map(|(href, _)| href.clone())?;

    Some(resolve_url(page_url, &href))
}
