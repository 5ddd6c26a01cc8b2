// src/services/source.rs

//! Document listing source.
//!
//! `DocumentSource` is the seam between the monitor core and the website:
//! one method per category, returning validated records or a typed failure.
//! The core never sees markup. `CaacSource` implements it against the CAAC
//! WAS5 search endpoint with the selector fallbacks the site requires
//! (listing markup differs slightly between categories).

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};

use crate::error::{AppError, Result};
use crate::models::{Category, Document};
use crate::utils::date::{extract_date_from_url, normalize_date};
use crate::utils::{resolve_url, RetryPolicy};

/// CAAC website root, used to resolve relative listing links.
pub const BASE_URL: &str = "https://www.caac.gov.cn";

/// WAS5 full-text search endpoint serving the listing pages.
pub const SEARCH_URL: &str = "https://www.caac.gov.cn/was5/web/search";

/// Channel id of the "法定主动公开内容" search channel.
const SEARCH_CHANNEL: &str = "211383";

/// A provider of freshly fetched documents for one category.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Fetch the current listing for `category`, newest first.
    ///
    /// A failure is reported as an error, never as an empty list, so the
    /// caller can tell "no documents" from "could not check".
    async fn fetch_category(&self, category: &Category, per_page: usize) -> Result<Vec<Document>>;
}

/// `DocumentSource` backed by the live CAAC site.
pub struct CaacSource {
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl CaacSource {
    /// Create a source using the given HTTP client and retry policy.
    pub fn new(client: reqwest::Client, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }

    fn build_search_url(&self, category_id: &str, per_page: usize) -> String {
        format!(
            "{}?channelid={}&was_custom_expr=+PARENTID%3D%27{id}%27+or+CLASSINFOID%3D%27{id}%27+&perpage={}&orderby=-fabuDate&fl={id}",
            SEARCH_URL,
            SEARCH_CHANNEL,
            per_page,
            id = category_id,
        )
    }

    async fn fetch_html(&self, url: &str) -> reqwest::Result<String> {
        self.retry
            .run("Listing fetch", || async {
                self.client
                    .get(url)
                    .send()
                    .await?
                    .error_for_status()?
                    .text()
                    .await
            })
            .await
    }
}

#[async_trait]
impl DocumentSource for CaacSource {
    async fn fetch_category(&self, category: &Category, per_page: usize) -> Result<Vec<Document>> {
        log::info!("Fetching category: {} (ID: {})", category.name, category.id);

        let url = self.build_search_url(category.id, per_page);
        log::debug!("Search URL: {url}");

        let html = self
            .fetch_html(&url)
            .await
            .map_err(|e| AppError::fetch(category.name, e))?;

        let documents = parse_listing(&html, category)?;
        log::info!("Category {}: {} documents", category.name, documents.len());
        Ok(documents)
    }
}

/// Parse a listing page into documents, in page order.
///
/// Rows that fail to parse are skipped with a warning; one malformed row
/// must not lose the rest of the page.
pub fn parse_listing(html: &str, category: &Category) -> Result<Vec<Document>> {
    let document = Html::parse_document(html);

    let table_sel = selector("table.t_table")?;
    let any_table_sel = selector("table")?;
    let marker_sel = selector("th, td.tdMC")?;
    let row_sel = selector("tbody tr")?;
    let bare_row_sel = selector("tr")?;

    // Primary selector first, then any table that looks like a listing.
    let table = document.select(&table_sel).next().or_else(|| {
        document
            .select(&any_table_sel)
            .find(|t| t.select(&marker_sel).next().is_some())
    });

    let Some(table) = table else {
        log::warn!("Listing table not found for category {}", category.name);
        return Ok(Vec::new());
    };

    let rows: Vec<ElementRef> = {
        let body_rows: Vec<ElementRef> = table.select(&row_sel).collect();
        if body_rows.is_empty() {
            // No tbody: skip the header row.
            table.select(&bare_row_sel).skip(1).collect()
        } else {
            body_rows
        }
    };

    let mut documents = Vec::new();
    for row in rows {
        match parse_row(row, category) {
            Ok(Some(doc)) => documents.push(doc),
            Ok(None) => {}
            Err(e) => log::warn!("Failed to parse listing row: {e}"),
        }
    }

    Ok(documents)
}

fn parse_row(row: ElementRef, category: &Category) -> Result<Option<Document>> {
    let cell_sel = selector("td")?;
    let title_cell_sel = selector("td.tdMC, td.t_l")?;
    let link_sel = selector("a[href]")?;
    let number_sel = selector("td.strFL")?;
    let validity_sel = selector("td.strGF")?;
    let date_sel = selector("td.tdRQ")?;
    let detail_sel = selector("div.t_l_content li")?;

    let cells: Vec<ElementRef> = row.select(&cell_sel).collect();
    if cells.len() < 2 {
        return Ok(None);
    }

    let title_cell = row
        .select(&title_cell_sel)
        .next()
        .or_else(|| cells.get(1).copied());
    let Some(title_cell) = title_cell else {
        return Ok(None);
    };

    let Some(link) = title_cell.select(&link_sel).next() else {
        return Ok(None);
    };
    let title = cell_text(link);
    if title.is_empty() {
        return Ok(None);
    }
    let href = link.value().attr("href").unwrap_or_default();
    let url = resolve_url(BASE_URL, href);

    let doc_number = row
        .select(&number_sel)
        .next()
        .map(cell_text)
        .or_else(|| cells.get(2).copied().map(cell_text))
        .unwrap_or_default();

    let mut validity = row
        .select(&validity_sel)
        .next()
        .map(cell_text)
        .or_else(|| cells.get(3).copied().map(cell_text))
        .unwrap_or_default();

    let date_cells: Vec<String> = row.select(&date_sel).map(cell_text).collect();
    let sign_date = date_cells
        .first()
        .map(|s| normalize_date(s))
        .unwrap_or_default();
    let mut publish_date = date_cells
        .get(1)
        .map(|s| normalize_date(s))
        .unwrap_or_default();
    if publish_date.is_empty() {
        publish_date = extract_date_from_url(&url);
    }

    // The hover detail list carries fields some layouts omit from cells.
    let mut office_unit = String::new();
    for li in title_cell.select(&detail_sel) {
        let text = cell_text(li);
        if let Some(value) = strip_label(&text, &["办文单位：", "办文单位:"]) {
            office_unit = value;
        } else if let Some(value) = strip_label(&text, &["发文日期：", "发文日期:"]) {
            let normalized = normalize_date(&value);
            if !normalized.is_empty() {
                publish_date = normalized;
            }
        } else if validity.is_empty() {
            if let Some(value) = strip_label(&text, &["有效性：", "有效性:", "有 效 性：", "有 效 性:"]) {
                validity = value;
            }
        }
    }

    Ok(Some(Document {
        title,
        url,
        category: category.name.to_string(),
        category_id: category.id.to_string(),
        doc_number,
        office_unit,
        sign_date,
        publish_date,
        validity,
        pdf_url: String::new(),
        has_pdf: false,
    }))
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| AppError::selector(css, format!("{e:?}")))
}

fn cell_text(element: ElementRef) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn strip_label(text: &str, labels: &[&str]) -> Option<String> {
    for label in labels {
        if let Some(rest) = text.strip_prefix(label) {
            return Some(rest.trim().to_string());
        }
    }
    None
}
