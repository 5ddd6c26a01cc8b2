// src/models/document.rs

//! Document record and content fingerprint.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use unicode_segmentation::UnicodeSegmentation;

/// Number of fields feeding the content fingerprint.
pub const FINGERPRINT_FIELD_COUNT: usize = 6;

/// One monitored document, as observed on a listing page.
///
/// The canonical page URL is the document's identity: two records with the
/// same `url` are the same logical document across runs. All other fields
/// are replaced wholesale on each observation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Document {
    /// Document title
    pub title: String,

    /// Canonical page URL (identity key)
    pub url: String,

    /// Category display name (e.g. "民航规章")
    #[serde(default)]
    pub category: String,

    /// Category id (`fl` parameter, snapshot partition key)
    #[serde(default)]
    pub category_id: String,

    /// Document number (文号)
    #[serde(default)]
    pub doc_number: String,

    /// Publishing unit (办文单位)
    #[serde(default)]
    pub office_unit: String,

    /// Signing date (成文日期), ISO `YYYY-MM-DD` when known
    #[serde(default)]
    pub sign_date: String,

    /// Publishing date (发文日期), ISO `YYYY-MM-DD` when known
    #[serde(default)]
    pub publish_date: String,

    /// Validity status (有效性): 有效 / 失效 / 废止 / empty
    #[serde(default)]
    pub validity: String,

    /// PDF attachment URL, filled in once the downloader has seen the page
    #[serde(default)]
    pub pdf_url: String,

    /// Whether a PDF attachment was found on the detail page
    #[serde(default)]
    pub has_pdf: bool,
}

impl Document {
    /// Content fingerprint over the tracked metadata fields.
    ///
    /// SHA-256 over `title, doc_number, validity, office_unit, sign_date,
    /// publish_date` — each trimmed, joined with a 0x1F unit separator —
    /// hex-encoded. The identity (`url`) and the lazily-populated
    /// `pdf_url`/`has_pdf` are deliberately excluded: the first never
    /// changes for a given record, the latter change without the document
    /// itself changing.
    pub fn fingerprint(&self) -> String {
        let fields: [&str; FINGERPRINT_FIELD_COUNT] = [
            &self.title,
            &self.doc_number,
            &self.validity,
            &self.office_unit,
            &self.sign_date,
            &self.publish_date,
        ];

        let mut hasher = Sha256::new();
        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                hasher.update([0x1f]);
            }
            hasher.update(field.trim().as_bytes());
        }
        hex::encode(hasher.finalize())
    }

    /// File name for the document's PDF attachment.
    ///
    /// Format: `[{category}]{doc_number}{title}.pdf`, with a `失效!` prefix
    /// for invalidated documents and illegal filename characters replaced.
    /// Capped at 200 graphemes so CJK titles never get split mid-character.
    pub fn pdf_filename(&self) -> String {
        fn sanitize(text: &str) -> String {
            text.trim()
                .chars()
                .map(|c| match c {
                    '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
                    other => other,
                })
                .collect()
        }

        let mut parts = Vec::new();

        if matches!(self.validity.trim(), "失效" | "废止") {
            parts.push("失效!".to_string());
        }

        let category = sanitize(&self.category);
        if !category.is_empty() {
            parts.push(format!("[{category}]"));
        }

        let doc_number = sanitize(&self.doc_number);
        if !doc_number.is_empty() {
            parts.push(doc_number);
        }

        parts.push(sanitize(&self.title));

        let filename = format!("{}.pdf", parts.concat());
        let graphemes: Vec<&str> = filename.graphemes(true).collect();
        if graphemes.len() > 200 {
            format!("{}....pdf", graphemes[..197].concat())
        } else {
            filename
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_document() -> Document {
        Document {
            title: "大型飞机公共航空运输承运人运行合格审定规则".to_string(),
            url: "https://www.caac.gov.cn/XXGK/XXGK/MHGZ/202601/t20260115_223344.html".to_string(),
            category: "民航规章".to_string(),
            category_id: "13".to_string(),
            doc_number: "CCAR-121-R8".to_string(),
            office_unit: "飞行标准司".to_string(),
            sign_date: "2026-01-10".to_string(),
            publish_date: "2026-01-15".to_string(),
            validity: "有效".to_string(),
            pdf_url: String::new(),
            has_pdf: false,
        }
    }

    #[test]
    fn test_fingerprint_is_stable_across_instances() {
        let a = sample_document();
        let b = sample_document();
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_fingerprint_changes_with_tracked_field() {
        let a = sample_document();
        let mut b = sample_document();
        b.validity = "失效".to_string();
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_fingerprint_ignores_untracked_fields() {
        let a = sample_document();
        let mut b = sample_document();
        b.pdf_url = "https://www.caac.gov.cn/attachment.pdf".to_string();
        b.has_pdf = true;
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_fingerprint_trims_whitespace() {
        let a = sample_document();
        let mut b = sample_document();
        b.title = format!("  {}  ", a.title);
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_fingerprint_field_shift_is_distinct() {
        // Moving text between adjacent fields must not collide.
        let mut a = Document::default();
        a.title = "AB".to_string();
        let mut b = Document::default();
        b.title = "A".to_string();
        b.doc_number = "B".to_string();
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_pdf_filename_format() {
        let doc = sample_document();
        assert_eq!(
            doc.pdf_filename(),
            "[民航规章]CCAR-121-R8大型飞机公共航空运输承运人运行合格审定规则.pdf"
        );
    }

    #[test]
    fn test_pdf_filename_invalid_prefix_and_sanitize() {
        let mut doc = sample_document();
        doc.validity = "废止".to_string();
        doc.title = "附件/说明:测试".to_string();
        let name = doc.pdf_filename();
        assert!(name.starts_with("失效!"));
        assert!(name.contains("附件_说明_测试"));
    }

    #[test]
    fn test_pdf_filename_truncation() {
        let mut doc = sample_document();
        doc.title = "长".repeat(300);
        let name = doc.pdf_filename();
        assert!(name.ends_with("....pdf"));
        assert!(name.graphemes(true).count() <= 204);
    }

    #[test]
    fn test_serde_defaults_for_sparse_records() {
        let json = r#"{"title":"测试","url":"https://www.caac.gov.cn/t.html"}"#;
        let doc: Document = serde_json::from_str(json).unwrap();
        assert_eq!(doc.title, "测试");
        assert!(doc.doc_number.is_empty());
        assert!(!doc.has_pdf);
    }
}
