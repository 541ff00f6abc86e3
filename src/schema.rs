//! Receipt and transaction types shared by the pipeline and the HTTP layer.

use chrono::{DateTime, Utc};
use image::ImageFormat;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const PDF_MIME: &str = "application/pdf";

/// A transaction candidate extracted from receipt text, pending user confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedTransaction {
    pub amount: f64,
    pub description: String,
    /// YYYY-MM-DD
    pub date: String,
    pub merchant: String,
}

impl ExtractedTransaction {
    /// Only transactions with a positive amount and non-empty description and
    /// merchant may leave the pipeline.
    pub fn is_valid(&self) -> bool {
        self.amount > 0.0 && !self.description.is_empty() && !self.merchant.is_empty()
    }
}

/// Media type of an uploaded receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaType {
    Pdf,
    Image(String),
}

impl MediaType {
    /// Interpret a declared MIME type. Returns `None` for anything that is
    /// neither a PDF nor an image.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        if essence == PDF_MIME {
            Some(Self::Pdf)
        } else if essence.starts_with("image/") && essence.len() > "image/".len() {
            Some(Self::Image(essence))
        } else {
            None
        }
    }

    /// Detect the media type from magic bytes.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"%PDF-") {
            return Some(Self::Pdf);
        }

        let format = image::guess_format(bytes).ok()?;
        let mime = match format {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Gif => "image/gif",
            ImageFormat::WebP => "image/webp",
            ImageFormat::Bmp => "image/bmp",
            ImageFormat::Tiff => "image/tiff",
            ImageFormat::Ico => "image/x-icon",
            _ => return None,
        };
        Some(Self::Image(mime.to_string()))
    }

    /// Use the declared type when it is specific, otherwise sniff the bytes.
    pub fn resolve(declared: Option<&str>, bytes: &[u8]) -> Option<Self> {
        match declared {
            Some(mime) if !is_generic_mime(mime) => Self::from_mime(mime),
            _ => Self::sniff(bytes),
        }
    }

    pub fn as_mime(&self) -> &str {
        match self {
            Self::Pdf => PDF_MIME,
            Self::Image(mime) => mime,
        }
    }
}

fn is_generic_mime(mime: &str) -> bool {
    let mime = mime.trim();
    mime.is_empty() || mime.eq_ignore_ascii_case("application/octet-stream")
}

/// An uploaded receipt file. Read-only input to the pipeline.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub file_name: String,
    pub media_type: MediaType,
    pub bytes: Vec<u8>,
}

impl RawDocument {
    pub fn new(file_name: impl Into<String>, media_type: MediaType, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            media_type,
            bytes,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceiptStatus {
    Pending,
    Processed,
}

/// Metadata kept for each uploaded receipt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptRecord {
    pub id: String,
    pub file_name: String,
    pub original_name: String,
    pub mime_type: String,
    pub size: usize,
    pub content_hash: String,
    pub status: ReceiptStatus,
    pub uploaded_at: DateTime<Utc>,
    #[serde(default)]
    pub extracted_transactions: Vec<ExtractedTransaction>,
}

impl ReceiptRecord {
    pub fn new(document: &RawDocument, content_hash: String) -> Self {
        let uploaded_at = Utc::now();
        Self {
            id: format!("rcpt_{}", Uuid::new_v4().simple()),
            file_name: format!("{}-{}", uploaded_at.timestamp_millis(), document.file_name),
            original_name: document.file_name.clone(),
            mime_type: document.media_type.as_mime().to_string(),
            size: document.bytes.len(),
            content_hash,
            status: ReceiptStatus::Pending,
            uploaded_at,
            extracted_transactions: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0];

    #[test]
    fn test_from_mime() {
        assert_eq!(MediaType::from_mime("application/pdf"), Some(MediaType::Pdf));
        assert_eq!(
            MediaType::from_mime("Image/JPEG; charset=binary"),
            Some(MediaType::Image("image/jpeg".to_string()))
        );
        assert_eq!(MediaType::from_mime("text/plain"), None);
        assert_eq!(MediaType::from_mime("image/"), None);
    }

    #[test]
    fn test_sniff() {
        assert_eq!(MediaType::sniff(b"%PDF-1.7\n..."), Some(MediaType::Pdf));
        assert_eq!(
            MediaType::sniff(PNG_MAGIC),
            Some(MediaType::Image("image/png".to_string()))
        );
        assert_eq!(MediaType::sniff(b"just some text"), None);
    }

    #[test]
    fn test_resolve_prefers_specific_declaration() {
        // Declared type wins even if the bytes look like something else
        assert_eq!(
            MediaType::resolve(Some("application/pdf"), PNG_MAGIC),
            Some(MediaType::Pdf)
        );
        assert_eq!(
            MediaType::resolve(Some("application/octet-stream"), PNG_MAGIC),
            Some(MediaType::Image("image/png".to_string()))
        );
        assert_eq!(MediaType::resolve(None, b"%PDF-1.4"), Some(MediaType::Pdf));
        assert_eq!(MediaType::resolve(Some("text/csv"), b"%PDF-1.4"), None);
    }

    #[test]
    fn test_validity() {
        let mut t = ExtractedTransaction {
            amount: 12.5,
            description: "Coffee".to_string(),
            date: "2025-01-01".to_string(),
            merchant: "Cafe".to_string(),
        };
        assert!(t.is_valid());
        t.amount = 0.0;
        assert!(!t.is_valid());
        t.amount = 1.0;
        t.merchant.clear();
        assert!(!t.is_valid());
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let doc = RawDocument::new("bill.pdf", MediaType::Pdf, b"%PDF-1.4".to_vec());
        let record = ReceiptRecord::new(&doc, "abc".to_string());

        assert!(record.id.starts_with("rcpt_"));
        assert!(record.file_name.ends_with("-bill.pdf"));

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["originalName"], "bill.pdf");
        assert_eq!(json["mimeType"], "application/pdf");
        assert_eq!(json["size"], 8);
        assert_eq!(json["status"], "pending");
    }
}
