//! Receipt text extraction.
//!
//! PDFs go to the OCR provider's document detection first and fall back to
//! [`PdfTextHeuristic`]; images only have the OCR tier. Every tier returns
//! `Option<String>` and the first non-empty result wins.

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::ocr::TextDetector;
use crate::pdf_text::PdfTextHeuristic;
use crate::schema::{MediaType, RawDocument};

pub struct TextExtractor {
    detector: Arc<dyn TextDetector>,
    heuristic: PdfTextHeuristic,
}

impl TextExtractor {
    pub fn new(detector: Arc<dyn TextDetector>) -> Self {
        Self {
            detector,
            heuristic: PdfTextHeuristic::new(),
        }
    }

    /// Best-effort transcription. Returns an empty string when every tier fails.
    pub async fn extract_text(&self, document: &RawDocument) -> String {
        let text = match &document.media_type {
            MediaType::Pdf => match self.detect_document(document).await {
                Some(text) => Some(text),
                None => self.readable_pdf_text(document),
            },
            MediaType::Image(_) => self.detect_image(document).await,
        };

        text.unwrap_or_default()
    }

    async fn detect_document(&self, document: &RawDocument) -> Option<String> {
        match self.detector.detect_document_text(&document.bytes).await {
            Ok(text) => {
                let text = text.trim();
                if text.is_empty() {
                    debug!("{}: no text in {}", self.detector.name(), document.file_name);
                    None
                } else {
                    info!(
                        "{}: {} chars from {}",
                        self.detector.name(),
                        text.len(),
                        document.file_name
                    );
                    Some(text.to_string())
                }
            }
            Err(e) => {
                error!("{} PDF extraction failed: {:#}", self.detector.name(), e);
                None
            }
        }
    }

    fn readable_pdf_text(&self, document: &RawDocument) -> Option<String> {
        let text = self.heuristic.extract(&document.bytes);
        match &text {
            Some(t) => info!("Raw PDF heuristic: {} chars from {}", t.len(), document.file_name),
            None => error!("Raw PDF text extraction found nothing in {}", document.file_name),
        }
        text
    }

    async fn detect_image(&self, document: &RawDocument) -> Option<String> {
        match self.detector.detect_image_text(&document.bytes).await {
            Ok(text) => {
                let text = text.trim();
                (!text.is_empty()).then(|| text.to_string())
            }
            Err(e) => {
                error!("{} image OCR failed: {:#}", self.detector.name(), e);
                None
            }
        }
    }
}
