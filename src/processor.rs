//! Receipt processing pipeline: text extraction, then transaction extraction.

use std::sync::Arc;

use tracing::{error, info};

use crate::llm::Completion;
use crate::ocr::TextDetector;
use crate::schema::{ExtractedTransaction, RawDocument};
use crate::text_extractor::TextExtractor;
use crate::transactions::TransactionExtractor;

/// Stateless apart from the injected providers; safe to share across requests.
pub struct ReceiptProcessor {
    text_extractor: TextExtractor,
    transaction_extractor: TransactionExtractor,
}

impl ReceiptProcessor {
    pub fn new(detector: Arc<dyn TextDetector>, completion: Arc<dyn Completion>) -> Self {
        Self {
            text_extractor: TextExtractor::new(detector),
            transaction_extractor: TransactionExtractor::new(completion),
        }
    }

    pub async fn process_receipt(&self, document: &RawDocument) -> Vec<ExtractedTransaction> {
        info!(
            "Processing receipt: {} ({}, {} bytes)",
            document.file_name,
            document.media_type.as_mime(),
            document.bytes.len()
        );

        let text = self.text_extractor.extract_text(document).await;
        if text.trim().is_empty() {
            error!("No text extracted from {}", document.file_name);
            return Vec::new();
        }

        let transactions = self.transaction_extractor.extract_transactions(&text).await;

        for (i, t) in transactions.iter().enumerate() {
            info!(
                "{}. {}: {} - {} ({})",
                i + 1,
                t.merchant,
                t.amount,
                t.description,
                t.date
            );
        }

        transactions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::fakes::FakeCompletion;
    use crate::llm::UnconfiguredCompletion;
    use crate::ocr::fakes::FakeDetector;
    use crate::ocr::UnconfiguredDetector;
    use crate::schema::MediaType;

    #[tokio::test]
    async fn test_empty_text_skips_transaction_extraction() {
        let completion = Arc::new(FakeCompletion::responding("[]"));
        let processor =
            ReceiptProcessor::new(Arc::new(FakeDetector::image("   ")), completion.clone());
        let doc = RawDocument::new("blank.jpg", MediaType::Image("image/jpeg".into()), vec![1, 2]);

        assert!(processor.process_receipt(&doc).await.is_empty());
        assert_eq!(completion.call_count(), 0);
    }

    #[tokio::test]
    async fn test_pdf_with_services_unavailable_uses_fallbacks() {
        let processor =
            ReceiptProcessor::new(Arc::new(UnconfiguredDetector), Arc::new(UnconfiguredCompletion));
        let bytes = b"%PDF-1.4\n2 0 obj\nstream\nBT /F1 12 Tf (garbage) Tj ET\nendstream\nendobj\nAmount Payable: Rs. 1200.00\n".to_vec();
        let doc = RawDocument::new("bill.pdf", MediaType::Pdf, bytes);

        let transactions = processor.process_receipt(&doc).await;

        assert_eq!(transactions.len(), 1);
        let t = &transactions[0];
        assert_eq!(t.amount, 1200.00);
        assert_eq!(t.description, "Transaction");
        assert_eq!(t.merchant, "Unknown Merchant");
        assert_eq!(
            t.date,
            chrono::Utc::now().date_naive().format("%Y-%m-%d").to_string()
        );
        assert!(t.is_valid());
    }

    #[tokio::test]
    async fn test_model_result_returned_verbatim() {
        let response = r#"[
            {"amount": 10, "description": "Tea", "date": "2025-02-02", "merchant": "Chai Point"},
            {"amount": 5.5, "description": "Biscuits", "date": "2025-02-02", "merchant": "Chai Point"}
        ]"#;
        let completion = Arc::new(FakeCompletion::responding(response));
        let processor =
            ReceiptProcessor::new(Arc::new(FakeDetector::image("Chai Point ...")), completion.clone());
        let doc = RawDocument::new("r.jpg", MediaType::Image("image/jpeg".into()), vec![0xFF, 0xD8]);

        let transactions = processor.process_receipt(&doc).await;

        assert_eq!(completion.call_count(), 1);
        assert_eq!(transactions.len(), 2);
        assert_eq!(transactions[1].description, "Biscuits");
    }
}
