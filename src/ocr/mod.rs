//! OCR provider abstraction.
//!
//! Defines the [`TextDetector`] trait so the text extractor does not care which
//! vision backend (or none at all) is behind it.

pub mod credentials;
pub mod google_vision;

/// Async trait implemented by each OCR backend.
#[async_trait::async_trait]
pub trait TextDetector: Send + Sync {
    fn name(&self) -> &str;

    /// Full-document text detection (PDFs, scanned or digital).
    async fn detect_document_text(&self, pdf: &[u8]) -> anyhow::Result<String>;

    /// Single-image text detection. Returns the top annotation.
    async fn detect_image_text(&self, image: &[u8]) -> anyhow::Result<String>;
}

/// Stand-in used when no OCR credentials are configured. Every call fails so
/// the extractor falls through to its next tier.
pub struct UnconfiguredDetector;

#[async_trait::async_trait]
impl TextDetector for UnconfiguredDetector {
    fn name(&self) -> &str {
        "unconfigured"
    }

    async fn detect_document_text(&self, _pdf: &[u8]) -> anyhow::Result<String> {
        anyhow::bail!("no OCR provider configured")
    }

    async fn detect_image_text(&self, _image: &[u8]) -> anyhow::Result<String> {
        anyhow::bail!("no OCR provider configured")
    }
}

#[cfg(test)]
pub mod fakes {
    use super::TextDetector;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns canned responses. `None` means the call fails.
    #[derive(Default)]
    pub struct FakeDetector {
        pub document_text: Option<String>,
        pub image_text: Option<String>,
        pub calls: AtomicUsize,
    }

    impl FakeDetector {
        pub fn document(text: &str) -> Self {
            Self {
                document_text: Some(text.to_string()),
                ..Default::default()
            }
        }

        pub fn image(text: &str) -> Self {
            Self {
                image_text: Some(text.to_string()),
                ..Default::default()
            }
        }

        pub fn failing() -> Self {
            Self::default()
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl TextDetector for FakeDetector {
        fn name(&self) -> &str {
            "fake"
        }

        async fn detect_document_text(&self, _pdf: &[u8]) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.document_text
                .clone()
                .ok_or_else(|| anyhow::anyhow!("vision service unavailable"))
        }

        async fn detect_image_text(&self, _image: &[u8]) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.image_text
                .clone()
                .ok_or_else(|| anyhow::anyhow!("vision service unavailable"))
        }
    }
}
