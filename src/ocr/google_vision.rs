//! Google Cloud Vision OCR provider (REST API).

use super::credentials::ServiceAccount;
use super::TextDetector;
use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const DEFAULT_VISION_URL: &str = "https://vision.googleapis.com";

/// Vision only accepts this many pages of an inline PDF per request.
const MAX_INLINE_PDF_PAGES: u32 = 5;

/// How requests are authorised.
#[derive(Debug, Clone)]
pub enum VisionAuth {
    ApiKey(String),
    ServiceAccount(ServiceAccount),
}

pub struct GoogleVisionProvider {
    base_url: String,
    auth: VisionAuth,
    client: reqwest::Client,
}

impl GoogleVisionProvider {
    pub fn new(client: reqwest::Client, auth: VisionAuth) -> Self {
        Self {
            base_url: DEFAULT_VISION_URL.to_string(),
            auth,
            client,
        }
    }

    async fn post<B: Serialize>(&self, method: &str, body: &B) -> Result<String> {
        let url = format!("{}/v1/{}", self.base_url.trim_end_matches('/'), method);
        let request = self.client.post(&url).json(body);

        let request = match &self.auth {
            VisionAuth::ApiKey(key) => request.query(&[("key", key)]),
            VisionAuth::ServiceAccount(account) => {
                let token = account.access_token(&self.client).await?;
                request.bearer_auth(token)
            }
        };

        let resp = request
            .send()
            .await
            .with_context(|| format!("Failed to send request to Vision {}", method))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("Vision API error ({}): {}", status, text);
        }

        let raw = resp.text().await?;
        debug!("Vision {}: {} byte response", method, raw.len());
        Ok(raw)
    }
}

// ── Vision API request/response types ───────────────────────────────────────

#[derive(Serialize)]
struct Feature {
    #[serde(rename = "type")]
    feature_type: &'static str,
}

#[derive(Serialize)]
struct ImagesRequest {
    requests: Vec<ImageRequest>,
}

#[derive(Serialize)]
struct ImageRequest {
    image: ImageContent,
    features: Vec<Feature>,
}

#[derive(Serialize)]
struct ImageContent {
    content: String,
}

#[derive(Serialize)]
struct FilesRequest {
    requests: Vec<FileRequest>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FileRequest {
    input_config: InputConfig,
    features: Vec<Feature>,
    pages: Vec<u32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InputConfig {
    content: String,
    mime_type: &'static str,
}

#[derive(Deserialize)]
struct BatchResponse {
    #[serde(default)]
    responses: Vec<AnnotateResponse>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FilesBatchResponse {
    #[serde(default)]
    responses: Vec<FileResponse>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileResponse {
    #[serde(default)]
    responses: Vec<AnnotateResponse>,
    #[serde(default)]
    error: Option<Status>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateResponse {
    #[serde(default)]
    text_annotations: Vec<EntityAnnotation>,
    #[serde(default)]
    full_text_annotation: Option<TextAnnotation>,
    #[serde(default)]
    error: Option<Status>,
}

#[derive(Deserialize)]
struct EntityAnnotation {
    #[serde(default)]
    description: String,
}

#[derive(Deserialize)]
struct TextAnnotation {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct Status {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

fn check_status(error: Option<Status>) -> Result<()> {
    match error {
        Some(status) => anyhow::bail!("Vision error {}: {}", status.code, status.message),
        None => Ok(()),
    }
}

/// Concatenate the full-text annotation of every page of a `files:annotate` response.
fn document_text_from_response(raw: &str) -> Result<String> {
    let batch: FilesBatchResponse =
        serde_json::from_str(raw).context("Failed to parse Vision files response")?;

    let mut pages = Vec::new();
    for file in batch.responses {
        check_status(file.error)?;
        for page in file.responses {
            check_status(page.error)?;
            if let Some(annotation) = page.full_text_annotation {
                pages.push(annotation.text);
            }
        }
    }

    Ok(pages.join("\n").trim().to_string())
}

/// Top text annotation of an `images:annotate` response.
fn image_text_from_response(raw: &str) -> Result<String> {
    let batch: BatchResponse =
        serde_json::from_str(raw).context("Failed to parse Vision images response")?;

    let Some(first) = batch.responses.into_iter().next() else {
        return Ok(String::new());
    };
    check_status(first.error)?;

    Ok(first
        .text_annotations
        .into_iter()
        .next()
        .map(|a| a.description.trim().to_string())
        .unwrap_or_default())
}

// ── Provider implementation ─────────────────────────────────────────────────

#[async_trait::async_trait]
impl TextDetector for GoogleVisionProvider {
    fn name(&self) -> &str {
        "google_vision"
    }

    async fn detect_document_text(&self, pdf: &[u8]) -> Result<String> {
        info!("GoogleVisionProvider: document text detection ({} bytes)", pdf.len());

        let body = FilesRequest {
            requests: vec![FileRequest {
                input_config: InputConfig {
                    content: BASE64.encode(pdf),
                    mime_type: "application/pdf",
                },
                features: vec![Feature {
                    feature_type: "DOCUMENT_TEXT_DETECTION",
                }],
                pages: (1..=MAX_INLINE_PDF_PAGES).collect(),
            }],
        };

        let raw = self.post("files:annotate", &body).await?;
        document_text_from_response(&raw)
    }

    async fn detect_image_text(&self, image: &[u8]) -> Result<String> {
        info!("GoogleVisionProvider: image text detection ({} bytes)", image.len());

        let body = ImagesRequest {
            requests: vec![ImageRequest {
                image: ImageContent {
                    content: BASE64.encode(image),
                },
                features: vec![Feature {
                    feature_type: "TEXT_DETECTION",
                }],
            }],
        };

        let raw = self.post("images:annotate", &body).await?;
        image_text_from_response(&raw)
    }
}
