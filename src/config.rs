//! Service configuration.
//!
//! Everything comes from the environment (a `.env` file is loaded first by
//! `main`). Missing provider credentials are not fatal: the pipeline then runs
//! on its fallback tiers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::llm::gemini::{self, GeminiClient};
use crate::llm::openrouter::{self, OpenRouterClient};
use crate::llm::{Completion, LlmProviderKind, UnconfiguredCompletion};
use crate::ocr::credentials::{ServiceAccount, VISION_SCOPE};
use crate::ocr::google_vision::{GoogleVisionProvider, VisionAuth};
use crate::ocr::{TextDetector, UnconfiguredDetector};

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;
pub const DEFAULT_CREDENTIALS_PATH: &str = "./secrets/gcloud-key.json";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub max_upload_bytes: usize,
    pub vision: VisionConfig,
    pub llm: LlmConfig,
}

#[derive(Debug, Clone, Default)]
pub struct VisionConfig {
    pub api_key: Option<String>,
    pub credentials_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub provider: LlmProviderKind,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub openrouter_api_key: Option<String>,
    pub openrouter_model: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary variable source. Blank values count
    /// as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let max_upload_bytes = match var("MAX_UPLOAD_BYTES") {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("MAX_UPLOAD_BYTES is not a byte count: {:?}", raw))?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        let provider = match var("RECEIPT_LLM_PROVIDER") {
            Some(raw) => LlmProviderKind::parse(&raw).with_context(|| {
                format!(
                    "Unknown RECEIPT_LLM_PROVIDER: {:?} (expected gemini or openrouter)",
                    raw
                )
            })?,
            None => LlmProviderKind::Gemini,
        };

        let credentials_path = var("GOOGLE_APPLICATION_CREDENTIALS")
            .map(PathBuf::from)
            .or_else(|| {
                let default = Path::new(DEFAULT_CREDENTIALS_PATH);
                default.exists().then(|| default.to_path_buf())
            });

        Ok(Self {
            bind_addr: var("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            max_upload_bytes,
            vision: VisionConfig {
                api_key: var("GOOGLE_VISION_API_KEY"),
                credentials_path,
            },
            llm: LlmConfig {
                provider,
                gemini_api_key: var("GEMINI_API_KEY"),
                gemini_model: var("GEMINI_MODEL")
                    .unwrap_or_else(|| gemini::DEFAULT_MODEL.to_string()),
                openrouter_api_key: var("OPENROUTER_API_KEY"),
                openrouter_model: var("OPENROUTER_MODEL")
                    .unwrap_or_else(|| openrouter::DEFAULT_MODEL.to_string()),
            },
        })
    }

    /// OCR provider for this config. An API key takes precedence over a
    /// service account file.
    pub fn text_detector(&self, client: &reqwest::Client) -> Result<Arc<dyn TextDetector>> {
        let auth = if let Some(key) = &self.vision.api_key {
            VisionAuth::ApiKey(key.clone())
        } else if let Some(path) = &self.vision.credentials_path {
            VisionAuth::ServiceAccount(ServiceAccount::from_file(path, VISION_SCOPE)?)
        } else {
            warn!("No Google Vision credentials configured, OCR disabled");
            return Ok(Arc::new(UnconfiguredDetector));
        };

        info!("OCR provider: google_vision");
        Ok(Arc::new(GoogleVisionProvider::new(client.clone(), auth)))
    }

    /// Completion provider for this config.
    pub fn completion(&self, client: &reqwest::Client) -> Arc<dyn Completion> {
        let llm = &self.llm;
        let provider: Option<Arc<dyn Completion>> = match llm.provider {
            LlmProviderKind::Gemini => llm.gemini_api_key.as_ref().map(|key| {
                Arc::new(
                    GeminiClient::new(client.clone(), key.clone()).with_model(&llm.gemini_model),
                ) as Arc<dyn Completion>
            }),
            LlmProviderKind::OpenRouter => llm.openrouter_api_key.as_ref().map(|key| {
                Arc::new(
                    OpenRouterClient::new(client.clone(), key.clone())
                        .with_model(&llm.openrouter_model),
                ) as Arc<dyn Completion>
            }),
        };

        match provider {
            Some(provider) => {
                info!("LLM provider: {}", provider.name());
                provider
            }
            None => {
                warn!(
                    "No API key for {:?}, transaction extraction will use pattern fallback only",
                    llm.provider
                );
                Arc::new(UnconfiguredCompletion)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<AppConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();

        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR);
        assert_eq!(config.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
        assert_eq!(config.llm.provider, LlmProviderKind::Gemini);
        assert_eq!(config.llm.gemini_model, "gemini-2.5-flash");
        assert!(config.llm.gemini_api_key.is_none());
        assert!(config.vision.api_key.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("BIND_ADDR", "127.0.0.1:8080"),
            ("MAX_UPLOAD_BYTES", "1024"),
            ("RECEIPT_LLM_PROVIDER", "openrouter"),
            ("OPENROUTER_API_KEY", "or-key"),
            ("OPENROUTER_MODEL", "openai/gpt-4o-mini"),
            ("GOOGLE_VISION_API_KEY", "vision-key"),
            ("GOOGLE_APPLICATION_CREDENTIALS", "/tmp/key.json"),
        ])
        .unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.max_upload_bytes, 1024);
        assert_eq!(config.llm.provider, LlmProviderKind::OpenRouter);
        assert_eq!(config.llm.openrouter_model, "openai/gpt-4o-mini");
        assert_eq!(config.vision.api_key.as_deref(), Some("vision-key"));
        assert_eq!(
            config.vision.credentials_path,
            Some(PathBuf::from("/tmp/key.json"))
        );
    }

    #[test]
    fn test_blank_values_are_unset() {
        let config = config_from(&[("GEMINI_API_KEY", "  "), ("BIND_ADDR", "")]).unwrap();

        assert!(config.llm.gemini_api_key.is_none());
        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(config_from(&[("MAX_UPLOAD_BYTES", "lots")]).is_err());
        assert!(config_from(&[("RECEIPT_LLM_PROVIDER", "claude")]).is_err());
    }

    #[test]
    fn test_providers_without_credentials_are_unconfigured() {
        let mut config = config_from(&[]).unwrap();
        config.vision.credentials_path = None;
        let client = reqwest::Client::new();

        assert_eq!(config.text_detector(&client).unwrap().name(), "unconfigured");
        assert_eq!(config.completion(&client).name(), "unconfigured");
    }

    #[test]
    fn test_providers_with_credentials() {
        let config = config_from(&[
            ("GEMINI_API_KEY", "g-key"),
            ("GOOGLE_VISION_API_KEY", "v-key"),
        ])
        .unwrap();
        let client = reqwest::Client::new();

        assert_eq!(config.text_detector(&client).unwrap().name(), "google_vision");
        assert_eq!(config.completion(&client).name(), "gemini");
    }

    #[test]
    fn test_missing_credentials_file_is_an_error() {
        let mut config = config_from(&[]).unwrap();
        config.vision.credentials_path = Some(PathBuf::from("/nonexistent/key.json"));

        assert!(config.text_detector(&reqwest::Client::new()).is_err());
    }
}
