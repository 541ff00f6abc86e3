//! Language-model completion providers.

pub mod gemini;
pub mod openrouter;

/// A text-in, text-out generative model.
#[async_trait::async_trait]
pub trait Completion: Send + Sync {
    fn name(&self) -> &str;
    async fn complete(&self, prompt: &str) -> anyhow::Result<String>;
}

/// Known provider identifiers used for configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LlmProviderKind {
    Gemini,
    OpenRouter,
}

impl LlmProviderKind {
    /// Parse a configuration string into a provider kind.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Some(Self::Gemini),
            "openrouter" => Some(Self::OpenRouter),
            _ => None,
        }
    }
}

/// Stand-in used when the selected provider has no API key. Every call fails
/// so the transaction extractor takes its regex fallback.
pub struct UnconfiguredCompletion;

#[async_trait::async_trait]
impl Completion for UnconfiguredCompletion {
    fn name(&self) -> &str {
        "unconfigured"
    }

    async fn complete(&self, _prompt: &str) -> anyhow::Result<String> {
        anyhow::bail!("no language model configured")
    }
}
