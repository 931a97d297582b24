//! Outbound text generation capability.

mod anthropic;
mod template;

pub use anthropic::{AnthropicProvider, AnthropicSettings};
pub use template::TemplateProvider;

use async_trait::async_trait;

use super::context::NarrativeContext;
use super::prompt::NarrativePrompt;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("provider is not configured: {0}")]
    Configuration(String),
    #[error("provider unreachable: {0}")]
    Transport(String),
    #[error("provider returned status {status}: {message}")]
    Api { status: u16, message: String },
    #[error("provider response could not be parsed: {0}")]
    Parse(String),
    #[error("provider returned an empty response")]
    EmptyResponse,
}

/// Anything that can turn a grounded prompt into narrative text.
#[async_trait]
pub trait NarrativeProvider: Send + Sync {
    async fn generate(
        &self,
        prompt: &NarrativePrompt,
        context: &NarrativeContext,
    ) -> Result<String, ProviderError>;
}
