//! Tiered text-generation provider implementations

pub mod mock;
pub mod ollama;
pub mod openai;

pub use mock::MockTextProvider;
pub use ollama::OllamaTextProvider;
pub use openai::OpenAiTextProvider;

use atlas_core::{AtlasResult, TextGenerationProvider};
use std::sync::Arc;

use crate::config::{ProviderConfig, ProviderType, TierConfig};

/// Create a generation provider from configuration.
pub fn create_generation_provider(
    config: ProviderConfig,
    tiers: TierConfig,
) -> AtlasResult<Arc<dyn TextGenerationProvider>> {
    config.validate()?;
    match config.provider_type {
        ProviderType::Ollama => Ok(Arc::new(OllamaTextProvider::new(config, tiers))),
        ProviderType::OpenAi => Ok(Arc::new(OpenAiTextProvider::new(config, tiers))),
        ProviderType::Mock => Ok(Arc::new(MockTextProvider::new())),
    }
}
