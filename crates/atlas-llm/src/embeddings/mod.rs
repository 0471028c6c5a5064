//! Embedding provider implementations

pub mod mock;
pub mod ollama;
pub mod openai;

pub use mock::MockEmbeddingProvider;
pub use ollama::OllamaEmbeddingProvider;
pub use openai::OpenAiEmbeddingProvider;

use atlas_core::{AtlasResult, EmbeddingProvider};
use std::sync::Arc;

use crate::config::{ProviderConfig, ProviderType};

/// Create an embedding provider from configuration.
pub fn create_embedding_provider(
    config: ProviderConfig,
) -> AtlasResult<Arc<dyn EmbeddingProvider>> {
    config.validate()?;
    match config.provider_type {
        ProviderType::Ollama => Ok(Arc::new(OllamaEmbeddingProvider::new(config))),
        ProviderType::OpenAi => Ok(Arc::new(OpenAiEmbeddingProvider::new(config))),
        ProviderType::Mock => Ok(Arc::new(MockEmbeddingProvider::with_dimensions(
            config.dimensions,
        ))),
    }
}
