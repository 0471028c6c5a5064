//! Ollama embedding provider

use async_trait::async_trait;
use atlas_core::{AtlasError, AtlasResult, EmbeddingProvider, EmbeddingResponse};
use serde::Deserialize;

use crate::config::ProviderConfig;
use crate::http::{status_error, transport_error};

/// Embeddings via a local or remote Ollama instance (`POST /api/embeddings`).
pub struct OllamaEmbeddingProvider {
    client: reqwest::Client,
    config: ProviderConfig,
}

impl OllamaEmbeddingProvider {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddingProvider {
    async fn embed(&self, text: &str) -> AtlasResult<EmbeddingResponse> {
        let url = format!("{}/api/embeddings", self.config.base_url);
        let request = serde_json::json!({
            "model": self.config.model,
            "prompt": text,
        });

        let response = self
            .client
            .post(&url)
            .json(&request)
            .timeout(self.config.timeout())
            .send()
            .await
            .map_err(|e| transport_error("ollama-embeddings", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(status_error("ollama-embeddings", status, body));
        }

        let parsed: OllamaEmbeddingResponse = response
            .json()
            .await
            .map_err(|e| AtlasError::data(format!("failed to parse Ollama response: {}", e)))?;

        if parsed.embedding.is_empty() {
            return Err(AtlasError::data("Ollama returned an empty embedding"));
        }

        Ok(EmbeddingResponse {
            embedding: parsed.embedding,
            model: self.config.model.clone(),
        })
    }

    fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    fn provider_name(&self) -> &str {
        "ollama"
    }
}
