//! OpenAI embedding provider

use async_trait::async_trait;
use atlas_core::{AtlasError, AtlasResult, EmbeddingProvider, EmbeddingResponse};
use serde::Deserialize;

use crate::config::ProviderConfig;
use crate::http::{status_error, transport_error};

/// Embeddings via the OpenAI API (`POST /v1/embeddings`).
pub struct OpenAiEmbeddingProvider {
    client: reqwest::Client,
    config: ProviderConfig,
}

impl OpenAiEmbeddingProvider {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<OpenAiEmbeddingData>,
    model: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingData {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    async fn embed(&self, text: &str) -> AtlasResult<EmbeddingResponse> {
        let url = format!("{}/v1/embeddings", self.config.base_url);
        let request = serde_json::json!({
            "model": self.config.model,
            "input": text,
        });

        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| AtlasError::config("OpenAI provider requires an API key"))?;

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&request)
            .timeout(self.config.timeout())
            .send()
            .await
            .map_err(|e| transport_error("openai-embeddings", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(status_error("openai-embeddings", status, body));
        }

        let parsed: OpenAiEmbeddingResponse = response
            .json()
            .await
            .map_err(|e| AtlasError::data(format!("failed to parse OpenAI response: {}", e)))?;

        let embedding = parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| AtlasError::data("OpenAI returned no embedding data"))?;

        Ok(EmbeddingResponse {
            embedding,
            model: parsed.model,
        })
    }

    fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    fn provider_name(&self) -> &str {
        "openai"
    }
}
