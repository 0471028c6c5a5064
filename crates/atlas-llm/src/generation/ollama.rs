//! Ollama chat generation provider

use async_trait::async_trait;
use atlas_core::{
    AtlasError, AtlasResult, GeneratedText, LlmMessage, MessageRole, ModelTier,
    TextGenerationProvider,
};
use serde::Deserialize;

use crate::config::{ProviderConfig, TierConfig};
use crate::http::{status_error, transport_error};

/// Chat completions via Ollama (`POST /api/chat`, non-streaming).
pub struct OllamaTextProvider {
    client: reqwest::Client,
    config: ProviderConfig,
    tiers: TierConfig,
}

impl OllamaTextProvider {
    pub fn new(config: ProviderConfig, tiers: TierConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            tiers,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    model: String,
    message: OllamaChatMessage,
}

#[derive(Debug, Deserialize)]
struct OllamaChatMessage {
    content: String,
}

fn role_str(role: MessageRole) -> &'static str {
    match role {
        MessageRole::System => "system",
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
    }
}

#[async_trait]
impl TextGenerationProvider for OllamaTextProvider {
    async fn generate(
        &self,
        system_prompt: &str,
        messages: &[LlmMessage],
        tier: ModelTier,
    ) -> AtlasResult<GeneratedText> {
        let model = self.tiers.model_for(tier);

        let mut api_messages = vec![serde_json::json!({
            "role": "system",
            "content": system_prompt,
        })];
        api_messages.extend(messages.iter().map(|m| {
            serde_json::json!({
                "role": role_str(m.role),
                "content": m.content,
            })
        }));

        let request = serde_json::json!({
            "model": model,
            "messages": api_messages,
            "stream": false,
        });

        let url = format!("{}/api/chat", self.config.base_url);
        let response = self
            .client
            .post(&url)
            .json(&request)
            .timeout(self.config.timeout())
            .send()
            .await
            .map_err(|e| transport_error("ollama-chat", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(status_error("ollama-chat", status, body));
        }

        let parsed: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| AtlasError::data(format!("failed to parse Ollama response: {}", e)))?;

        Ok(GeneratedText {
            text: parsed.message.content,
            model: parsed.model,
        })
    }

    fn provider_name(&self) -> &str {
        "ollama"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderType;

    #[tokio::test]
    async fn escalated_tier_switches_model() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/chat")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "model": "llama3.1:70b"
            })))
            .with_status(200)
            .with_body(r#"{"model": "llama3.1:70b", "message": {"role": "assistant", "content": "answer"}}"#)
            .create_async()
            .await;

        let config = ProviderConfig {
            provider_type: ProviderType::Ollama,
            base_url: server.url(),
            model: "llama3.2".to_string(),
            dimensions: 1,
            timeout_secs: 5,
            api_key: None,
        };
        let provider = OllamaTextProvider::new(config, TierConfig::new("llama3.2", "llama3.1:70b"));
        let out = provider
            .generate("system", &[LlmMessage::user("hi")], ModelTier::Escalated)
            .await
            .unwrap();
        assert_eq!(out.text, "answer");
        mock.assert_async().await;
    }
}
