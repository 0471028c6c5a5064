//! OpenAI chat generation provider

use async_trait::async_trait;
use atlas_core::{
    AtlasError, AtlasResult, GeneratedText, LlmMessage, MessageRole, ModelTier,
    TextGenerationProvider,
};
use serde::Deserialize;

use crate::config::{ProviderConfig, TierConfig};
use crate::http::{status_error, transport_error};

/// Chat completions via the OpenAI API (`POST /v1/chat/completions`).
pub struct OpenAiTextProvider {
    client: reqwest::Client,
    config: ProviderConfig,
    tiers: TierConfig,
}

impl OpenAiTextProvider {
    pub fn new(config: ProviderConfig, tiers: TierConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            tiers,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    model: String,
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
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
impl TextGenerationProvider for OpenAiTextProvider {
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
        });

        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| AtlasError::config("OpenAI provider requires an API key"))?;

        let url = format!("{}/v1/chat/completions", self.config.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&request)
            .timeout(self.config.timeout())
            .send()
            .await
            .map_err(|e| transport_error("openai-chat", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(status_error("openai-chat", status, body));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| AtlasError::data(format!("failed to parse OpenAI response: {}", e)))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AtlasError::data("OpenAI response contained no choices"))?;

        Ok(GeneratedText {
            text: choice.message.content,
            model: parsed.model,
        })
    }

    fn provider_name(&self) -> &str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderType;

    fn test_config(base_url: String) -> ProviderConfig {
        ProviderConfig {
            provider_type: ProviderType::OpenAi,
            base_url,
            model: "gpt-4o-mini".to_string(),
            dimensions: 1,
            timeout_secs: 5,
            api_key: Some("sk-test".to_string()),
        }
    }

    #[tokio::test]
    async fn parses_first_choice() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .with_status(200)
            .with_body(
                r#"{"model": "gpt-4o-mini", "choices": [{"message": {"role": "assistant", "content": "hello"}}]}"#,
            )
            .create_async()
            .await;

        let provider = OpenAiTextProvider::new(
            test_config(server.url()),
            TierConfig::new("gpt-4o-mini", "gpt-4o"),
        );
        let out = provider
            .generate("system", &[LlmMessage::user("hi")], ModelTier::Default)
            .await
            .unwrap();
        assert_eq!(out.text, "hello");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn rate_limit_is_transient() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(429)
            .with_body("slow down")
            .create_async()
            .await;

        let provider = OpenAiTextProvider::new(
            test_config(server.url()),
            TierConfig::new("gpt-4o-mini", "gpt-4o"),
        );
        let err = provider
            .generate("system", &[LlmMessage::user("hi")], ModelTier::Default)
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }
}
