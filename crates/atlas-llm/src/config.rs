//! Provider configuration

use atlas_core::{AtlasError, AtlasResult, ModelTier};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which provider backend to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderType {
    Ollama,
    OpenAi,
    Mock,
}

/// Configuration shared by embedding and generation providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub provider_type: ProviderType,
    pub base_url: String,
    pub model: String,
    /// Embedding dimensionality; ignored by generation providers.
    pub dimensions: usize,
    pub timeout_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl ProviderConfig {
    pub fn ollama(base_url: Option<String>, model: Option<String>) -> Self {
        Self {
            provider_type: ProviderType::Ollama,
            base_url: base_url.unwrap_or_else(|| "http://localhost:11434".to_string()),
            model: model.unwrap_or_else(|| "nomic-embed-text".to_string()),
            dimensions: 768,
            timeout_secs: 120,
            api_key: None,
        }
    }

    pub fn openai(api_key: String, model: Option<String>) -> Self {
        Self {
            provider_type: ProviderType::OpenAi,
            base_url: "https://api.openai.com".to_string(),
            model: model.unwrap_or_else(|| "text-embedding-3-small".to_string()),
            dimensions: 1536,
            timeout_secs: 60,
            api_key: Some(api_key),
        }
    }

    pub fn mock(dimensions: usize) -> Self {
        Self {
            provider_type: ProviderType::Mock,
            base_url: String::new(),
            model: "mock".to_string(),
            dimensions,
            timeout_secs: 1,
            api_key: None,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> AtlasResult<()> {
        if self.model.is_empty() {
            return Err(AtlasError::config("model name must not be empty"));
        }
        if self.dimensions == 0 {
            return Err(AtlasError::config("embedding dimensions must be positive"));
        }
        match self.provider_type {
            ProviderType::OpenAi if self.api_key.is_none() => {
                Err(AtlasError::config("OpenAI provider requires an API key"))
            }
            ProviderType::Ollama | ProviderType::OpenAi if self.base_url.is_empty() => {
                Err(AtlasError::config("base URL must not be empty"))
            }
            _ => Ok(()),
        }
    }
}

/// Model names for the two generation tiers. The escalated tier is used when
/// synthesis signals low confidence or the traversal budget is exhausted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierConfig {
    pub default_model: String,
    pub escalated_model: String,
}

impl TierConfig {
    pub fn new(default_model: impl Into<String>, escalated_model: impl Into<String>) -> Self {
        Self {
            default_model: default_model.into(),
            escalated_model: escalated_model.into(),
        }
    }

    pub fn model_for(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Default => &self.default_model,
            ModelTier::Escalated => &self.escalated_model,
        }
    }
}

/// Retry and circuit-breaker settings applied by the resilient wrappers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResilienceConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Rolling window of call outcomes fed into the breaker.
    pub breaker_window: usize,
    /// The breaker never trips before seeing this many outcomes.
    pub breaker_min_samples: usize,
    /// Failure ratio over the window that trips the breaker.
    pub breaker_failure_ratio: f64,
    pub breaker_cooldown_secs: u64,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
            max_delay_ms: 5_000,
            breaker_window: 20,
            breaker_min_samples: 10,
            breaker_failure_ratio: 0.5,
            breaker_cooldown_secs: 30,
        }
    }
}
