//! Atlas LLM providers
//!
//! A unified interface for generating text embeddings and chat completions
//! from multiple providers (Ollama, OpenAI) with built-in resilience
//! patterns: retry with exponential backoff and a rolling-window circuit
//! breaker. Also home of the LLM-backed entity extractor used by ingestion.

pub mod config;
pub mod embeddings;
mod http;
pub mod extractor;
pub mod generation;
pub mod resilience;

pub use config::{ProviderConfig, ProviderType, ResilienceConfig, TierConfig};
pub use embeddings::{create_embedding_provider, MockEmbeddingProvider};
pub use extractor::LlmEntityExtractor;
pub use generation::{create_generation_provider, MockTextProvider};
pub use resilience::{CircuitBreaker, ResilientEmbeddings, ResilientGeneration, RetryPolicy};
