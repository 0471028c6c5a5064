//! LLM-backed entity extraction
//!
//! Sends a chunk of text to the generation provider and parses the reply as
//! a JSON array of named entities. Extraction is best-effort: an empty input
//! yields no entities, and the caller treats failures as unit-scoped rather
//! than fatal.

use async_trait::async_trait;
use atlas_core::{
    AtlasError, AtlasResult, EntityExtractor, ExtractedEntity, LlmMessage, ModelTier,
    TextGenerationProvider,
};
use std::sync::Arc;
use tracing::debug;

const EXTRACTION_SYSTEM_PROMPT: &str = "\
You extract named concepts from technical documentation.

Return ONLY a JSON array. Each element must be an object with exactly these \
keys:
  \"name\": the canonical name of the concept
  \"type\": one of \"technology\", \"component\", \"process\", \"standard\", \"other\"
  \"description\": one sentence describing the concept as used in the text

Extract only concepts that are substantively discussed, not merely mentioned \
in passing. Return [] if the text contains no extractable concepts. Do not \
wrap the array in markdown fences or add any commentary.";

/// Extracts entities by prompting a [`TextGenerationProvider`] for JSON.
pub struct LlmEntityExtractor {
    provider: Arc<dyn TextGenerationProvider>,
}

impl LlmEntityExtractor {
    pub fn new(provider: Arc<dyn TextGenerationProvider>) -> Self {
        Self { provider }
    }
}

/// Pull the outermost JSON array out of a model reply. Models routinely wrap
/// JSON in fences or prose despite instructions, so we scan for the bracket
/// span instead of parsing the reply verbatim.
fn extract_json_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

#[async_trait]
impl EntityExtractor for LlmEntityExtractor {
    async fn extract_entities(&self, text: &str) -> AtlasResult<Vec<ExtractedEntity>> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let reply = self
            .provider
            .generate(
                EXTRACTION_SYSTEM_PROMPT,
                &[LlmMessage::user(text)],
                ModelTier::Default,
            )
            .await?;

        let json = extract_json_array(&reply.text).ok_or_else(|| {
            AtlasError::data(format!(
                "entity extraction reply contained no JSON array: {}",
                reply.text.chars().take(120).collect::<String>()
            ))
        })?;

        let entities: Vec<ExtractedEntity> = serde_json::from_str(json)
            .map_err(|e| AtlasError::data(format!("malformed entity JSON: {}", e)))?;

        let entities: Vec<ExtractedEntity> = entities
            .into_iter()
            .filter(|e| !e.name.trim().is_empty())
            .collect();

        debug!(count = entities.len(), "extracted entities");
        Ok(entities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::MockTextProvider;

    #[tokio::test]
    async fn parses_fenced_reply() {
        let provider = Arc::new(MockTextProvider::new());
        provider.push_response(
            "Here you go:\n```json\n[{\"name\": \"SurrealDB\", \"type\": \"technology\", \
             \"description\": \"A multi-model database.\"}]\n```",
        );
        let extractor = LlmEntityExtractor::new(provider);

        let entities = extractor
            .extract_entities("SurrealDB stores the graph.")
            .await
            .unwrap();
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].name, "SurrealDB");
        assert_eq!(entities[0].entity_type, "technology");
    }

    #[tokio::test]
    async fn empty_input_skips_provider() {
        let provider = Arc::new(MockTextProvider::new());
        let extractor = LlmEntityExtractor::new(provider.clone());

        let entities = extractor.extract_entities("   \n  ").await.unwrap();
        assert!(entities.is_empty());
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn non_json_reply_is_a_data_error() {
        let provider = Arc::new(MockTextProvider::new());
        provider.push_response("I could not find any concepts, sorry!");
        let extractor = LlmEntityExtractor::new(provider);

        let err = extractor.extract_entities("some text").await.unwrap_err();
        assert!(err.is_unit_scoped());
    }

    #[tokio::test]
    async fn empty_array_reply_yields_no_entities() {
        let provider = Arc::new(MockTextProvider::new());
        provider.push_response("[]");
        let extractor = LlmEntityExtractor::new(provider);

        let entities = extractor.extract_entities("nothing here").await.unwrap();
        assert!(entities.is_empty());
    }
}
