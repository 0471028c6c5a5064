//! Query settings

use atlas_core::{AtlasError, AtlasResult};
use serde::{Deserialize, Serialize};

/// Tunables for one [`crate::QueryPipeline`] run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryOptions {
    /// Top-K for the initial vector retrieval.
    pub max_chunks: usize,
    /// Step budget across the expansion stages; exhausting it forces
    /// synthesis on the escalated tier.
    pub max_traversal_steps: u32,
    /// Vector hits below this score are dropped.
    pub min_relevance_score: f32,
    /// Whether document traversal may cross repository boundaries.
    pub use_cross_repo_links: bool,
    /// Restrict retrieval to one repository.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    /// Restrict retrieval to documents of one type; resolved through the
    /// graph into a document-id filter before it reaches the vector store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<String>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            max_chunks: 10,
            max_traversal_steps: 5,
            min_relevance_score: 0.7,
            use_cross_repo_links: true,
            repository: None,
            doc_type: None,
        }
    }
}

impl QueryOptions {
    pub fn validate(&self) -> AtlasResult<()> {
        if self.max_chunks == 0 {
            return Err(AtlasError::config("max_chunks must be positive"));
        }
        if !(0.0..=1.0).contains(&self.min_relevance_score) {
            return Err(AtlasError::config(
                "min_relevance_score must be between 0 and 1",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(QueryOptions::default().validate().is_ok());
    }

    #[test]
    fn out_of_range_score_is_rejected() {
        let options = QueryOptions {
            min_relevance_score: 1.5,
            ..Default::default()
        };
        assert!(options.validate().is_err());
    }
}
