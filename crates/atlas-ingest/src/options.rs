//! Ingestion settings

use atlas_core::{AtlasError, AtlasResult};
use atlas_parser::DEFAULT_CHUNK_THRESHOLD_LINES;
use serde::{Deserialize, Serialize};

/// Tunables for [`crate::IngestionService`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestOptions {
    /// Concurrent embedding calls per document.
    pub max_concurrency: usize,
    /// Bodies longer than this many lines also chunk at H3 boundaries.
    pub chunk_threshold_lines: u32,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            chunk_threshold_lines: DEFAULT_CHUNK_THRESHOLD_LINES,
        }
    }
}

impl IngestOptions {
    pub fn validate(&self) -> AtlasResult<()> {
        if self.max_concurrency == 0 {
            return Err(AtlasError::config("max_concurrency must be positive"));
        }
        Ok(())
    }
}
