//! Table and index definitions
//!
//! Tables are schemaless; the Rust node types are the source of truth for
//! their shape. Indexes cover the lookups the stores run per query: edges by
//! endpoint, and section/chunk/embedding rows by owning document.

use atlas_core::AtlasResult;
use serde_json::json;
use tracing::debug;

use crate::client::SurrealClient;

const DEFINITIONS: &[&str] = &[
    "DEFINE TABLE IF NOT EXISTS documents SCHEMALESS",
    "DEFINE TABLE IF NOT EXISTS sections SCHEMALESS",
    "DEFINE TABLE IF NOT EXISTS chunks SCHEMALESS",
    "DEFINE TABLE IF NOT EXISTS concepts SCHEMALESS",
    "DEFINE TABLE IF NOT EXISTS relations SCHEMALESS",
    "DEFINE TABLE IF NOT EXISTS embeddings SCHEMALESS",
    "DEFINE INDEX IF NOT EXISTS relations_source ON TABLE relations COLUMNS source_id",
    "DEFINE INDEX IF NOT EXISTS relations_target ON TABLE relations COLUMNS target_id",
    "DEFINE INDEX IF NOT EXISTS relations_kind ON TABLE relations COLUMNS kind",
    "DEFINE INDEX IF NOT EXISTS sections_document ON TABLE sections COLUMNS document_id",
    "DEFINE INDEX IF NOT EXISTS chunks_document ON TABLE chunks COLUMNS document_id",
    "DEFINE INDEX IF NOT EXISTS embeddings_document ON TABLE embeddings COLUMNS document_id",
    "DEFINE INDEX IF NOT EXISTS documents_repository ON TABLE documents COLUMNS repository",
];

/// Apply table and index definitions. Idempotent; run once at startup.
pub async fn initialize(client: &SurrealClient) -> AtlasResult<()> {
    for statement in DEFINITIONS {
        client.execute(statement, json!({})).await?;
    }
    debug!("database schema initialized");
    Ok(())
}
