//! [`VectorStore`] implementation over SurrealDB
//!
//! Chunk embeddings are native arrays in an `embeddings` table keyed by
//! chunk id, searched with `vector::similarity::cosine`. The filterable
//! columns are exactly the vector metadata keys; doc-type filters never
//! reach this store, callers resolve them to document ids first.

use async_trait::async_trait;
use atlas_core::{AtlasResult, VectorFilter, VectorMatch, VectorMetadata, VectorRecord, VectorStore};
use serde::Deserialize;
use serde_json::json;

use crate::client::SurrealClient;

/// Vector index backed by a [`SurrealClient`].
#[derive(Debug, Clone)]
pub struct SurrealVectorStore {
    client: SurrealClient,
}

impl SurrealVectorStore {
    pub fn new(client: SurrealClient) -> Self {
        Self { client }
    }
}

#[derive(Debug, Deserialize)]
struct SearchRow {
    chunk_id: String,
    document_id: String,
    section_id: String,
    file_path: String,
    repository: String,
    header_path: String,
    score: f32,
}

#[async_trait]
impl VectorStore for SurrealVectorStore {
    async fn index(&self, record: &VectorRecord) -> AtlasResult<()> {
        self.client
            .execute(
                "UPSERT type::thing('embeddings', $id) CONTENT { \
                    embedding: $embedding, \
                    document_id: $document_id, \
                    section_id: $section_id, \
                    file_path: $file_path, \
                    repository: $repository, \
                    header_path: $header_path }",
                json!({
                    "id": record.id,
                    "embedding": record.embedding,
                    "document_id": record.metadata.document_id,
                    "section_id": record.metadata.section_id,
                    "file_path": record.metadata.file_path,
                    "repository": record.metadata.repository,
                    "header_path": record.metadata.header_path,
                }),
            )
            .await
    }

    async fn delete_document(&self, document_id: &str) -> AtlasResult<()> {
        self.client
            .execute(
                "DELETE embeddings WHERE document_id = $document_id",
                json!({ "document_id": document_id }),
            )
            .await
    }

    async fn search(
        &self,
        vector: &[f32],
        k: usize,
        filter: &VectorFilter,
    ) -> AtlasResult<Vec<VectorMatch>> {
        let mut conditions = Vec::new();
        let mut bindings = serde_json::Map::new();
        bindings.insert("query".to_string(), json!(vector));
        if let Some(repository) = &filter.repository {
            conditions.push("repository = $repository");
            bindings.insert("repository".to_string(), json!(repository));
        }
        if let Some(document_ids) = &filter.document_ids {
            conditions.push("document_id IN $document_ids");
            bindings.insert("document_ids".to_string(), json!(document_ids));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };
        let sql = format!(
            "SELECT meta::id(id) AS chunk_id, document_id, section_id, file_path, \
             repository, header_path, \
             vector::similarity::cosine(embedding, $query) AS score \
             FROM embeddings{} ORDER BY score DESC LIMIT {}",
            where_clause, k
        );

        let rows: Vec<SearchRow> = self
            .client
            .select(&sql, serde_json::Value::Object(bindings))
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| VectorMatch {
                chunk_id: row.chunk_id.clone(),
                score: row.score,
                metadata: VectorMetadata {
                    document_id: row.document_id,
                    section_id: row.section_id,
                    chunk_id: row.chunk_id,
                    file_path: row.file_path,
                    repository: row.repository,
                    header_path: row.header_path,
                },
            })
            .collect())
    }
}
