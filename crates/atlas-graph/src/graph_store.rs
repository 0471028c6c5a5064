//! [`GraphStore`] implementation over SurrealDB
//!
//! Nodes are stored in per-type tables with their deterministic string id as
//! the record id, read back via `meta::id(id)`. Edges live in a `relations`
//! table whose record id is `"{source}|{KIND}|{target}"`, which makes
//! `relate` idempotent without RELATE statements. Multi-hop traversals are
//! iterative frontier expansions in Rust rather than recursive SurrealQL.

use async_trait::async_trait;
use atlas_core::{
    AtlasResult, ChunkNode, ConceptNode, DocumentNode, GraphRelationship, GraphStore,
    RelationKind, SectionNode,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use tracing::warn;

use crate::client::SurrealClient;

const DOCUMENT_FIELDS: &str = "meta::id(id) AS id, repository, file_path, title, doc_type, \
     promotion_level, commit_hash, ingested_at";
const SECTION_FIELDS: &str = "meta::id(id) AS id, document_id, title, `order`, level";
const CHUNK_FIELDS: &str = "meta::id(id) AS id, section_id, document_id, `order`, header_path, \
     content, token_count, start_line, end_line";
const CONCEPT_FIELDS: &str = "meta::id(id) AS id, name, concept_type, description";

#[derive(Debug, Deserialize)]
struct IdRow {
    id: String,
}

#[derive(Debug, Deserialize)]
struct EndpointRow {
    source_id: String,
    target_id: String,
}

#[derive(Debug, Deserialize)]
struct RelationRow {
    source_id: String,
    target_id: String,
    kind: String,
    #[serde(default)]
    properties: Value,
}

impl RelationRow {
    fn into_relationship(self) -> Option<GraphRelationship> {
        let Some(kind) = RelationKind::parse(&self.kind) else {
            warn!(kind = %self.kind, "skipping relation with unknown kind");
            return None;
        };
        Some(GraphRelationship {
            source_id: self.source_id,
            target_id: self.target_id,
            kind,
            properties: self.properties,
        })
    }
}

/// Property-graph store backed by a [`SurrealClient`].
#[derive(Debug, Clone)]
pub struct SurrealGraphStore {
    client: SurrealClient,
}

impl SurrealGraphStore {
    pub fn new(client: SurrealClient) -> Self {
        Self { client }
    }

    async fn upsert(&self, table: &str, id: &str, node: impl serde::Serialize) -> AtlasResult<()> {
        // The record id carries the identity; a duplicate `id` field inside
        // the content would collide with it.
        let mut data = serde_json::to_value(node)
            .map_err(|e| atlas_core::AtlasError::storage(format!("serialize {}: {}", table, e)))?;
        if let Value::Object(ref mut map) = data {
            map.remove("id");
        }
        self.client
            .execute(
                &format!("UPSERT type::thing('{}', $id) CONTENT $data", table),
                json!({ "id": id, "data": data }),
            )
            .await
    }

    /// Expand a concept id set along `RELATED_TO` edges in both directions,
    /// up to `hops` steps. The result includes the seed ids.
    async fn expand_related(&self, seed: &[String], hops: u8) -> AtlasResult<Vec<String>> {
        let mut visited: HashSet<String> = seed.iter().cloned().collect();
        let mut frontier: Vec<String> = seed.to_vec();

        for _ in 0..hops {
            if frontier.is_empty() {
                break;
            }
            let rows: Vec<EndpointRow> = self
                .client
                .select(
                    "SELECT source_id, target_id FROM relations \
                     WHERE kind = 'RELATED_TO' AND (source_id IN $ids OR target_id IN $ids)",
                    json!({ "ids": frontier }),
                )
                .await?;

            let mut next = Vec::new();
            for row in rows {
                for id in [row.source_id, row.target_id] {
                    if visited.insert(id.clone()) {
                        next.push(id);
                    }
                }
            }
            frontier = next;
        }

        Ok(visited.into_iter().collect())
    }

    async fn concepts_by_ids(&self, ids: &[String]) -> AtlasResult<Vec<ConceptNode>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.client
            .select(
                &format!(
                    "SELECT {} FROM concepts WHERE meta::id(id) IN $ids ORDER BY name ASC",
                    CONCEPT_FIELDS
                ),
                json!({ "ids": ids }),
            )
            .await
    }

    async fn node_ids(&self, table: &str, document_id: &str) -> AtlasResult<Vec<String>> {
        let rows: Vec<IdRow> = self
            .client
            .select(
                &format!(
                    "SELECT meta::id(id) AS id FROM {} WHERE document_id = $document_id",
                    table
                ),
                json!({ "document_id": document_id }),
            )
            .await?;
        Ok(rows.into_iter().map(|r| r.id).collect())
    }
}

#[async_trait]
impl GraphStore for SurrealGraphStore {
    async fn upsert_document(&self, doc: &DocumentNode) -> AtlasResult<()> {
        self.upsert("documents", &doc.id, doc).await
    }

    async fn upsert_section(&self, section: &SectionNode) -> AtlasResult<()> {
        self.upsert("sections", &section.id, section).await
    }

    async fn upsert_chunk(&self, chunk: &ChunkNode) -> AtlasResult<()> {
        self.upsert("chunks", &chunk.id, chunk).await
    }

    async fn upsert_concept(&self, concept: &ConceptNode) -> AtlasResult<()> {
        self.upsert("concepts", &concept.id, concept).await
    }

    async fn relate(
        &self,
        source_id: &str,
        target_id: &str,
        kind: RelationKind,
        properties: Value,
    ) -> AtlasResult<()> {
        let edge_id = format!("{}|{}|{}", source_id, kind.as_str(), target_id);
        self.client
            .execute(
                "UPSERT type::thing('relations', $id) CONTENT { \
                    source_id: $source_id, target_id: $target_id, \
                    kind: $kind, properties: $properties }",
                json!({
                    "id": edge_id,
                    "source_id": source_id,
                    "target_id": target_id,
                    "kind": kind.as_str(),
                    "properties": properties,
                }),
            )
            .await
    }

    async fn get_document(&self, id: &str) -> AtlasResult<Option<DocumentNode>> {
        self.client
            .select_one(
                &format!(
                    "SELECT {} FROM type::thing('documents', $id)",
                    DOCUMENT_FIELDS
                ),
                json!({ "id": id }),
            )
            .await
    }

    async fn document_exists(&self, id: &str) -> AtlasResult<bool> {
        let row: Option<IdRow> = self
            .client
            .select_one(
                "SELECT meta::id(id) AS id FROM type::thing('documents', $id)",
                json!({ "id": id }),
            )
            .await?;
        Ok(row.is_some())
    }

    async fn documents_by_type(
        &self,
        repository: Option<&str>,
        doc_type: &str,
    ) -> AtlasResult<Vec<DocumentNode>> {
        match repository {
            Some(repo) => {
                self.client
                    .select(
                        &format!(
                            "SELECT {} FROM documents \
                             WHERE doc_type = $doc_type AND repository = $repository",
                            DOCUMENT_FIELDS
                        ),
                        json!({ "doc_type": doc_type, "repository": repo }),
                    )
                    .await
            }
            None => {
                self.client
                    .select(
                        &format!(
                            "SELECT {} FROM documents WHERE doc_type = $doc_type",
                            DOCUMENT_FIELDS
                        ),
                        json!({ "doc_type": doc_type }),
                    )
                    .await
            }
        }
    }

    async fn sections_of(&self, document_id: &str) -> AtlasResult<Vec<SectionNode>> {
        self.client
            .select(
                &format!(
                    "SELECT {} FROM sections WHERE document_id = $document_id \
                     ORDER BY `order` ASC",
                    SECTION_FIELDS
                ),
                json!({ "document_id": document_id }),
            )
            .await
    }

    async fn chunks_of_document(&self, document_id: &str) -> AtlasResult<Vec<ChunkNode>> {
        self.client
            .select(
                &format!(
                    "SELECT {} FROM chunks WHERE document_id = $document_id \
                     ORDER BY `order` ASC",
                    CHUNK_FIELDS
                ),
                json!({ "document_id": document_id }),
            )
            .await
    }

    async fn get_chunks(&self, ids: &[String]) -> AtlasResult<Vec<ChunkNode>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.client
            .select(
                &format!("SELECT {} FROM chunks WHERE meta::id(id) IN $ids", CHUNK_FIELDS),
                json!({ "ids": ids }),
            )
            .await
    }

    async fn get_concept(&self, id: &str) -> AtlasResult<Option<ConceptNode>> {
        self.client
            .select_one(
                &format!("SELECT {} FROM type::thing('concepts', $id)", CONCEPT_FIELDS),
                json!({ "id": id }),
            )
            .await
    }

    async fn list_concepts(&self) -> AtlasResult<Vec<ConceptNode>> {
        self.client
            .select(
                &format!("SELECT {} FROM concepts ORDER BY name ASC", CONCEPT_FIELDS),
                json!({}),
            )
            .await
    }

    async fn concepts_mentioned_by(&self, chunk_ids: &[String]) -> AtlasResult<Vec<ConceptNode>> {
        if chunk_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<EndpointRow> = self
            .client
            .select(
                "SELECT source_id, target_id FROM relations \
                 WHERE kind = 'MENTIONS' AND source_id IN $ids",
                json!({ "ids": chunk_ids }),
            )
            .await?;
        let concept_ids: Vec<String> = rows
            .into_iter()
            .map(|r| r.target_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        self.concepts_by_ids(&concept_ids).await
    }

    async fn chunks_mentioning(
        &self,
        concept_ids: &[String],
        max_hops: u8,
    ) -> AtlasResult<Vec<ChunkNode>> {
        if concept_ids.is_empty() {
            return Ok(Vec::new());
        }
        let expanded = self.expand_related(concept_ids, max_hops).await?;
        let rows: Vec<EndpointRow> = self
            .client
            .select(
                "SELECT source_id, target_id FROM relations \
                 WHERE kind = 'MENTIONS' AND target_id IN $ids",
                json!({ "ids": expanded }),
            )
            .await?;
        let chunk_ids: Vec<String> = rows
            .into_iter()
            .map(|r| r.source_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        self.get_chunks(&chunk_ids).await
    }

    async fn concept_neighbors(
        &self,
        concept_ids: &[String],
        depth: u8,
    ) -> AtlasResult<Vec<ConceptNode>> {
        if concept_ids.is_empty() {
            return Ok(Vec::new());
        }
        let seeds: HashSet<&String> = concept_ids.iter().collect();
        let expanded: Vec<String> = self
            .expand_related(concept_ids, depth)
            .await?
            .into_iter()
            .filter(|id| !seeds.contains(id))
            .collect();
        self.concepts_by_ids(&expanded).await
    }

    async fn outgoing_links(
        &self,
        document_id: &str,
        kinds: &[RelationKind],
    ) -> AtlasResult<Vec<GraphRelationship>> {
        let kind_strs: Vec<&str> = kinds.iter().map(|k| k.as_str()).collect();
        let rows: Vec<RelationRow> = self
            .client
            .select(
                "SELECT source_id, target_id, kind, properties FROM relations \
                 WHERE source_id = $id AND kind IN $kinds",
                json!({ "id": document_id, "kinds": kind_strs }),
            )
            .await?;
        Ok(rows.into_iter().filter_map(RelationRow::into_relationship).collect())
    }

    async fn incoming_links(
        &self,
        document_id: &str,
        kinds: &[RelationKind],
    ) -> AtlasResult<Vec<GraphRelationship>> {
        let kind_strs: Vec<&str> = kinds.iter().map(|k| k.as_str()).collect();
        let rows: Vec<RelationRow> = self
            .client
            .select(
                "SELECT source_id, target_id, kind, properties FROM relations \
                 WHERE target_id = $id AND kind IN $kinds",
                json!({ "id": document_id, "kinds": kind_strs }),
            )
            .await?;
        Ok(rows.into_iter().filter_map(RelationRow::into_relationship).collect())
    }

    async fn delete_document(&self, document_id: &str) -> AtlasResult<bool> {
        if !self.document_exists(document_id).await? {
            return Ok(false);
        }

        let mut touched = vec![document_id.to_string()];
        touched.extend(self.node_ids("sections", document_id).await?);
        touched.extend(self.node_ids("chunks", document_id).await?);

        // Edges first, so a crash mid-delete can never leave an edge whose
        // endpoint record is already gone.
        self.client
            .execute(
                "DELETE relations WHERE source_id IN $ids OR target_id IN $ids",
                json!({ "ids": touched }),
            )
            .await?;
        self.client
            .execute(
                "DELETE chunks WHERE document_id = $id",
                json!({ "id": document_id }),
            )
            .await?;
        self.client
            .execute(
                "DELETE sections WHERE document_id = $id",
                json!({ "id": document_id }),
            )
            .await?;
        self.client
            .execute(
                "DELETE type::thing('documents', $id)",
                json!({ "id": document_id }),
            )
            .await?;
        Ok(true)
    }

    async fn clear_document_content(&self, document_id: &str) -> AtlasResult<()> {
        let mut derived = self.node_ids("sections", document_id).await?;
        derived.extend(self.node_ids("chunks", document_id).await?);

        // Edges before nodes, same as the full cascade. Inbound document
        // edges are deliberately spared: only the linking document's own
        // re-ingest may rewrite them.
        self.client
            .execute(
                "DELETE relations WHERE source_id = $document_id \
                 OR source_id IN $ids OR target_id IN $ids",
                json!({ "document_id": document_id, "ids": derived }),
            )
            .await?;
        self.client
            .execute(
                "DELETE chunks WHERE document_id = $id",
                json!({ "id": document_id }),
            )
            .await?;
        self.client
            .execute(
                "DELETE sections WHERE document_id = $id",
                json!({ "id": document_id }),
            )
            .await
    }

    async fn repoint_concept_edges(
        &self,
        from_concept: &str,
        to_concept: &str,
    ) -> AtlasResult<u64> {
        let rows: Vec<RelationRow> = self
            .client
            .select(
                "SELECT source_id, target_id, kind, properties FROM relations \
                 WHERE source_id = $id OR target_id = $id",
                json!({ "id": from_concept }),
            )
            .await?;

        let mut moved = 0u64;
        for row in rows {
            let Some(kind) = RelationKind::parse(&row.kind) else {
                continue;
            };
            let source = if row.source_id == from_concept {
                to_concept
            } else {
                &row.source_id
            };
            let target = if row.target_id == from_concept {
                to_concept
            } else {
                &row.target_id
            };
            // Edges between the merged pair would become self-loops.
            if source != target {
                self.relate(source, target, kind, row.properties).await?;
                moved += 1;
            }
        }

        self.client
            .execute(
                "DELETE relations WHERE source_id = $id OR target_id = $id",
                json!({ "id": from_concept }),
            )
            .await?;
        Ok(moved)
    }

    async fn delete_concept(&self, id: &str) -> AtlasResult<()> {
        self.client
            .execute(
                "DELETE relations WHERE source_id = $id OR target_id = $id",
                json!({ "id": id }),
            )
            .await?;
        self.client
            .execute("DELETE type::thing('concepts', $id)", json!({ "id": id }))
            .await
    }
}
