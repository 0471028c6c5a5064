//! Store and provider contracts
//!
//! Infrastructure implements these; the ingestion service and query pipeline
//! depend only on the abstractions so tests can substitute in-memory stores
//! and mock providers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AtlasResult;
use crate::types::{
    ChunkNode, ConceptNode, DocumentNode, ExtractedEntity, GraphRelationship, RelationKind,
    SectionNode,
};

/// Model capability tier for generation calls. The escalated tier is
/// substituted when synthesis signals low confidence or the step budget is
/// exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelTier {
    Default,
    Escalated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// A single message in a generation conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmMessage {
    pub role: MessageRole,
    pub content: String,
}

impl LlmMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: MessageRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: MessageRole::Assistant, content: content.into() }
    }
}

/// Response from an embedding call.
#[derive(Debug, Clone)]
pub struct EmbeddingResponse {
    pub embedding: Vec<f32>,
    pub model: String,
}

/// Maps text to a fixed-dimension vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> AtlasResult<EmbeddingResponse>;

    /// Output dimensionality; all vectors in one store must agree.
    fn dimensions(&self) -> usize;

    fn provider_name(&self) -> &str;
}

/// Response from a generation call.
#[derive(Debug, Clone)]
pub struct GeneratedText {
    pub text: String,
    pub model: String,
}

/// Tiered text generation over a chat-style API.
#[async_trait]
pub trait TextGenerationProvider: Send + Sync {
    async fn generate(
        &self,
        system_prompt: &str,
        messages: &[LlmMessage],
        tier: ModelTier,
    ) -> AtlasResult<GeneratedText>;

    fn provider_name(&self) -> &str;
}

/// LLM-backed entity extraction over a text span. May return an empty list;
/// failures are recoverable and must not abort the caller's sibling units.
#[async_trait]
pub trait EntityExtractor: Send + Sync {
    async fn extract_entities(&self, text: &str) -> AtlasResult<Vec<ExtractedEntity>>;
}

/// Metadata stored with every chunk vector. The key names are load-bearing:
/// they are the filterable fields of the vector store and must match exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorMetadata {
    pub document_id: String,
    pub section_id: String,
    pub chunk_id: String,
    pub file_path: String,
    pub repository: String,
    pub header_path: String,
}

/// A chunk embedding plus its filterable metadata.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    /// Chunk id; also the vector store key.
    pub id: String,
    pub embedding: Vec<f32>,
    pub metadata: VectorMetadata,
}

/// Metadata filter for k-NN search. `document_ids` is how callers express
/// doc-type filters: the graph resolves types to ids, the vector store only
/// ever filters on its own metadata keys.
#[derive(Debug, Clone, Default)]
pub struct VectorFilter {
    pub repository: Option<String>,
    pub document_ids: Option<Vec<String>>,
}

impl VectorFilter {
    pub fn is_empty(&self) -> bool {
        self.repository.is_none() && self.document_ids.is_none()
    }
}

/// One k-NN search hit.
#[derive(Debug, Clone)]
pub struct VectorMatch {
    pub chunk_id: String,
    pub score: f32,
    pub metadata: VectorMetadata,
}

/// Chunk-embedding store with metadata-filtered k-NN search.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or overwrite one chunk vector.
    async fn index(&self, record: &VectorRecord) -> AtlasResult<()>;

    /// Remove all vectors belonging to a document. Must run before the graph
    /// cascade delete so a reader never sees a vector hit pointing at a
    /// deleted graph node.
    async fn delete_document(&self, document_id: &str) -> AtlasResult<()>;

    /// k-NN search by cosine similarity, optionally metadata-filtered.
    /// Results are ordered by score descending.
    async fn search(
        &self,
        vector: &[f32],
        k: usize,
        filter: &VectorFilter,
    ) -> AtlasResult<Vec<VectorMatch>>;
}

/// Property-graph repository over Document/Section/Chunk/Concept nodes.
///
/// All upserts are keyed by the node's string id; ids are deterministic
/// (see [`crate::identity`]) so ingestion is idempotent.
#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn upsert_document(&self, doc: &DocumentNode) -> AtlasResult<()>;
    async fn upsert_section(&self, section: &SectionNode) -> AtlasResult<()>;
    async fn upsert_chunk(&self, chunk: &ChunkNode) -> AtlasResult<()>;
    async fn upsert_concept(&self, concept: &ConceptNode) -> AtlasResult<()>;

    /// Create or overwrite a typed edge; idempotent per
    /// `(source, target, kind)`.
    async fn relate(
        &self,
        source_id: &str,
        target_id: &str,
        kind: RelationKind,
        properties: Value,
    ) -> AtlasResult<()>;

    async fn get_document(&self, id: &str) -> AtlasResult<Option<DocumentNode>>;
    async fn document_exists(&self, id: &str) -> AtlasResult<bool>;
    async fn documents_by_type(&self, repository: Option<&str>, doc_type: &str)
        -> AtlasResult<Vec<DocumentNode>>;

    async fn sections_of(&self, document_id: &str) -> AtlasResult<Vec<SectionNode>>;
    async fn chunks_of_document(&self, document_id: &str) -> AtlasResult<Vec<ChunkNode>>;
    async fn get_chunks(&self, ids: &[String]) -> AtlasResult<Vec<ChunkNode>>;

    async fn get_concept(&self, id: &str) -> AtlasResult<Option<ConceptNode>>;
    async fn list_concepts(&self) -> AtlasResult<Vec<ConceptNode>>;

    /// Concepts mentioned by any of the given chunks.
    async fn concepts_mentioned_by(&self, chunk_ids: &[String]) -> AtlasResult<Vec<ConceptNode>>;

    /// Chunks mentioning the given concepts, expanding the concept set via
    /// `RELATED_TO` edges up to `max_hops`.
    async fn chunks_mentioning(
        &self,
        concept_ids: &[String],
        max_hops: u8,
    ) -> AtlasResult<Vec<ChunkNode>>;

    /// Concepts reachable from the given set via `RELATED_TO`, up to `depth`.
    async fn concept_neighbors(
        &self,
        concept_ids: &[String],
        depth: u8,
    ) -> AtlasResult<Vec<ConceptNode>>;

    /// Outgoing document edges of the given kinds.
    async fn outgoing_links(
        &self,
        document_id: &str,
        kinds: &[RelationKind],
    ) -> AtlasResult<Vec<GraphRelationship>>;

    /// Incoming document edges of the given kinds (reverse scan).
    async fn incoming_links(
        &self,
        document_id: &str,
        kinds: &[RelationKind],
    ) -> AtlasResult<Vec<GraphRelationship>>;

    /// Cascade delete: the document, its sections and chunks, and every edge
    /// touching them. Concept nodes are never deleted here; shared concepts
    /// must survive the removal of any one mentioning document.
    /// Returns false if the document did not exist.
    async fn delete_document(&self, document_id: &str) -> AtlasResult<bool>;

    /// Drop a document's derived content ahead of a rewrite: its sections,
    /// chunks, every edge touching them, and the document's own outgoing
    /// edges. The document node itself and edges pointing at it from other
    /// documents are kept, so inbound links survive re-ingestion.
    async fn clear_document_content(&self, document_id: &str) -> AtlasResult<()>;

    /// Re-point every edge touching `from_concept` onto `to_concept`;
    /// used by the concept merge pass. Returns the number of moved edges.
    async fn repoint_concept_edges(
        &self,
        from_concept: &str,
        to_concept: &str,
    ) -> AtlasResult<u64>;

    async fn delete_concept(&self, id: &str) -> AtlasResult<()>;
}
