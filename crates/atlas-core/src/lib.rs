//! Atlas core domain layer
//!
//! Defines the node and relationship types of the knowledge graph, the pure
//! identity functions that make ingestion idempotent, the error taxonomy, and
//! the store/provider traits that infrastructure crates implement. Following
//! the Dependency Inversion Principle, this crate holds only abstractions;
//! concrete SurrealDB stores and LLM providers live in `atlas-graph` and
//! `atlas-llm`.

pub mod error;
pub mod identity;
pub mod traits;
pub mod types;

pub use error::{AtlasError, AtlasResult};
pub use identity::{
    chunk_id, concept_id, document_id, normalize_concept_name, resolve_relative_link, section_id,
    slug,
};
pub use traits::{
    EmbeddingProvider, EmbeddingResponse, EntityExtractor, GeneratedText, GraphStore, LlmMessage,
    MessageRole, ModelTier, TextGenerationProvider, VectorFilter, VectorMatch, VectorMetadata,
    VectorRecord, VectorStore,
};
pub use types::{
    ChunkNode, ConceptNode, DocumentMetadata, DocumentNode, ExtractedEntity, GraphRelationship,
    RelationKind, SectionNode,
};
