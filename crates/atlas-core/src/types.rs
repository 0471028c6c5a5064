//! Graph node and relationship types
//!
//! All identifiers are plain strings built by the functions in
//! [`crate::identity`], so re-ingesting the same `(repository, file_path)`
//! overwrites rather than duplicates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::identity;

/// Caller-supplied metadata accompanying a raw document at ingestion time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Source repository key; the tenant/isolation boundary.
    pub repository: String,
    /// Path of the file within its repository, forward slashes.
    pub file_path: String,
    /// Human-readable document title.
    pub title: String,
    /// Free-form document type (e.g. "adr", "runbook").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<String>,
    /// Visibility tier used to boost search ranking.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotion_level: Option<String>,
    /// Commit the content was taken from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_hash: Option<String>,
}

impl DocumentMetadata {
    pub fn new(
        repository: impl Into<String>,
        file_path: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            repository: repository.into(),
            file_path: file_path.into(),
            title: title.into(),
            doc_type: None,
            promotion_level: None,
            commit_hash: None,
        }
    }

    /// Repo-qualified document id, the upsert key.
    pub fn document_id(&self) -> String {
        identity::document_id(&self.repository, &self.file_path)
    }
}

/// A versioned markdown document in the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentNode {
    /// `"{repository}:{file_path}"`.
    pub id: String,
    pub repository: String,
    pub file_path: String,
    pub title: String,
    #[serde(default)]
    pub doc_type: Option<String>,
    #[serde(default)]
    pub promotion_level: Option<String>,
    #[serde(default)]
    pub commit_hash: Option<String>,
    pub ingested_at: DateTime<Utc>,
}

impl DocumentNode {
    pub fn from_metadata(meta: &DocumentMetadata) -> Self {
        Self {
            id: meta.document_id(),
            repository: meta.repository.clone(),
            file_path: meta.file_path.clone(),
            title: meta.title.clone(),
            doc_type: meta.doc_type.clone(),
            promotion_level: meta.promotion_level.clone(),
            commit_hash: meta.commit_hash.clone(),
            ingested_at: Utc::now(),
        }
    }
}

/// One top-level (H2) section of a document, or the synthetic "Introduction"
/// holding pre-heading or headerless content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionNode {
    /// `"{document_id}:{slug(title)}"`.
    pub id: String,
    pub document_id: String,
    pub title: String,
    /// Position within the document, stable and monotonic.
    pub order: u32,
    /// Heading level that spawned the section (2 for regular, 2 for synthetic).
    pub level: u8,
}

/// Smallest retrievable unit: a header-delimited span of document text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkNode {
    pub id: String,
    pub section_id: String,
    pub document_id: String,
    /// 0-based position within the document.
    pub order: u32,
    /// Rendered as `"## Title > ### Subtitle"` with literal heading markers.
    pub header_path: String,
    pub content: String,
    /// Cheap proxy: `ceil(content.len() / 4)`.
    pub token_count: u32,
    pub start_line: u32,
    pub end_line: u32,
}

/// A deduplicated, cross-repository semantic entity discovered by LLM
/// extraction. `concept_type` is an open string: the vocabulary is unbounded
/// and discovered at runtime, never a closed enum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptNode {
    /// `"concept:" + normalize(name)`; identity is a pure function of the
    /// normalized name, which is what deduplicates concepts across repos.
    pub id: String,
    pub name: String,
    pub concept_type: String,
    pub description: String,
}

impl ConceptNode {
    pub fn from_entity(entity: &ExtractedEntity) -> Self {
        Self {
            id: identity::concept_id(&entity.name),
            name: entity.name.clone(),
            concept_type: entity.entity_type.clone(),
            description: entity.description.clone(),
        }
    }
}

/// `(name, type, description)` tuple returned by the entity extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedEntity {
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    #[serde(default)]
    pub description: String,
}

/// Typed relationship between two graph nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationKind {
    /// Document -> Section.
    HasSection,
    /// Section -> Chunk, for chunks split out of an H3 subsection.
    HasSubsection,
    /// Section -> Chunk.
    HasChunk,
    /// Chunk -> Concept.
    Mentions,
    /// Document -> Document, from resolved relative links.
    LinksTo,
    /// Document -> Document, author-declared.
    DependsOn,
    /// Document -> Document, author-declared.
    Supersedes,
    /// Concept -> Concept, weighted.
    RelatedTo,
}

impl RelationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationKind::HasSection => "HAS_SECTION",
            RelationKind::HasSubsection => "HAS_SUBSECTION",
            RelationKind::HasChunk => "HAS_CHUNK",
            RelationKind::Mentions => "MENTIONS",
            RelationKind::LinksTo => "LINKS_TO",
            RelationKind::DependsOn => "DEPENDS_ON",
            RelationKind::Supersedes => "SUPERSEDES",
            RelationKind::RelatedTo => "RELATED_TO",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "HAS_SECTION" => Some(RelationKind::HasSection),
            "HAS_SUBSECTION" => Some(RelationKind::HasSubsection),
            "HAS_CHUNK" => Some(RelationKind::HasChunk),
            "MENTIONS" => Some(RelationKind::Mentions),
            "LINKS_TO" => Some(RelationKind::LinksTo),
            "DEPENDS_ON" => Some(RelationKind::DependsOn),
            "SUPERSEDES" => Some(RelationKind::Supersedes),
            "RELATED_TO" => Some(RelationKind::RelatedTo),
            _ => None,
        }
    }
}

impl std::fmt::Display for RelationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed edge with an open JSON properties bag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphRelationship {
    pub source_id: String,
    pub target_id: String,
    pub kind: RelationKind,
    #[serde(default)]
    pub properties: Value,
}

impl GraphRelationship {
    pub fn new(source_id: impl Into<String>, target_id: impl Into<String>, kind: RelationKind) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            kind,
            properties: Value::Null,
        }
    }

    pub fn with_properties(mut self, properties: Value) -> Self {
        self.properties = properties;
        self
    }
}
