//! Document ingestion service
//!
//! One `ingest` call takes raw markdown plus caller metadata through parse,
//! chunk, graph upsert, embedding, entity extraction, and link resolution.
//! All ids are deterministic, so re-ingesting a `(repository, file_path)`
//! pair overwrites its previous version instead of duplicating it.
//!
//! Failure scoping: an embedding or extraction failure costs only that
//! chunk, an unresolvable link costs only that link. Cancellation is checked
//! between units and surfaces as [`AtlasError::Cancelled`], leaving already
//! written nodes in place.

use atlas_core::{
    identity, AtlasError, AtlasResult, ChunkNode, ConceptNode, DocumentMetadata, DocumentNode,
    EmbeddingProvider, EntityExtractor, GraphStore, RelationKind, SectionNode, VectorMetadata,
    VectorRecord, VectorStore,
};
use atlas_parser::{parse_markdown, HeaderChunker, ParsedMarkdown};
use futures::stream::{self, StreamExt};
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::options::IngestOptions;

/// What one ingest run produced.
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    pub document_id: String,
    pub sections: usize,
    pub chunks: usize,
    pub chunks_embedded: usize,
    pub concepts_linked: usize,
    pub links_created: usize,
    /// Units skipped after a recoverable failure, with the cause.
    pub skipped_units: Vec<String>,
}

/// Orchestrates parsing, storage, and enrichment for one document at a time.
pub struct IngestionService {
    graph: Arc<dyn GraphStore>,
    vectors: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    extractor: Arc<dyn EntityExtractor>,
    options: IngestOptions,
}

impl IngestionService {
    pub fn new(
        graph: Arc<dyn GraphStore>,
        vectors: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        extractor: Arc<dyn EntityExtractor>,
        options: IngestOptions,
    ) -> AtlasResult<Self> {
        options.validate()?;
        Ok(Self {
            graph,
            vectors,
            embedder,
            extractor,
            options,
        })
    }

    /// Ingest one markdown document.
    pub async fn ingest(
        &self,
        raw: &str,
        metadata: &DocumentMetadata,
        cancel: &CancellationToken,
    ) -> AtlasResult<IngestReport> {
        let document_id = metadata.document_id();
        info!(%document_id, "ingesting document");

        let parsed = parse_markdown(raw);
        let plan = HeaderChunker::new(self.options.chunk_threshold_lines).chunk(&parsed);

        let mut report = IngestReport {
            document_id: document_id.clone(),
            ..Default::default()
        };

        self.checkpoint(cancel)?;
        // A prior version's sections, chunks, and vectors must not outlive
        // re-ingestion: a shrunk or restructured document would otherwise
        // keep stale content retrievable under its old ids. Vectors go
        // first, same ordering as deletion.
        self.vectors.delete_document(&document_id).await?;
        self.graph.clear_document_content(&document_id).await?;

        let doc = DocumentNode::from_metadata(metadata);
        self.graph.upsert_document(&doc).await?;

        // Sections and chunks are written before any provider call so that a
        // total embedding outage still leaves a complete graph skeleton.
        let mut section_ids = Vec::with_capacity(plan.sections.len());
        for planned in &plan.sections {
            let section = SectionNode {
                id: identity::section_id(&document_id, &planned.title),
                document_id: document_id.clone(),
                title: planned.title.clone(),
                order: planned.order,
                level: planned.level,
            };
            self.graph.upsert_section(&section).await?;
            self.graph
                .relate(&document_id, &section.id, RelationKind::HasSection, json!({}))
                .await?;
            section_ids.push(section.id);
        }
        report.sections = section_ids.len();

        let mut chunks = Vec::with_capacity(plan.chunks.len());
        for planned in &plan.chunks {
            self.checkpoint(cancel)?;
            let chunk = ChunkNode {
                id: identity::chunk_id(&document_id, planned.order),
                section_id: section_ids[planned.section_index].clone(),
                document_id: document_id.clone(),
                order: planned.order,
                header_path: planned.header_path.clone(),
                content: planned.content.clone(),
                token_count: planned.token_count,
                start_line: planned.start_line,
                end_line: planned.end_line,
            };
            self.graph.upsert_chunk(&chunk).await?;
            let kind = if planned.from_subsection {
                RelationKind::HasSubsection
            } else {
                RelationKind::HasChunk
            };
            self.graph
                .relate(&chunk.section_id, &chunk.id, kind, json!({}))
                .await?;
            chunks.push(chunk);
        }
        report.chunks = chunks.len();

        self.embed_chunks(metadata, &chunks, cancel, &mut report).await?;
        self.extract_concepts(&chunks, cancel, &mut report).await?;
        self.resolve_links(metadata, &parsed, &document_id, cancel, &mut report)
            .await?;

        info!(
            %document_id,
            chunks = report.chunks,
            embedded = report.chunks_embedded,
            concepts = report.concepts_linked,
            links = report.links_created,
            skipped = report.skipped_units.len(),
            "ingest complete"
        );
        Ok(report)
    }

    /// Remove a document everywhere. Vectors go first: a vector hit pointing
    /// at a missing graph node is worse than a briefly unsearchable chunk.
    pub async fn delete_document(&self, document_id: &str) -> AtlasResult<bool> {
        self.vectors.delete_document(document_id).await?;
        let existed = self.graph.delete_document(document_id).await?;
        info!(%document_id, existed, "document deleted");
        Ok(existed)
    }

    fn checkpoint(&self, cancel: &CancellationToken) -> AtlasResult<()> {
        if cancel.is_cancelled() {
            return Err(AtlasError::Cancelled);
        }
        Ok(())
    }

    async fn embed_chunks(
        &self,
        metadata: &DocumentMetadata,
        chunks: &[ChunkNode],
        cancel: &CancellationToken,
        report: &mut IngestReport,
    ) -> AtlasResult<()> {
        let results: Vec<(String, AtlasResult<()>)> = stream::iter(chunks)
            .map(|chunk| {
                let embedder = self.embedder.clone();
                let vectors = self.vectors.clone();
                async move {
                    if cancel.is_cancelled() {
                        return (chunk.id.clone(), Err(AtlasError::Cancelled));
                    }
                    let result = async {
                        let response = embedder.embed(&chunk.content).await?;
                        vectors
                            .index(&VectorRecord {
                                id: chunk.id.clone(),
                                embedding: response.embedding,
                                metadata: VectorMetadata {
                                    document_id: chunk.document_id.clone(),
                                    section_id: chunk.section_id.clone(),
                                    chunk_id: chunk.id.clone(),
                                    file_path: metadata.file_path.clone(),
                                    repository: metadata.repository.clone(),
                                    header_path: chunk.header_path.clone(),
                                },
                            })
                            .await
                    }
                    .await;
                    (chunk.id.clone(), result)
                }
            })
            .buffer_unordered(self.options.max_concurrency)
            .collect()
            .await;

        for (chunk_id, result) in results {
            match result {
                Ok(()) => report.chunks_embedded += 1,
                Err(err) if err.is_cancelled() => return Err(err),
                Err(err) if err.is_unit_scoped() => {
                    warn!(%chunk_id, error = %err, "skipping chunk embedding");
                    report.skipped_units.push(format!("embed {}: {}", chunk_id, err));
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    async fn extract_concepts(
        &self,
        chunks: &[ChunkNode],
        cancel: &CancellationToken,
        report: &mut IngestReport,
    ) -> AtlasResult<()> {
        let results: Vec<(String, AtlasResult<usize>)> = stream::iter(chunks)
            .map(|chunk| {
                let extractor = self.extractor.clone();
                let graph = self.graph.clone();
                async move {
                    if cancel.is_cancelled() {
                        return (chunk.id.clone(), Err(AtlasError::Cancelled));
                    }
                    let result = async {
                        let entities = extractor.extract_entities(&chunk.content).await?;
                        let mut linked = 0;
                        for entity in entities {
                            let concept = ConceptNode::from_entity(&entity);
                            graph.upsert_concept(&concept).await?;
                            graph
                                .relate(&chunk.id, &concept.id, RelationKind::Mentions, json!({}))
                                .await?;
                            linked += 1;
                        }
                        Ok(linked)
                    }
                    .await;
                    (chunk.id.clone(), result)
                }
            })
            .buffer_unordered(self.options.max_concurrency)
            .collect()
            .await;

        for (chunk_id, result) in results {
            match result {
                Ok(linked) => report.concepts_linked += linked,
                Err(err) if err.is_cancelled() => return Err(err),
                Err(err) if err.is_unit_scoped() => {
                    warn!(%chunk_id, error = %err, "skipping entity extraction");
                    report
                        .skipped_units
                        .push(format!("extract {}: {}", chunk_id, err));
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    async fn resolve_links(
        &self,
        metadata: &DocumentMetadata,
        parsed: &ParsedMarkdown,
        document_id: &str,
        cancel: &CancellationToken,
        report: &mut IngestReport,
    ) -> AtlasResult<()> {
        for link in &parsed.links {
            self.checkpoint(cancel)?;
            let Some(target_path) = identity::resolve_relative_link(&metadata.file_path, &link.target)
            else {
                continue;
            };
            let target_id = identity::document_id(&metadata.repository, &target_path);
            if target_id == document_id {
                continue;
            }
            // Dangling edges are never stored: targets must already exist.
            if !self.graph.document_exists(&target_id).await? {
                debug!(target = %target_id, "link target not in corpus, skipping");
                continue;
            }
            self.graph
                .relate(
                    document_id,
                    &target_id,
                    RelationKind::LinksTo,
                    json!({ "line": link.line }),
                )
                .await?;
            report.links_created += 1;
        }

        if let Some(frontmatter) = &parsed.frontmatter {
            for (key, kind) in [
                ("depends_on", RelationKind::DependsOn),
                ("supersedes", RelationKind::Supersedes),
            ] {
                for reference in frontmatter.document_refs(key) {
                    self.checkpoint(cancel)?;
                    let Some(target_path) =
                        identity::resolve_relative_link(&metadata.file_path, &reference)
                    else {
                        continue;
                    };
                    let target_id = identity::document_id(&metadata.repository, &target_path);
                    if target_id == document_id
                        || !self.graph.document_exists(&target_id).await?
                    {
                        continue;
                    }
                    self.graph
                        .relate(document_id, &target_id, kind, json!({ "declared": key }))
                        .await?;
                    report.links_created += 1;
                }
            }
        }
        Ok(())
    }
}
