//! Related-document resolver
//!
//! Combines the explicit link graph with optional embedding similarity to
//! answer "what should I read next to this document". Relationship classes
//! rank on a fixed ladder: reciprocal links at 1.0, outbound-only at 0.9,
//! incoming-only at 0.85, transitive hops decaying by 0.7 per extra hop, and
//! semantic matches at similarity times 0.8. The visited set is filled in
//! ladder order, so a document reached through a stronger relationship is
//! never downgraded by a weaker path to it.

use atlas_core::{
    AtlasError, AtlasResult, DocumentNode, EmbeddingProvider, GraphStore, RelationKind,
    VectorFilter, VectorStore,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

const OUTBOUND_RELEVANCE: f32 = 0.9;
const INCOMING_RELEVANCE: f32 = 0.85;
const TRANSITIVE_DECAY: f32 = 0.7;
const SEMANTIC_WEIGHT: f32 = 0.8;

/// How a related document was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationClass {
    Bidirectional,
    Outbound,
    Incoming,
    Transitive,
    Semantic,
}

/// One entry in the related-documents result.
#[derive(Debug, Clone)]
pub struct RelatedDocument {
    pub document_id: String,
    pub title: String,
    pub relevance: f32,
    pub class: RelationClass,
    /// The predecessor document for transitive hops.
    pub via: Option<String>,
    /// Link distance from the source; 0 for semantic matches.
    pub hops: u32,
}

/// Per-class counts over the returned set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkSummary {
    pub bidirectional: usize,
    pub outbound: usize,
    pub incoming: usize,
    pub transitive: usize,
    pub semantic: usize,
}

impl LinkSummary {
    fn count(&mut self, class: RelationClass) {
        match class {
            RelationClass::Bidirectional => self.bidirectional += 1,
            RelationClass::Outbound => self.outbound += 1,
            RelationClass::Incoming => self.incoming += 1,
            RelationClass::Transitive => self.transitive += 1,
            RelationClass::Semantic => self.semantic += 1,
        }
    }
}

/// Where the traversal starts: a known document, or free text resolved to
/// its best-matching document via vector search.
#[derive(Debug, Clone)]
pub enum RelatedSource {
    Document(String),
    Query(String),
}

#[derive(Debug, Clone)]
pub struct RelatedRequest {
    pub source: RelatedSource,
    /// Transitive traversal depth, clamped to 3.
    pub depth: u32,
    pub limit: usize,
    pub link_kinds: Vec<RelationKind>,
    pub include_semantic: bool,
    pub doc_type: Option<String>,
}

impl RelatedRequest {
    pub fn new(document_id: impl Into<String>) -> Self {
        Self::with_source(RelatedSource::Document(document_id.into()))
    }

    /// Start from free text instead of a document id; needs a resolver with
    /// a semantic backend attached.
    pub fn from_query(text: impl Into<String>) -> Self {
        Self::with_source(RelatedSource::Query(text.into()))
    }

    fn with_source(source: RelatedSource) -> Self {
        Self {
            source,
            depth: 2,
            limit: 10,
            link_kinds: vec![
                RelationKind::LinksTo,
                RelationKind::DependsOn,
                RelationKind::Supersedes,
            ],
            include_semantic: false,
            doc_type: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RelatedDocumentsResult {
    pub source_id: String,
    pub related: Vec<RelatedDocument>,
    pub link_summary: LinkSummary,
}

struct Candidate {
    relevance: f32,
    class: RelationClass,
    via: Option<String>,
    hops: u32,
}

/// Resolves documents related to a source document. Semantic matching is
/// off unless both an embedder and a vector store are attached.
pub struct RelatedResolver {
    graph: Arc<dyn GraphStore>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    vectors: Option<Arc<dyn VectorStore>>,
}

impl RelatedResolver {
    pub fn new(graph: Arc<dyn GraphStore>) -> Self {
        Self {
            graph,
            embedder: None,
            vectors: None,
        }
    }

    pub fn with_semantic(
        mut self,
        embedder: Arc<dyn EmbeddingProvider>,
        vectors: Arc<dyn VectorStore>,
    ) -> Self {
        self.embedder = Some(embedder);
        self.vectors = Some(vectors);
        self
    }

    pub async fn find_related(&self, request: &RelatedRequest) -> AtlasResult<RelatedDocumentsResult> {
        let source = match &request.source {
            RelatedSource::Document(id) => self
                .graph
                .get_document(id)
                .await?
                .ok_or_else(|| AtlasError::not_found(id.clone()))?,
            RelatedSource::Query(text) => self.resolve_query_source(text).await?,
        };
        let depth = request.depth.min(3);
        info!(source = %source.id, depth, "resolving related documents");

        // Visited map filled strictly in ladder order; first writer wins.
        let mut candidates: HashMap<String, Candidate> = HashMap::new();

        let outgoing = self
            .graph
            .outgoing_links(&source.id, &request.link_kinds)
            .await?;
        let incoming = self
            .graph
            .incoming_links(&source.id, &request.link_kinds)
            .await?;
        let links_back: Vec<&str> = incoming.iter().map(|l| l.source_id.as_str()).collect();

        let mut direct_targets = Vec::new();
        for link in &outgoing {
            if link.target_id == source.id {
                continue;
            }
            direct_targets.push(link.target_id.clone());
            let reciprocal = links_back.contains(&link.target_id.as_str());
            candidates.entry(link.target_id.clone()).or_insert(Candidate {
                relevance: if reciprocal { 1.0 } else { OUTBOUND_RELEVANCE },
                class: if reciprocal {
                    RelationClass::Bidirectional
                } else {
                    RelationClass::Outbound
                },
                via: None,
                hops: 1,
            });
        }

        for link in &incoming {
            if link.source_id == source.id {
                continue;
            }
            candidates.entry(link.source_id.clone()).or_insert(Candidate {
                relevance: INCOMING_RELEVANCE,
                class: RelationClass::Incoming,
                via: None,
                hops: 1,
            });
        }

        // Transitive expansion follows outgoing links from each frontier
        // document, one level per hop.
        let mut frontier = direct_targets;
        for hop in 2..=depth {
            let decay = OUTBOUND_RELEVANCE * TRANSITIVE_DECAY.powi(hop as i32 - 1);
            let mut next = Vec::new();
            for predecessor in &frontier {
                let links = self
                    .graph
                    .outgoing_links(predecessor, &request.link_kinds)
                    .await?;
                for link in links {
                    if link.target_id == source.id || candidates.contains_key(&link.target_id) {
                        continue;
                    }
                    debug!(target = %link.target_id, via = %predecessor, hop, "transitive hit");
                    next.push(link.target_id.clone());
                    candidates.insert(
                        link.target_id.clone(),
                        Candidate {
                            relevance: decay,
                            class: RelationClass::Transitive,
                            via: Some(predecessor.clone()),
                            hops: hop,
                        },
                    );
                }
            }
            frontier = next;
        }

        if request.include_semantic {
            self.add_semantic_matches(&source.id, &source.title, request, &mut candidates)
                .await?;
        }

        let mut related = Vec::new();
        let mut link_summary = LinkSummary::default();
        for (document_id, candidate) in candidates {
            let Some(doc) = self.graph.get_document(&document_id).await? else {
                continue;
            };
            if let Some(kind) = &request.doc_type {
                if doc.doc_type.as_deref() != Some(kind.as_str()) {
                    continue;
                }
            }
            link_summary.count(candidate.class);
            related.push(RelatedDocument {
                document_id,
                title: doc.title,
                relevance: candidate.relevance,
                class: candidate.class,
                via: candidate.via,
                hops: candidate.hops,
            });
        }
        related.sort_by(|a, b| {
            b.relevance
                .partial_cmp(&a.relevance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.document_id.cmp(&b.document_id))
        });
        related.truncate(request.limit);

        Ok(RelatedDocumentsResult {
            source_id: source.id,
            related,
            link_summary,
        })
    }

    /// Resolve free text to the document whose chunks best match it.
    async fn resolve_query_source(&self, text: &str) -> AtlasResult<DocumentNode> {
        let (Some(embedder), Some(vectors)) = (&self.embedder, &self.vectors) else {
            return Err(AtlasError::config(
                "resolving a query source requires a vector backend",
            ));
        };
        let embedding = embedder.embed(text).await?.embedding;
        let matches = vectors.search(&embedding, 1, &VectorFilter::default()).await?;
        let best = matches
            .into_iter()
            .next()
            .ok_or_else(|| AtlasError::not_found(format!("no document matches: {}", text)))?;
        self.graph
            .get_document(&best.metadata.document_id)
            .await?
            .ok_or_else(|| AtlasError::not_found(best.metadata.document_id.clone()))
    }

    async fn add_semantic_matches(
        &self,
        source_id: &str,
        source_title: &str,
        request: &RelatedRequest,
        candidates: &mut HashMap<String, Candidate>,
    ) -> AtlasResult<()> {
        let (Some(embedder), Some(vectors)) = (&self.embedder, &self.vectors) else {
            debug!("semantic matching requested but no vector backend attached");
            return Ok(());
        };

        // The source's own text stands in for "documents like this one":
        // title plus the opening chunk's content.
        let mut seed_text = source_title.to_string();
        if let Some(first) = self.graph.chunks_of_document(source_id).await?.first() {
            seed_text.push('\n');
            seed_text.push_str(&first.content);
        }
        let embedding = embedder.embed(&seed_text).await?.embedding;
        let matches = vectors
            .search(&embedding, request.limit, &VectorFilter::default())
            .await?;

        for vector_match in matches {
            let document_id = vector_match.metadata.document_id;
            if document_id == source_id || candidates.contains_key(&document_id) {
                continue;
            }
            candidates.insert(
                document_id,
                Candidate {
                    relevance: vector_match.score * SEMANTIC_WEIGHT,
                    class: RelationClass::Semantic,
                    via: None,
                    hops: 0,
                },
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitive_relevance_decays_per_hop() {
        let hop2 = OUTBOUND_RELEVANCE * TRANSITIVE_DECAY.powi(1);
        let hop3 = OUTBOUND_RELEVANCE * TRANSITIVE_DECAY.powi(2);
        assert!((hop2 - 0.63).abs() < 1e-6);
        assert!((hop3 - 0.441).abs() < 1e-6);
        assert!(hop2 < INCOMING_RELEVANCE && hop3 < hop2);
    }

    #[test]
    fn request_defaults_cover_explicit_link_kinds() {
        let request = RelatedRequest::new("docs:a.md");
        assert!(matches!(request.source, RelatedSource::Document(ref id) if id == "docs:a.md"));
        assert_eq!(request.depth, 2);
        assert_eq!(request.limit, 10);
        assert!(request.link_kinds.contains(&RelationKind::LinksTo));
        assert!(request.link_kinds.contains(&RelationKind::DependsOn));
        assert!(request.link_kinds.contains(&RelationKind::Supersedes));
        assert!(!request.include_semantic);

        let query = RelatedRequest::from_query("cache eviction");
        assert!(matches!(query.source, RelatedSource::Query(_)));
    }
}
