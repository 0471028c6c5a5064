//! End-to-end tests: ingest through the real services into in-memory
//! SurrealDB, then query with scripted mock providers.

use async_trait::async_trait;
use atlas_core::{
    AtlasResult, DocumentMetadata, DocumentNode, EntityExtractor, ExtractedEntity, GraphStore,
    ModelTier, RelationKind,
};
use atlas_graph::{schema, SurrealClient, SurrealGraphStore, SurrealVectorStore};
use atlas_ingest::{IngestOptions, IngestionService};
use atlas_llm::{MockEmbeddingProvider, MockTextProvider};
use atlas_query::{
    QueryOptions, QueryPipeline, RelatedRequest, RelatedResolver, RelationClass, SessionContext,
    SessionMode, Stage,
};
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

struct NoEntities;

#[async_trait]
impl EntityExtractor for NoEntities {
    async fn extract_entities(&self, _text: &str) -> AtlasResult<Vec<ExtractedEntity>> {
        Ok(Vec::new())
    }
}

/// Tags every chunk with a single fixed entity.
struct OneEntity(&'static str);

#[async_trait]
impl EntityExtractor for OneEntity {
    async fn extract_entities(&self, _text: &str) -> AtlasResult<Vec<ExtractedEntity>> {
        Ok(vec![ExtractedEntity {
            name: self.0.to_string(),
            entity_type: "technology".to_string(),
            description: format!("{} entity", self.0),
        }])
    }
}

struct Fixture {
    graph: Arc<SurrealGraphStore>,
    vectors: Arc<SurrealVectorStore>,
    embedder: Arc<MockEmbeddingProvider>,
    generator: Arc<MockTextProvider>,
}

impl Fixture {
    async fn new() -> Self {
        let client = SurrealClient::new_memory().await.unwrap();
        schema::initialize(&client).await.unwrap();
        Self {
            graph: Arc::new(SurrealGraphStore::new(client.clone())),
            vectors: Arc::new(SurrealVectorStore::new(client)),
            embedder: Arc::new(MockEmbeddingProvider::with_dimensions(64)),
            generator: Arc::new(MockTextProvider::new()),
        }
    }

    fn ingestor(&self, extractor: Arc<dyn EntityExtractor>) -> IngestionService {
        IngestionService::new(
            self.graph.clone(),
            self.vectors.clone(),
            self.embedder.clone(),
            extractor,
            IngestOptions::default(),
        )
        .unwrap()
    }

    fn pipeline(&self) -> QueryPipeline {
        QueryPipeline::new(
            self.graph.clone(),
            self.vectors.clone(),
            self.embedder.clone(),
            self.generator.clone(),
        )
    }

    async fn ingest(&self, body: &str, meta: &DocumentMetadata) {
        self.ingestor(Arc::new(NoEntities))
            .ingest(body, meta, &CancellationToken::new())
            .await
            .unwrap();
    }
}

const TOY_DOC: &str = "## Alpha\n\nFirst.\n\n## Beta\n\nSecond.\n";

fn lenient_options() -> QueryOptions {
    // The bag-of-words mock gives real but modest cosine scores, so the
    // relevance floor drops below the production default here.
    QueryOptions {
        min_relevance_score: 0.3,
        ..QueryOptions::default()
    }
}

#[tokio::test]
async fn answers_from_ingested_document_with_attribution() {
    let fx = Fixture::new().await;
    fx.ingest(TOY_DOC, &DocumentMetadata::new("docs", "guide.md", "Guide"))
        .await;

    fx.generator
        .push_response("Second. [1]\n\nCONFIDENCE: high");
    let result = fx
        .pipeline()
        .query("Second", &lenient_options())
        .await
        .unwrap();

    assert_eq!(result.answer, "Second. [1]");
    assert!((result.confidence - 0.9).abs() < f32::EPSILON);
    assert_eq!(
        result.stages_run,
        vec![Stage::InitialRetrieval, Stage::Synthesis]
    );

    // The Beta chunk shares the query's vocabulary and must rank first.
    let top = &result.sources[0];
    assert_eq!(top.header_path, "## Beta");
    assert_eq!(top.document_id, "docs:guide.md");
    assert_eq!(top.file_path, "guide.md");
    assert!(top.score > 0.0);
}

#[tokio::test]
async fn concept_expansion_pulls_chunks_via_selected_concepts() {
    let fx = Fixture::new().await;
    let ingestor = fx.ingestor(Arc::new(OneEntity("Kubernetes")));
    let cancel = CancellationToken::new();
    ingestor
        .ingest(
            "## Beta\n\nSecond.\n",
            &DocumentMetadata::new("docs", "a.md", "A"),
            &cancel,
        )
        .await
        .unwrap();
    ingestor
        .ingest(
            "## Other\n\nUnrelated words entirely.\n",
            &DocumentMetadata::new("docs", "b.md", "B"),
            &cancel,
        )
        .await
        .unwrap();

    // First generation call routes concepts, second synthesizes.
    fx.generator.push_response(r#"["concept:kubernetes"]"#);
    fx.generator.push_response("Answer.\n\nCONFIDENCE: medium");

    let result = fx
        .pipeline()
        .query("Second", &lenient_options())
        .await
        .unwrap();

    assert!(result.stages_run.contains(&Stage::ConceptExpansion));
    assert!(result.related_concepts.iter().any(|c| c == "Kubernetes"));
    // The unrelated document's chunk came in through the shared concept,
    // with no vector score of its own.
    assert!(result
        .sources
        .iter()
        .any(|s| s.document_id == "docs:b.md" && s.score == 0.0));
    assert_eq!(fx.generator.call_count(), 2);
}

#[tokio::test]
async fn routing_refusal_skips_expansion() {
    let fx = Fixture::new().await;
    let ingestor = fx.ingestor(Arc::new(OneEntity("Kubernetes")));
    ingestor
        .ingest(
            TOY_DOC,
            &DocumentMetadata::new("docs", "guide.md", "Guide"),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    fx.generator.push_response("I would not expand anything.");
    fx.generator.push_response("Answer.\n\nCONFIDENCE: high");

    let result = fx
        .pipeline()
        .query("Second", &lenient_options())
        .await
        .unwrap();

    assert!(result
        .traversal_log
        .iter()
        .any(|line| line == "concept expansion: routing declined"));
    // Refusal means no chunks beyond the vector hits.
    assert!(result.sources.iter().all(|s| s.document_id == "docs:guide.md"));
}

#[tokio::test]
async fn document_traversal_follows_selected_dependency_edges() {
    let fx = Fixture::new().await;
    fx.ingest(
        "## Base\n\nFoundation text.\n",
        &DocumentMetadata::new("docs", "base.md", "Base"),
    )
    .await;
    fx.ingest(
        "---\ndepends_on: base.md\n---\n## Beta\n\nSecond.\n",
        &DocumentMetadata::new("docs", "new.md", "New"),
    )
    .await;

    // No concepts ingested, so the first call is traversal routing.
    fx.generator.push_response(r#"["docs:base.md"]"#);
    fx.generator.push_response("Answer. [1][2]\n\nCONFIDENCE: high");

    let result = fx
        .pipeline()
        .query("Second", &lenient_options())
        .await
        .unwrap();

    assert!(result.stages_run.contains(&Stage::DocumentTraversal));
    assert!(result
        .sources
        .iter()
        .any(|s| s.document_id == "docs:base.md"));

    let routing = &fx.generator.calls()[0];
    assert!(routing.messages[0].content.contains("DEPENDS_ON"));
}

#[tokio::test]
async fn low_confidence_escalates_once() {
    let fx = Fixture::new().await;
    fx.ingest(TOY_DOC, &DocumentMetadata::new("docs", "guide.md", "Guide"))
        .await;

    fx.generator.push_response("Unsure.\n\nCONFIDENCE: low");
    fx.generator.push_response("Certain now.\n\nCONFIDENCE: high");

    let result = fx
        .pipeline()
        .query("Second", &lenient_options())
        .await
        .unwrap();

    assert_eq!(result.answer, "Certain now.");
    assert!((result.confidence - 0.9).abs() < f32::EPSILON);

    let calls = fx.generator.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].tier, ModelTier::Default);
    assert_eq!(calls[1].tier, ModelTier::Escalated);
}

#[tokio::test]
async fn session_carries_prior_turns_into_synthesis() {
    let fx = Fixture::new().await;
    fx.ingest(TOY_DOC, &DocumentMetadata::new("docs", "guide.md", "Guide"))
        .await;

    let pipeline = fx.pipeline();
    let mut session = SessionContext::new("s-1");

    fx.generator.push_response("First answer.\n\nCONFIDENCE: high");
    pipeline
        .query_session("Second", &lenient_options(), &mut session, SessionMode::New)
        .await
        .unwrap();

    fx.generator.push_response("Follow-up answer.\n\nCONFIDENCE: high");
    let result = pipeline
        .query_session(
            "And the alpha part?",
            &lenient_options(),
            &mut session,
            SessionMode::Continue,
        )
        .await
        .unwrap();
    assert_eq!(result.answer, "Follow-up answer.");

    let calls = fx.generator.calls();
    let follow_up = calls.last().unwrap();
    // Prior user turn, prior answer, then the new question.
    assert_eq!(follow_up.messages.len(), 3);
    assert!(follow_up.messages[0].content.contains("Second"));
    assert_eq!(follow_up.messages[1].content, "First answer.");

    // Starting a new session drops the history again.
    fx.generator.push_response("Fresh.\n\nCONFIDENCE: high");
    pipeline
        .query_session("Second", &lenient_options(), &mut session, SessionMode::New)
        .await
        .unwrap();
    assert_eq!(fx.generator.calls().last().unwrap().messages.len(), 1);
}

async fn seed_document(graph: &SurrealGraphStore, repo: &str, path: &str, doc_type: Option<&str>) {
    let mut meta = DocumentMetadata::new(repo, path, path);
    meta.doc_type = doc_type.map(str::to_string);
    graph
        .upsert_document(&DocumentNode::from_metadata(&meta))
        .await
        .unwrap();
}

#[tokio::test]
async fn related_documents_rank_on_the_relationship_ladder() {
    let fx = Fixture::new().await;
    let graph = &fx.graph;
    for path in ["a.md", "b.md", "c.md", "d.md", "e.md"] {
        seed_document(graph, "docs", path, None).await;
    }
    // a<->b reciprocal, a->c outbound, d->a incoming, c->e transitive.
    graph.relate("docs:a.md", "docs:b.md", RelationKind::LinksTo, Value::Null).await.unwrap();
    graph.relate("docs:b.md", "docs:a.md", RelationKind::LinksTo, Value::Null).await.unwrap();
    graph.relate("docs:a.md", "docs:c.md", RelationKind::LinksTo, Value::Null).await.unwrap();
    graph.relate("docs:d.md", "docs:a.md", RelationKind::LinksTo, Value::Null).await.unwrap();
    graph.relate("docs:c.md", "docs:e.md", RelationKind::DependsOn, Value::Null).await.unwrap();

    let resolver = RelatedResolver::new(graph.clone());
    let result = resolver
        .find_related(&RelatedRequest::new("docs:a.md"))
        .await
        .unwrap();

    let ids: Vec<&str> = result.related.iter().map(|r| r.document_id.as_str()).collect();
    assert_eq!(ids, vec!["docs:b.md", "docs:c.md", "docs:d.md", "docs:e.md"]);

    let by_id = |id: &str| result.related.iter().find(|r| r.document_id == id).unwrap();
    assert_eq!(by_id("docs:b.md").class, RelationClass::Bidirectional);
    assert!((by_id("docs:b.md").relevance - 1.0).abs() < f32::EPSILON);
    assert_eq!(by_id("docs:c.md").class, RelationClass::Outbound);
    assert!((by_id("docs:c.md").relevance - 0.9).abs() < f32::EPSILON);
    assert_eq!(by_id("docs:d.md").class, RelationClass::Incoming);
    assert!((by_id("docs:d.md").relevance - 0.85).abs() < f32::EPSILON);

    let transitive = by_id("docs:e.md");
    assert_eq!(transitive.class, RelationClass::Transitive);
    assert!((transitive.relevance - 0.63).abs() < 1e-6);
    assert_eq!(transitive.via.as_deref(), Some("docs:c.md"));
    assert_eq!(transitive.hops, 2);

    assert_eq!(result.link_summary.bidirectional, 1);
    assert_eq!(result.link_summary.outbound, 1);
    assert_eq!(result.link_summary.incoming, 1);
    assert_eq!(result.link_summary.transitive, 1);
}

#[tokio::test]
async fn stronger_relationship_wins_over_transitive_path() {
    let fx = Fixture::new().await;
    let graph = &fx.graph;
    for path in ["a.md", "b.md", "c.md"] {
        seed_document(graph, "docs", path, None).await;
    }
    // c is both a direct outbound link and reachable transitively via b.
    graph.relate("docs:a.md", "docs:b.md", RelationKind::LinksTo, Value::Null).await.unwrap();
    graph.relate("docs:a.md", "docs:c.md", RelationKind::LinksTo, Value::Null).await.unwrap();
    graph.relate("docs:b.md", "docs:c.md", RelationKind::LinksTo, Value::Null).await.unwrap();

    let resolver = RelatedResolver::new(graph.clone());
    let result = resolver
        .find_related(&RelatedRequest::new("docs:a.md"))
        .await
        .unwrap();

    let c = result
        .related
        .iter()
        .find(|r| r.document_id == "docs:c.md")
        .unwrap();
    assert_eq!(c.class, RelationClass::Outbound);
    assert!((c.relevance - 0.9).abs() < f32::EPSILON);
}

#[tokio::test]
async fn related_filters_by_doc_type_and_caps_at_limit() {
    let fx = Fixture::new().await;
    let graph = &fx.graph;
    seed_document(graph, "docs", "hub.md", None).await;
    seed_document(graph, "docs", "adr-1.md", Some("adr")).await;
    seed_document(graph, "docs", "runbook-1.md", Some("runbook")).await;
    seed_document(graph, "docs", "adr-2.md", Some("adr")).await;
    for target in ["adr-1.md", "runbook-1.md", "adr-2.md"] {
        graph
            .relate("docs:hub.md", &format!("docs:{target}"), RelationKind::LinksTo, Value::Null)
            .await
            .unwrap();
    }

    let resolver = RelatedResolver::new(graph.clone());
    let mut request = RelatedRequest::new("docs:hub.md");
    request.doc_type = Some("adr".to_string());
    let result = resolver.find_related(&request).await.unwrap();
    assert_eq!(result.related.len(), 2);
    assert!(result.related.iter().all(|r| r.document_id.starts_with("docs:adr-")));

    let mut capped = RelatedRequest::new("docs:hub.md");
    capped.limit = 1;
    let result = resolver.find_related(&capped).await.unwrap();
    assert_eq!(result.related.len(), 1);
}

#[tokio::test]
async fn related_semantic_matches_reach_unlinked_documents() {
    let fx = Fixture::new().await;
    fx.ingest(
        "## Caching\n\nRedis cache eviction policies.\n",
        &DocumentMetadata::new("docs", "cache.md", "Caching"),
    )
    .await;
    fx.ingest(
        "## Tuning\n\nRedis cache eviction tuning notes.\n",
        &DocumentMetadata::new("docs", "tuning.md", "Tuning"),
    )
    .await;

    let resolver = RelatedResolver::new(fx.graph.clone())
        .with_semantic(fx.embedder.clone(), fx.vectors.clone());
    let mut request = RelatedRequest::new("docs:cache.md");
    request.include_semantic = true;
    let result = resolver.find_related(&request).await.unwrap();

    let semantic = result
        .related
        .iter()
        .find(|r| r.document_id == "docs:tuning.md")
        .expect("vocabulary overlap should surface the unlinked document");
    assert_eq!(semantic.class, RelationClass::Semantic);
    assert!(semantic.relevance > 0.0 && semantic.relevance <= 0.8);
    assert_eq!(result.link_summary.semantic, 1);
}

#[tokio::test]
async fn related_source_must_exist() {
    let fx = Fixture::new().await;
    let resolver = RelatedResolver::new(fx.graph.clone());
    let err = resolver
        .find_related(&RelatedRequest::new("docs:missing.md"))
        .await
        .unwrap_err();
    assert!(matches!(err, atlas_core::AtlasError::NotFound(_)));
}

#[tokio::test]
async fn doc_type_filter_restricts_retrieval() {
    let fx = Fixture::new().await;
    let mut adr = DocumentMetadata::new("docs", "adr.md", "ADR");
    adr.doc_type = Some("adr".to_string());
    fx.ingestor(Arc::new(NoEntities))
        .ingest("## Beta\n\nSecond.\n", &adr, &CancellationToken::new())
        .await
        .unwrap();
    fx.ingest(
        "## Beta\n\nSecond.\n",
        &DocumentMetadata::new("docs", "note.md", "Note"),
    )
    .await;

    fx.generator.set_default_response("Answer.\n\nCONFIDENCE: high");
    let options = QueryOptions {
        doc_type: Some("adr".to_string()),
        ..lenient_options()
    };
    let result = fx.pipeline().query("Second", &options).await.unwrap();

    assert!(!result.sources.is_empty());
    assert!(result.sources.iter().all(|s| s.document_id == "docs:adr.md"));
}

#[tokio::test]
async fn related_accepts_free_text_in_place_of_a_source_id() {
    let fx = Fixture::new().await;
    fx.ingest(
        "## Caching\n\nRedis cache eviction policies.\n",
        &DocumentMetadata::new("docs", "cache.md", "Caching"),
    )
    .await;
    fx.ingest(
        "## Deploys\n\nRollout and rollback procedures.\n",
        &DocumentMetadata::new("docs", "deploy.md", "Deploys"),
    )
    .await;
    fx.graph
        .relate(
            "docs:cache.md",
            "docs:deploy.md",
            RelationKind::DependsOn,
            Value::Null,
        )
        .await
        .unwrap();

    let resolver = RelatedResolver::new(fx.graph.clone())
        .with_semantic(fx.embedder.clone(), fx.vectors.clone());
    let result = resolver
        .find_related(&RelatedRequest::from_query("redis eviction policies"))
        .await
        .unwrap();

    // The text resolves to the caching document, whose dependency is found.
    assert_eq!(result.source_id, "docs:cache.md");
    assert!(result
        .related
        .iter()
        .any(|r| r.document_id == "docs:deploy.md" && r.class == RelationClass::Outbound));

    // Without a vector backend, a query source is a configuration error.
    let bare = RelatedResolver::new(fx.graph.clone());
    let err = bare
        .find_related(&RelatedRequest::from_query("redis eviction policies"))
        .await
        .unwrap_err();
    assert!(matches!(err, atlas_core::AtlasError::Config(_)));
}
