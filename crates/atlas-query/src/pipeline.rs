//! GraphRAG query pipeline
//!
//! An explicit four-stage state machine: INITIAL_RETRIEVAL gathers vector
//! hits and their concept neighborhood, CONCEPT_EXPANSION and
//! DOCUMENT_TRAVERSAL are LLM-routed graph expansions that may each run at
//! most once, and SYNTHESIS is the single terminal stage reachable from any
//! of them. Budget exhaustion and routing refusal are transition rules, not
//! nested branches: either one sends the pipeline straight to synthesis.
//! Low synthesis confidence retries once on the escalated model tier.

use atlas_core::{
    AtlasError, AtlasResult, ChunkNode, ConceptNode, DocumentNode, EmbeddingProvider, GraphStore,
    LlmMessage, ModelTier, RelationKind, TextGenerationProvider, VectorFilter, VectorStore,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::options::QueryOptions;
use crate::session::{SessionContext, SessionMode};

const CONCEPT_ROUTING_PROMPT: &str = "\
You route retrieval for a documentation answering system. Given a question, \
the chunks retrieved so far, and a list of known concepts, select the \
concept ids whose related chunks would materially help answer the question. \
Reply with ONLY a JSON array of concept id strings, [] if none would help.";

const TRAVERSAL_ROUTING_PROMPT: &str = "\
You route retrieval for a documentation answering system. Given a question \
and a list of dependency edges between documents, select the target document \
ids worth pulling into context. Reply with ONLY a JSON array of document id \
strings, [] if none are worth following.";

const SYNTHESIS_PROMPT: &str = "\
Answer the question using ONLY the provided context chunks. Cite sources \
inline as [n] referring to the numbered chunks. If the context is \
insufficient, say so. End your reply with a line of the form \
'CONFIDENCE: high', 'CONFIDENCE: medium', or 'CONFIDENCE: low'.";

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    InitialRetrieval,
    ConceptExpansion,
    DocumentTraversal,
    Synthesis,
}

/// One source attribution in the answer.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySource {
    pub chunk_id: String,
    pub document_id: String,
    pub file_path: String,
    pub header_path: String,
    /// Vector similarity for retrieved chunks; 0 for graph-expanded ones.
    pub score: f32,
}

/// Final pipeline output.
#[derive(Debug, Clone)]
pub struct GraphRagResult {
    pub answer: String,
    pub sources: Vec<QuerySource>,
    pub related_concepts: Vec<String>,
    pub confidence: f32,
    pub stages_run: Vec<Stage>,
    pub traversal_log: Vec<String>,
    pub model: String,
}

#[derive(Default)]
struct Gathered {
    chunks: Vec<ChunkNode>,
    seen_chunks: HashSet<String>,
    scores: HashMap<String, f32>,
    concepts: Vec<ConceptNode>,
    seen_concepts: HashSet<String>,
    log: Vec<String>,
}

impl Gathered {
    fn add_chunks(&mut self, chunks: Vec<ChunkNode>) -> usize {
        let mut added = 0;
        for chunk in chunks {
            if self.seen_chunks.insert(chunk.id.clone()) {
                self.chunks.push(chunk);
                added += 1;
            }
        }
        added
    }

    fn add_concepts(&mut self, concepts: Vec<ConceptNode>) {
        for concept in concepts {
            if self.seen_concepts.insert(concept.id.clone()) {
                self.concepts.push(concept);
            }
        }
    }

    fn document_ids(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.chunks
            .iter()
            .filter(|c| seen.insert(c.document_id.clone()))
            .map(|c| c.document_id.clone())
            .collect()
    }
}

/// The agentic query pipeline.
pub struct QueryPipeline {
    graph: Arc<dyn GraphStore>,
    vectors: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    generator: Arc<dyn TextGenerationProvider>,
}

impl QueryPipeline {
    pub fn new(
        graph: Arc<dyn GraphStore>,
        vectors: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn TextGenerationProvider>,
    ) -> Self {
        Self {
            graph,
            vectors,
            embedder,
            generator,
        }
    }

    /// Answer one question with no conversational context.
    pub async fn query(&self, text: &str, options: &QueryOptions) -> AtlasResult<GraphRagResult> {
        self.run(text, options, &[]).await
    }

    /// Answer one question inside a session. `SessionMode::New` discards the
    /// session's prior turns first; the session records this turn either way.
    pub async fn query_session(
        &self,
        text: &str,
        options: &QueryOptions,
        session: &mut SessionContext,
        mode: SessionMode,
    ) -> AtlasResult<GraphRagResult> {
        if mode == SessionMode::New {
            session.reset();
        }
        let result = self.run(text, options, session.history()).await?;
        session.record_turn(text, &result.answer);
        Ok(result)
    }

    async fn run(
        &self,
        text: &str,
        options: &QueryOptions,
        history: &[LlmMessage],
    ) -> AtlasResult<GraphRagResult> {
        options.validate()?;
        info!(query = %text, "starting query pipeline");

        let mut state = Gathered::default();
        let mut stages_run = Vec::new();
        let mut steps: u32 = 0;

        // INITIAL_RETRIEVAL
        stages_run.push(Stage::InitialRetrieval);
        steps += 1;
        self.initial_retrieval(text, options, &mut state).await?;

        // CONCEPT_EXPANSION: skipped when retrieval surfaced no concepts or
        // the budget is already gone.
        if !state.concepts.is_empty() && steps < options.max_traversal_steps {
            stages_run.push(Stage::ConceptExpansion);
            steps += 1;
            self.concept_expansion(text, &mut state).await?;
        }

        // DOCUMENT_TRAVERSAL: skipped without candidate edges or budget.
        if steps < options.max_traversal_steps {
            if self.document_traversal(text, options, &mut state, &mut stages_run).await? {
                steps += 1;
            }
        }

        // SYNTHESIS
        stages_run.push(Stage::Synthesis);
        let budget_exhausted = steps >= options.max_traversal_steps;
        let (answer, confidence, model) = self
            .synthesize(text, history, &state, budget_exhausted)
            .await?;

        let sources = self.attribute_sources(&state).await?;
        info!(
            confidence,
            chunks = state.chunks.len(),
            stages = stages_run.len(),
            "query pipeline complete"
        );
        Ok(GraphRagResult {
            answer,
            sources,
            related_concepts: state.concepts.iter().map(|c| c.name.clone()).collect(),
            confidence,
            stages_run,
            traversal_log: state.log,
            model,
        })
    }

    async fn initial_retrieval(
        &self,
        text: &str,
        options: &QueryOptions,
        state: &mut Gathered,
    ) -> AtlasResult<()> {
        // Doc-type filters are resolved through the graph; the vector store
        // only ever filters on its own metadata keys.
        let document_ids = match &options.doc_type {
            Some(doc_type) => {
                let docs = self
                    .graph
                    .documents_by_type(options.repository.as_deref(), doc_type)
                    .await?;
                Some(docs.into_iter().map(|d| d.id).collect::<Vec<_>>())
            }
            None => None,
        };

        let query_embedding = self.embedder.embed(text).await?.embedding;
        let filter = VectorFilter {
            repository: options.repository.clone(),
            document_ids,
        };
        let matches = self
            .vectors
            .search(&query_embedding, options.max_chunks, &filter)
            .await?;

        let total = matches.len();
        let kept: Vec<_> = matches
            .into_iter()
            .filter(|m| m.score >= options.min_relevance_score)
            .collect();
        state.log.push(format!(
            "initial retrieval: kept {} of {} vector hits",
            kept.len(),
            total
        ));

        let ids: Vec<String> = kept.iter().map(|m| m.chunk_id.clone()).collect();
        for m in &kept {
            state.scores.insert(m.chunk_id.clone(), m.score);
        }
        let chunks = self.graph.get_chunks(&ids).await?;
        state.add_chunks(chunks);

        let mentioned = self.graph.concepts_mentioned_by(&ids).await?;
        let mentioned_ids: Vec<String> = mentioned.iter().map(|c| c.id.clone()).collect();
        state.add_concepts(mentioned);
        if !mentioned_ids.is_empty() {
            let neighbors = self.graph.concept_neighbors(&mentioned_ids, 1).await?;
            state.add_concepts(neighbors);
        }
        state.log.push(format!(
            "concept neighborhood: {} concepts",
            state.concepts.len()
        ));
        Ok(())
    }

    async fn concept_expansion(&self, text: &str, state: &mut Gathered) -> AtlasResult<()> {
        let concept_list: String = state
            .concepts
            .iter()
            .map(|c| format!("- {} ({})\n", c.id, c.name))
            .collect();
        let excerpts = excerpt_list(&state.chunks, 400);
        let prompt = format!(
            "Question: {}\n\nRetrieved chunks:\n{}\nKnown concepts:\n{}",
            text, excerpts, concept_list
        );
        let reply = self
            .generator
            .generate(CONCEPT_ROUTING_PROMPT, &[LlmMessage::user(prompt)], ModelTier::Default)
            .await?;

        let known: HashSet<&str> = state.concepts.iter().map(|c| c.id.as_str()).collect();
        let selected: Vec<String> = match parse_id_list(&reply.text) {
            Some(ids) => ids
                .into_iter()
                .filter(|id| known.contains(id.as_str()))
                .collect(),
            None => {
                warn!("concept routing reply was not a JSON array, treating as refusal");
                Vec::new()
            }
        };

        if selected.is_empty() {
            state.log.push("concept expansion: routing declined".to_string());
            return Ok(());
        }
        let chunks = self.graph.chunks_mentioning(&selected, 2).await?;
        let added = state.add_chunks(chunks);
        state.log.push(format!(
            "concept expansion: {} concepts -> {} new chunks",
            selected.len(),
            added
        ));
        Ok(())
    }

    /// Returns whether the stage actually ran (candidate edges existed).
    async fn document_traversal(
        &self,
        text: &str,
        options: &QueryOptions,
        state: &mut Gathered,
        stages_run: &mut Vec<Stage>,
    ) -> AtlasResult<bool> {
        let mut candidates = Vec::new();
        for document_id in state.document_ids() {
            let links = self
                .graph
                .outgoing_links(
                    &document_id,
                    &[RelationKind::DependsOn, RelationKind::Supersedes],
                )
                .await?;
            for link in links {
                if !options.use_cross_repo_links
                    && repository_of(&link.source_id) != repository_of(&link.target_id)
                {
                    debug!(target = %link.target_id, "cross-repo link disabled, skipping");
                    continue;
                }
                candidates.push(link);
            }
        }
        if candidates.is_empty() {
            return Ok(false);
        }
        stages_run.push(Stage::DocumentTraversal);

        let edge_list: String = candidates
            .iter()
            .map(|l| format!("- {} {} {}\n", l.source_id, l.kind, l.target_id))
            .collect();
        let prompt = format!("Question: {}\n\nDependency edges:\n{}", text, edge_list);
        let reply = self
            .generator
            .generate(TRAVERSAL_ROUTING_PROMPT, &[LlmMessage::user(prompt)], ModelTier::Default)
            .await?;

        let targets: HashSet<&str> = candidates.iter().map(|l| l.target_id.as_str()).collect();
        let selected: Vec<String> = match parse_id_list(&reply.text) {
            Some(ids) => ids
                .into_iter()
                .filter(|id| targets.contains(id.as_str()))
                .collect(),
            None => Vec::new(),
        };
        if selected.is_empty() {
            state.log.push("document traversal: routing declined".to_string());
            return Ok(true);
        }

        let mut added = 0;
        for document_id in &selected {
            let chunks = self.graph.chunks_of_document(document_id).await?;
            added += state.add_chunks(chunks);
        }
        state.log.push(format!(
            "document traversal: {} documents -> {} new chunks",
            selected.len(),
            added
        ));
        Ok(true)
    }

    async fn synthesize(
        &self,
        text: &str,
        history: &[LlmMessage],
        state: &Gathered,
        budget_exhausted: bool,
    ) -> AtlasResult<(String, f32, String)> {
        let context: String = state
            .chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| {
                format!("[{}] {}\n{}\n\n", i + 1, chunk.header_path, chunk.content)
            })
            .collect();
        let prompt = format!(
            "Question: {}\n\nContext chunks:\n{}\nTraversal log:\n{}",
            text,
            context,
            state.log.join("\n")
        );

        let mut messages: Vec<LlmMessage> = history.to_vec();
        messages.push(LlmMessage::user(prompt));

        let mut tier = if budget_exhausted {
            info!("step budget exhausted, synthesizing on escalated tier");
            ModelTier::Escalated
        } else {
            ModelTier::Default
        };
        let reply = self
            .generator
            .generate(SYNTHESIS_PROMPT, &messages, tier)
            .await?;
        let (mut answer, mut confidence) = parse_confidence(&reply.text);
        let mut model = reply.model;

        if confidence < 0.5 && tier == ModelTier::Default {
            info!(confidence, "low confidence, retrying synthesis on escalated tier");
            tier = ModelTier::Escalated;
            let retry = self
                .generator
                .generate(SYNTHESIS_PROMPT, &messages, tier)
                .await?;
            let (retry_answer, retry_confidence) = parse_confidence(&retry.text);
            answer = retry_answer;
            confidence = retry_confidence;
            model = retry.model;
        }
        Ok((answer, confidence, model))
    }

    async fn attribute_sources(&self, state: &Gathered) -> AtlasResult<Vec<QuerySource>> {
        let mut paths: HashMap<String, String> = HashMap::new();
        for document_id in state.document_ids() {
            let file_path = self
                .graph
                .get_document(&document_id)
                .await?
                .map(|d: DocumentNode| d.file_path)
                .ok_or_else(|| AtlasError::not_found(document_id.clone()))?;
            paths.insert(document_id, file_path);
        }

        let mut sources: Vec<QuerySource> = state
            .chunks
            .iter()
            .map(|chunk| QuerySource {
                chunk_id: chunk.id.clone(),
                document_id: chunk.document_id.clone(),
                file_path: paths.get(&chunk.document_id).cloned().unwrap_or_default(),
                header_path: chunk.header_path.clone(),
                score: state.scores.get(&chunk.id).copied().unwrap_or(0.0),
            })
            .collect();
        sources.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk_id.cmp(&b.chunk_id))
        });
        Ok(sources)
    }
}

fn repository_of(document_id: &str) -> &str {
    document_id.split(':').next().unwrap_or(document_id)
}

fn excerpt_list(chunks: &[ChunkNode], max_chars: usize) -> String {
    chunks
        .iter()
        .map(|chunk| {
            let excerpt: String = chunk.content.chars().take(max_chars).collect();
            format!("- {} | {}\n", chunk.header_path, excerpt)
        })
        .collect()
}

/// Pull a JSON string array out of a routing reply. Models wrap JSON in
/// fences and prose despite instructions, so scan for the bracket span.
fn parse_id_list(text: &str) -> Option<Vec<String>> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

/// Split the trailing confidence marker off a synthesis reply.
/// Missing markers read as 0.5: uncertain, but not escalation-worthy on
/// their own.
fn parse_confidence(text: &str) -> (String, f32) {
    let upper = text.to_uppercase();
    let Some(pos) = upper.rfind("CONFIDENCE:") else {
        return (text.trim().to_string(), 0.5);
    };
    let label = upper[pos + "CONFIDENCE:".len()..].trim();
    let confidence = if label.starts_with("HIGH") {
        0.9
    } else if label.starts_with("MEDIUM") {
        0.6
    } else if label.starts_with("LOW") {
        0.3
    } else {
        0.5
    };
    (text[..pos].trim().to_string(), confidence)
}
