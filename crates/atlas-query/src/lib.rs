//! Atlas query layer
//!
//! Two read paths over the knowledge graph: the agentic GraphRAG pipeline
//! (vector retrieval, LLM-routed graph expansion, synthesis with tier
//! escalation) and the related-document resolver, which ranks link-graph
//! neighbors by relationship class and distance decay.

pub mod options;
pub mod pipeline;
pub mod related;
pub mod session;

pub use options::QueryOptions;
pub use pipeline::{GraphRagResult, QueryPipeline, QuerySource, Stage};
pub use related::{
    LinkSummary, RelatedDocument, RelatedDocumentsResult, RelatedRequest, RelatedResolver,
    RelatedSource, RelationClass,
};
pub use session::{SessionContext, SessionMode};
