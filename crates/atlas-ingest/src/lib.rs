//! Atlas ingestion
//!
//! Turns raw markdown plus caller metadata into graph nodes, typed edges,
//! and chunk vectors, idempotently per `(repository, file_path)`. Also home
//! of the concept merge pass that deduplicates near-identical concepts
//! after a batch of ingests.

pub mod concepts;
pub mod options;
pub mod service;

pub use concepts::{ConceptMerger, MergeReport};
pub use options::IngestOptions;
pub use service::{IngestReport, IngestionService};
