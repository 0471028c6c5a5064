//! Atlas SurrealDB backend
//!
//! One embedded SurrealDB instance (in-memory or RocksDB) backs both the
//! property graph and the vector index. Nodes live in per-type tables keyed
//! by their deterministic string ids, edges live in a `relations` table with
//! composite record ids so re-ingestion never duplicates them, and chunk
//! embeddings live in an `embeddings` table queried with
//! `vector::similarity::cosine`.

pub mod client;
pub mod graph_store;
pub mod schema;
pub mod vector_store;

pub use client::{SurrealClient, SurrealDbConfig};
pub use graph_store::SurrealGraphStore;
pub use vector_store::SurrealVectorStore;
