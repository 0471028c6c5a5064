//! Atlas markdown parser
//!
//! Decomposes raw markdown + frontmatter into a header outline, link list,
//! and code-block list with line ranges, then plans header-delimited chunks
//! from that structure. Parsing uses pulldown-cmark's offset iterator, which
//! also guarantees that headings inside fenced code blocks never split a
//! chunk: they are simply not heading events.

pub mod chunker;
pub mod structure;
pub mod types;

pub use chunker::{ChunkPlan, HeaderChunker, PlannedChunk, PlannedSection};
pub use structure::parse_markdown;
pub use types::{CodeBlockSpan, Frontmatter, Heading, LinkRef, ParsedMarkdown};

/// Default line-count threshold above which documents are additionally split
/// at H3 boundaries.
pub const DEFAULT_CHUNK_THRESHOLD_LINES: u32 = 500;

/// Title of the synthetic section that holds pre-heading or headerless
/// content.
pub const INTRODUCTION_TITLE: &str = "Introduction";
