//! Header chunker
//!
//! Splits a frontmatter-stripped body into ordered chunks at heading
//! boundaries. H2 boundaries always split; H3 boundaries split only once the
//! body exceeds the line threshold, so short documents chunk at section
//! granularity while long ones get finer retrieval units. Content preceding
//! the first boundary (or a headerless body) becomes one implicit chunk under
//! a synthetic "Introduction" section. The chunker emits plan structs, not
//! graph nodes: id assignment belongs to ingestion.

use crate::types::ParsedMarkdown;
use crate::{DEFAULT_CHUNK_THRESHOLD_LINES, INTRODUCTION_TITLE};

/// A section to be created: one per H2 heading, plus the synthetic
/// introduction when content precedes the first boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedSection {
    pub title: String,
    /// Position within the document, monotonic from 0.
    pub order: u32,
    pub level: u8,
    pub synthetic: bool,
}

/// A chunk to be created, referencing its section by index into
/// [`ChunkPlan::sections`].
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedChunk {
    pub section_index: usize,
    /// 0-based, document-global.
    pub order: u32,
    pub header_path: String,
    pub content: String,
    /// `ceil(content.len() / 4)`, a cheap token proxy.
    pub token_count: u32,
    pub start_line: u32,
    pub end_line: u32,
    /// True when the chunk was split out of an H3 subsection.
    pub from_subsection: bool,
}

/// Output of the chunker.
#[derive(Debug, Clone, Default)]
pub struct ChunkPlan {
    pub sections: Vec<PlannedSection>,
    pub chunks: Vec<PlannedChunk>,
}

/// Splits documents at H2/H3 heading boundaries.
#[derive(Debug, Clone)]
pub struct HeaderChunker {
    /// Bodies longer than this many lines also split at H3 boundaries.
    threshold_lines: u32,
}

impl Default for HeaderChunker {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_THRESHOLD_LINES)
    }
}

impl HeaderChunker {
    pub fn new(threshold_lines: u32) -> Self {
        Self { threshold_lines }
    }

    pub fn chunk(&self, parsed: &ParsedMarkdown) -> ChunkPlan {
        let lines: Vec<&str> = parsed.body.lines().collect();
        let total_lines = lines.len() as u32;
        let split_subsections = total_lines > self.threshold_lines;

        // Boundary headings, in document order. Headings inside code fences
        // never appear in the outline, so fences cannot be split.
        let boundaries: Vec<_> = parsed
            .outline
            .iter()
            .filter(|h| h.level == 2 || (h.level == 3 && split_subsections))
            .collect();

        let mut plan = ChunkPlan::default();
        let mut order: u32 = 0;

        // Implicit introduction: content before the first boundary, or the
        // whole body when there is no boundary at all.
        let intro_end = boundaries
            .first()
            .map(|h| h.line - 1)
            .unwrap_or(total_lines);
        let intro_content = slice_lines(&lines, 1, intro_end);
        let headerless = boundaries.is_empty();
        if !intro_content.trim().is_empty() || headerless {
            plan.sections.push(PlannedSection {
                title: INTRODUCTION_TITLE.to_string(),
                order: 0,
                level: 2,
                synthetic: true,
            });
            if !intro_content.trim().is_empty() {
                plan.chunks.push(PlannedChunk {
                    section_index: 0,
                    order,
                    header_path: INTRODUCTION_TITLE.to_string(),
                    token_count: approx_token_count(&intro_content),
                    content: intro_content,
                    start_line: 1,
                    end_line: intro_end,
                    from_subsection: false,
                });
                order += 1;
            }
        }

        // One section per H2, whether or not it produces chunks.
        let mut current_section: Option<usize> = None;
        for (idx, boundary) in boundaries.iter().enumerate() {
            if boundary.level == 2 {
                plan.sections.push(PlannedSection {
                    title: boundary.title.clone(),
                    order: plan.sections.len() as u32,
                    level: 2,
                    synthetic: false,
                });
                current_section = Some(plan.sections.len() - 1);
            }

            // An H3 boundary before any H2 files under the introduction.
            let section_index = match current_section {
                Some(section_index) => section_index,
                None => {
                    if plan.sections.is_empty() {
                        plan.sections.push(PlannedSection {
                            title: INTRODUCTION_TITLE.to_string(),
                            order: 0,
                            level: 2,
                            synthetic: true,
                        });
                    }
                    0
                }
            };

            let end_line = boundaries
                .get(idx + 1)
                .map(|next| next.line - 1)
                .unwrap_or(total_lines);
            let content = slice_lines(&lines, boundary.line, end_line);

            // A heading with nothing under it yields no chunk.
            let beyond_heading = content
                .lines()
                .skip(1)
                .any(|line| !line.trim().is_empty());
            if !beyond_heading {
                continue;
            }

            plan.chunks.push(PlannedChunk {
                section_index,
                order,
                header_path: boundary.header_path.clone(),
                token_count: approx_token_count(&content),
                content,
                start_line: boundary.line,
                end_line,
                from_subsection: boundary.level == 3,
            });
            order += 1;
        }

        plan
    }
}

/// `ceil(len / 4)` over characters.
pub fn approx_token_count(text: &str) -> u32 {
    (text.len() as u32).div_ceil(4)
}

/// Join lines `start..=end` (1-based, inclusive).
fn slice_lines(lines: &[&str], start: u32, end: u32) -> String {
    if start > end || start == 0 {
        return String::new();
    }
    let start = (start - 1) as usize;
    let end = (end as usize).min(lines.len());
    if start >= end {
        return String::new();
    }
    lines[start..end].join("\n")
}
