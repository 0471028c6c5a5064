//! Parsed-structure types

use serde::{Deserialize, Serialize};

/// YAML frontmatter, kept raw plus parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frontmatter {
    pub raw: String,
    pub data: serde_yaml::Value,
}

impl Frontmatter {
    /// Author-declared document references under the given key
    /// (e.g. `depends_on`, `supersedes`). Accepts a string or a sequence.
    pub fn document_refs(&self, key: &str) -> Vec<String> {
        match self.data.get(key) {
            Some(serde_yaml::Value::String(s)) => vec![s.clone()],
            Some(serde_yaml::Value::Sequence(seq)) => seq
                .iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// One heading in the outline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heading {
    /// 1-6.
    pub level: u8,
    pub title: String,
    /// Rendered path with literal markers: `"## Title > ### Subtitle"`.
    pub header_path: String,
    /// 1-based line in the frontmatter-stripped body.
    pub line: u32,
}

/// An inline or reference link occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkRef {
    /// Raw target as written, fragment and all.
    pub target: String,
    pub line: u32,
}

/// A fenced or indented code block's span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeBlockSpan {
    pub language: Option<String>,
    pub start_line: u32,
    pub end_line: u32,
}

/// A structurally parsed markdown document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedMarkdown {
    pub frontmatter: Option<Frontmatter>,
    /// Body with frontmatter stripped; all line numbers are relative to this.
    pub body: String,
    pub outline: Vec<Heading>,
    pub links: Vec<LinkRef>,
    pub code_blocks: Vec<CodeBlockSpan>,
    pub line_count: u32,
}
