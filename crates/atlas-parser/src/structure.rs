//! Structural markdown parsing
//!
//! Walks pulldown-cmark's offset iterator over the frontmatter-stripped body,
//! converting byte offsets to 1-based line numbers through a precomputed
//! line-start table. Invalid frontmatter YAML is tolerated: the raw block is
//! kept and a warning logged, per the unit-scoped data-error policy.

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use tracing::warn;

use crate::types::{CodeBlockSpan, Frontmatter, Heading, LinkRef, ParsedMarkdown};

/// Parse raw markdown (frontmatter included) into its structural outline.
pub fn parse_markdown(raw: &str) -> ParsedMarkdown {
    let (frontmatter, body) = extract_frontmatter(raw);
    let body = body.to_string();
    let lines = LineTable::new(&body);

    let mut outline: Vec<Heading> = Vec::new();
    let mut links: Vec<LinkRef> = Vec::new();
    let mut code_blocks: Vec<CodeBlockSpan> = Vec::new();

    // Stack of (level, title) for rendering header paths.
    let mut heading_stack: Vec<(u8, String)> = Vec::new();

    let mut in_heading = false;
    let mut heading_level: u8 = 0;
    let mut heading_text = String::new();
    let mut heading_start = 0usize;

    let mut code_lang: Option<String> = None;
    let mut code_start = 0usize;

    let parser = Parser::new_ext(&body, Options::empty());
    for (event, range) in parser.into_offset_iter() {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                in_heading = true;
                heading_level = heading_level_to_u8(level);
                heading_text.clear();
                heading_start = range.start;
            }
            Event::End(TagEnd::Heading(_)) => {
                if in_heading {
                    let title = heading_text.trim().to_string();
                    while heading_stack
                        .last()
                        .is_some_and(|(level, _)| *level >= heading_level)
                    {
                        heading_stack.pop();
                    }
                    heading_stack.push((heading_level, title.clone()));
                    outline.push(Heading {
                        level: heading_level,
                        title,
                        header_path: render_header_path(&heading_stack),
                        line: lines.line_of(heading_start),
                    });
                    in_heading = false;
                }
            }
            Event::Start(Tag::CodeBlock(kind)) => {
                code_lang = match kind {
                    CodeBlockKind::Fenced(lang) if !lang.is_empty() => Some(lang.to_string()),
                    _ => None,
                };
                code_start = range.start;
            }
            Event::End(TagEnd::CodeBlock) => {
                code_blocks.push(CodeBlockSpan {
                    language: code_lang.take(),
                    start_line: lines.line_of(code_start),
                    end_line: lines.line_of(range.end.saturating_sub(1).max(code_start)),
                });
            }
            Event::Start(Tag::Link { dest_url, .. }) => {
                links.push(LinkRef {
                    target: dest_url.to_string(),
                    line: lines.line_of(range.start),
                });
            }
            Event::Text(text) | Event::Code(text) => {
                if in_heading {
                    heading_text.push_str(&text);
                }
            }
            _ => {}
        }
    }

    let line_count = body.lines().count() as u32;
    ParsedMarkdown {
        frontmatter,
        body,
        outline,
        links,
        code_blocks,
        line_count,
    }
}

/// Render a header path from the heading stack, starting at the H2 level:
/// `"## Title > ### Subtitle"`. A lone H1 renders as `"# Title"`.
fn render_header_path(stack: &[(u8, String)]) -> String {
    let from_h2: Vec<String> = stack
        .iter()
        .filter(|(level, _)| *level >= 2)
        .map(|(level, title)| format!("{} {}", "#".repeat(*level as usize), title))
        .collect();
    if from_h2.is_empty() {
        // The heading itself is an H1.
        stack
            .last()
            .map(|(level, title)| format!("{} {}", "#".repeat(*level as usize), title))
            .unwrap_or_default()
    } else {
        from_h2.join(" > ")
    }
}

fn heading_level_to_u8(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

/// Extract YAML frontmatter (`---` fenced at the very top) from content.
fn extract_frontmatter(content: &str) -> (Option<Frontmatter>, &str) {
    for (open, close, skip) in [("---\n", "\n---\n", 5), ("---\r\n", "\r\n---\r\n", 7)] {
        if let Some(rest) = content.strip_prefix(open) {
            if let Some(end_idx) = rest.find(close) {
                let raw = &rest[..end_idx];
                let body = &rest[end_idx + skip..];
                let data = match serde_yaml::from_str(raw) {
                    Ok(data) => data,
                    Err(e) => {
                        warn!("invalid frontmatter YAML, keeping raw block: {}", e);
                        serde_yaml::Value::Null
                    }
                };
                return (
                    Some(Frontmatter {
                        raw: raw.to_string(),
                        data,
                    }),
                    body,
                );
            }
        }
    }
    (None, content)
}

/// Byte-offset to 1-based line number conversion.
struct LineTable {
    starts: Vec<usize>,
}

impl LineTable {
    fn new(text: &str) -> Self {
        let mut starts = vec![0];
        for (idx, byte) in text.bytes().enumerate() {
            if byte == b'\n' {
                starts.push(idx + 1);
            }
        }
        Self { starts }
    }

    fn line_of(&self, offset: usize) -> u32 {
        match self.starts.binary_search(&offset) {
            Ok(idx) => idx as u32 + 1,
            Err(idx) => idx as u32,
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_outline_with_header_paths() {
        let md = "# Top\n\n## Alpha\n\ntext\n\n### Inner\n\nmore\n\n## Beta\n\nlast\n";
        let parsed = parse_markdown(md);
        let titles: Vec<_> = parsed.outline.iter().map(|h| h.title.as_str()).collect();
        assert_eq!(titles, vec!["Top", "Alpha", "Inner", "Beta"]);
        assert_eq!(parsed.outline[0].header_path, "# Top");
        assert_eq!(parsed.outline[1].header_path, "## Alpha");
        assert_eq!(parsed.outline[2].header_path, "## Alpha > ### Inner");
        assert_eq!(parsed.outline[3].header_path, "## Beta");
        assert_eq!(parsed.outline[1].line, 3);
        assert_eq!(parsed.outline[3].line, 11);
    }

    #[test]
    fn strips_and_parses_frontmatter() {
        let md = "---\ntitle: Guide\ndepends_on:\n  - docs/base.md\n---\n# Body\n";
        let parsed = parse_markdown(md);
        let fm = parsed.frontmatter.expect("frontmatter");
        assert_eq!(fm.document_refs("depends_on"), vec!["docs/base.md"]);
        assert!(parsed.body.starts_with("# Body"));
        assert_eq!(parsed.outline[0].line, 1);
    }

    #[test]
    fn invalid_frontmatter_is_kept_raw() {
        let md = "---\n: not yaml : [\n---\nbody\n";
        let parsed = parse_markdown(md);
        let fm = parsed.frontmatter.expect("frontmatter kept");
        assert!(fm.raw.contains("not yaml"));
        assert_eq!(fm.data, serde_yaml::Value::Null);
    }

    #[test]
    fn collects_links_with_lines() {
        let md = "intro\n\nsee [other](../other.md) and [web](https://example.com)\n";
        let parsed = parse_markdown(md);
        assert_eq!(parsed.links.len(), 2);
        assert_eq!(parsed.links[0].target, "../other.md");
        assert_eq!(parsed.links[0].line, 3);
    }

    #[test]
    fn headings_inside_code_fences_are_not_headings() {
        let md = "## Real\n\n```md\n## Fake heading\n```\n";
        let parsed = parse_markdown(md);
        assert_eq!(parsed.outline.len(), 1);
        assert_eq!(parsed.outline[0].title, "Real");
        assert_eq!(parsed.code_blocks.len(), 1);
        assert_eq!(parsed.code_blocks[0].language.as_deref(), Some("md"));
        assert_eq!(parsed.code_blocks[0].start_line, 3);
    }

    #[test]
    fn heading_titles_keep_inline_code() {
        let md = "## Using `cargo`\n";
        let parsed = parse_markdown(md);
        assert_eq!(parsed.outline[0].title, "Using cargo");
    }
}
