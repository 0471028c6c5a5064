//! Pure identity functions
//!
//! Node ids are deterministic functions of content location, which is the
//! whole idempotence story: re-ingesting the same `(repository, file_path)`
//! produces the same ids and overwrites in place. Concept identity is a pure
//! function of the normalized name, which is the cross-repo resolution
//! mechanism.

/// Repo-qualified document id: `"{repository}:{path}"`.
pub fn document_id(repository: &str, file_path: &str) -> String {
    format!("{}:{}", repository, file_path.trim_start_matches('/'))
}

/// Section id: `"{document_id}:{slug(title)}"`.
pub fn section_id(document_id: &str, title: &str) -> String {
    format!("{}:{}", document_id, slug(title))
}

/// Chunk id, keyed by document-global order.
pub fn chunk_id(document_id: &str, order: u32) -> String {
    format!("{}:chunk-{}", document_id, order)
}

/// Concept id: `"concept:" + normalize(name)`.
pub fn concept_id(name: &str) -> String {
    format!("concept:{}", normalize_concept_name(name))
}

/// Lower-case, keep alphanumerics and hyphens, collapse whitespace and
/// underscores to single hyphens, trim hyphens from the edges.
pub fn normalize_concept_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_hyphen = false;
    for ch in name.chars() {
        if ch.is_whitespace() || ch == '_' || ch == '-' {
            pending_hyphen = true;
            continue;
        }
        if !ch.is_alphanumeric() {
            continue;
        }
        if pending_hyphen && !out.is_empty() {
            out.push('-');
        }
        pending_hyphen = false;
        for lower in ch.to_lowercase() {
            out.push(lower);
        }
    }
    out
}

/// URL-ish slug for section titles. Same rules as concept normalization.
pub fn slug(title: &str) -> String {
    normalize_concept_name(title)
}

/// Resolve a relative markdown link against the directory of `source_path`.
///
/// Returns `None` for links that cannot name a corpus document: empty or
/// fragment-only links, external URLs, and paths that escape the repository
/// root. Fragments are stripped before resolution.
pub fn resolve_relative_link(source_path: &str, target: &str) -> Option<String> {
    let target = target.trim();
    if target.is_empty() || target.starts_with('#') {
        return None;
    }
    if target.contains("://") || target.starts_with("mailto:") {
        return None;
    }

    let target = match target.split_once('#') {
        Some((path, _fragment)) => path,
        None => target,
    };
    if target.is_empty() {
        return None;
    }

    // Leading slash means repo-root-relative; otherwise resolve against the
    // source document's own directory.
    let mut components: Vec<&str> = if target.starts_with('/') {
        Vec::new()
    } else {
        let mut dir: Vec<&str> = source_path.split('/').collect();
        dir.pop();
        dir
    };

    for part in target.trim_start_matches('/').split('/') {
        match part {
            "" | "." => {}
            ".." => {
                // A link climbing above the repository root cannot resolve.
                components.pop()?;
            }
            other => components.push(other),
        }
    }

    if components.is_empty() {
        return None;
    }
    Some(components.join("/"))
}
