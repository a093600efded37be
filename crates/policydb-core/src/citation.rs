//! Citation strings of the form `[<doc_id>: <section>](<file_path>)`.

use crate::types::{FlatMetadata, HybridResult, Scalar};

fn non_empty<'a>(metadata: &'a FlatMetadata, key: &str) -> Option<&'a str> {
    metadata
        .get(key)
        .and_then(Scalar::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Render a citation; the section and path segments are dropped when
/// unknown.
pub fn format_citation(metadata: &FlatMetadata) -> String {
    let doc_id = non_empty(metadata, "doc_id")
        .or_else(|| non_empty(metadata, "id"))
        .unwrap_or("unknown");
    let label = match non_empty(metadata, "section") {
        Some(section) => format!("[{doc_id}: {section}]"),
        None => format!("[{doc_id}]"),
    };
    match non_empty(metadata, "file_path") {
        Some(path) => format!("{label}({path})"),
        None => label,
    }
}

/// Render ranked results as numbered, cited context blocks for a synthesis
/// prompt.
pub fn format_context(results: &[HybridResult]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, r)| format!("{}. {}\n{}", i + 1, format_citation(&r.metadata), r.text.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SourceKind;

    fn meta(pairs: &[(&str, &str)]) -> FlatMetadata {
        pairs.iter().map(|(k, v)| (k.to_string(), Scalar::from(*v))).collect()
    }

    #[test]
    fn full_citation() {
        let m = meta(&[("doc_id", "G-1"), ("section", "Purpose"), ("file_path", "docs/g1.md")]);
        assert_eq!(format_citation(&m), "[G-1: Purpose](docs/g1.md)");
    }

    #[test]
    fn missing_segments_are_dropped() {
        assert_eq!(format_citation(&meta(&[("doc_id", "G-1"), ("file_path", "docs/g1.md")])), "[G-1](docs/g1.md)");
        assert_eq!(format_citation(&meta(&[("doc_id", "G-1"), ("section", "Scope")])), "[G-1: Scope]");
        assert_eq!(format_citation(&meta(&[("doc_id", "G-1"), ("file_path", "")])), "[G-1]");
        assert_eq!(format_citation(&meta(&[("id", "ADR-2")])), "[ADR-2]");
        assert_eq!(format_citation(&FlatMetadata::new()), "[unknown]");
    }

    #[test]
    fn context_is_numbered_and_cited() {
        let results = vec![
            HybridResult {
                id: "G-1_0".into(),
                text: "## Purpose\nWhy.\n".into(),
                metadata: meta(&[("doc_id", "G-1"), ("section", "Purpose")]),
                score: 0.1,
                source: SourceKind::Vector,
                related_docs: vec![],
            },
            HybridResult {
                id: "G-2_1".into(),
                text: "Other.".into(),
                metadata: meta(&[("doc_id", "G-2")]),
                score: 0.3,
                source: SourceKind::Graph,
                related_docs: vec![],
            },
        ];
        assert_eq!(format_context(&results), "1. [G-1: Purpose]\n## Purpose\nWhy.\n\n2. [G-2]\nOther.");
    }
}
