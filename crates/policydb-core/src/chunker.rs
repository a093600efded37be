//! Section chunking along level-2 markdown headers.
//!
//! Headers inside fenced code blocks are not boundaries. Chunks never
//! overlap, and joining chunk texts in order gives back the content up to
//! whitespace at the boundaries.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::Lines;

use crate::types::{Chunk, Document, Metadata};

/// Section label for text that precedes the first header.
pub const INTRODUCTION: &str = "Introduction";
pub const DEFAULT_WINDOW: usize = 3;

const HEADER_MARKER: &str = "## ";
const FENCE_MARKERS: [&str; 2] = ["```", "~~~"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkingMode {
    /// One chunk per level-2 header section.
    #[default]
    Headers,
    /// One chunk per sentence, with up to `window` neighbouring sentences
    /// on each side attached as `surrounding_context`.
    SentenceWindow { window: usize },
}

/// One header-bounded section of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub title: String,
    pub header_level: u8,
    /// Trimmed section text, including the header line when there is one.
    pub text: String,
}

/// Lazy iterator over the header sections of a document body.
pub struct HeaderSections<'a> {
    lines: Lines<'a>,
    open_fence: Option<&'static str>,
    pending_header: Option<&'a str>,
    done: bool,
}

impl<'a> HeaderSections<'a> {
    pub fn new(content: &'a str) -> Self {
        Self { lines: content.lines(), open_fence: None, pending_header: None, done: false }
    }

    fn fence_marker(line: &str) -> Option<&'static str> {
        let trimmed = line.trim_start();
        FENCE_MARKERS.iter().copied().find(|m| trimmed.starts_with(m))
    }

    /// Track fence state; true when `line` is a section boundary.
    fn is_boundary(&mut self, line: &str) -> bool {
        if let Some(marker) = Self::fence_marker(line) {
            match self.open_fence {
                None => self.open_fence = Some(marker),
                Some(open) if open == marker => self.open_fence = None,
                Some(_) => {}
            }
            return false;
        }
        self.open_fence.is_none() && line.starts_with(HEADER_MARKER)
    }
}

impl<'a> Iterator for HeaderSections<'a> {
    type Item = Section;

    fn next(&mut self) -> Option<Section> {
        loop {
            if self.done {
                return None;
            }
            let header = self.pending_header.take();
            let mut body: Vec<&str> = header.into_iter().collect();
            loop {
                let Some(line) = self.lines.next() else {
                    self.done = true;
                    break;
                };
                if self.is_boundary(line) {
                    self.pending_header = Some(line);
                    break;
                }
                body.push(line);
            }

            let text = body.join("\n").trim().to_string();
            match header {
                Some(h) => {
                    return Some(Section {
                        title: h.trim_start_matches('#').trim().to_string(),
                        header_level: 2,
                        text,
                    })
                }
                None if text.is_empty() => continue,
                None => {
                    return Some(Section { title: INTRODUCTION.to_string(), header_level: 1, text })
                }
            }
        }
    }
}

pub fn sections(content: &str) -> HeaderSections<'_> {
    HeaderSections::new(content)
}

fn chunk_metadata(base: &Metadata, index: usize, section: &Section) -> Metadata {
    let mut metadata = base.clone();
    metadata.insert("chunk_index".to_string(), Value::from(index));
    metadata.insert("header_level".to_string(), Value::from(section.header_level));
    metadata.insert("section".to_string(), Value::from(section.title.clone()));
    metadata
}

/// Split `content` into header-bounded chunks carrying `base` metadata.
pub fn chunk_document(content: &str, base: &Metadata) -> Vec<Chunk> {
    sections(content)
        .enumerate()
        .map(|(index, section)| Chunk {
            metadata: chunk_metadata(base, index, &section),
            text: section.text,
        })
        .collect()
}

/// Split text into sentences: after `.`, `!` or `?` followed by whitespace,
/// and at blank lines. A leading header line is its own sentence.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    for paragraph in text.split("\n\n") {
        let mut rest = paragraph.trim();
        if rest.starts_with('#') {
            let end = rest.find('\n').unwrap_or(rest.len());
            sentences.push(rest[..end].trim().to_string());
            rest = rest[end..].trim_start();
        }
        let mut start = 0usize;
        let mut chars = rest.char_indices().peekable();
        while let Some((i, c)) = chars.next() {
            if matches!(c, '.' | '!' | '?') {
                if let Some(&(_, next)) = chars.peek() {
                    if next.is_whitespace() {
                        let piece = rest[start..i + c.len_utf8()].trim();
                        if !piece.is_empty() {
                            sentences.push(piece.to_string());
                        }
                        start = i + c.len_utf8();
                    }
                }
            }
        }
        let tail = rest[start..].trim();
        if !tail.is_empty() {
            sentences.push(tail.to_string());
        }
    }
    sentences
}

/// Sentence-level chunks. Chunks whose section has more than one sentence
/// carry `surrounding_context` and `has_context_window = true`; windows
/// stay inside their section.
pub fn chunk_sentence_window(content: &str, base: &Metadata, window: usize) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    for section in sections(content) {
        let sentences = split_sentences(&section.text);
        for (i, sentence) in sentences.iter().enumerate() {
            let mut metadata = chunk_metadata(base, chunks.len(), &section);
            let lo = i.saturating_sub(window);
            let hi = (i + window).min(sentences.len() - 1);
            if hi > lo {
                metadata.insert("surrounding_context".to_string(), Value::from(sentences[lo..=hi].join(" ")));
                metadata.insert("has_context_window".to_string(), Value::Bool(true));
            }
            chunks.push(Chunk { text: sentence.clone(), metadata });
        }
    }
    chunks
}

/// Chunks documents according to a [`ChunkingMode`].
#[derive(Debug, Clone, Default)]
pub struct Chunker {
    mode: ChunkingMode,
}

impl Chunker {
    pub fn new(mode: ChunkingMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> ChunkingMode {
        self.mode
    }

    pub fn chunk(&self, document: &Document) -> Vec<Chunk> {
        let chunks = match self.mode {
            ChunkingMode::Headers => chunk_document(&document.content, &document.metadata),
            ChunkingMode::SentenceWindow { window } => {
                chunk_sentence_window(&document.content, &document.metadata, window)
            }
        };
        tracing::debug!(doc_id = %document.doc_id(), chunks = chunks.len(), mode = ?self.mode, "chunked document");
        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(chunks: &[Chunk]) -> Vec<&str> {
        chunks.iter().map(|c| c.text.as_str()).collect()
    }

    #[test]
    fn two_header_sections() {
        let chunks = chunk_document("## A\nfoo\n\n## B\nbar\n", &Metadata::new());
        assert_eq!(texts(&chunks), vec!["## A\nfoo", "## B\nbar"]);
        assert_eq!(chunks[0].section(), Some("A"));
        assert_eq!(chunks[1].section(), Some("B"));
        assert_eq!(chunks[0].header_level(), Some(2));
        assert_eq!(chunks[1].chunk_index(), 1);
    }

    #[test]
    fn leading_text_becomes_introduction() {
        let chunks = chunk_document("# Title\n\nPreamble.\n\n## Scope\nAll teams.", &Metadata::new());
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].section(), Some(INTRODUCTION));
        assert_eq!(chunks[0].header_level(), Some(1));
        assert_eq!(chunks[0].text, "# Title\n\nPreamble.");
        assert_eq!(chunks[1].section(), Some("Scope"));
    }

    #[test]
    fn blank_introduction_is_omitted() {
        let chunks = chunk_document("\n\n  \n## Only\ntext", &Metadata::new());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_index(), 0);
        assert_eq!(chunks[0].section(), Some("Only"));
    }

    #[test]
    fn headers_inside_fences_are_not_boundaries() {
        let content = "## Example\n```markdown\n## Not a section\n```\nafter\n~~~\n## Still code\n~~~\n## Real\nend";
        let chunks = chunk_document(content, &Metadata::new());
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].text.contains("## Not a section"));
        assert!(chunks[0].text.contains("## Still code"));
        assert_eq!(chunks[1].section(), Some("Real"));
    }

    #[test]
    fn mismatched_fence_marker_does_not_close() {
        let content = "## A\n```\n~~~\n## inside\n```\n## B\nx";
        let chunks = chunk_document(content, &Metadata::new());
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].section(), Some("B"));
    }

    #[test]
    fn deeper_headers_stay_inside_section() {
        let chunks = chunk_document("## A\n### A.1\ntext\n# top\nmore", &Metadata::new());
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn empty_content_yields_nothing() {
        assert!(chunk_document("", &Metadata::new()).is_empty());
        assert!(chunk_document("  \n\n ", &Metadata::new()).is_empty());
    }

    #[test]
    fn base_metadata_is_inherited() {
        let mut base = Metadata::new();
        base.insert("id".into(), Value::from("G-1"));
        let chunks = chunk_document("## A\nx", &base);
        assert_eq!(chunks[0].metadata.get("id"), Some(&Value::from("G-1")));
    }

    #[test]
    fn sentences_split_on_terminators_and_paragraphs() {
        let s = split_sentences("## Purpose\nFirst one. Second one? Third!\n\nNew paragraph");
        assert_eq!(s, vec!["## Purpose", "First one.", "Second one?", "Third!", "New paragraph"]);
        assert_eq!(split_sentences("v1.2 is out. ok"), vec!["v1.2 is out.", "ok"]);
    }

    #[test]
    fn sentence_window_attaches_context() {
        let chunks = chunk_sentence_window("One. Two. Three. Four.", &Metadata::new(), 1);
        assert_eq!(texts(&chunks), vec!["One.", "Two.", "Three.", "Four."]);
        assert_eq!(chunks[0].metadata["surrounding_context"], Value::from("One. Two."));
        assert_eq!(chunks[2].metadata["surrounding_context"], Value::from("Two. Three. Four."));
        assert_eq!(chunks[3].metadata["has_context_window"], Value::Bool(true));
        let indexes: Vec<usize> = chunks.iter().map(Chunk::chunk_index).collect();
        assert_eq!(indexes, vec![0, 1, 2, 3]);
    }

    #[test]
    fn sentence_window_stays_in_section() {
        let chunks = chunk_sentence_window("Lonely.\n\n## B\nAlpha. Beta.", &Metadata::new(), 3);
        assert_eq!(chunks[0].text, "Lonely.");
        assert!(!chunks[0].metadata.contains_key("has_context_window"));
        assert_eq!(chunks[1].text, "## B");
        assert_eq!(chunks[1].section(), Some("B"));
        assert_eq!(chunks[3].metadata["surrounding_context"], Value::from("## B Alpha. Beta."));
    }

    #[test]
    fn chunker_dispatches_on_mode() {
        let doc = Document {
            metadata: Metadata::new(),
            content: "## A\nOne. Two.".into(),
            source_path: "a.md".into(),
        };
        assert_eq!(Chunker::default().chunk(&doc).len(), 1);
        assert_eq!(Chunker::new(ChunkingMode::SentenceWindow { window: 2 }).chunk(&doc).len(), 3);
    }

    #[test]
    fn default_mode_is_headers() {
        assert_eq!(ChunkingMode::default(), ChunkingMode::Headers);
        assert_eq!(Chunker::default().mode(), ChunkingMode::Headers);
        let parsed: ChunkingMode = serde_json::from_str("\"headers\"").unwrap();
        assert_eq!(parsed, ChunkingMode::default());
    }
}
