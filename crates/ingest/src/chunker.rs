use lazy_static::lazy_static;
use regex::Regex;
use std::ops::Range;

use crate::chunk::Chunk;
use crate::document::Document;
use crate::scope::Scope;

lazy_static! {
    static ref SECTION_TAG: Regex = Regex::new(r"<section[^>]*>|</section>").expect("section tag pattern");

    /// A newline followed by one or more whitespace-only lines
    static ref BLANK_LINES: Regex = Regex::new(r"\r?\n(?:[ \t]*\r?\n)+").expect("blank line pattern");

    static ref SENTENCE_END: Regex = Regex::new(r"[.!?]\s+").expect("sentence end pattern");
}

/// Splitting strategy for a single scope.
///
/// Implementations return byte ranges into `text` in input order. Ranges may
/// include surrounding whitespace or be blank; the [`Chunker`] trims them and
/// drops the blank ones, so a strategy only has to decide where boundaries are.
pub trait SplitStrategy: Send + Sync {
    fn spans(&self, text: &str) -> Vec<Range<usize>>;
}

/// `full`: the whole document is one chunk.
pub struct WholeDocument;

impl SplitStrategy for WholeDocument {
    fn spans(&self, text: &str) -> Vec<Range<usize>> {
        vec![0..text.len()]
    }
}

/// `section`: `<section>` markup when present, markdown headings otherwise.
pub struct SectionSplitter;

impl SplitStrategy for SectionSplitter {
    fn spans(&self, text: &str) -> Vec<Range<usize>> {
        if text.contains("<section") || text.contains("</section>") {
            split_around(text, &SECTION_TAG)
        } else {
            heading_spans(text)
        }
    }
}

/// `paragraph`: one or more blank lines separate paragraphs.
pub struct ParagraphSplitter;

impl SplitStrategy for ParagraphSplitter {
    fn spans(&self, text: &str) -> Vec<Range<usize>> {
        split_around(text, &BLANK_LINES)
    }
}

/// `sentence`: breaks right after `.`, `!` or `?` when followed by whitespace.
///
/// Known limitation: abbreviations ("e.g. this") and decimals followed by a
/// space ("costs 3. Then") are split too.
pub struct SentenceSplitter;

impl SplitStrategy for SentenceSplitter {
    fn spans(&self, text: &str) -> Vec<Range<usize>> {
        let mut spans = Vec::new();
        let mut start = 0;

        for m in SENTENCE_END.find_iter(text) {
            // The terminator is a single ASCII byte and stays with its sentence
            spans.push(start..m.start() + 1);
            start = m.end();
        }
        spans.push(start..text.len());

        spans
    }
}

/// Pieces of `text` between matches of `pattern`; the matches themselves are dropped.
fn split_around(text: &str, pattern: &Regex) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut start = 0;

    for m in pattern.find_iter(text) {
        spans.push(start..m.start());
        start = m.end();
    }
    spans.push(start..text.len());

    spans
}

/// Sections start at every line beginning with `#`, heading line included.
/// Lines inside fenced code blocks never start a section.
fn heading_spans(text: &str) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut start = 0;
    let mut pos = 0;
    let mut in_fence = false;

    for line in text.split_inclusive('\n') {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
        } else if !in_fence && line.starts_with('#') && pos > start {
            spans.push(start..pos);
            start = pos;
        }
        pos += line.len();
    }
    spans.push(start..text.len());

    spans
}

fn trim_span(text: &str, span: Range<usize>) -> Option<Range<usize>> {
    let slice = &text[span.clone()];
    let trimmed = slice.trim();
    if trimmed.is_empty() {
        return None;
    }

    let start = span.start + (slice.len() - slice.trim_start().len());
    Some(start..start + trimmed.len())
}

pub struct Chunker {
    strategy: Box<dyn SplitStrategy>,
}

impl Chunker {
    pub fn for_scope(scope: Scope) -> Self {
        let strategy: Box<dyn SplitStrategy> = match scope {
            Scope::Full => Box::new(WholeDocument),
            Scope::Section => Box::new(SectionSplitter),
            Scope::Paragraph => Box::new(ParagraphSplitter),
            Scope::Sentence => Box::new(SentenceSplitter),
        };
        Self::with_strategy(strategy)
    }

    /// Use a custom splitter, e.g. a stronger sentence segmenter.
    pub fn with_strategy(strategy: Box<dyn SplitStrategy>) -> Self {
        Self { strategy }
    }

    /// Split raw text into trimmed, non-empty chunk strings in input order.
    pub fn split(&self, text: &str) -> Vec<String> {
        self.trimmed_spans(text)
            .into_iter()
            .map(|span| text[span].to_string())
            .collect()
    }

    pub fn chunk_document(&self, document: &Document) -> Vec<Chunk> {
        self.trimmed_spans(&document.text)
            .into_iter()
            .enumerate()
            .map(|(index, span)| {
                Chunk::new(
                    index,
                    document.doc_id.clone(),
                    document.text[span.clone()].to_string(),
                    (span.start, span.end),
                )
            })
            .collect()
    }

    fn trimmed_spans(&self, text: &str) -> Vec<Range<usize>> {
        self.strategy
            .spans(text)
            .into_iter()
            .filter_map(|span| trim_span(text, span))
            .collect()
    }
}

/// Split `text` at the given scope.
pub fn split(text: &str, scope: Scope) -> Vec<String> {
    Chunker::for_scope(scope).split(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_full_is_single_chunk() {
        let chunks = split("  # Title\n\nBody text.\n", Scope::Full);
        assert_eq!(chunks, vec!["# Title\n\nBody text."]);
    }

    #[test]
    fn test_paragraph_split() {
        assert_eq!(split("A\n\nB\n\nC", Scope::Paragraph), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_paragraph_split_collapses_blank_runs() {
        let text = "First line\nstill first.\n\n\n  \nSecond.\r\n\r\nThird.";
        assert_eq!(
            split(text, Scope::Paragraph),
            vec!["First line\nstill first.", "Second.", "Third."]
        );
    }

    #[test]
    fn test_sentence_split() {
        assert_eq!(
            split("Hello world. This is a test!", Scope::Sentence),
            vec!["Hello world.", "This is a test!"]
        );
    }

    #[test]
    fn test_sentence_split_known_limitation() {
        // Abbreviations are split; this is the documented heuristic, not a bug
        assert_eq!(
            split("Use e.g. a flag. Done?", Scope::Sentence),
            vec!["Use e.g.", "a flag.", "Done?"]
        );
        // Decimals without trailing whitespace stay intact
        assert_eq!(split("Pi is 3.14 today.", Scope::Sentence), vec!["Pi is 3.14 today."]);
    }

    #[test]
    fn test_markdown_sections_keep_heading_line() {
        let text = "Preamble\n# Intro\ntext\n## Usage\nmore\n";
        assert_eq!(
            split(text, Scope::Section),
            vec!["Preamble", "# Intro\ntext", "## Usage\nmore"]
        );
    }

    #[test]
    fn test_markdown_sections_ignore_fenced_comments() {
        let text = "# Install\n```sh\n# not a heading\nmake\n```\n# Next\nbody";
        assert_eq!(
            split(text, Scope::Section),
            vec!["# Install\n```sh\n# not a heading\nmake\n```", "# Next\nbody"]
        );
    }

    #[test]
    fn test_xml_sections() {
        let text = "<doc><section id=\"a\">One</section>\n<section>Two</section></doc>";
        assert_eq!(split(text, Scope::Section), vec!["<doc>", "One", "Two", "</doc>"]);
    }

    #[test]
    fn test_chunk_offsets_point_into_document() {
        let doc = Document::new("guide.md", "Alpha.\n\n  Beta gamma.  \n\nDelta.");
        let chunks = Chunker::for_scope(Scope::Paragraph).chunk_document(&doc);

        assert_eq!(chunks.len(), 3);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
            assert_eq!(&doc.text[chunk.offset.0..chunk.offset.1], chunk.text);
            assert_eq!(chunk.doc_id, doc.doc_id);
        }
        assert_eq!(chunks[1].text, "Beta gamma.");
    }

    #[test]
    fn test_custom_strategy() {
        struct Lines;
        impl SplitStrategy for Lines {
            fn spans(&self, text: &str) -> Vec<Range<usize>> {
                let mut pos = 0;
                text.split_inclusive('\n')
                    .map(|line| {
                        let span = pos..pos + line.len();
                        pos += line.len();
                        span
                    })
                    .collect()
            }
        }

        let chunker = Chunker::with_strategy(Box::new(Lines));
        assert_eq!(chunker.split("a\n\nb\n"), vec!["a", "b"]);
    }

    proptest! {
        #[test]
        fn prop_no_blank_chunks(text in "[a-zA-Z .!?#\n\t<>/]{0,200}") {
            for scope in Scope::ALL {
                for chunk in split(&text, scope) {
                    prop_assert!(!chunk.trim().is_empty());
                }
            }
        }

        #[test]
        fn prop_full_yields_exactly_one(text in "\\s*[a-z]{1,20}[a-z .\n]{0,100}") {
            prop_assert_eq!(split(&text, Scope::Full).len(), 1);
        }

        #[test]
        fn prop_chunks_are_ordered_and_disjoint(text in "[a-z .!?#\n]{0,200}") {
            let doc = Document::new("p.md", text);
            for scope in Scope::ALL {
                let chunks = Chunker::for_scope(scope).chunk_document(&doc);
                let mut last_end = 0;
                for chunk in &chunks {
                    prop_assert!(chunk.offset.0 >= last_end);
                    prop_assert_eq!(&doc.text[chunk.offset.0..chunk.offset.1], chunk.text.as_str());
                    last_end = chunk.offset.1;
                }
            }
        }
    }
}
