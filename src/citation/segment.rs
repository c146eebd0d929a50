//! Paragraph-bounded chunking of extracted page text.

use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;

use super::identity::ChunkIdentity;

pub const DEFAULT_MAX_CHUNK_CHARS: usize = 800;
pub const DEFAULT_MIN_PARAGRAPH_CHARS: usize = 20;

const SENTENCE_FALLBACK_MIN_CHARS: usize = 400;
const FALLBACK_PIECE_CHARS: usize = 200;

// Unicode noncharacter; never valid in interchange text, stripped from input first.
const PARAGRAPH_BREAK: char = '\u{FDD0}';

const DISCOURSE_MARKERS: &[&str] = &[
    "An example of",
    "For instance",
    "However",
    "Moreover",
    "Furthermore",
    "In addition",
    "Therefore",
    "Thus",
    "Consequently",
    "In conclusion",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmenterConfig {
    pub max_chunk_chars: usize,
    pub min_paragraph_chars: usize,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            max_chunk_chars: DEFAULT_MAX_CHUNK_CHARS,
            min_paragraph_chars: DEFAULT_MIN_PARAGRAPH_CHARS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    pub identity: ChunkIdentity,
    pub text: String,
}

impl Chunk {
    pub fn id(&self) -> String {
        self.identity.to_string()
    }
}

#[derive(Debug)]
pub struct ParagraphSegmenter {
    config: SegmenterConfig,
    blank_line_regex: Regex,
    paragraph_starter_regex: Regex,
    sentence_boundary_regex: Regex,
    clause_boundary_regex: Regex,
}

impl ParagraphSegmenter {
    pub fn new(config: SegmenterConfig) -> Result<Self> {
        let blank_line_regex =
            Regex::new(r"\n\s*\n+").context("failed to compile blank line regex")?;

        let markers = DISCOURSE_MARKERS
            .iter()
            .map(|marker| regex::escape(marker))
            .collect::<Vec<String>>()
            .join("|");
        // Only a sentence terminator, a newline, and one of these openers counts.
        let paragraph_starter_regex = Regex::new(&format!(
            r"([.!?])[ \t\r]*\n\s*((?:{markers})\b|[0-9]+(?:\.[0-9]+)*[.)]?[ \t]+[A-Z]|[A-Za-z][.)][ \t]|[A-Z]{{2,}}(?:[ \t]+[A-Z]{{2,}})*\b)"
        ))
        .context("failed to compile paragraph starter regex")?;

        let sentence_boundary_regex =
            Regex::new(r"[.!?](\s+)[A-Z]").context("failed to compile sentence regex")?;
        let clause_boundary_regex =
            Regex::new(r"[,;]\s+").context("failed to compile clause boundary regex")?;

        Ok(Self {
            config,
            blank_line_regex,
            paragraph_starter_regex,
            sentence_boundary_regex,
            clause_boundary_regex,
        })
    }

    pub fn segment_document(&self, document_id: &str, pages: &[String]) -> Vec<Chunk> {
        pages
            .iter()
            .enumerate()
            .flat_map(|(page_index, text)| self.segment_page(document_id, page_index, text))
            .collect()
    }

    pub fn segment_page(&self, document_id: &str, page_index: usize, text: &str) -> Vec<Chunk> {
        let page_number = u32::try_from(page_index + 1).unwrap_or(u32::MAX);
        let mut chunks = Vec::<Chunk>::new();

        for (paragraph_offset, paragraph) in self.detect_paragraphs(text).iter().enumerate() {
            let paragraph_number = u32::try_from(paragraph_offset + 1).unwrap_or(u32::MAX);
            for (chunk_offset, chunk_text) in self.pack_paragraph(paragraph).into_iter().enumerate()
            {
                chunks.push(Chunk {
                    identity: ChunkIdentity::new(
                        document_id,
                        page_number,
                        paragraph_number,
                        u32::try_from(chunk_offset + 1).unwrap_or(u32::MAX),
                    ),
                    text: chunk_text,
                });
            }
        }

        chunks
    }

    pub fn detect_paragraphs(&self, text: &str) -> Vec<String> {
        let text = text.replace(PARAGRAPH_BREAK, "");
        let text = text.trim();
        if text.is_empty() {
            return Vec::new();
        }

        let break_marker = PARAGRAPH_BREAK.to_string();
        let marked = self.blank_line_regex.replace_all(text, break_marker.as_str());
        let marked = self
            .paragraph_starter_regex
            .replace_all(&marked, format!("${{1}}{PARAGRAPH_BREAK}${{2}}").as_str());

        marked
            .split(PARAGRAPH_BREAK)
            .map(condense_whitespace)
            .filter(|paragraph| {
                !paragraph.is_empty() && char_len(paragraph) >= self.config.min_paragraph_chars
            })
            .collect()
    }

    pub fn pack_paragraph(&self, paragraph: &str) -> Vec<String> {
        let max_chars = self.config.max_chunk_chars;
        if char_len(paragraph) <= max_chars {
            return vec![paragraph.to_string()];
        }

        let mut chunks = Vec::<String>::new();
        let mut current = String::new();

        for sentence in self.split_into_sentences(paragraph) {
            let candidate_len = if current.is_empty() {
                char_len(&sentence)
            } else {
                char_len(&current) + 1 + char_len(&sentence)
            };

            if candidate_len <= max_chars {
                if !current.is_empty() {
                    current.push(' ');
                }
                current.push_str(&sentence);
                continue;
            }

            if !current.is_empty() {
                chunks.push(current.trim().to_string());
            }
            current = sentence;
        }

        if !current.is_empty() {
            chunks.push(current.trim().to_string());
        }

        chunks
    }

    pub fn split_into_sentences(&self, text: &str) -> Vec<String> {
        let mut sentences = Vec::<&str>::new();
        let mut start = 0usize;

        for captures in self.sentence_boundary_regex.captures_iter(text) {
            let Some(gap) = captures.get(1) else {
                continue;
            };
            sentences.push(&text[start..gap.start()]);
            start = gap.end();
        }
        sentences.push(&text[start..]);

        if sentences.len() == 1 && char_len(text) > SENTENCE_FALLBACK_MIN_CHARS {
            return self.split_into_clause_pieces(text, FALLBACK_PIECE_CHARS);
        }

        sentences
            .into_iter()
            .map(str::trim)
            .filter(|sentence| !sentence.is_empty())
            .map(ToOwned::to_owned)
            .collect()
    }

    // Clause units end at `,`/`;` and keep their punctuation. A clause longer
    // than `max_chars` is cut at word boundaries.
    fn split_into_clause_pieces(&self, text: &str, max_chars: usize) -> Vec<String> {
        let mut clauses = Vec::<&str>::new();
        let mut start = 0usize;
        for boundary in self.clause_boundary_regex.find_iter(text) {
            clauses.push(&text[start..boundary.start() + 1]);
            start = boundary.end();
        }
        clauses.push(&text[start..]);

        let units = clauses.into_iter().flat_map(|clause| {
            if char_len(clause) <= max_chars {
                vec![clause]
            } else {
                clause.split_whitespace().collect()
            }
        });
        pack_units(units, max_chars)
    }
}

fn pack_units<'a>(units: impl IntoIterator<Item = &'a str>, max_chars: usize) -> Vec<String> {
    let mut pieces = Vec::<String>::new();
    let mut current = String::new();

    for unit in units.into_iter().map(str::trim).filter(|unit| !unit.is_empty()) {
        let candidate_len = if current.is_empty() {
            char_len(unit)
        } else {
            char_len(&current) + 1 + char_len(unit)
        };

        if candidate_len <= max_chars || current.is_empty() {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(unit);
            continue;
        }

        pieces.push(std::mem::take(&mut current));
        current.push_str(unit);
    }

    if !current.is_empty() {
        pieces.push(current);
    }

    pieces
}

fn condense_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<&str>>().join(" ")
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}
