use serde::Serialize;

use super::identity::{document_filename, split_identity};
use super::normalize::ContentNormalizer;

pub const CONTEXT_DELIMITER: &str = "\n\n---\n\n";

const UNKNOWN_SOURCE_ID: &str = "Unknown";
const UNKNOWN_DOCUMENT: &str = "Unknown Document";
const UNKNOWN_PAGE: &str = "N/A";

#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub content: String,
    pub id: Option<String>,
    pub distance: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Citation {
    pub source_num: usize,
    pub filename: String,
    pub page_reference: String,
    pub source_id: String,
    pub relevance_score: Option<f64>,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct CitationRegistry {
    k: usize,
    citations: Vec<Citation>,
}

impl CitationRegistry {
    pub fn build(results: &[RetrievedChunk], k: usize, normalizer: &ContentNormalizer) -> Self {
        let citations = results
            .iter()
            .take(k)
            .enumerate()
            .map(|(index, result)| {
                let source_id = result
                    .id
                    .as_deref()
                    .map(str::trim)
                    .filter(|value| !value.is_empty())
                    .unwrap_or(UNKNOWN_SOURCE_ID)
                    .to_string();
                let (filename, page_reference) = match result.id.as_deref() {
                    Some(raw) if !raw.trim().is_empty() => describe_source(raw.trim()),
                    _ => (UNKNOWN_DOCUMENT.to_string(), UNKNOWN_PAGE.to_string()),
                };

                Citation {
                    source_num: index + 1,
                    content: normalizer.normalize(&result.content, &filename),
                    filename,
                    page_reference,
                    source_id,
                    relevance_score: result.distance.and_then(relevance_from_distance),
                }
            })
            .collect();

        Self { k, citations }
    }

    pub fn len(&self) -> usize {
        self.citations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.citations.is_empty()
    }

    /// Lookup by source number. Numbers outside `1..=k`, or past the number of
    /// chunks actually retrieved, have no citation.
    pub fn get(&self, source_num: usize) -> Option<&Citation> {
        if source_num == 0 || source_num > self.k {
            return None;
        }
        self.citations.get(source_num - 1)
    }

    pub fn context(&self) -> String {
        self.citations
            .iter()
            .map(|citation| format!("[Source {}] {}", citation.source_num, citation.content))
            .collect::<Vec<String>>()
            .join(CONTEXT_DELIMITER)
    }
}

fn describe_source(source_id: &str) -> (String, String) {
    let fields = split_identity(source_id);
    let filename = fields
        .first()
        .map(|document| document_filename(document))
        .filter(|name| !name.is_empty())
        .unwrap_or(UNKNOWN_DOCUMENT)
        .to_string();

    let page_reference = match fields.as_slice() {
        [_, page, paragraph, chunk, ..] => format!("{page} (\u{b6}{paragraph}.{chunk})"),
        [_, page, paragraph] => format!("{page} (\u{b6}{paragraph})"),
        [_, page] if !page.is_empty() => page.to_string(),
        _ => UNKNOWN_PAGE.to_string(),
    };

    (filename, page_reference)
}

fn relevance_from_distance(distance: f64) -> Option<f64> {
    if !distance.is_finite() {
        return None;
    }
    Some(((1.0 - distance) * 1000.0).round() / 1000.0)
}
