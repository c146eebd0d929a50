use std::collections::HashMap;

use anyhow::{Context, Result};
use regex::{Captures, Regex};
use serde::Serialize;
use tracing::debug;

use super::registry::CitationRegistry;

// Noncharacters never produced by a model or kept from user input; they
// delimit the placeholder of a renumbered marker between passes.
const PLACEHOLDER_OPEN: char = '\u{FDD1}';
const PLACEHOLDER_CLOSE: char = '\u{FDD2}';

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenumberedCitation {
    pub new_source_num: usize,
    pub original_source_num: usize,
    pub filename: String,
    pub page_reference: String,
    pub source_id: String,
    pub relevance_score: Option<f64>,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessedResponse {
    pub text: String,
    pub citations: Vec<RenumberedCitation>,
    /// Numbers of markers removed from `text` because they name no retrieved
    /// source. Empty whenever the response was returned unchanged.
    pub scrubbed_markers: Vec<String>,
}

impl ProcessedResponse {
    fn unchanged(text: &str) -> Self {
        Self {
            text: text.to_string(),
            citations: Vec::new(),
            scrubbed_markers: Vec::new(),
        }
    }
}

#[derive(Debug)]
pub struct CitationRewriter {
    marker_regex: Regex,
    bare_marker_regex: Regex,
    placeholder_regex: Regex,
    whitespace_regex: Regex,
}

impl CitationRewriter {
    pub fn new() -> Result<Self> {
        Ok(Self {
            marker_regex: Regex::new(r"\[Source (\d+)\]")
                .context("failed to compile citation marker regex")?,
            bare_marker_regex: Regex::new(r"\[\d+\]")
                .context("failed to compile bare numeric marker regex")?,
            placeholder_regex: Regex::new(r"\x{FDD1}(\d+)\x{FDD2}")
                .context("failed to compile citation placeholder regex")?,
            whitespace_regex: Regex::new(r"\s+").context("failed to compile whitespace regex")?,
        })
    }

    pub fn process(&self, response: &str, registry: &CitationRegistry) -> ProcessedResponse {
        let mut used = Vec::<usize>::new();
        let mut scrubbed = Vec::<String>::new();
        for captures in self.marker_regex.captures_iter(response) {
            let raw = &captures[1];
            match raw.parse::<usize>().ok().filter(|n| registry.get(*n).is_some()) {
                Some(number) => {
                    if !used.contains(&number) {
                        used.push(number);
                    }
                }
                None => {
                    if !scrubbed.iter().any(|seen| seen == raw) {
                        scrubbed.push(raw.to_string());
                    }
                }
            }
        }

        if used.is_empty() {
            return ProcessedResponse::unchanged(response);
        }

        let renumbering = used
            .iter()
            .enumerate()
            .map(|(index, original)| (*original, index + 1))
            .collect::<HashMap<usize, usize>>();

        let sanitized = response.replace([PLACEHOLDER_OPEN, PLACEHOLDER_CLOSE], "");
        let placeheld = self
            .marker_regex
            .replace_all(&sanitized, |captures: &Captures| {
                let renumbered = captures[1]
                    .parse::<usize>()
                    .ok()
                    .and_then(|original| renumbering.get(&original));
                match renumbered {
                    Some(new_number) => {
                        format!("{PLACEHOLDER_OPEN}{new_number}{PLACEHOLDER_CLOSE}")
                    }
                    None => captures[0].to_string(),
                }
            });
        // Every marker still spelled out at this point was rejected above.
        let without_invalid = self.marker_regex.replace_all(&placeheld, "");
        let without_bare = self.bare_marker_regex.replace_all(&without_invalid, "");
        let restored = self
            .placeholder_regex
            .replace_all(&without_bare, "[Source $1]");
        let text = self
            .whitespace_regex
            .replace_all(&restored, " ")
            .trim()
            .to_string();

        if !scrubbed.is_empty() {
            debug!(markers = ?scrubbed, "scrubbed citation markers without a retrieved source");
        }

        let citations = used
            .iter()
            .enumerate()
            .filter_map(|(index, original)| {
                registry.get(*original).map(|citation| RenumberedCitation {
                    new_source_num: index + 1,
                    original_source_num: *original,
                    filename: citation.filename.clone(),
                    page_reference: citation.page_reference.clone(),
                    source_id: citation.source_id.clone(),
                    relevance_score: citation.relevance_score,
                    content: citation.content.clone(),
                })
            })
            .collect();

        ProcessedResponse {
            text,
            citations,
            scrubbed_markers: scrubbed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::citation::normalize::{ContentNormalizer, NormalizerOptions};
    use crate::citation::registry::RetrievedChunk;

    fn registry(count: usize, k: usize) -> CitationRegistry {
        let normalizer = ContentNormalizer::new(NormalizerOptions::default()).expect("normalizer");
        let results = (1..=count)
            .map(|rank| RetrievedChunk {
                content: format!("Retrieved passage number {rank} text."),
                id: Some(format!("data/rules.pdf:{rank}:1:1")),
                distance: Some(0.25),
            })
            .collect::<Vec<RetrievedChunk>>();
        CitationRegistry::build(&results, k, &normalizer)
    }

    fn rewriter() -> CitationRewriter {
        CitationRewriter::new().expect("rewriter")
    }

    fn mapping(processed: &ProcessedResponse) -> Vec<(usize, usize)> {
        processed
            .citations
            .iter()
            .map(|citation| (citation.new_source_num, citation.original_source_num))
            .collect()
    }

    #[test]
    fn renumbers_by_first_appearance_and_scrubs_out_of_range() {
        let processed = rewriter().process(
            "A[Source 2]. B[Source 1][Source 2]. C[Source 9].",
            &registry(3, 3),
        );

        assert_eq!(processed.text, "A[Source 1]. B[Source 2][Source 1]. C.");
        assert_eq!(mapping(&processed), vec![(1, 2), (2, 1)]);
        assert_eq!(processed.scrubbed_markers, vec!["9".to_string()]);
    }

    #[test]
    fn citations_copy_display_fields_from_registry() {
        let processed = rewriter().process("Roll again [Source 3].", &registry(3, 3));

        let citation = &processed.citations[0];
        assert_eq!(citation.new_source_num, 1);
        assert_eq!(citation.original_source_num, 3);
        assert_eq!(citation.filename, "rules.pdf");
        assert_eq!(citation.page_reference, "3 (\u{b6}1.1)");
        assert_eq!(citation.source_id, "data/rules.pdf:3:1:1");
        assert_eq!(citation.relevance_score, Some(0.75));
        assert_eq!(citation.content, "Retrieved passage number 3 text.");
        assert_eq!(processed.text, "Roll again [Source 1].");
    }

    #[test]
    fn response_without_markers_is_returned_unchanged() {
        let response = "No  citations\nhere at all.";
        let processed = rewriter().process(response, &registry(3, 3));

        assert_eq!(processed.text, response);
        assert!(processed.citations.is_empty());
    }

    #[test]
    fn response_with_only_invalid_markers_is_returned_unchanged() {
        let response = "Only an invented source [Source 999] and [42].";
        let processed = rewriter().process(response, &registry(5, 5));

        assert_eq!(processed.text, response);
        assert!(processed.citations.is_empty());
        assert!(processed.scrubbed_markers.is_empty());
    }

    #[test]
    fn invalid_marker_is_scrubbed_when_valid_citations_exist() {
        let processed = rewriter().process(
            "Rent doubles [Source 1]. Houses are free [Source 999].",
            &registry(5, 5),
        );

        assert!(!processed.text.contains("999"));
        assert_eq!(processed.text, "Rent doubles [Source 1]. Houses are free .");
        assert_eq!(mapping(&processed), vec![(1, 1)]);
    }

    #[test]
    fn bare_numeric_markers_are_stripped_without_citations() {
        let processed = rewriter().process(
            "The study [42] found [Source 2] that rent doubles.",
            &registry(3, 3),
        );

        assert_eq!(processed.text, "The study found [Source 1] that rent doubles.");
        assert_eq!(mapping(&processed), vec![(1, 2)]);
    }

    #[test]
    fn numbers_past_the_retrieved_results_are_invalid() {
        // k allows five sources but only two chunks came back.
        let processed = rewriter().process("X [Source 4]. Y [Source 2].", &registry(2, 5));

        assert_eq!(processed.text, "X . Y [Source 1].");
        assert_eq!(mapping(&processed), vec![(1, 2)]);
        assert_eq!(processed.scrubbed_markers, vec!["4".to_string()]);
    }

    #[test]
    fn zero_and_overflowing_numbers_are_scrubbed() {
        let processed = rewriter().process(
            "A [Source 0] B [Source 99999999999999999999999] C [Source 1]",
            &registry(3, 3),
        );

        assert_eq!(processed.text, "A B C [Source 1]");
        assert_eq!(processed.citations.len(), 1);
    }

    #[test]
    fn swapping_numbers_does_not_collide() {
        let processed = rewriter().process(
            "[Source 3] then [Source 2] then [Source 1] then [Source 3]",
            &registry(3, 3),
        );

        assert_eq!(
            processed.text,
            "[Source 1] then [Source 2] then [Source 3] then [Source 1]"
        );
        assert_eq!(mapping(&processed), vec![(1, 3), (2, 2), (3, 1)]);
    }

    #[test]
    fn new_numbers_form_a_gapless_range_in_first_appearance_order() {
        let response = "[Source 5] a [Source 2] b [Source 5] c [Source 4] d [Source 2] e [Source 1]";
        let processed = rewriter().process(response, &registry(5, 5));

        let new_numbers = processed
            .citations
            .iter()
            .map(|citation| citation.new_source_num)
            .collect::<Vec<usize>>();
        assert_eq!(new_numbers, vec![1, 2, 3, 4]);

        let originals = processed
            .citations
            .iter()
            .map(|citation| citation.original_source_num)
            .collect::<Vec<usize>>();
        assert_eq!(originals, vec![5, 2, 4, 1]);
    }

    #[test]
    fn malformed_markers_pass_through() {
        let processed = rewriter().process(
            "Keep [source 1] and [Source one] and [Source-2] but cite [Source 1].",
            &registry(3, 3),
        );

        assert_eq!(
            processed.text,
            "Keep [source 1] and [Source one] and [Source-2] but cite [Source 1]."
        );
        assert_eq!(mapping(&processed), vec![(1, 1)]);
    }

    #[test]
    fn placeholder_characters_in_input_are_discarded() {
        let response = format!("Forged {PLACEHOLDER_OPEN}7{PLACEHOLDER_CLOSE} and [Source 1].");
        let processed = rewriter().process(&response, &registry(3, 3));

        assert_eq!(processed.text, "Forged 7 and [Source 1].");
    }

    #[test]
    fn empty_registry_leaves_text_unchanged() {
        let processed = rewriter().process("See [Source 1].", &registry(0, 0));

        assert_eq!(processed.text, "See [Source 1].");
        assert!(processed.citations.is_empty());
    }
}
