use std::collections::HashMap;
use std::fmt::Write as _;

use anyhow::{Context, Result};
use regex::{Captures, Regex};
use serde::Serialize;

use super::navigation::{NavigationResolver, ResolvedLocation};
use super::rewrite::{ProcessedResponse, RenumberedCitation};

const SOURCES_HEADER: &str = "\n\nSources:\n";
const NO_SOURCES_SUFFIX: &str = "\n\n(No sources cited)";

#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub question: String,
    pub response_text: String,
    pub citations: Vec<RenumberedCitation>,
    pub formatted_response: String,
    pub html_response_with_tooltips: String,
    pub context_used: String,
    pub total_citations_used: usize,
    pub locations: Vec<ResolvedLocation>,
    pub scrubbed_markers: Vec<String>,
}

#[derive(Debug)]
pub struct AnswerFormatter {
    marker_regex: Regex,
}

impl AnswerFormatter {
    pub fn new() -> Result<Self> {
        let marker_regex =
            Regex::new(r"\[Source (\d+)\]").context("failed to compile citation marker regex")?;
        Ok(Self { marker_regex })
    }

    pub fn assemble(
        &self,
        question: &str,
        processed: ProcessedResponse,
        context_used: String,
        navigation: &NavigationResolver,
    ) -> QueryResult {
        let locations = processed
            .citations
            .iter()
            .map(|citation| navigation.resolve_citation(citation))
            .collect::<Vec<ResolvedLocation>>();

        QueryResult {
            question: question.to_string(),
            formatted_response: format_with_sources(&processed.text, &processed.citations),
            html_response_with_tooltips: self.html_with_tooltips(&processed.text, &processed.citations),
            total_citations_used: processed.citations.len(),
            response_text: processed.text,
            citations: processed.citations,
            context_used,
            locations,
            scrubbed_markers: processed.scrubbed_markers,
        }
    }

    // One pass, so inserted markup is never rescanned.
    pub fn html_with_tooltips(&self, text: &str, citations: &[RenumberedCitation]) -> String {
        if citations.is_empty() {
            return text.to_string();
        }

        let tooltips = citations
            .iter()
            .map(|citation| (citation.new_source_num, escape_attribute(&citation.content)))
            .collect::<HashMap<usize, String>>();

        self.marker_regex
            .replace_all(text, |captures: &Captures| {
                let tooltip = captures[1]
                    .parse::<usize>()
                    .ok()
                    .and_then(|number| tooltips.get(&number).map(|tooltip| (number, tooltip)));
                match tooltip {
                    Some((number, tooltip)) => format!(
                        "<span class=\"citation-tooltip\" data-tooltip=\"{tooltip}\" title=\"{tooltip}\">[Source {number}]</span>"
                    ),
                    None => captures[0].to_string(),
                }
            })
            .into_owned()
    }
}

pub fn format_with_sources(text: &str, citations: &[RenumberedCitation]) -> String {
    if citations.is_empty() {
        return format!("{text}{NO_SOURCES_SUFFIX}");
    }

    let mut formatted = format!("{text}{SOURCES_HEADER}");
    for citation in citations {
        let _ = writeln!(
            formatted,
            "[Source {}] {}, p. {}",
            citation.new_source_num, citation.filename, citation.page_reference
        );
    }
    formatted
}

fn escape_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}
