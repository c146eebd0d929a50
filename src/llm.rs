use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "llama3.2:latest";

const CITATION_RULES: &str = "\
Answer the question based only on the following context. Provide a detailed answer which is \
complete and covers the topics of the context while answering only through the context provided.
When making claims or statements, include inline citations using the format [Source X], where X \
is the source number provided.

You must strictly follow these citation rules:

1. Every factual claim, definition, or piece of information must include an inline citation in the format [Source X].
2. The citation must name exactly the source the fact was taken from.
3. If one sentence uses information from several sources, cite all of them, like [Source 1][Source 3].
4. Do not refer to source numbers in the body of the sentence. Write \"The lion is the king of the jungle[Source 1]\", not \"Source 1 states that the lion is the king of the jungle\".
5. Do not say \"according to Source X\" or \"Source X says\". The citation comes only at the end of the sentence or clause.
6. If no provided context supports the claim, say \"The answer cannot be determined from the given sources.\" Never mention the sources or that sources were provided in that case.
7. Do not make any statement without a citation, even if it seems obvious, when it appears in the context.";

pub fn render_prompt(context: &str, question: &str) -> String {
    format!(
        "{CITATION_RULES}\n\n---\n\nContext:\n{context}\n\n---\n\nAnswer the question based on the above context:\n{question}\n"
    )
}

pub trait LanguageModel {
    fn name(&self) -> &str;
    fn generate(&self, prompt: &str) -> Result<String>;
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

pub struct OllamaModel {
    client: Client,
    url_generate: String,
    model: String,
}

impl OllamaModel {
    pub fn new(base_url: &str, model: &str, timeout_ms: u64) -> Result<Self> {
        let base = base_url.trim().trim_end_matches('/');
        if base.is_empty() {
            bail!("ollama url must not be empty");
        }

        let mut builder = Client::builder();
        if timeout_ms > 0 {
            builder = builder.timeout(Duration::from_millis(timeout_ms));
        }
        let client = builder.build().context("failed to build http client")?;

        Ok(Self {
            client,
            url_generate: format!("{base}/api/generate"),
            model: model.to_string(),
        })
    }
}

impl LanguageModel for OllamaModel {
    fn name(&self) -> &str {
        &self.model
    }

    fn generate(&self, prompt: &str) -> Result<String> {
        debug!(url = %self.url_generate, model = %self.model, "requesting completion");
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
        };

        let response = self
            .client
            .post(&self.url_generate)
            .json(&request)
            .send()
            .with_context(|| format!("ollama request to {} failed", self.url_generate))?
            .error_for_status()
            .context("ollama returned an error status")?;
        let body: GenerateResponse = response
            .json()
            .context("invalid ollama generate response")?;

        Ok(body.response)
    }
}

pub struct ReplayModel {
    path: PathBuf,
    name: String,
}

impl ReplayModel {
    pub fn new(path: PathBuf) -> Self {
        let name = format!("replay:{}", path.display());
        Self { path, name }
    }
}

impl LanguageModel for ReplayModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn generate(&self, _prompt: &str) -> Result<String> {
        let response = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read response file {}", self.path.display()))?;
        info!(path = %self.path.display(), "replaying saved model response");
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_prompt_places_context_before_question() {
        let prompt = render_prompt("[Source 1] Rent doubles.", "When does rent double?");

        let context_at = prompt.find("[Source 1] Rent doubles.").expect("context");
        let question_at = prompt.find("When does rent double?").expect("question");
        assert!(context_at < question_at);
        assert!(prompt.starts_with("Answer the question based only on the following context."));
        assert!(prompt.contains("[Source X]"));
        assert!(prompt.ends_with("When does rent double?\n"));
    }

    #[test]
    fn render_prompt_does_not_expand_braces_in_inputs() {
        let prompt = render_prompt("{question}", "{context}");
        assert!(prompt.contains("Context:\n{question}\n"));
        assert!(prompt.ends_with("{context}\n"));
    }

    #[test]
    fn replay_model_returns_file_contents() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("response.txt");
        fs::write(&path, "Rent doubles [Source 1].").expect("write");

        let model = ReplayModel::new(path);
        assert_eq!(model.generate("ignored").expect("generate"), "Rent doubles [Source 1].");
        assert!(model.name().starts_with("replay:"));
    }

    #[test]
    fn replay_model_reports_missing_file() {
        let model = ReplayModel::new(PathBuf::from("/nonexistent/response.txt"));
        assert!(model.generate("ignored").is_err());
    }

    #[test]
    fn ollama_model_rejects_empty_url() {
        assert!(OllamaModel::new("  ", DEFAULT_MODEL, 1000).is_err());
        let model = OllamaModel::new("http://localhost:11434/", DEFAULT_MODEL, 0).expect("model");
        assert_eq!(model.url_generate, "http://localhost:11434/api/generate");
        assert_eq!(model.name(), DEFAULT_MODEL);
    }
}
