use std::time::Instant;

use anyhow::{Result, bail};
use tracing::{info, warn};

use crate::citation::{
    AnswerFormatter, CitationRegistry, CitationRewriter, ContentNormalizer, NavigationResolver,
    NormalizerOptions, QueryResult,
};
use crate::cli::{QueryArgs, default_db_path};
use crate::llm::{LanguageModel, OllamaModel, ReplayModel, render_prompt};
use crate::retrieval::{Retriever, VectorRetriever};
use crate::session::Session;

use super::output::{write_html_response, write_json_response, write_text_response};

pub fn run(args: QueryArgs) -> Result<()> {
    let question = args.query.trim();
    if question.is_empty() {
        bail!("query must not be empty");
    }

    let db_path = args
        .db_path
        .clone()
        .unwrap_or_else(|| default_db_path(&args.cache_root));
    if !db_path.exists() {
        bail!(
            "index store not found at {}; run `ragcite ingest` first",
            db_path.display()
        );
    }

    let session = Session::open_read_only(&db_path, &args.data_root, &args.model_id)?;
    let model: Box<dyn LanguageModel> = match &args.response_file {
        Some(path) => Box::new(ReplayModel::new(path.clone())),
        None => Box::new(OllamaModel::new(
            &args.ollama_url,
            &args.model,
            args.timeout_ms,
        )?),
    };

    let engine = AnswerEngine::new(NormalizerOptions {
        strip_filename_references: !args.keep_filename_references,
    })?;
    let retriever = VectorRetriever::new(&session);
    let result = engine.answer(
        question,
        args.k,
        &retriever,
        model.as_ref(),
        session.navigation(),
    )?;

    if args.json {
        write_json_response(&result)
    } else if args.html {
        write_html_response(&result)
    } else {
        write_text_response(&result, args.show_context)
    }
}

pub(super) struct AnswerEngine {
    normalizer: ContentNormalizer,
    rewriter: CitationRewriter,
    formatter: AnswerFormatter,
}

impl AnswerEngine {
    pub(super) fn new(options: NormalizerOptions) -> Result<Self> {
        Ok(Self {
            normalizer: ContentNormalizer::new(options)?,
            rewriter: CitationRewriter::new()?,
            formatter: AnswerFormatter::new()?,
        })
    }

    pub(super) fn answer(
        &self,
        question: &str,
        k: usize,
        retriever: &dyn Retriever,
        model: &dyn LanguageModel,
        navigation: &NavigationResolver,
    ) -> Result<QueryResult> {
        let results = retriever.retrieve(question, k)?;
        let registry = CitationRegistry::build(&results, k, &self.normalizer);
        info!(retrieved = results.len(), numbered = registry.len(), k, "retrieved chunks");
        if registry.is_empty() {
            warn!("no chunks retrieved; the model gets an empty context");
        }

        let context = registry.context();
        let prompt = render_prompt(&context, question);

        let started = Instant::now();
        let response = model.generate(&prompt)?;
        info!(
            model = %model.name(),
            duration_ms = started.elapsed().as_millis() as u64,
            response_chars = response.chars().count(),
            "model responded"
        );

        let processed = self.rewriter.process(&response, &registry);
        if !processed.scrubbed_markers.is_empty() {
            warn!(
                markers = ?processed.scrubbed_markers,
                "dropped citations to sources that were not retrieved"
            );
        }

        Ok(self
            .formatter
            .assemble(question, processed, context, navigation))
    }
}
