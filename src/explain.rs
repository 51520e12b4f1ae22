//! Top-level orchestration: one request in, one [`ExplainResponse`] out.
//!
//! [`Explainer`] owns everything that outlives a request (configuration,
//! HTTP client and AI backend) and runs the pipeline stages strictly in
//! sequence for each call. Nothing is cached between requests; the PDF bytes
//! and extracted text are dropped on return.
//!
//! Style and identifier are validated before the first outbound request.

use crate::config::ExplainConfig;
use crate::error::ExplainError;
use crate::output::{ExplainResponse, ExplainStats, FigurePayload, PaperInfo, SummaryField};
use crate::pipeline::explain::{
    request_explanation, ExplanationBackend, ExplanationRequest, LlmBackend,
};
use crate::pipeline::extract::Extraction;
use crate::pipeline::source::{self, ArxivId, PaperMetadata};
use crate::pipeline::{extract, filter, matcher};
use crate::progress::Stage;
use crate::style::ExplanationStyle;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Runs the explanation pipeline.
///
/// Cheap to share: wrap in an `Arc` and call from as many tasks as needed.
///
/// # Example
/// ```rust,no_run
/// use arxiv_eli5::{ExplainConfig, Explainer};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let explainer = Explainer::new(ExplainConfig::default())?;
/// let out = explainer
///     .explain("https://arxiv.org/abs/1706.03762", Some("harry-potter"))
///     .await?;
/// println!("{}", out.title);
/// # Ok(())
/// # }
/// ```
pub struct Explainer {
    config: ExplainConfig,
    client: reqwest::Client,
    backend: Arc<dyn ExplanationBackend>,
}

impl Explainer {
    /// Build with the LLM provider resolved from `config` and the environment.
    pub fn new(config: ExplainConfig) -> Result<Self, ExplainError> {
        let backend = Arc::new(LlmBackend::from_config(&config)?);
        Self::with_backend(config, backend)
    }

    /// Build with an explicit backend.
    pub fn with_backend(
        config: ExplainConfig,
        backend: Arc<dyn ExplanationBackend>,
    ) -> Result<Self, ExplainError> {
        let client = source::build_client(&config)?;
        Ok(Self {
            config,
            client,
            backend,
        })
    }

    pub fn config(&self) -> &ExplainConfig {
        &self.config
    }

    /// Explain the paper at `url` (any accepted arXiv form).
    ///
    /// `style` of `None` uses the configured default style.
    pub async fn explain(
        &self,
        url: &str,
        style: Option<&str>,
    ) -> Result<ExplainResponse, ExplainError> {
        let style = match style {
            Some(s) => s.parse::<ExplanationStyle>()?,
            None => self.config.default_style,
        };
        let id = ArxivId::parse(url, self.config.max_url_len)?;
        let total_start = Instant::now();
        info!("Explaining arXiv:{} in {} style", id, style);
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_start(&id.id);
        }

        self.stage_start(Stage::Fetching);
        let fetch_start = Instant::now();
        let paper = source::fetch_pdf(&self.client, &id, &self.config)
            .await
            .map_err(|e| self.stage_failed(Stage::Fetching, e))?;
        let metadata = if self.config.fetch_metadata {
            source::fetch_metadata(&self.client, &id, &self.config).await
        } else {
            None
        };
        let fetch_ms = fetch_start.elapsed().as_millis() as u64;
        self.stage_done(
            Stage::Fetching,
            &format!("{} KiB", paper.byte_size() / 1024),
        );

        let pdf_bytes = paper.byte_size();
        let mut response = self
            .run(paper.bytes, style, Some(&id), metadata, total_start)
            .await?;
        response.stats.pdf_bytes = pdf_bytes;
        response.stats.fetch_ms = fetch_ms;
        response.stats.total_ms = total_start.elapsed().as_millis() as u64;
        Ok(response)
    }

    /// Explain a PDF already in memory (e.g. a local file).
    ///
    /// `id` only labels the response; nothing is downloaded.
    pub async fn explain_pdf_bytes(
        &self,
        bytes: Vec<u8>,
        style: ExplanationStyle,
        id: Option<&ArxivId>,
    ) -> Result<ExplainResponse, ExplainError> {
        let total_start = Instant::now();
        let pdf_bytes = bytes.len() as u64;
        if pdf_bytes > self.config.max_pdf_bytes {
            return Err(ExplainError::PayloadTooLarge {
                what: "PDF".into(),
                limit_bytes: self.config.max_pdf_bytes,
            });
        }
        let mut response = self.run(bytes, style, id, None, total_start).await?;
        response.stats.pdf_bytes = pdf_bytes;
        Ok(response)
    }

    async fn run(
        &self,
        bytes: Vec<u8>,
        style: ExplanationStyle,
        id: Option<&ArxivId>,
        metadata: Option<PaperMetadata>,
        total_start: Instant,
    ) -> Result<ExplainResponse, ExplainError> {
        self.stage_start(Stage::Extracting);
        let extract_start = Instant::now();
        let extraction = extract::extract(bytes, &self.config)
            .await
            .map_err(|e| self.stage_failed(Stage::Extracting, e))?;
        let extract_ms = extract_start.elapsed().as_millis() as u64;
        self.stage_done(
            Stage::Extracting,
            &format!(
                "{} pages, {} characters",
                extraction.pages_processed,
                extraction.text.char_count()
            ),
        );

        let mut response = self.finish(extraction, style, id, metadata, total_start).await?;
        response.stats.extract_ms = extract_ms;
        Ok(response)
    }

    /// Run the stages after extraction (filter, explain, match) over an
    /// already extracted document.
    ///
    /// `id` only labels the response. Extraction and fetch timings are zero.
    pub async fn explain_extraction(
        &self,
        extraction: Extraction,
        style: ExplanationStyle,
        id: Option<&ArxivId>,
    ) -> Result<ExplainResponse, ExplainError> {
        self.finish(extraction, style, id, None, Instant::now()).await
    }

    async fn finish(
        &self,
        extraction: Extraction,
        style: ExplanationStyle,
        id: Option<&ArxivId>,
        metadata: Option<PaperMetadata>,
        total_start: Instant,
    ) -> Result<ExplainResponse, ExplainError> {
        let config = &self.config;

        self.stage_start(Stage::Filtering);
        let raw_count = extraction.figures.len();
        let figures = filter::filter_figures(extraction.figures, &config.figure_filter);
        self.stage_done(
            Stage::Filtering,
            &format!("{} of {} figures kept", figures.len(), raw_count),
        );

        self.stage_start(Stage::Explaining);
        let indices: Vec<usize> = figures.iter().map(|f| f.extraction_index).collect();
        let outcome = request_explanation(
            self.backend.as_ref(),
            ExplanationRequest {
                text: &extraction.text.text,
                style,
                figure_indices: &indices,
            },
            config,
        )
        .await
        .map_err(|e| self.stage_failed(Stage::Explaining, e))?;
        self.stage_done(
            Stage::Explaining,
            &format!("{} attempt(s)", outcome.attempts),
        );

        self.stage_start(Stage::Matching);
        let matched = matcher::match_figures(figures, &outcome.explanation.figures);
        let described = matched.iter().filter(|m| m.ai_described).count();
        self.stage_done(
            Stage::Matching,
            &format!("{} of {} figures described", described, matched.len()),
        );

        let (title, paper_info) = describe_paper(id, metadata, extraction.pdf_title);
        let stats = ExplainStats {
            pdf_bytes: 0,
            total_pages: extraction.total_pages,
            pages_processed: extraction.pages_processed,
            text_chars: extraction.text.char_count(),
            text_truncated: extraction.text.truncated,
            prompt_truncated: outcome.prompt_truncated,
            raw_figures: raw_count,
            figures_kept: matched.len(),
            figures_described: described,
            ai_attempts: outcome.attempts,
            input_tokens: outcome.input_tokens,
            output_tokens: outcome.output_tokens,
            fetch_ms: 0,
            extract_ms: 0,
            ai_ms: outcome.duration_ms,
            total_ms: total_start.elapsed().as_millis() as u64,
        };

        let response = ExplainResponse {
            title,
            arxiv_id: id.map(|i| i.id.clone()).unwrap_or_default(),
            explanation_style: style,
            summary: SummaryField::encode(outcome.explanation, config.summary_encoding)?,
            figures: matched.iter().map(FigurePayload::from).collect(),
            paper_info,
            stats,
        };

        if let Some(ref cb) = config.progress_callback {
            cb.on_complete(response.figures.len());
        }
        info!(
            "Explained \"{}\" with {} figures in {}ms",
            response.title,
            response.figures.len(),
            response.stats.total_ms
        );
        Ok(response)
    }

    fn stage_start(&self, stage: Stage) {
        debug!("Stage: {}", stage.label());
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_stage_start(stage);
        }
    }

    fn stage_done(&self, stage: Stage, detail: &str) {
        debug!("Stage done: {} ({})", stage.label(), detail);
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_stage_complete(stage, detail);
        }
    }

    fn stage_failed(&self, stage: Stage, err: ExplainError) -> ExplainError {
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_error(stage, &err.to_string());
        }
        err
    }
}

/// Title and paper info, preferring Atom metadata, then the PDF's own title.
fn describe_paper(
    id: Option<&ArxivId>,
    metadata: Option<PaperMetadata>,
    pdf_title: Option<String>,
) -> (String, PaperInfo) {
    let url = id.map(|i| i.abs_url()).unwrap_or_default();
    let fallback = || match id {
        Some(i) => format!("arXiv:{}", i.id),
        None => "Untitled paper".to_string(),
    };
    match metadata {
        Some(meta) => (
            meta.title,
            PaperInfo {
                authors: meta.authors,
                published: meta.published,
                url,
            },
        ),
        None => (
            pdf_title.unwrap_or_else(fallback),
            PaperInfo {
                authors: Vec::new(),
                published: None,
                url,
            },
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> ArxivId {
        ArxivId::parse("1706.03762v2", 64).unwrap()
    }

    #[test]
    fn metadata_title_wins() {
        let meta = PaperMetadata {
            title: "Attention Is All You Need".into(),
            authors: vec!["A. Vaswani".into()],
            published: Some("2017-06-12".into()),
        };
        let (title, info) = describe_paper(Some(&id()), Some(meta), Some("pdf title".into()));
        assert_eq!(title, "Attention Is All You Need");
        assert_eq!(info.authors.len(), 1);
        assert_eq!(info.url, "https://arxiv.org/abs/1706.03762v2");
    }

    #[test]
    fn falls_back_to_pdf_title_then_id() {
        let (title, _) = describe_paper(Some(&id()), None, Some("From PDF".into()));
        assert_eq!(title, "From PDF");
        let (title, info) = describe_paper(Some(&id()), None, None);
        assert_eq!(title, "arXiv:1706.03762");
        assert!(info.authors.is_empty());
    }
}
