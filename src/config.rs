//! Configuration types for the explanation pipeline.
//!
//! All pipeline behaviour is controlled through [`ExplainConfig`], built via
//! [`ExplainConfigBuilder`]. The figure heuristics and the request guard have
//! their own small structs ([`FigureFilterConfig`], [`RateLimitConfig`]) so
//! they can be tuned and tested independently of the rest.

use crate::error::ExplainError;
use crate::progress::ProgressCallback;
use crate::style::ExplanationStyle;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// One binary megabyte.
pub const MIB: u64 = 1024 * 1024;

/// Configuration for explaining a paper.
///
/// # Example
/// ```rust
/// use arxiv_eli5::ExplainConfig;
///
/// let config = ExplainConfig::builder()
///     .max_pages(40)
///     .fetch_timeout_secs(10)
///     .model("gpt-4.1-mini")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExplainConfig {
    /// Base URL PDFs are downloaded from. Default: `https://arxiv.org/pdf`.
    ///
    /// The identifier (with version, when given) is appended as a path
    /// segment. Point this at a mirror or a local test server if needed.
    pub arxiv_pdf_base: String,

    /// arXiv Atom API endpoint. Default: `https://export.arxiv.org/api/query`.
    pub arxiv_api_base: String,

    /// Look up title and authors from the Atom API. Default: true.
    ///
    /// When disabled, or when the lookup fails, the title falls back to the
    /// PDF's embedded title and then to `arXiv:<id>`.
    pub fetch_metadata: bool,

    /// Longest accepted input URL/identifier in characters. Default: 2048.
    pub max_url_len: usize,

    /// Download ceiling for the PDF in bytes. Default: 50 MiB.
    pub max_pdf_bytes: u64,

    /// Timeout for the PDF download in seconds. Default: 15.
    pub fetch_timeout_secs: u64,

    /// Maximum pages parsed; later pages are ignored. Default: 100.
    pub max_pages: usize,

    /// Cap on extracted text in characters. Default: 500 000.
    pub max_text_chars: usize,

    /// Documents with less text than this are rejected as unusable. Default: 500.
    ///
    /// Scanned papers without a text layer land here; OCR is out of scope.
    pub min_text_chars: usize,

    /// Stop recording raw figures after this many. Default: 64.
    pub max_raw_figures: usize,

    /// Cap on the text sent to the AI in characters. Default: 100 000.
    pub max_prompt_chars: usize,

    /// Figure quality heuristics.
    pub figure_filter: FigureFilterConfig,

    /// LLM model identifier. If None, uses the provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "gemini").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.7.
    ///
    /// Styles such as `shakespearean` or `brain-rot` need some creativity;
    /// schema conformance is enforced by validation, not by temperature.
    pub temperature: f32,

    /// Maximum tokens the AI may generate. Default: 4096.
    pub max_tokens: usize,

    /// Per-attempt AI timeout in seconds. Default: 60.
    pub ai_timeout_secs: u64,

    /// How `summary` is encoded in responses. Default: structured object.
    pub summary_encoding: SummaryEncoding,

    /// Style used when a request does not name one.
    pub default_style: ExplanationStyle,

    /// Optional stage-level progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExplainConfig {
    fn default() -> Self {
        Self {
            arxiv_pdf_base: "https://arxiv.org/pdf".to_string(),
            arxiv_api_base: "https://export.arxiv.org/api/query".to_string(),
            fetch_metadata: true,
            max_url_len: 2048,
            max_pdf_bytes: 50 * MIB,
            fetch_timeout_secs: 15,
            max_pages: 100,
            max_text_chars: 500_000,
            min_text_chars: 500,
            max_raw_figures: 64,
            max_prompt_chars: 100_000,
            figure_filter: FigureFilterConfig::default(),
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.7,
            max_tokens: 4096,
            ai_timeout_secs: 60,
            summary_encoding: SummaryEncoding::default(),
            default_style: ExplanationStyle::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExplainConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExplainConfig")
            .field("arxiv_pdf_base", &self.arxiv_pdf_base)
            .field("arxiv_api_base", &self.arxiv_api_base)
            .field("fetch_metadata", &self.fetch_metadata)
            .field("max_pdf_bytes", &self.max_pdf_bytes)
            .field("fetch_timeout_secs", &self.fetch_timeout_secs)
            .field("max_pages", &self.max_pages)
            .field("max_text_chars", &self.max_text_chars)
            .field("max_prompt_chars", &self.max_prompt_chars)
            .field("figure_filter", &self.figure_filter)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("ai_timeout_secs", &self.ai_timeout_secs)
            .field("summary_encoding", &self.summary_encoding)
            .finish()
    }
}

impl ExplainConfig {
    /// Create a new builder for `ExplainConfig`.
    pub fn builder() -> ExplainConfigBuilder {
        ExplainConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExplainConfig`].
#[derive(Debug)]
pub struct ExplainConfigBuilder {
    config: ExplainConfig,
}

impl ExplainConfigBuilder {
    pub fn arxiv_pdf_base(mut self, url: impl Into<String>) -> Self {
        self.config.arxiv_pdf_base = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn arxiv_api_base(mut self, url: impl Into<String>) -> Self {
        self.config.arxiv_api_base = url.into();
        self
    }

    pub fn fetch_metadata(mut self, v: bool) -> Self {
        self.config.fetch_metadata = v;
        self
    }

    pub fn max_url_len(mut self, n: usize) -> Self {
        self.config.max_url_len = n.max(16);
        self
    }

    pub fn max_pdf_bytes(mut self, n: u64) -> Self {
        self.config.max_pdf_bytes = n;
        self
    }

    pub fn fetch_timeout_secs(mut self, secs: u64) -> Self {
        self.config.fetch_timeout_secs = secs.max(1);
        self
    }

    pub fn max_pages(mut self, n: usize) -> Self {
        self.config.max_pages = n;
        self
    }

    pub fn max_text_chars(mut self, n: usize) -> Self {
        self.config.max_text_chars = n;
        self
    }

    pub fn min_text_chars(mut self, n: usize) -> Self {
        self.config.min_text_chars = n;
        self
    }

    pub fn max_raw_figures(mut self, n: usize) -> Self {
        self.config.max_raw_figures = n;
        self
    }

    pub fn max_prompt_chars(mut self, n: usize) -> Self {
        self.config.max_prompt_chars = n.max(1_000);
        self
    }

    pub fn figure_filter(mut self, filter: FigureFilterConfig) -> Self {
        self.config.figure_filter = filter;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn ai_timeout_secs(mut self, secs: u64) -> Self {
        self.config.ai_timeout_secs = secs.max(1);
        self
    }

    pub fn summary_encoding(mut self, encoding: SummaryEncoding) -> Self {
        self.config.summary_encoding = encoding;
        self
    }

    pub fn default_style(mut self, style: ExplanationStyle) -> Self {
        self.config.default_style = style;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExplainConfig, ExplainError> {
        let c = &self.config;
        if c.max_pages == 0 {
            return Err(ExplainError::InvalidConfig("max_pages must be ≥ 1".into()));
        }
        if c.max_pdf_bytes == 0 {
            return Err(ExplainError::InvalidConfig(
                "max_pdf_bytes must be ≥ 1".into(),
            ));
        }
        if c.min_text_chars > c.max_text_chars {
            return Err(ExplainError::InvalidConfig(format!(
                "min_text_chars ({}) exceeds max_text_chars ({})",
                c.min_text_chars, c.max_text_chars
            )));
        }
        if c.max_tokens == 0 {
            return Err(ExplainError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        c.figure_filter.validate()?;
        Ok(self.config)
    }
}

// ── Figure heuristics ────────────────────────────────────────────────────

/// Thresholds for the figure quality filter.
///
/// Defaults are tuned for arXiv papers: plots and diagrams are rarely
/// smaller than 100 × 100 px, while publisher logos, ORCID badges and rule
/// lines are.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FigureFilterConfig {
    /// Minimum width × height in pixels. Default: 10 000.
    pub min_area_px: u64,
    /// Minimum length of the shorter side in pixels. Default: 32.
    pub min_side_px: u32,
    /// Maximum long-side / short-side ratio. Default: 12.0.
    pub max_aspect_ratio: f32,
    /// Height of the top and bottom page bands, as a fraction of page height. Default: 0.07.
    ///
    /// An image lying entirely inside one of these bands is treated as a
    /// running header, footer or logo.
    pub margin_band: f32,
    /// Minimum luma spread (max − min, 0–255); below this the image is near-blank. Default: 12.
    pub min_tonal_range: u8,
    /// Keep at most this many survivors (first N in extraction order). Default: 10.
    pub max_figures: Option<usize>,
}

impl Default for FigureFilterConfig {
    fn default() -> Self {
        Self {
            min_area_px: 10_000,
            min_side_px: 32,
            max_aspect_ratio: 12.0,
            margin_band: 0.07,
            min_tonal_range: 12,
            max_figures: Some(10),
        }
    }
}

impl FigureFilterConfig {
    fn validate(&self) -> Result<(), ExplainError> {
        if self.max_aspect_ratio.is_nan() || self.max_aspect_ratio < 1.0 {
            return Err(ExplainError::InvalidConfig(format!(
                "max_aspect_ratio must be ≥ 1.0, got {}",
                self.max_aspect_ratio
            )));
        }
        if !(0.0..0.5).contains(&self.margin_band) {
            return Err(ExplainError::InvalidConfig(format!(
                "margin_band must be in [0, 0.5), got {}",
                self.margin_band
            )));
        }
        Ok(())
    }
}

// ── Request guard ────────────────────────────────────────────────────────

/// Per-client request limits applied at the service boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Requests allowed per client per window. Default: 10.
    pub max_requests: u32,
    /// Sliding window length in seconds. Default: 60.
    pub window_secs: u64,
    /// Maximum request body in bytes. Default: 1 MiB.
    pub max_body_bytes: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window_secs: 60,
            max_body_bytes: MIB,
        }
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How the `summary` field of a response is encoded.
///
/// Older front-ends expect the AI payload as a JSON-encoded string (they call
/// `JSON.parse` themselves); newer ones take the object directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SummaryEncoding {
    /// `summary` is a JSON object. (default)
    #[default]
    Object,
    /// `summary` is a string containing the JSON object.
    JsonString,
}
