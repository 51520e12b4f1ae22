//! # arxiv-eli5
//!
//! Explain arXiv papers in plain language, in the style of your choice, with
//! the paper's own figures annotated.
//!
//! ## Pipeline Overview
//!
//! ```text
//! arXiv URL
//!  │
//!  ├─ 1. Source   parse the identifier, stream the PDF under a size cap
//!  ├─ 2. Extract  page text + raster figures via pdfium (spawn_blocking)
//!  ├─ 3. Filter   drop logos, rules, blanks and tiny images
//!  ├─ 4. Explain  style-specific prompt → strict JSON, one retry
//!  ├─ 5. Match    pair figures with AI captions, fallback for the rest
//!  └─ 6. Output   title, summary, figures as data URIs, stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use arxiv_eli5::{ExplainConfig, Explainer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let explainer = Explainer::new(ExplainConfig::default())?;
//!     let out = explainer
//!         .explain("https://arxiv.org/abs/1706.03762", Some("five-year-old"))
//!         .await?;
//!     println!("{}", out.title);
//!     for fig in &out.figures {
//!         println!("  fig {} (page {}): {}", fig.index, fig.page, fig.caption);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `cli`    | on      | The `eli5` binary (clap + indicatif + tracing-subscriber) |
//! | `server` | on      | The `eli5-server` binary and [`server`] module (axum + tower-http) |
//!
//! Disable both when using only the library:
//! ```toml
//! arxiv-eli5 = { version = "0.1", default-features = false }
//! ```
//!
//! ## Runtime requirements
//!
//! pdfium must be available as a shared library: set `PDFIUM_LIB_PATH`, or
//! install it on the system library path.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod explain;
pub mod guard;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
#[cfg(feature = "server")]
pub mod server;
pub mod style;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ExplainConfig, ExplainConfigBuilder, FigureFilterConfig, RateLimitConfig, SummaryEncoding,
};
pub use error::{ErrorKind, ExplainError, FetchFailure};
pub use explain::Explainer;
pub use guard::{client_identity, RateDecision, RateLimitStore, RequestGuard, SlidingWindowLimiter};
pub use output::{
    ErrorResponse, ExplainRequest, ExplainResponse, ExplainStats, FigurePayload, HealthResponse,
    PaperInfo, SummaryField,
};
pub use pipeline::explain::{
    BackendError, BackendReply, ExplanationBackend, LlmBackend, MAX_ATTEMPTS,
};
pub use pipeline::matcher::MatchedFigure;
pub use pipeline::schema::{AiExplanation, AiFigure, KeyTerm};
pub use pipeline::source::{ArxivId, PaperMetadata};
pub use progress::{ExplainProgressCallback, NoopProgressCallback, ProgressCallback, Stage};
pub use style::ExplanationStyle;
