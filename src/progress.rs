//! Progress-callback trait for stage-level pipeline events.
//!
//! Inject an [`Arc<dyn ExplainProgressCallback>`] via
//! [`crate::config::ExplainConfigBuilder::progress_callback`] to receive
//! events as the pipeline moves through its stages. The CLI uses this to
//! drive its spinner; a server could forward events to a WebSocket.
//!
//! # Example
//!
//! ```rust
//! use arxiv_eli5::{ExplainConfig, ExplainProgressCallback, Stage};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl ExplainProgressCallback for Printer {
//!     fn on_stage_start(&self, stage: Stage) {
//!         eprintln!("{}…", stage.label());
//!     }
//! }
//!
//! let config = ExplainConfig::builder()
//!     .progress_callback(Arc::new(Printer) as Arc<dyn ExplainProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// A pipeline stage, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Fetching,
    Extracting,
    Filtering,
    Explaining,
    Matching,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Fetching,
        Stage::Extracting,
        Stage::Filtering,
        Stage::Explaining,
        Stage::Matching,
    ];

    /// Short human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            Stage::Fetching => "Downloading paper",
            Stage::Extracting => "Reading PDF",
            Stage::Filtering => "Selecting figures",
            Stage::Explaining => "Writing explanation",
            Stage::Matching => "Matching figures",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Called by the pipeline as it moves through its stages.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Stages run sequentially, but the callback may be
/// shared across concurrent requests, hence `Send + Sync`.
pub trait ExplainProgressCallback: Send + Sync {
    /// Called once the identifier has been parsed, before any network work.
    fn on_start(&self, arxiv_id: &str) {
        let _ = arxiv_id;
    }

    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// `detail` is a short summary such as "7 of 12 figures kept".
    fn on_stage_complete(&self, stage: Stage, detail: &str) {
        let _ = (stage, detail);
    }

    /// Called before the second explanation attempt.
    fn on_explanation_retry(&self, attempt: u32, reason: &str) {
        let _ = (attempt, reason);
    }

    /// Called when a stage fails; the request ends here.
    fn on_error(&self, stage: Stage, error: &str) {
        let _ = (stage, error);
    }

    fn on_complete(&self, figure_count: usize) {
        let _ = figure_count;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExplainProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExplainConfig`].
pub type ProgressCallback = Arc<dyn ExplainProgressCallback>;
