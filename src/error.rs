//! Error types for the arxiv-eli5 library.
//!
//! Every failure in the pipeline is terminal for the request and surfaces as
//! one [`ExplainError`]. The [`ErrorKind`] discriminator gives callers (the
//! HTTP server, the CLI, a UI) a stable machine-readable name for each
//! variant, while the `Display` text is the human-readable message.
//!
//! Messages never include local file paths, stack traces, or raw upstream
//! bodies: they are safe to forward verbatim to an end user.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Why fetching the PDF failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    /// DNS, connect, TLS or mid-stream read failure.
    Network(String),
    /// The server answered with a non-success status.
    Status(u16),
    /// The response was not a PDF (content type or magic bytes).
    NotPdf(String),
    /// The download did not complete within the configured timeout.
    Timeout { secs: u64 },
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchFailure::Network(detail) => write!(f, "network error: {detail}"),
            FetchFailure::Status(code) => write!(f, "arXiv answered HTTP {code}"),
            FetchFailure::NotPdf(what) => write!(f, "response is not a PDF ({what})"),
            FetchFailure::Timeout { secs } => write!(f, "timed out after {secs}s"),
        }
    }
}

/// All fatal errors returned by the arxiv-eli5 library.
#[derive(Debug, Error)]
pub enum ExplainError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The input is not a recognisable arXiv URL or identifier.
    #[error("Not a recognisable arXiv URL or identifier: {reason}\nUse a form like https://arxiv.org/abs/1706.03762")]
    InvalidIdentifier { reason: String },

    /// The request body is not a valid explanation request.
    #[error("Invalid request: {detail}")]
    InvalidRequest { detail: String },

    /// The requested explanation style is not in the catalog.
    #[error("Unknown explanation style '{style}'. Valid styles: {valid}")]
    InvalidStyle { style: String, valid: String },

    // ── Source errors ─────────────────────────────────────────────────────
    /// Downloading the PDF failed.
    #[error("Failed to fetch paper {arxiv_id}: {reason}")]
    FetchError {
        arxiv_id: String,
        reason: FetchFailure,
    },

    /// The download (or request body) exceeded the configured ceiling.
    #[error("{what} is too large: limit is {limit_bytes} bytes")]
    PayloadTooLarge { what: String, limit_bytes: u64 },

    // ── Document errors ───────────────────────────────────────────────────
    /// The bytes are not a PDF or pdfium could not parse them.
    #[error("The paper's PDF could not be read: {detail}")]
    CorruptDocument { detail: String },

    // ── AI errors ─────────────────────────────────────────────────────────
    /// The AI payload did not match the explanation schema.
    #[error("AI response did not match the expected schema: {detail}")]
    SchemaViolation { detail: String },

    /// Every attempt at generating an explanation failed.
    #[error("Could not generate an explanation after {attempts} attempts. Last error: {last_error}")]
    ExplanationFailed {
        attempts: u32,
        cause: ErrorKind,
        last_error: String,
    },

    // ── Guard errors ──────────────────────────────────────────────────────
    /// The client exceeded its request quota.
    #[error("Too many requests: limit is {limit} per {window_secs}s. Retry in {retry_after_secs}s.")]
    RateLimited {
        limit: u32,
        window_secs: u64,
        retry_after_secs: u64,
    },

    /// An API key is required and was missing or not recognised.
    #[error("A valid API key is required")]
    Unauthorized,

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (task panic, pdfium binding, provider setup).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Stable discriminator for [`ExplainError`], serialised in kebab-case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    InvalidIdentifier,
    InvalidRequest,
    InvalidStyle,
    FetchError,
    PayloadTooLarge,
    CorruptDocument,
    SchemaViolation,
    ExplanationFailed,
    RateLimited,
    Unauthorized,
    /// Attempt-level only: the AI call exceeded its timeout.
    Timeout,
    /// Attempt-level only: the AI backend returned an error.
    Backend,
    InvalidConfig,
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidIdentifier => "invalid-identifier",
            ErrorKind::InvalidRequest => "invalid-request",
            ErrorKind::InvalidStyle => "invalid-style",
            ErrorKind::FetchError => "fetch-error",
            ErrorKind::PayloadTooLarge => "payload-too-large",
            ErrorKind::CorruptDocument => "corrupt-document",
            ErrorKind::SchemaViolation => "schema-violation",
            ErrorKind::ExplanationFailed => "explanation-failed",
            ErrorKind::RateLimited => "rate-limited",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Backend => "backend",
            ErrorKind::InvalidConfig => "invalid-config",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ExplainError {
    /// The discriminator for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExplainError::InvalidIdentifier { .. } => ErrorKind::InvalidIdentifier,
            ExplainError::InvalidRequest { .. } => ErrorKind::InvalidRequest,
            ExplainError::InvalidStyle { .. } => ErrorKind::InvalidStyle,
            ExplainError::FetchError { .. } => ErrorKind::FetchError,
            ExplainError::PayloadTooLarge { .. } => ErrorKind::PayloadTooLarge,
            ExplainError::CorruptDocument { .. } => ErrorKind::CorruptDocument,
            ExplainError::SchemaViolation { .. } => ErrorKind::SchemaViolation,
            ExplainError::ExplanationFailed { .. } => ErrorKind::ExplanationFailed,
            ExplainError::RateLimited { .. } => ErrorKind::RateLimited,
            ExplainError::Unauthorized => ErrorKind::Unauthorized,
            ExplainError::InvalidConfig(_) => ErrorKind::InvalidConfig,
            ExplainError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether the caller may usefully retry the same request later.
    ///
    /// Only rate limiting and AI failures are transient; everything else
    /// stems from the input or from an unusable document.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ExplainError::RateLimited { .. } | ExplainError::ExplanationFailed { .. }
        )
    }

    /// Seconds the caller should wait before retrying, when known.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            ExplainError::RateLimited {
                retry_after_secs, ..
            } => Some(*retry_after_secs),
            _ => None,
        }
    }
}
