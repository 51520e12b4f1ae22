//! Request and response shapes shared by the library, CLI and server.

use crate::config::SummaryEncoding;
use crate::error::{ErrorKind, ExplainError};
use crate::pipeline::encode::png_data_uri;
use crate::pipeline::matcher::MatchedFigure;
use crate::pipeline::schema::{self, AiExplanation};
use crate::style::ExplanationStyle;
use serde::{Deserialize, Serialize};

/// Body of `POST /api/summarize`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplainRequest {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation_style: Option<String>,
}

/// The complete result of explaining one paper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplainResponse {
    pub title: String,
    pub arxiv_id: String,
    pub explanation_style: ExplanationStyle,
    pub summary: SummaryField,
    pub figures: Vec<FigurePayload>,
    pub paper_info: PaperInfo,
    pub stats: ExplainStats,
}

/// The AI explanation, either as an object or as a JSON-encoded string.
///
/// Deserialisation accepts both forms; which one is emitted depends on
/// [`SummaryEncoding`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SummaryField {
    Structured(AiExplanation),
    Encoded(String),
}

impl SummaryField {
    pub fn encode(
        explanation: AiExplanation,
        encoding: SummaryEncoding,
    ) -> Result<Self, ExplainError> {
        match encoding {
            SummaryEncoding::Object => Ok(SummaryField::Structured(explanation)),
            SummaryEncoding::JsonString => serde_json::to_string(&explanation)
                .map(SummaryField::Encoded)
                .map_err(|e| ExplainError::Internal(format!("summary encoding: {e}"))),
        }
    }

    /// The explanation regardless of encoding. A string form is re-validated.
    pub fn decode(&self) -> Result<AiExplanation, ExplainError> {
        match self {
            SummaryField::Structured(e) => Ok(e.clone()),
            SummaryField::Encoded(s) => Ok(schema::parse_explanation(s)?),
        }
    }
}

/// One figure in a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FigurePayload {
    /// Extraction index; stable across stages.
    pub index: usize,
    pub page: usize,
    /// `data:image/png;base64,…`
    pub data: String,
    pub width: u32,
    pub height: u32,
    pub caption: String,
    pub importance: String,
    #[serde(default)]
    pub ai_described: bool,
}

impl From<&MatchedFigure> for FigurePayload {
    fn from(m: &MatchedFigure) -> Self {
        Self {
            index: m.extraction_index,
            page: m.page,
            data: png_data_uri(&m.image_bytes),
            width: m.width,
            height: m.height,
            caption: m.caption.clone(),
            importance: m.importance.clone(),
            ai_described: m.ai_described,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperInfo {
    pub authors: Vec<String>,
    pub published: Option<String>,
    /// Abstract page URL.
    pub url: String,
}

/// Accounting for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplainStats {
    pub pdf_bytes: u64,
    pub total_pages: usize,
    pub pages_processed: usize,
    pub text_chars: usize,
    pub text_truncated: bool,
    pub prompt_truncated: bool,
    pub raw_figures: usize,
    pub figures_kept: usize,
    pub figures_described: usize,
    pub ai_attempts: u32,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub fetch_ms: u64,
    pub extract_ms: u64,
    pub ai_ms: u64,
    pub total_ms: u64,
}

/// Error body returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorKind,
    pub message: String,
    pub retryable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

impl From<&ExplainError> for ErrorResponse {
    fn from(e: &ExplainError) -> Self {
        Self {
            error: e.kind(),
            message: e.to_string(),
            retryable: e.is_retryable(),
            retry_after_secs: e.retry_after_secs(),
        }
    }
}

/// Body of `GET /api/health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".into(),
            service: env!("CARGO_PKG_NAME").into(),
            version: env!("CARGO_PKG_VERSION").into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::schema::KeyTerm;

    fn explanation() -> AiExplanation {
        AiExplanation {
            gist: "g".into(),
            analogy: "a".into(),
            experimental_details: None,
            key_findings: vec!["1".into(), "2".into(), "3".into()],
            why_it_matters: "w".into(),
            key_terms: vec![KeyTerm {
                term: "t".into(),
                definition: "d".into(),
            }],
            figures: vec![],
        }
    }

    #[test]
    fn summary_object_and_string_forms_decode_alike() {
        let obj = SummaryField::encode(explanation(), SummaryEncoding::Object).unwrap();
        let s = SummaryField::encode(explanation(), SummaryEncoding::JsonString).unwrap();
        assert!(matches!(obj, SummaryField::Structured(_)));
        assert!(matches!(s, SummaryField::Encoded(_)));
        assert_eq!(obj.decode().unwrap(), s.decode().unwrap());
    }

    #[test]
    fn summary_deserialises_either_form() {
        let as_obj = serde_json::to_value(explanation()).unwrap();
        let as_str = serde_json::Value::String(as_obj.to_string());

        let a: SummaryField = serde_json::from_value(as_obj).unwrap();
        let b: SummaryField = serde_json::from_value(as_str).unwrap();
        assert!(matches!(a, SummaryField::Structured(_)));
        assert!(matches!(b, SummaryField::Encoded(_)));
        assert_eq!(a.decode().unwrap(), b.decode().unwrap());
    }

    #[test]
    fn request_style_is_optional() {
        let r: ExplainRequest =
            serde_json::from_str(r#"{"url":"https://arxiv.org/abs/1706.03762"}"#).unwrap();
        assert!(r.explanation_style.is_none());
    }

    #[test]
    fn error_response_carries_kind_and_retry_hint() {
        let e = ExplainError::RateLimited {
            limit: 10,
            window_secs: 60,
            retry_after_secs: 30,
        };
        let body = serde_json::to_value(ErrorResponse::from(&e)).unwrap();
        assert_eq!(body["error"], "rate-limited");
        assert_eq!(body["retryable"], true);
        assert_eq!(body["retry_after_secs"], 30);

        let e = ExplainError::CorruptDocument {
            detail: "x".into(),
        };
        let body = serde_json::to_value(ErrorResponse::from(&e)).unwrap();
        assert_eq!(body["retryable"], false);
        assert!(body.get("retry_after_secs").is_none());
    }

    #[test]
    fn figure_payload_is_a_png_data_uri() {
        let m = MatchedFigure {
            extraction_index: 4,
            image_bytes: vec![1, 2, 3],
            page: 2,
            width: 10,
            height: 20,
            caption: "c".into(),
            importance: "i".into(),
            ai_described: true,
        };
        let p = FigurePayload::from(&m);
        assert_eq!(p.index, 4);
        assert_eq!(p.data, "data:image/png;base64,AQID");
    }
}
