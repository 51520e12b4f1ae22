//! The AI explanation schema and its validation.
//!
//! The model's reply is parsed in two steps: first into a
//! `serde_json::Value` (is it JSON at all?), then into [`AiExplanation`]
//! (right shape and types?), followed by content checks serde cannot express
//! (non-empty strings, 3–5 findings). Nothing is coerced: a wrong-typed or
//! empty field is a [`ExplainError::SchemaViolation`].

use crate::error::ExplainError;
use serde::{Deserialize, Serialize};

/// The structured explanation returned by the AI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiExplanation {
    pub gist: String,
    pub analogy: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experimental_details: Option<String>,
    pub key_findings: Vec<String>,
    pub why_it_matters: String,
    pub key_terms: Vec<KeyTerm>,
    #[serde(default)]
    pub figures: Vec<AiFigure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyTerm {
    pub term: String,
    pub definition: String,
}

/// One AI-described figure. `figure_index` is a claim, checked by the matcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiFigure {
    pub figure_index: i64,
    pub caption: String,
    pub importance: String,
}

pub const MIN_KEY_FINDINGS: usize = 3;
pub const MAX_KEY_FINDINGS: usize = 5;

/// Why a reply was unusable. Both kinds surface as `SchemaViolation`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadProblem {
    Malformed(String),
    Schema(String),
}

impl PayloadProblem {
    pub fn detail(&self) -> String {
        match self {
            PayloadProblem::Malformed(d) => format!("response is not valid JSON: {d}"),
            PayloadProblem::Schema(d) => d.clone(),
        }
    }
}

impl From<PayloadProblem> for ExplainError {
    fn from(p: PayloadProblem) -> Self {
        ExplainError::SchemaViolation { detail: p.detail() }
    }
}

/// Remove Markdown code fences (```` ```json … ``` ````) around a payload.
pub fn strip_code_fences(raw: &str) -> &str {
    let mut s = raw.trim();
    if let Some(rest) = s.strip_prefix("```") {
        // Drop the info string (`json`, `JSON`, …) up to the first newline
        s = match rest.find('\n') {
            Some(nl) => &rest[nl + 1..],
            None => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
        };
        s = s.trim_end();
        s = s.strip_suffix("```").unwrap_or(s);
    }
    s.trim()
}

/// Parse and validate a raw model reply.
pub fn parse_explanation(raw: &str) -> Result<AiExplanation, PayloadProblem> {
    let body = strip_code_fences(raw);
    if body.is_empty() {
        return Err(PayloadProblem::Malformed("empty response".into()));
    }

    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| PayloadProblem::Malformed(e.to_string()))?;
    if !value.is_object() {
        return Err(PayloadProblem::Schema("top level must be a JSON object".into()));
    }

    let mut parsed: AiExplanation =
        serde_json::from_value(value).map_err(|e| PayloadProblem::Schema(e.to_string()))?;

    if parsed
        .experimental_details
        .as_deref()
        .is_some_and(|d| d.trim().is_empty())
    {
        parsed.experimental_details = None;
    }

    validate(&parsed).map_err(PayloadProblem::Schema)?;
    Ok(parsed)
}

/// Content checks that the type system does not cover.
pub fn validate(e: &AiExplanation) -> Result<(), String> {
    non_empty("gist", &e.gist)?;
    non_empty("analogy", &e.analogy)?;
    non_empty("why_it_matters", &e.why_it_matters)?;

    let n = e.key_findings.len();
    if !(MIN_KEY_FINDINGS..=MAX_KEY_FINDINGS).contains(&n) {
        return Err(format!(
            "key_findings must have {MIN_KEY_FINDINGS}-{MAX_KEY_FINDINGS} entries, got {n}"
        ));
    }
    for (i, f) in e.key_findings.iter().enumerate() {
        non_empty(&format!("key_findings[{i}]"), f)?;
    }

    for (i, t) in e.key_terms.iter().enumerate() {
        non_empty(&format!("key_terms[{i}].term"), &t.term)?;
        non_empty(&format!("key_terms[{i}].definition"), &t.definition)?;
    }

    for (i, f) in e.figures.iter().enumerate() {
        non_empty(&format!("figures[{i}].caption"), &f.caption)?;
        non_empty(&format!("figures[{i}].importance"), &f.importance)?;
    }

    Ok(())
}

fn non_empty(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("field '{field}' must be a non-empty string"))
    } else {
        Ok(())
    }
}
