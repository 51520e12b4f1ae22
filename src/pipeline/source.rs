//! Source resolution: arXiv URL or identifier → PDF bytes (+ metadata).
//!
//! Identifiers are parsed locally with no network access, so malformed input
//! is rejected before any outbound request is made. The download is bounded
//! three ways: the client timeout, a `Content-Length` pre-check, and a running
//! byte count on the streamed body that aborts the transfer as soon as the
//! ceiling is crossed. The body is never buffered past the limit.

use crate::config::ExplainConfig;
use crate::error::{ExplainError, FetchFailure};
use futures::StreamExt;
use once_cell::sync::Lazy;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Hosts accepted in URL input.
pub const ARXIV_HOSTS: &[&str] = &["arxiv.org", "www.arxiv.org", "export.arxiv.org"];

/// New style `YYMM.NNNN[N]` or old style `archive[.SC]/YYMMNNN`, optional `vN`.
static ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<id>\d{4}\.\d{4,5}|[a-z][a-z\-]*(?:\.[A-Z]{2})?/\d{7})(?:v(?P<version>\d+))?$",
    )
    .expect("static regex")
});

// ── Identifier ───────────────────────────────────────────────────────────

/// A parsed arXiv identifier.
///
/// `id` never contains the version suffix, so `1706.03762` and
/// `1706.03762v5` share the same canonical id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArxivId {
    pub id: String,
    pub version: Option<u32>,
}

impl ArxivId {
    /// Parse any accepted input form.
    ///
    /// Accepted:
    /// - `https://arxiv.org/abs/1706.03762`, `…/abs/1706.03762v5`
    /// - `https://arxiv.org/pdf/1706.03762`, `…/pdf/1706.03762v5.pdf`
    /// - `arXiv:1706.03762`, `1706.03762v2`, `hep-th/9901001`
    pub fn parse(input: &str, max_len: usize) -> Result<Self, ExplainError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(invalid("input is empty"));
        }
        if input.chars().count() > max_len {
            return Err(invalid(format!("input exceeds {max_len} characters")));
        }

        let lower = input.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return Self::from_url(input);
        }
        if lower.contains("://") {
            return Err(invalid("only http and https URLs are accepted"));
        }
        if ARXIV_HOSTS
            .iter()
            .any(|h| lower.starts_with(&format!("{h}/")))
        {
            return Self::from_url(&format!("https://{input}"));
        }
        if lower.starts_with("arxiv:") {
            return Self::from_bare(&input["arxiv:".len()..]);
        }
        Self::from_bare(input)
    }

    fn from_url(raw: &str) -> Result<Self, ExplainError> {
        let url = reqwest::Url::parse(raw).map_err(|e| invalid(format!("malformed URL: {e}")))?;
        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
        if !ARXIV_HOSTS.contains(&host.as_str()) {
            return Err(invalid(format!("'{host}' is not an arXiv host")));
        }

        let path = url.path().trim_end_matches('/');
        let rest = path
            .strip_prefix("/abs/")
            .or_else(|| path.strip_prefix("/pdf/"))
            .ok_or_else(|| invalid("URL must point to an /abs/ or /pdf/ page"))?;
        let rest = rest.strip_suffix(".pdf").unwrap_or(rest);
        Self::from_bare(rest)
    }

    fn from_bare(raw: &str) -> Result<Self, ExplainError> {
        let caps = ID_RE
            .captures(raw.trim())
            .ok_or_else(|| invalid(format!("'{raw}' is not an arXiv identifier")))?;
        let id = caps["id"].to_string();
        let version = match caps.name("version") {
            Some(v) => Some(
                v.as_str()
                    .parse::<u32>()
                    .map_err(|_| invalid("version number out of range"))?,
            ),
            None => None,
        };
        Ok(Self { id, version })
    }

    /// `1706.03762v5` when a version was given, else `1706.03762`.
    pub fn versioned(&self) -> String {
        match self.version {
            Some(v) => format!("{}v{}", self.id, v),
            None => self.id.clone(),
        }
    }

    /// Direct PDF URL under `base` (e.g. `https://arxiv.org/pdf`).
    pub fn pdf_url(&self, base: &str) -> String {
        format!("{}/{}", base.trim_end_matches('/'), self.versioned())
    }

    /// Human-facing abstract page.
    pub fn abs_url(&self) -> String {
        format!("https://arxiv.org/abs/{}", self.versioned())
    }
}

impl fmt::Display for ArxivId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

fn invalid(reason: impl Into<String>) -> ExplainError {
    ExplainError::InvalidIdentifier {
        reason: reason.into(),
    }
}

// ── Download ─────────────────────────────────────────────────────────────

/// A downloaded paper. Dropped once extraction has consumed it.
#[derive(Debug, Clone)]
pub struct SourcePaper {
    pub arxiv_id: ArxivId,
    pub canonical_url: String,
    pub bytes: Vec<u8>,
}

impl SourcePaper {
    pub fn byte_size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Build the HTTP client used for arXiv requests.
pub fn build_client(config: &ExplainConfig) -> Result<reqwest::Client, ExplainError> {
    reqwest::Client::builder()
        .user_agent(concat!("arxiv-eli5/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(config.fetch_timeout_secs))
        .build()
        .map_err(|e| ExplainError::Internal(format!("HTTP client: {e}")))
}

/// Download the PDF for `id`, enforcing the size ceiling while streaming.
pub async fn fetch_pdf(
    client: &reqwest::Client,
    id: &ArxivId,
    config: &ExplainConfig,
) -> Result<SourcePaper, ExplainError> {
    let url = id.pdf_url(&config.arxiv_pdf_base);
    let limit = config.max_pdf_bytes;
    let fail = |reason: FetchFailure| ExplainError::FetchError {
        arxiv_id: id.id.clone(),
        reason,
    };
    let from_reqwest = |e: reqwest::Error| {
        if e.is_timeout() {
            fail(FetchFailure::Timeout {
                secs: config.fetch_timeout_secs,
            })
        } else {
            fail(FetchFailure::Network(e.to_string()))
        }
    };

    info!("Downloading PDF from: {}", url);
    let response = client.get(&url).send().await.map_err(from_reqwest)?;

    let status = response.status();
    if !status.is_success() {
        return Err(fail(FetchFailure::Status(status.as_u16())));
    }

    if let Some(ct) = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
    {
        let ct = ct.to_ascii_lowercase();
        if !ct.contains("pdf") && !ct.contains("octet-stream") {
            return Err(fail(FetchFailure::NotPdf(format!("content type {ct}"))));
        }
    }

    if let Some(len) = response.content_length() {
        if len > limit {
            return Err(too_large(limit));
        }
    }

    let mut bytes: Vec<u8> = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(from_reqwest)?;
        if bytes.len() as u64 + chunk.len() as u64 > limit {
            warn!("Aborting download of {}: exceeded {} bytes", id, limit);
            return Err(too_large(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    if !bytes.starts_with(b"%PDF") {
        return Err(fail(FetchFailure::NotPdf("missing %PDF header".into())));
    }

    debug!("Downloaded {} bytes for {}", bytes.len(), id);
    Ok(SourcePaper {
        arxiv_id: id.clone(),
        canonical_url: url,
        bytes,
    })
}

fn too_large(limit: u64) -> ExplainError {
    ExplainError::PayloadTooLarge {
        what: "PDF".into(),
        limit_bytes: limit,
    }
}

// ── Metadata ─────────────────────────────────────────────────────────────

/// Bibliographic data from the arXiv Atom API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperMetadata {
    pub title: String,
    pub authors: Vec<String>,
    pub published: Option<String>,
}

/// Look up title/authors/date. Never fails: any problem yields `None`.
pub async fn fetch_metadata(
    client: &reqwest::Client,
    id: &ArxivId,
    config: &ExplainConfig,
) -> Option<PaperMetadata> {
    let response = client
        .get(&config.arxiv_api_base)
        .query(&[("id_list", id.id.as_str()), ("max_results", "1")])
        .send()
        .await;

    let body = match response {
        Ok(r) if r.status().is_success() => r.text().await.ok()?,
        Ok(r) => {
            warn!("Metadata lookup for {} returned HTTP {}", id, r.status());
            return None;
        }
        Err(e) => {
            warn!("Metadata lookup for {} failed: {}", id, e);
            return None;
        }
    };

    let meta = parse_atom(&body);
    if meta.is_none() {
        debug!("No usable Atom entry for {}", id);
    }
    meta
}

/// Fields of the first `<entry>`, collected while walking the feed.
#[derive(Default)]
struct AtomEntry {
    id: String,
    title: String,
    published: String,
    authors: Vec<String>,
}

impl AtomEntry {
    /// `path` is the element chain below `<entry>`, innermost last.
    fn set(&mut self, path: &[String], value: String) {
        let path: Vec<&str> = path.iter().map(String::as_str).collect();
        match path.as_slice() {
            ["id"] => self.id = value,
            ["title"] => self.title = value,
            ["published"] => self.published = value,
            ["author", "name"] if !value.is_empty() => self.authors.push(value),
            _ => {}
        }
    }

    fn into_metadata(self) -> Option<PaperMetadata> {
        // arXiv reports unknown ids as an entry whose id points at api/errors
        if self.id.contains("api/errors") || self.title.is_empty() {
            return None;
        }
        Some(PaperMetadata {
            title: self.title,
            authors: self.authors,
            published: (!self.published.is_empty()).then_some(self.published),
        })
    }
}

/// Extract the first entry of an Atom feed.
pub fn parse_atom(xml: &str) -> Option<PaperMetadata> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut entry = AtomEntry::default();
    let mut in_entry = false;
    // Element names below <entry>
    let mut path: Vec<String> = Vec::new();
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if in_entry {
                    path.push(name);
                } else if name == "entry" {
                    in_entry = true;
                }
                text.clear();
            }
            Ok(Event::Text(t)) if in_entry => match t.unescape() {
                Ok(s) => text.push_str(&s),
                Err(e) => {
                    debug!("Bad entity in Atom text: {}", e);
                    text.push_str(&String::from_utf8_lossy(&t));
                }
            },
            Ok(Event::CData(c)) if in_entry => {
                text.push_str(&String::from_utf8_lossy(&c.into_inner()));
            }
            Ok(Event::End(_)) if in_entry => {
                if path.is_empty() {
                    // </entry>
                    return entry.into_metadata();
                }
                entry.set(&path, collapse_ws(&text));
                text.clear();
                path.pop();
            }
            Ok(Event::Eof) => return None,
            Err(e) => {
                debug!("Malformed Atom feed at byte {}: {}", reader.buffer_position(), e);
                return None;
            }
            _ => {}
        }
    }
}

fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
