//! HTTP integration tests.
//!
//! A local axum app stands in for arxiv.org (PDF downloads and the Atom API),
//! and the service router is exercised over a real TCP listener with reqwest.
//! No test here reaches pdfium or a real LLM.

use arxiv_eli5::pipeline::source::{self, fetch_metadata, fetch_pdf};
use arxiv_eli5::server::{router, ServerOptions};
use arxiv_eli5::{
    ArxivId, BackendError, BackendReply, ErrorKind, ErrorResponse, ExplainConfig, ExplainError,
    Explainer, ExplanationBackend, FetchFailure, HealthResponse, RateLimitConfig,
};
use async_trait::async_trait;
use axum::body::Body;
use axum::extract::{Path, Query};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

// ── Fake arXiv ───────────────────────────────────────────────────────────────

const SMALL_PDF: &[u8] = b"%PDF-1.4\n% tiny test document\n";

const ATOM_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title type="html">ArXiv Query: id_list=1706.03762</title>
  <entry>
    <id>http://arxiv.org/abs/1706.03762v7</id>
    <published>2017-06-12T17:57:34Z</published>
    <title>Attention Is All
      You Need</title>
    <author><name>Ashish Vaswani</name></author>
    <author><name>Noam Shazeer</name></author>
  </entry>
</feed>"#;

const ERROR_FEED: &str = r#"<feed xmlns="http://www.w3.org/2005/Atom">
  <entry>
    <id>http://arxiv.org/api/errors#incorrect_id_format_for_9999.99999</id>
    <title>Error</title>
  </entry>
</feed>"#;

async fn pdf(Path(id): Path<String>) -> Response {
    match id.as_str() {
        "1706.03762" | "1706.03762v5" | "hep-th/9901001" => {
            ([(header::CONTENT_TYPE, "application/pdf")], SMALL_PDF).into_response()
        }
        "2301.00002" => (
            [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
            "<html>captcha</html>",
        )
            .into_response(),
        "2301.00003" => {
            let mut body = b"%PDF-1.7\n".to_vec();
            body.resize(4096, b'x');
            ([(header::CONTENT_TYPE, "application/pdf")], body).into_response()
        }
        "2301.00004" => {
            // Chunked, no Content-Length: only the running count can catch it
            let chunks: Vec<Result<Vec<u8>, std::io::Error>> =
                (0..8).map(|_| Ok(vec![b'%'; 512])).collect();
            Response::builder()
                .header(header::CONTENT_TYPE, "application/pdf")
                .body(Body::from_stream(futures::stream::iter(chunks)))
                .unwrap()
        }
        "2301.00005" => (
            [(header::CONTENT_TYPE, "application/octet-stream")],
            "GIF89a not a pdf",
        )
            .into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn atom(Query(q): Query<HashMap<String, String>>) -> Response {
    let body = match q.get("id_list").map(String::as_str) {
        Some("1706.03762") => ATOM_FEED,
        Some("2301.00009") => return StatusCode::SERVICE_UNAVAILABLE.into_response(),
        _ => ERROR_FEED,
    };
    ([(header::CONTENT_TYPE, "application/atom+xml")], body).into_response()
}

async fn spawn(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });
    addr
}

async fn fake_arxiv() -> SocketAddr {
    spawn(
        Router::new()
            .route("/pdf/{*id}", get(pdf))
            .route("/api/query", get(atom)),
    )
    .await
}

fn config_for(arxiv: SocketAddr, max_pdf_bytes: u64) -> ExplainConfig {
    ExplainConfig::builder()
        .arxiv_pdf_base(format!("http://{arxiv}/pdf/"))
        .arxiv_api_base(format!("http://{arxiv}/api/query"))
        .max_pdf_bytes(max_pdf_bytes)
        .fetch_timeout_secs(5)
        .build()
        .unwrap()
}

fn id(s: &str) -> ArxivId {
    ArxivId::parse(s, 2048).unwrap()
}

// ── Download ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn downloads_a_pdf() {
    let arxiv = fake_arxiv().await;
    let config = config_for(arxiv, 1024);
    let client = source::build_client(&config).unwrap();

    let paper = fetch_pdf(&client, &id("https://arxiv.org/abs/1706.03762v5"), &config)
        .await
        .unwrap();
    assert_eq!(paper.bytes, SMALL_PDF);
    assert_eq!(paper.byte_size(), SMALL_PDF.len() as u64);
    assert!(paper.canonical_url.ends_with("/pdf/1706.03762v5"));

    let old_style = fetch_pdf(&client, &id("hep-th/9901001"), &config)
        .await
        .unwrap();
    assert_eq!(old_style.arxiv_id.id, "hep-th/9901001");
}

#[tokio::test]
async fn missing_paper_is_a_fetch_error_with_status() {
    let arxiv = fake_arxiv().await;
    let config = config_for(arxiv, 1024);
    let client = source::build_client(&config).unwrap();

    let err = fetch_pdf(&client, &id("2301.00001"), &config)
        .await
        .unwrap_err();
    match err {
        ExplainError::FetchError { arxiv_id, reason } => {
            assert_eq!(arxiv_id, "2301.00001");
            assert_eq!(reason, FetchFailure::Status(404));
        }
        other => panic!("expected FetchError, got {other:?}"),
    }
}

#[tokio::test]
async fn html_and_mislabelled_bodies_are_not_pdfs() {
    let arxiv = fake_arxiv().await;
    let config = config_for(arxiv, 1024);
    let client = source::build_client(&config).unwrap();

    for paper in ["2301.00002", "2301.00005"] {
        let err = fetch_pdf(&client, &id(paper), &config).await.unwrap_err();
        assert!(
            matches!(
                err,
                ExplainError::FetchError {
                    reason: FetchFailure::NotPdf(_),
                    ..
                }
            ),
            "{paper}: {err:?}"
        );
    }
}

#[tokio::test]
async fn oversized_pdf_is_refused_by_content_length() {
    let arxiv = fake_arxiv().await;
    let config = config_for(arxiv, 1024);
    let client = source::build_client(&config).unwrap();

    let err = fetch_pdf(&client, &id("2301.00003"), &config)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ExplainError::PayloadTooLarge {
            limit_bytes: 1024,
            ..
        }
    ));
}

#[tokio::test]
async fn oversized_stream_is_aborted_midway() {
    let arxiv = fake_arxiv().await;
    let config = config_for(arxiv, 1024);
    let client = source::build_client(&config).unwrap();

    let err = fetch_pdf(&client, &id("2301.00004"), &config)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PayloadTooLarge);
}

// ── Metadata ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn metadata_lookup_parses_the_atom_entry() {
    let arxiv = fake_arxiv().await;
    let config = config_for(arxiv, 1024);
    let client = source::build_client(&config).unwrap();

    let meta = fetch_metadata(&client, &id("1706.03762v5"), &config)
        .await
        .unwrap();
    assert_eq!(meta.title, "Attention Is All You Need");
    assert_eq!(meta.authors, vec!["Ashish Vaswani", "Noam Shazeer"]);
    assert_eq!(meta.published.as_deref(), Some("2017-06-12T17:57:34Z"));
}

#[tokio::test]
async fn metadata_lookup_is_best_effort() {
    let arxiv = fake_arxiv().await;
    let config = config_for(arxiv, 1024);
    let client = source::build_client(&config).unwrap();

    assert!(fetch_metadata(&client, &id("9999.99999"), &config).await.is_none());
    assert!(fetch_metadata(&client, &id("2301.00009"), &config).await.is_none());
}

// ── Service router ───────────────────────────────────────────────────────────

struct NeverCalled;

#[async_trait]
impl ExplanationBackend for NeverCalled {
    async fn complete(&self, _system: &str, _user: &str) -> Result<BackendReply, BackendError> {
        Err(BackendError("backend must not be reached".into()))
    }
}

async fn service(options: ServerOptions) -> String {
    let arxiv = fake_arxiv().await;
    let explainer =
        Explainer::with_backend(config_for(arxiv, 1024), Arc::new(NeverCalled)).unwrap();
    let addr = spawn(router(Arc::new(explainer), options)).await;
    format!("http://{addr}")
}

async fn post(base: &str, body: &str, headers: &[(&str, &str)]) -> reqwest::Response {
    let mut req = reqwest::Client::new()
        .post(format!("{base}/api/summarize"))
        .header("content-type", "application/json")
        .body(body.to_string());
    for (k, v) in headers {
        req = req.header(*k, *v);
    }
    req.send().await.unwrap()
}

#[tokio::test]
async fn health_endpoints_answer_with_security_headers() {
    let base = service(ServerOptions::default()).await;

    for path in ["/", "/api/health"] {
        let resp = reqwest::get(format!("{base}{path}")).await.unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.headers()["x-content-type-options"], "nosniff");
        assert_eq!(resp.headers()["x-frame-options"], "DENY");
        let body: HealthResponse = resp.json().await.unwrap();
        assert_eq!(body.status, "ok");
        assert_eq!(body.service, "arxiv-eli5");
    }
}

#[tokio::test]
async fn unknown_style_is_a_bad_request() {
    let base = service(ServerOptions::default()).await;

    let resp = post(
        &base,
        r#"{"url":"https://arxiv.org/abs/1706.03762","explanation_style":"pirate"}"#,
        &[],
    )
    .await;
    assert_eq!(resp.status(), 400);
    assert_eq!(resp.headers()["x-ratelimit-limit"], "10");
    assert_eq!(resp.headers()["x-ratelimit-remaining"], "9");
    let body: ErrorResponse = resp.json().await.unwrap();
    assert_eq!(body.error, ErrorKind::InvalidStyle);
    assert!(!body.retryable);
}

#[tokio::test]
async fn malformed_body_is_an_invalid_request() {
    let base = service(ServerOptions::default()).await;

    let resp = post(&base, r#"{"link":"1706.03762"}"#, &[]).await;
    assert_eq!(resp.status(), 400);
    let body: ErrorResponse = resp.json().await.unwrap();
    assert_eq!(body.error, ErrorKind::InvalidRequest);
}

#[tokio::test]
async fn upstream_404_is_a_bad_gateway() {
    let base = service(ServerOptions::default()).await;

    let resp = post(&base, r#"{"url":"2301.00001"}"#, &[]).await;
    assert_eq!(resp.status(), 502);
    let body: ErrorResponse = resp.json().await.unwrap();
    assert_eq!(body.error, ErrorKind::FetchError);
    assert!(body.message.contains("404"));
}

#[tokio::test]
async fn quota_is_enforced_per_forwarded_client() {
    let base = service(ServerOptions::default()).await;
    let me = [("x-forwarded-for", "203.0.113.7")];

    for i in 0..10 {
        let resp = post(&base, r#"{"url":"nope"}"#, &me).await;
        assert_eq!(resp.status(), 400, "request {}", i + 1);
        let remaining: u32 = resp.headers()["x-ratelimit-remaining"]
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        assert_eq!(remaining, 9 - i);
    }

    let resp = post(&base, r#"{"url":"nope"}"#, &me).await;
    assert_eq!(resp.status(), 429);
    let retry: u64 = resp.headers()["retry-after"]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!((1..=60).contains(&retry));
    let body: ErrorResponse = resp.json().await.unwrap();
    assert_eq!(body.error, ErrorKind::RateLimited);
    assert!(body.retryable);

    let other = [("x-forwarded-for", "198.51.100.2")];
    assert_eq!(post(&base, r#"{"url":"nope"}"#, &other).await.status(), 400);
}

#[tokio::test]
async fn oversized_body_is_payload_too_large() {
    let base = service(ServerOptions {
        rate_limit: RateLimitConfig {
            max_body_bytes: 256,
            ..Default::default()
        },
        ..Default::default()
    })
    .await;
    let me = [("x-forwarded-for", "203.0.113.9")];

    // Just over the limit, then far past it (Content-Length 4 KiB)
    for (i, pad) in [400, 4096].into_iter().enumerate() {
        let padding = "x".repeat(pad);
        let body = format!(r#"{{"url":"1706.03762","pad":"{padding}"}}"#);
        let resp = post(&base, &body, &me).await;
        assert_eq!(resp.status(), 413, "padding {pad}");
        assert!(resp.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("application/json"));
        let err: ErrorResponse = resp.json().await.unwrap();
        assert_eq!(err.error, ErrorKind::PayloadTooLarge);
        assert!(!err.retryable);

        // Rejected bodies still count against the client's quota
        let next = post(&base, r#"{"url":"nope"}"#, &me).await;
        assert_eq!(next.headers()["x-ratelimit-remaining"], (8 - 2 * i).to_string().as_str());
    }
}

#[tokio::test]
async fn api_key_is_required_when_configured() {
    let base = service(ServerOptions {
        api_keys: vec!["s3cret".into()],
        ..Default::default()
    })
    .await;
    let body = r#"{"url":"1706.03762","explanation_style":"pirate"}"#;

    let resp = post(&base, body, &[]).await;
    assert_eq!(resp.status(), 401);
    let err: ErrorResponse = resp.json().await.unwrap();
    assert_eq!(err.error, ErrorKind::Unauthorized);

    assert_eq!(post(&base, body, &[("x-api-key", "wrong")]).await.status(), 401);
    // Past the key check, the style is validated as usual
    assert_eq!(post(&base, body, &[("x-api-key", "s3cret")]).await.status(), 400);
}
