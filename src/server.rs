//! HTTP surface: `POST /api/summarize`, `GET /api/health`, `GET /`.
//!
//! A thin shell over [`Explainer`]. Each summarize request goes through the
//! [`RequestGuard`] (counted against the client's quota, body size checked),
//! then the optional API-key check, then the pipeline. Errors are rendered as
//! [`ErrorResponse`] with a status code derived from [`ErrorKind`].

use crate::config::RateLimitConfig;
use crate::error::{ErrorKind, ExplainError};
use crate::explain::Explainer;
use crate::guard::{client_identity, RateDecision, RequestGuard};
use crate::output::{ErrorResponse, ExplainRequest, HealthResponse};
use axum::extract::{ConnectInfo, Request, State};
use axum::http::header::{HeaderName, HeaderValue, CONTENT_TYPE, RETRY_AFTER};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

const API_KEY_HEADER: &str = "x-api-key";

/// Server-only settings.
#[derive(Debug, Clone, Default)]
pub struct ServerOptions {
    pub rate_limit: RateLimitConfig,
    /// When non-empty, `POST /api/summarize` requires one of these in `X-API-Key`.
    pub api_keys: Vec<String>,
    /// CORS origins. Empty allows any origin.
    pub allowed_origins: Vec<String>,
}

#[derive(Clone)]
struct AppState {
    explainer: Arc<Explainer>,
    guard: RequestGuard,
    api_keys: Arc<HashSet<String>>,
}

/// HTTP status for each error kind.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidIdentifier | ErrorKind::InvalidStyle | ErrorKind::InvalidRequest => {
            StatusCode::BAD_REQUEST
        }
        ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorKind::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        ErrorKind::CorruptDocument => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::FetchError
        | ErrorKind::SchemaViolation
        | ErrorKind::ExplanationFailed
        | ErrorKind::Timeout
        | ErrorKind::Backend => StatusCode::BAD_GATEWAY,
        ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        ErrorKind::InvalidConfig | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Build the application router.
pub fn router(explainer: Arc<Explainer>, options: ServerOptions) -> Router {
    let state = AppState {
        explainer,
        guard: RequestGuard::new(options.rate_limit.clone()),
        api_keys: Arc::new(options.api_keys.into_iter().filter(|k| !k.is_empty()).collect()),
    };

    Router::new()
        .route("/", get(health))
        .route("/api/health", get(health))
        .route("/api/summarize", post(summarize))
        .with_state(state)
        .layer(cors_layer(&options.allowed_origins))
        .layer(SetResponseHeaderLayer::if_not_present(
            HeaderName::from_static("x-content-type-options"),
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            HeaderName::from_static("x-frame-options"),
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            HeaderName::from_static("referrer-policy"),
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, HeaderName::from_static(API_KEY_HEADER)]);
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o.trim()).ok())
        .collect();
    if parsed.is_empty() {
        base.allow_origin(Any)
    } else {
        base.allow_origin(AllowOrigin::list(parsed))
    }
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::default())
}

async fn summarize(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Request,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|c| c.0.ip());
    let client = client_identity(
        |name| headers.get(name).and_then(|v| v.to_str().ok()),
        peer,
    );

    let limit = state.guard.config().max_body_bytes;
    let body = axum::body::to_bytes(request.into_body(), limit as usize).await;
    let body_len = match &body {
        Ok(b) => b.len() as u64,
        Err(_) => limit.saturating_add(1),
    };

    let decision = match state.guard.admit(&client, body_len) {
        Ok(d) => d,
        Err(e) => return error_response(&e, None),
    };

    if !state.api_keys.is_empty() {
        let presented = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok());
        if !presented.is_some_and(|k| state.api_keys.contains(k)) {
            warn!("Rejected request from {} without a valid API key", client);
            return error_response(&ExplainError::Unauthorized, Some(&decision));
        }
    }

    let body = match body {
        Ok(b) => b,
        Err(e) => {
            let err = ExplainError::InvalidRequest {
                detail: format!("could not read body: {e}"),
            };
            return error_response(&err, Some(&decision));
        }
    };
    let req: ExplainRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            let err = ExplainError::InvalidRequest {
                detail: e.to_string(),
            };
            return error_response(&err, Some(&decision));
        }
    };

    info!("Summarize request from {} for {}", client, req.url);
    match state
        .explainer
        .explain(&req.url, req.explanation_style.as_deref())
        .await
    {
        Ok(out) => {
            let mut response = (StatusCode::OK, Json(out)).into_response();
            add_rate_headers(response.headers_mut(), &decision);
            response
        }
        Err(e) => {
            warn!("Request from {} failed: {}", client, e);
            error_response(&e, Some(&decision))
        }
    }
}

fn error_response(err: &ExplainError, decision: Option<&RateDecision>) -> Response {
    let status = status_for(err.kind());
    let mut response = (status, Json(ErrorResponse::from(err))).into_response();
    let headers = response.headers_mut();
    if let Some(d) = decision {
        add_rate_headers(headers, d);
    }
    if let Some(secs) = err.retry_after_secs() {
        headers.insert(RETRY_AFTER, HeaderValue::from(secs));
    }
    response
}

fn add_rate_headers(headers: &mut HeaderMap, d: &RateDecision) {
    headers.insert(
        HeaderName::from_static("x-ratelimit-limit"),
        HeaderValue::from(d.limit),
    );
    headers.insert(
        HeaderName::from_static("x-ratelimit-remaining"),
        HeaderValue::from(d.remaining),
    );
    headers.insert(
        HeaderName::from_static("x-ratelimit-reset"),
        HeaderValue::from(d.retry_after_secs()),
    );
}
