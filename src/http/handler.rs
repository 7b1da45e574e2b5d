//! Image request pipeline.
//!
//! ```text
//! validate → authorize → fetch → negotiate → fingerprint ─┬→ 304
//!                                                         └→ transform → 200
//! ```
//!
//! Every stage is a potential exit; no stage is retried.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::{header, HeaderMap, Uri};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use url::Url;

use crate::admission::AdmissionSlot;
use crate::http::error::ProxyError;
use crate::http::request::{request_id, ImageParams};
use crate::http::response;
use crate::http::server::{AppState, IMAGE_PREFIX};
use crate::observability::metrics;
use crate::transform::{fingerprint, OutputFormat, TransformOptions};

/// `GET /x/{*path}`
pub async fn image_handler(
    State(state): State<AppState>,
    slot: Option<Extension<Arc<AdmissionSlot>>>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let start = Instant::now();
    let slot = slot.map(|Extension(slot)| slot);
    let response = match run_pipeline(&state, slot, &uri, &headers).await {
        Ok(response) => response,
        Err(e) => {
            tracing::debug!(request_id = request_id(&headers), stage = e.stage(), "Pipeline stopped");
            e.into_response()
        }
    };
    metrics::record_request(response.status().as_u16(), start);
    response
}

/// `GET /health-z`
pub async fn health_handler() -> &'static str {
    "OK"
}

async fn run_pipeline(
    state: &AppState,
    slot: Option<Arc<AdmissionSlot>>,
    uri: &Uri,
    headers: &HeaderMap,
) -> Result<Response, ProxyError> {
    // Parse & validate
    let params = ImageParams::from_query(uri.query());
    let domain = params.domain.ok_or(ProxyError::MissingDomain)?;

    // Authorize
    if !state.allow_list.is_allowed(&domain) {
        return Err(ProxyError::ForbiddenDomain(domain));
    }
    let path = uri.path().strip_prefix(IMAGE_PREFIX).unwrap_or_default();
    let url = origin_url(&state.origin_scheme, &domain, path)?;

    tracing::info!(
        request_id = request_id(headers),
        url = %url,
        width = params.width,
        height = params.height,
        quality = params.quality,
        "Processing image"
    );

    // Fetch
    let original = state.fetcher.fetch(&url).await.map_err(|source| ProxyError::Fetch {
        url: url.to_string(),
        source,
    })?;

    // Negotiate
    let accept = headers.get(header::ACCEPT).and_then(|v| v.to_str().ok());
    let format = OutputFormat::negotiate(accept);
    let options = TransformOptions::new(params.width, params.height, params.quality, format);

    // Fingerprint & conditional check
    let tag = fingerprint::generate(&original, url.as_str(), &options);
    if fingerprint::matches(headers, &tag) {
        tracing::debug!(url = %url, etag = %tag, "ETag matched, skipping transform");
        return Ok(response::not_modified(&tag, &state.cache_control));
    }

    // Transform; the engine holds the admission slot until it returns
    let body = state
        .invoker
        .process(original, options, slot)
        .await
        .map_err(|source| ProxyError::Transform {
            url: url.to_string(),
            source,
        })?;

    // Respond
    tracing::debug!(url = %url, format = %format, bytes = body.len(), "Sending transformed image");
    Ok(response::image_response(body, format, &tag, &state.cache_control))
}

/// Build the origin URL, refusing domains that could smuggle a different
/// authority, path or query into it.
fn origin_url(scheme: &str, domain: &str, path: &str) -> Result<Url, ProxyError> {
    let suspicious = |c: char| matches!(c, '/' | '\\' | '@' | '?' | '#') || c.is_whitespace();
    if domain.chars().any(suspicious) {
        return Err(ProxyError::InvalidDomain(domain.to_string()));
    }

    let url = Url::parse(&format!("{scheme}://{domain}/{path}"))
        .map_err(|_| ProxyError::InvalidDomain(domain.to_string()))?;
    if url.host_str().is_none() {
        return Err(ProxyError::InvalidDomain(domain.to_string()));
    }
    Ok(url)
}
