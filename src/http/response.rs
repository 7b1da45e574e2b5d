//! Response construction for transformed images.

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::security::headers::NOSNIFF;
use crate::transform::{Fingerprint, OutputFormat};

/// `Cache-Control` value for transformed images.
pub fn cache_control(max_age_secs: u64) -> HeaderValue {
    HeaderValue::from_str(&format!("public, max-age={max_age_secs}"))
        .unwrap_or_else(|_| HeaderValue::from_static("public, max-age=2592000"))
}

/// 200 with the transformed body.
pub fn image_response(
    body: Vec<u8>,
    format: OutputFormat,
    tag: &Fingerprint,
    cache_control: &HeaderValue,
) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(format.mime_type()));
    validator_headers(&mut headers, tag, cache_control);
    headers.insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static(NOSNIFF));

    (StatusCode::OK, headers, Body::from(body)).into_response()
}

/// 304 for a matching `If-None-Match`; no body.
pub fn not_modified(tag: &Fingerprint, cache_control: &HeaderValue) -> Response {
    let mut headers = HeaderMap::new();
    validator_headers(&mut headers, tag, cache_control);
    (StatusCode::NOT_MODIFIED, headers).into_response()
}

fn validator_headers(headers: &mut HeaderMap, tag: &Fingerprint, cache_control: &HeaderValue) {
    headers.insert(header::CACHE_CONTROL, cache_control.clone());
    if !tag.is_empty() {
        if let Ok(etag) = HeaderValue::from_str(tag.as_str()) {
            headers.insert(header::ETAG, etag);
        }
    }
    headers.insert(header::VARY, HeaderValue::from_static("Accept"));
}
