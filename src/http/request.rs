//! Request identification and parameter parsing.
//!
//! # Responsibilities
//! - Generate a UUID v4 `x-request-id` for requests that lack one
//! - Parse the image query string with first-value-wins semantics

use axum::http::{HeaderMap, HeaderValue, Request};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

use crate::transform::options::parse_dimension;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Generates UUID v4 request IDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// The request's ID, or "unknown" outside the request-id layer.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// Query parameters of an image request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageParams {
    /// Origin domain (`d`), trimmed; `None` when absent or blank.
    pub domain: Option<String>,
    /// `w`, 0 when unset or unparseable.
    pub width: u32,
    /// `h`, 0 when unset or unparseable.
    pub height: u32,
    /// `q`, 0 when unset or unparseable.
    pub quality: u32,
}

impl ImageParams {
    pub fn from_query(query: Option<&str>) -> Self {
        let mut domain = None;
        let mut width = None;
        let mut height = None;
        let mut quality = None;

        for (key, value) in url::form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
            let slot = match key.as_ref() {
                "d" => &mut domain,
                "w" => &mut width,
                "h" => &mut height,
                "q" => &mut quality,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }

        Self {
            domain: domain
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            width: parse_dimension(width.as_deref()),
            height: parse_dimension(height.as_deref()),
            quality: parse_dimension(quality.as_deref()),
        }
    }
}
