//! Security response headers.
//!
//! Every response leaves with `X-Content-Type-Options: nosniff`; transformed
//! images are served as bytes from an untrusted origin and must never be
//! content-sniffed into something executable.

use axum::http::{header, HeaderValue};
use tower_http::set_header::SetResponseHeaderLayer;

pub const NOSNIFF: &str = "nosniff";

/// Layer adding `X-Content-Type-Options` to responses that lack it.
pub fn nosniff_layer() -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::if_not_present(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static(NOSNIFF),
    )
}
