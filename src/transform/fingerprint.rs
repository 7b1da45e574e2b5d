//! Content + parameter fingerprints used as ETags.
//!
//! The digest covers the original bytes, the source URL and every option that
//! changes the transform output, in a fixed order. `If-None-Match` is compared
//! byte-for-byte: no weak validators, no lists.

use std::fmt;

use axum::http::{header, HeaderMap};
use sha2::{Digest, Sha256};

use crate::transform::options::TransformOptions;

/// Hex SHA-256 digest identifying one transform of one asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// An empty fingerprint is never sent as an ETag.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the fingerprint of transforming `bytes` fetched from `url` with `options`.
pub fn generate(bytes: &[u8], url: &str, options: &TransformOptions) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.update(url.as_bytes());
    hasher.update(options.height.to_string());
    hasher.update(options.width.to_string());
    hasher.update(options.quality.to_string());
    hasher.update(options.format.code().to_string());
    hasher.update(options.force.to_string());
    hasher.update(options.enlarge.to_string());
    hasher.update(options.compression.to_string());
    Fingerprint(hex::encode(hasher.finalize()))
}

/// Whether the request's `If-None-Match` header equals `fingerprint` exactly.
pub fn matches(headers: &HeaderMap, fingerprint: &Fingerprint) -> bool {
    if fingerprint.is_empty() {
        return false;
    }
    headers
        .get(header::IF_NONE_MATCH)
        .map(|value| value.as_bytes() == fingerprint.as_str().as_bytes())
        .unwrap_or(false)
}
