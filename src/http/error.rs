//! Pipeline errors and their HTTP mapping.
//!
//! Each failure maps to exactly one status code. Clients only ever see a
//! short generic message; the details go to the log.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::fetch::FetchError;
use crate::transform::TransformError;

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("missing source domain")]
    MissingDomain,

    #[error("invalid source domain '{0}'")]
    InvalidDomain(String),

    #[error("domain '{0}' is not allow-listed")]
    ForbiddenDomain(String),

    #[error("fetching {url} failed: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("transforming {url} failed: {source}")]
    Transform {
        url: String,
        #[source]
        source: TransformError,
    },
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::MissingDomain | ProxyError::InvalidDomain(_) => StatusCode::BAD_REQUEST,
            ProxyError::ForbiddenDomain(_) => StatusCode::FORBIDDEN,
            ProxyError::Fetch { source, .. } => match source {
                FetchError::Transport(_) | FetchError::Status(_) => StatusCode::BAD_GATEWAY,
                FetchError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                FetchError::Read(_) | FetchError::Client(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ProxyError::Transform { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Pipeline stage that failed, for logs.
    pub fn stage(&self) -> &'static str {
        match self {
            ProxyError::MissingDomain | ProxyError::InvalidDomain(_) => "validate",
            ProxyError::ForbiddenDomain(_) => "authorize",
            ProxyError::Fetch { .. } => "fetch",
            ProxyError::Transform { .. } => "transform",
        }
    }

    fn public_message(&self) -> &'static str {
        match self {
            ProxyError::MissingDomain => "Missing source domain",
            ProxyError::InvalidDomain(_) => "Invalid source domain",
            ProxyError::ForbiddenDomain(_) => "Forbidden domain",
            ProxyError::Fetch { source, .. } => match source {
                FetchError::Transport(_) | FetchError::Status(_) => "Failed to fetch source image",
                FetchError::TooLarge { .. } => "Source image too large",
                FetchError::Read(_) | FetchError::Client(_) => "Error reading image",
            },
            ProxyError::Transform { .. } => "Failed to process image",
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(stage = self.stage(), status = status.as_u16(), error = %self, "Image request failed");
        } else {
            tracing::warn!(stage = self.stage(), status = status.as_u16(), error = %self, "Image request rejected");
        }
        (status, self.public_message()).into_response()
    }
}
