//! Outbound origin fetching.
//!
//! # Responsibilities
//! - One shared, connection-pooling HTTP client
//! - Fixed timeouts on every fetch
//! - Hard cap on the response body, enforced while streaming
//!
//! # Design Decisions
//! - At most `max_body_bytes + 1` bytes are ever buffered
//! - A declared `Content-Length` over the cap is rejected before reading
//! - Redirects are only followed within the same host, so the allow-list
//!   cannot be bypassed by an origin redirecting elsewhere
//! - No retries; the caller (usually a CDN) owns retry policy

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::{redirect, Client, StatusCode};
use url::Url;

use crate::config::OriginConfig;
use crate::fetch::buffer_pool::{BufferPool, PooledBuffer};
use crate::observability::metrics;

const MAX_REDIRECTS: usize = 5;

/// Errors from fetching an origin asset.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("origin request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("origin responded with status {0}")]
    Status(StatusCode),

    #[error("origin body exceeds {limit} bytes")]
    TooLarge { limit: usize },

    #[error("reading origin body failed: {0}")]
    Read(#[source] reqwest::Error),

    #[error("failed to build origin client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Fetches original images from origins.
#[derive(Debug, Clone)]
pub struct OriginFetcher {
    client: Client,
    pool: Arc<BufferPool>,
    max_body_bytes: usize,
}

impl OriginFetcher {
    pub fn new(config: &OriginConfig, pool: Arc<BufferPool>) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .pool_idle_timeout(Duration::from_secs(config.pool_idle_timeout_secs))
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .user_agent(config.user_agent.clone())
            .redirect(same_host_redirects())
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            client,
            pool,
            max_body_bytes: config.max_body_bytes,
        })
    }

    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }

    /// GET `url` and return its body in a pooled buffer.
    pub async fn fetch(&self, url: &Url) -> Result<PooledBuffer, FetchError> {
        let start = Instant::now();
        let mut response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(FetchError::Transport)?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::Status(status));
        }

        let limit = self.max_body_bytes;
        if response.content_length().is_some_and(|len| len > limit as u64) {
            return Err(FetchError::TooLarge { limit });
        }

        let mut buffer = self.pool.checkout();
        let read_cap = limit.saturating_add(1);
        while let Some(chunk) = response.chunk().await.map_err(FetchError::Read)? {
            let room = read_cap - buffer.len();
            buffer.extend_from_slice(&chunk[..chunk.len().min(room)]);
            if buffer.len() > limit {
                return Err(FetchError::TooLarge { limit });
            }
        }

        metrics::record_origin_fetch(buffer.len(), start);
        tracing::debug!(
            url = %url,
            bytes = buffer.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Fetched origin image"
        );
        Ok(buffer)
    }
}

fn same_host_redirects() -> redirect::Policy {
    redirect::Policy::custom(|attempt| {
        let same_host = attempt
            .previous()
            .first()
            .is_some_and(|first| first.host_str() == attempt.url().host_str());
        if attempt.previous().len() > MAX_REDIRECTS {
            attempt.error("too many redirects")
        } else if same_host {
            attempt.follow()
        } else {
            attempt.stop()
        }
    })
}
