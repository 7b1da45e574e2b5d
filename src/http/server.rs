//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the shared pipeline dependencies (allow-list, fetcher, engine)
//! - Create the Axum Router with the image and liveness routes
//! - Wire up middleware (admission gate, request ID, tracing, deadline)
//! - Serve over plain TCP or TLS with graceful shutdown

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{HeaderValue, Request, StatusCode},
    middleware,
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admission::{admission_middleware, AdmissionGate};
use crate::config::schema::TlsConfig;
use crate::config::ProxyConfig;
use crate::fetch::{BufferPool, FetchError, OriginFetcher};
use crate::http::handler::{health_handler, image_handler};
use crate::http::request::{request_id, UuidRequestId};
use crate::http::response::cache_control;
use crate::security::headers::nosniff_layer;
use crate::security::AllowList;
use crate::transform::engine::{report_capabilities, warm_up};
use crate::transform::{ImageEngine, TransformEngine, TransformInvoker};

/// Liveness probe; never passes through the admission gate.
pub const HEALTH_PATH: &str = "/health-z";

/// Prefix of image routes; the remainder is the origin path.
pub const IMAGE_PREFIX: &str = "/x/";

/// Shared dependencies injected into the image handler.
#[derive(Clone)]
pub struct AppState {
    pub allow_list: Arc<AllowList>,
    pub fetcher: OriginFetcher,
    pub invoker: TransformInvoker,
    pub origin_scheme: Arc<str>,
    pub cache_control: HeaderValue,
}

/// Errors building the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// HTTP server for the image proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    gate: Arc<AdmissionGate>,
}

impl HttpServer {
    /// Create a server backed by the `image` crate engine.
    pub fn new(config: ProxyConfig) -> Result<Self, ServerError> {
        let engine = Arc::new(ImageEngine::new(&config.transform));
        Self::with_engine(config, engine)
    }

    /// Create a server with a specific transform engine.
    pub fn with_engine(
        config: ProxyConfig,
        engine: Arc<dyn TransformEngine>,
    ) -> Result<Self, ServerError> {
        let allow_list = Arc::new(AllowList::from_domains(&config.security.allowed_domains));
        if allow_list.is_open() {
            tracing::warn!("No allowed domains configured; every origin domain is permitted");
        } else {
            tracing::info!(domains = ?allow_list.domains(), "Loaded allowed domains");
        }

        report_capabilities(engine.as_ref());
        if config.transform.warm_up {
            warm_up(engine.as_ref());
        }

        let pool = Arc::new(BufferPool::new(
            config.origin.buffer_pool_size,
            config.origin.buffer_retain_bytes,
        ));
        let fetcher = OriginFetcher::new(&config.origin, pool)?;

        let gate = Arc::new(AdmissionGate::new(
            config.admission.max_concurrent,
            config.admission.queue_timeout(),
        ));

        let state = AppState {
            allow_list,
            fetcher,
            invoker: TransformInvoker::new(engine),
            origin_scheme: Arc::from(config.origin.scheme.as_str()),
            cache_control: cache_control(config.cache.max_age_secs),
        };

        let router = Self::build_router(&config, state, Arc::clone(&gate));
        Ok(Self {
            router,
            config,
            gate,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &ProxyConfig, state: AppState, gate: Arc<AdmissionGate>) -> Router {
        let trace = TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
            tracing::info_span!(
                "request",
                method = %request.method(),
                path = %request.uri().path(),
                request_id = %request_id(request.headers()),
            )
        });

        Router::new()
            .route("/x/{*path}", get(image_handler))
            .route(HEALTH_PATH, get(health_handler))
            .with_state(state)
            .layer(middleware::from_fn_with_state(gate, admission_middleware))
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                    .layer(trace)
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(nosniff_layer())
                    .layer(TimeoutLayer::with_status_code(
                        StatusCode::REQUEST_TIMEOUT,
                        Duration::from_secs(config.timeouts.request_secs),
                    )),
            )
    }

    /// The fully layered router, for serving or in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn gate(&self) -> Arc<AdmissionGate> {
        Arc::clone(&self.gate)
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Serve on `listener` until `shutdown` fires, then drain in-flight
    /// requests for at most the configured grace period.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        let grace = Duration::from_secs(self.config.timeouts.shutdown_grace_secs);
        tracing::info!(
            address = %addr,
            max_concurrent = self.gate.capacity(),
            queue_timeout_ms = self.gate.queue_timeout().as_millis() as u64,
            "HTTP server starting"
        );

        let mut drain_signal = shutdown.resubscribe();
        let serve = axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .into_future();
        tokio::pin!(serve);

        tokio::select! {
            result = &mut serve => result?,
            _ = drain_signal.recv() => {
                match tokio::time::timeout(grace, &mut serve).await {
                    Ok(result) => result?,
                    Err(_) => tracing::warn!(
                        grace_secs = grace.as_secs(),
                        "Drain deadline passed, closing remaining connections"
                    ),
                }
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Serve HTTPS on `addr` until `shutdown` fires.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: &TlsConfig,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let rustls = axum_server::tls_rustls::RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path).await?;
        let grace = Duration::from_secs(self.config.timeouts.shutdown_grace_secs);

        let handle = axum_server::Handle::new();
        let shutdown_handle = handle.clone();
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            tracing::info!("Shutdown signal received, draining TLS connections");
            shutdown_handle.graceful_shutdown(Some(grace));
        });

        tracing::info!(address = %addr, max_concurrent = self.gate.capacity(), "HTTPS server starting");
        axum_server::bind_rustls(addr, rustls)
            .handle(handle)
            .serve(self.router.into_make_service())
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }
}
