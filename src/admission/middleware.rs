//! Admission middleware.
//!
//! Wraps every route except the liveness probe. The slot is shared with the
//! pipeline through request extensions: the transform stage keeps a clone
//! alive on the blocking pool, so a dropped request (client gone, deadline
//! hit) does not free capacity while the engine is still running.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::admission::gate::{AdmissionError, AdmissionGate};
use crate::http::server::HEALTH_PATH;
use crate::observability::metrics;

pub async fn admission_middleware(
    State(gate): State<Arc<AdmissionGate>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if request.uri().path() == HEALTH_PATH {
        return next.run(request).await;
    }

    let slot = match gate.admit().await {
        Ok(slot) => slot,
        Err(AdmissionError::Busy(waited)) => {
            tracing::warn!(
                path = %request.uri().path(),
                waited_ms = waited.as_millis() as u64,
                "Admission timed out, server busy"
            );
            metrics::record_admission("rejected", gate.available());
            return (StatusCode::SERVICE_UNAVAILABLE, "Server busy").into_response();
        }
    };

    metrics::record_admission(slot.admission().as_str(), gate.available());
    let slot = Arc::new(slot);
    request.extensions_mut().insert(Arc::clone(&slot));
    let response = next.run(request).await;
    drop(slot);
    response
}
