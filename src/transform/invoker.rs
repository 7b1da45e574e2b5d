//! Fault-isolated transform invocation.
//!
//! The engine runs on tokio's blocking pool inside `catch_unwind`, so a panic
//! on one hostile image turns into a single failed request instead of a
//! poisoned worker.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use crate::admission::AdmissionSlot;
use crate::fetch::PooledBuffer;
use crate::observability::metrics;
use crate::transform::engine::{EngineError, TransformEngine};
use crate::transform::options::TransformOptions;

/// Outcome of a failed transform.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    /// The engine rejected the input or failed to encode.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The engine terminated abnormally.
    #[error("engine fault: {0}")]
    Fault(String),
}

/// Runs a `TransformEngine` behind a panic boundary.
#[derive(Clone)]
pub struct TransformInvoker {
    engine: Arc<dyn TransformEngine>,
}

impl TransformInvoker {
    pub fn new(engine: Arc<dyn TransformEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &dyn TransformEngine {
        self.engine.as_ref()
    }

    /// Transform the fetched bytes. The buffer goes back to its pool, and the
    /// admission slot (if any) is released, once the engine is done, whatever
    /// the outcome. Dropping the returned future does not cut that short.
    pub async fn process(
        &self,
        original: PooledBuffer,
        options: TransformOptions,
        slot: Option<Arc<AdmissionSlot>>,
    ) -> Result<Vec<u8>, TransformError> {
        let engine = Arc::clone(&self.engine);
        let start = Instant::now();

        let joined = tokio::task::spawn_blocking(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                engine.transform(original.as_slice(), &options)
            }));
            drop(original);
            drop(slot);
            result
        })
        .await;

        let result = match joined {
            Ok(Ok(Ok(bytes))) => Ok(bytes),
            Ok(Ok(Err(e))) => Err(TransformError::Engine(e)),
            Ok(Err(payload)) => Err(TransformError::Fault(panic_message(payload))),
            Err(e) if e.is_panic() => Err(TransformError::Fault(panic_message(e.into_panic()))),
            Err(e) => Err(TransformError::Fault(format!("transform task lost: {e}"))),
        };

        metrics::record_transform(start, result.is_ok());
        if let Err(TransformError::Fault(ref reason)) = result {
            metrics::record_transform_fault();
            tracing::error!(reason = %reason, "Recovered from transform engine fault");
        }
        result
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
