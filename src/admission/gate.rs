//! Fixed-capacity admission gate.
//!
//! A semaphore of `capacity` permits. Acquisition is one bounded-wait
//! operation: take a free permit if there is one, otherwise wait up to the
//! given timeout. A zero timeout therefore means "try once".

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// How a slot was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Capacity was free on arrival.
    Immediate,
    /// The request waited in the queue before a slot freed.
    Queued,
}

impl Admission {
    pub fn as_str(self) -> &'static str {
        match self {
            Admission::Immediate => "immediate",
            Admission::Queued => "queued",
        }
    }
}

/// Reasons a request was not admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AdmissionError {
    #[error("no capacity freed within {0:?}")]
    Busy(Duration),
}

/// A held unit of capacity. Dropping it releases the slot.
#[derive(Debug)]
pub struct AdmissionSlot {
    _permit: OwnedSemaphorePermit,
    admission: Admission,
}

impl AdmissionSlot {
    pub fn admission(&self) -> Admission {
        self.admission
    }
}

/// Bounded-concurrency gate with a bounded queue wait.
#[derive(Debug)]
pub struct AdmissionGate {
    permits: Arc<Semaphore>,
    capacity: usize,
    queue_timeout: Duration,
}

impl AdmissionGate {
    pub fn new(capacity: usize, queue_timeout: Duration) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
            queue_timeout,
        }
    }

    /// Acquire with the configured queue timeout.
    pub async fn admit(&self) -> Result<AdmissionSlot, AdmissionError> {
        self.acquire(self.queue_timeout).await
    }

    /// Acquire a slot, waiting at most `timeout` for one to free.
    pub async fn acquire(&self, timeout: Duration) -> Result<AdmissionSlot, AdmissionError> {
        if let Ok(permit) = Arc::clone(&self.permits).try_acquire_owned() {
            return Ok(self.slot(permit, Admission::Immediate));
        }
        if timeout.is_zero() {
            return Err(AdmissionError::Busy(timeout));
        }

        tracing::debug!(
            capacity = self.capacity,
            timeout_ms = timeout.as_millis() as u64,
            "No admission slot available, queuing"
        );

        // The semaphore is never closed, so the only failure is the deadline.
        match tokio::time::timeout(timeout, Arc::clone(&self.permits).acquire_owned()).await {
            Ok(Ok(permit)) => Ok(self.slot(permit, Admission::Queued)),
            _ => Err(AdmissionError::Busy(timeout)),
        }
    }

    fn slot(&self, permit: OwnedSemaphorePermit, admission: Admission) -> AdmissionSlot {
        AdmissionSlot {
            _permit: permit,
            admission,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots not currently held.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn queue_timeout(&self) -> Duration {
        self.queue_timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fast_path() {
        let gate = AdmissionGate::new(2, Duration::from_millis(50));
        let a = gate.admit().await.unwrap();
        let b = gate.admit().await.unwrap();
        assert_eq!(a.admission(), Admission::Immediate);
        assert_eq!(b.admission(), Admission::Immediate);
        assert_eq!(gate.available(), 0);

        drop(a);
        drop(b);
        assert_eq!(gate.available(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_queued_then_accepted() {
        let gate = Arc::new(AdmissionGate::new(1, Duration::from_secs(5)));
        let held = gate.admit().await.unwrap();

        let waiter = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { gate.admit().await })
        };

        tokio::time::sleep(Duration::from_secs(1)).await;
        drop(held);

        let slot = waiter.await.unwrap().unwrap();
        assert_eq!(slot.admission(), Admission::Queued);
        assert_eq!(gate.available(), 0);
        drop(slot);
        assert_eq!(gate.available(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_queued_then_rejected() {
        let gate = AdmissionGate::new(1, Duration::from_secs(2));
        let _held = gate.admit().await.unwrap();

        let err = gate.admit().await.unwrap_err();
        assert_eq!(err, AdmissionError::Busy(Duration::from_secs(2)));
        // The rejected request never held a slot.
        assert_eq!(gate.available(), 0);
    }

    #[tokio::test]
    async fn test_zero_timeout_is_try_once() {
        let gate = AdmissionGate::new(1, Duration::ZERO);
        let held = gate.acquire(Duration::ZERO).await.unwrap();
        assert!(matches!(gate.acquire(Duration::ZERO).await, Err(AdmissionError::Busy(_))));
        drop(held);
        assert!(gate.acquire(Duration::ZERO).await.is_ok());
    }

    #[tokio::test]
    async fn test_never_exceeds_capacity() {
        let gate = Arc::new(AdmissionGate::new(3, Duration::from_millis(200)));
        let in_flight = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let peak = Arc::new(std::sync::atomic::AtomicUsize::new(0));

        let tasks: Vec<_> = (0..12)
            .map(|_| {
                let gate = Arc::clone(&gate);
                let in_flight = Arc::clone(&in_flight);
                let peak = Arc::clone(&peak);
                tokio::spawn(async move {
                    use std::sync::atomic::Ordering;
                    let _slot = gate.admit().await.unwrap();
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap();
        }
        assert!(peak.load(std::sync::atomic::Ordering::SeqCst) <= 3);
        assert_eq!(gate.available(), 3);
    }
}
