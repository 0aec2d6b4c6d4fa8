use crossbeam::channel::{bounded, Receiver, SendTimeoutError, Sender, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::engine::SampleRecord;

// ============================================================================
// STORAGE HEALTH - degraded-storage signal for the presentation layer
// ============================================================================

#[derive(Debug, Default)]
pub struct StorageHealth {
    persisted: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

impl StorageHealth {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_persisted(&self) {
        self.persisted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn report(&self) -> StorageHealthReport {
        StorageHealthReport {
            persisted: self.persisted.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageHealthReport {
    pub persisted: u64,
    /// Records the sink rejected.
    pub failed: u64,
    /// Records that never reached the sink (queue full or closed).
    pub dropped: u64,
}

impl StorageHealthReport {
    pub fn degraded(&self) -> bool {
        self.failed > 0 || self.dropped > 0
    }
}

// ============================================================================
// RECORD CHANNEL - bounded outbound queue from engine to storage
// ============================================================================

/// Creates the engine-side publisher and the storage-side receiver.
pub fn record_channel(
    capacity: usize,
    enqueue_timeout: Duration,
) -> (RecordPublisher, Receiver<SampleRecord>) {
    let (tx, rx) = bounded(capacity.max(1));
    let publisher = RecordPublisher {
        tx,
        enqueue_timeout,
        health: StorageHealth::new(),
    };
    (publisher, rx)
}

/// Fire-and-forget handoff of sample records. Never blocks longer than the
/// configured enqueue timeout and never reports failure to the tick loop.
#[derive(Clone)]
pub struct RecordPublisher {
    tx: Sender<SampleRecord>,
    enqueue_timeout: Duration,
    health: Arc<StorageHealth>,
}

impl RecordPublisher {
    /// Returns `true` if the record was queued.
    pub fn publish(&self, record: SampleRecord) -> bool {
        let sequence = record.sequence;
        let queued = if self.enqueue_timeout.is_zero() {
            match self.tx.try_send(record) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => false,
            }
        } else {
            match self.tx.send_timeout(record, self.enqueue_timeout) {
                Ok(()) => true,
                Err(SendTimeoutError::Timeout(_)) | Err(SendTimeoutError::Disconnected(_)) => false,
            }
        };

        if !queued {
            self.health.record_dropped();
            warn!(sequence, "storage queue unavailable, sample dropped");
        }
        queued
    }

    /// Counters shared with the storage worker.
    pub fn health(&self) -> Arc<StorageHealth> {
        self.health.clone()
    }
}
