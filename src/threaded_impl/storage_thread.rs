use crossbeam::channel::{Receiver, RecvTimeoutError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

use crate::engine::SampleRecord;
use crate::ipc::channels::StorageHealth;
use crate::storage::SampleSink;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Handle to the thread draining the record queue into a sink.
pub struct StorageWorker {
    handle: Option<thread::JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl StorageWorker {
    /// Persists whatever is still queued, flushes the sink and joins the thread.
    /// Safe to call more than once.
    pub fn shutdown(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("storage thread panicked");
            }
        }
    }
}

impl Drop for StorageWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn persist<S: SampleSink>(sink: &mut S, record: SampleRecord, health: &StorageHealth) {
    match sink.record(record) {
        Ok(()) => health.record_persisted(),
        Err(e) => {
            health.record_failed();
            warn!(sequence = record.sequence, error = %e, "failed to persist sample");
        }
    }
}

pub fn spawn_storage_thread<S>(
    receiver: Receiver<SampleRecord>,
    mut sink: S,
    health: Arc<StorageHealth>,
) -> StorageWorker
where
    S: SampleSink + 'static,
{
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = shutdown.clone();

    let handle = thread::spawn(move || {
        loop {
            if shutdown_flag.load(Ordering::Relaxed) {
                for record in receiver.try_iter() {
                    persist(&mut sink, record, &health);
                }
                break;
            }

            // Timeout lets the shutdown flag be observed while the queue is idle
            match receiver.recv_timeout(POLL_INTERVAL) {
                Ok(record) => persist(&mut sink, record, &health),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        if let Err(e) = sink.flush() {
            health.record_failed();
            warn!(error = %e, "failed to flush sample sink");
        }
        let report = health.report();
        info!(
            persisted = report.persisted,
            failed = report.failed,
            dropped = report.dropped,
            "storage thread shutting down"
        );
    });

    StorageWorker {
        handle: Some(handle),
        shutdown,
    }
}
