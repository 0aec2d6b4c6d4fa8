//! Metrics module - tick timing statistics

use hdrhistogram::Histogram;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// TICK METRICS - Thread-safe timing of the tick loop
// ============================================================================

#[derive(Clone)]
pub struct TickMetrics {
    execution_hist: Arc<Mutex<Histogram<u64>>>,
    // How late each paced tick started relative to its deadline
    lateness_hist: Arc<Mutex<Histogram<u64>>>,
    // Variation between consecutive tick execution times
    last_execution_ns: Arc<AtomicU64>,
    jitter_hist: Arc<Mutex<Histogram<u64>>>,
}

fn histogram() -> Arc<Mutex<Histogram<u64>>> {
    // 3 significant figures is always within hdrhistogram's supported range
    Arc::new(Mutex::new(
        Histogram::new(3).expect("3 significant figures is a valid precision"),
    ))
}

impl TickMetrics {
    pub fn new() -> Self {
        Self {
            execution_hist: histogram(),
            lateness_hist: histogram(),
            last_execution_ns: Arc::new(AtomicU64::new(0)),
            jitter_hist: histogram(),
        }
    }

    pub fn record_execution(&self, duration: Duration) {
        let nanos = duration.as_nanos() as u64;
        self.execution_hist.lock().record(nanos).ok();

        let last = self.last_execution_ns.swap(nanos, Ordering::Relaxed);
        if last > 0 {
            self.jitter_hist.lock().record(nanos.abs_diff(last)).ok();
        }
    }

    pub fn record_lateness(&self, duration: Duration) {
        self.lateness_hist.lock().record(duration.as_nanos() as u64).ok();
    }

    pub fn report(&self) -> MetricsReport {
        let exec = self.execution_hist.lock();
        let late = self.lateness_hist.lock();
        let jitter = self.jitter_hist.lock();

        MetricsReport {
            samples: exec.len(),
            execution_p50: Duration::from_nanos(exec.value_at_quantile(0.5)),
            execution_p99: Duration::from_nanos(exec.value_at_quantile(0.99)),
            execution_max: Duration::from_nanos(exec.max()),
            lateness_p50: Duration::from_nanos(late.value_at_quantile(0.5)),
            lateness_p99: Duration::from_nanos(late.value_at_quantile(0.99)),
            jitter_p99: Duration::from_nanos(jitter.value_at_quantile(0.99)),
        }
    }
}

impl Default for TickMetrics {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// METRICS REPORT - Summary statistics
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct MetricsReport {
    pub samples: u64,
    pub execution_p50: Duration,
    pub execution_p99: Duration,
    pub execution_max: Duration,
    pub lateness_p50: Duration,
    pub lateness_p99: Duration,
    pub jitter_p99: Duration,
}
