use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::SimulationParameters;
use crate::engine::SimulationEngine;
use crate::error::EngineError;
use crate::metrics::{MetricsReport, TickMetrics};

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    /// One tick per tick period of wall-clock time.
    RealTime,
    /// Back-to-back ticks, stopping the engine after `ticks` if given.
    Batch { ticks: Option<u64> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub pacing: Pacing,
    /// Upper bound on extra ticks run to make up for one overrun.
    pub max_catch_up_ticks: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            pacing: Pacing::RealTime,
            max_catch_up_ticks: 5,
        }
    }
}

impl SchedulerConfig {
    pub fn real_time() -> Self {
        Self::default()
    }

    pub fn batch(ticks: u64) -> Self {
        Self {
            pacing: Pacing::Batch { ticks: Some(ticks) },
            ..Self::default()
        }
    }
}

// ============================================================================
// STATS
// ============================================================================

#[derive(Default)]
struct SchedulerStats {
    ticks: AtomicU64,
    overruns: AtomicU64,
    make_up_ticks: AtomicU64,
    skipped_ticks: AtomicU64,
}

impl SchedulerStats {
    fn report(&self) -> SchedulerReport {
        SchedulerReport {
            ticks: self.ticks.load(Ordering::Relaxed),
            overruns: self.overruns.load(Ordering::Relaxed),
            make_up_ticks: self.make_up_ticks.load(Ordering::Relaxed),
            skipped_ticks: self.skipped_ticks.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerReport {
    pub ticks: u64,
    /// Pacing intervals that started one or more whole periods late.
    pub overruns: u64,
    pub make_up_ticks: u64,
    /// Ticks given up because the catch-up bound was reached.
    pub skipped_ticks: u64,
}

// ============================================================================
// SCHEDULER
// ============================================================================

pub struct Scheduler;

impl Scheduler {
    /// Starts `engine` with `params` and spawns the tick thread.
    pub fn start(
        engine: Arc<SimulationEngine>,
        params: SimulationParameters,
        config: SchedulerConfig,
    ) -> Result<SchedulerHandle, EngineError> {
        engine.start(params)?;
        Ok(Self::spawn(engine, config))
    }

    /// Spawns the tick thread for an engine that is already running.
    pub fn spawn(engine: Arc<SimulationEngine>, config: SchedulerConfig) -> SchedulerHandle {
        let (cancel_tx, cancel_rx) = bounded::<()>(1);
        let stats = Arc::new(SchedulerStats::default());
        let metrics = TickMetrics::new();

        let thread_engine = engine.clone();
        let thread_stats = stats.clone();
        let thread_metrics = metrics.clone();
        let thread = thread::spawn(move || {
            let ticker = Ticker {
                engine: &thread_engine,
                stats: &thread_stats,
                metrics: &thread_metrics,
                cancel: &cancel_rx,
            };
            match config.pacing {
                Pacing::Batch { ticks } => ticker.run_batch(ticks),
                Pacing::RealTime => ticker.run_real_time(config.max_catch_up_ticks),
            }
            thread_engine.stop();
            info!(pacing = ?config.pacing, ticks = thread_stats.report().ticks, "scheduler finished");
        });

        SchedulerHandle {
            thread: Some(thread),
            cancel: Some(cancel_tx),
            stats,
            metrics,
            engine,
        }
    }
}

struct Ticker<'a> {
    engine: &'a SimulationEngine,
    stats: &'a SchedulerStats,
    metrics: &'a TickMetrics,
    cancel: &'a Receiver<()>,
}

impl Ticker<'_> {
    fn cancelled(&self) -> bool {
        !matches!(self.cancel.try_recv(), Err(TryRecvError::Empty))
    }

    /// Returns `false` once the engine refuses to tick.
    fn execute_tick(&self) -> bool {
        let start = Instant::now();
        match self.engine.tick() {
            Ok(_) => {
                self.metrics.record_execution(start.elapsed());
                self.stats.ticks.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(e) => {
                debug!(error = %e, "engine no longer running");
                false
            }
        }
    }

    fn run_batch(&self, limit: Option<u64>) {
        loop {
            if limit.is_some_and(|limit| self.stats.ticks.load(Ordering::Relaxed) >= limit) {
                break;
            }
            if self.cancelled() || !self.execute_tick() {
                break;
            }
        }
    }

    fn run_real_time(&self, max_catch_up: u32) {
        let mut deadline = Instant::now();
        loop {
            let now = Instant::now();
            if deadline > now {
                // Sleeping on the cancel channel bounds stop latency by one period
                match self.cancel.recv_timeout(deadline - now) {
                    Err(RecvTimeoutError::Timeout) => {}
                    _ => break,
                }
            } else if self.cancelled() {
                break;
            }

            let period = self.engine.parameters().tick_duration();
            let lateness = Instant::now().saturating_duration_since(deadline);
            self.metrics.record_lateness(lateness);

            let missed = (lateness.as_nanos() / period.as_nanos().max(1)) as u64;
            let make_up = missed.min(u64::from(max_catch_up));
            if missed > 0 {
                self.stats.overruns.fetch_add(1, Ordering::Relaxed);
                self.stats.make_up_ticks.fetch_add(make_up, Ordering::Relaxed);
                self.stats
                    .skipped_ticks
                    .fetch_add(missed - make_up, Ordering::Relaxed);
                warn!(missed, make_up, skipped = missed - make_up, "tick overrun");
            }

            for _ in 0..=make_up {
                if !self.execute_tick() {
                    return;
                }
            }

            // Stay on the deadline grid; skipped slots are not replayed
            let slots = u32::try_from(missed + 1).unwrap_or(u32::MAX);
            deadline += period.saturating_mul(slots);
        }
    }
}

// ============================================================================
// HANDLE
// ============================================================================

pub struct SchedulerHandle {
    thread: Option<thread::JoinHandle<()>>,
    cancel: Option<Sender<()>>,
    stats: Arc<SchedulerStats>,
    metrics: TickMetrics,
    engine: Arc<SimulationEngine>,
}

impl SchedulerHandle {
    /// Cancels the tick thread, joins it and leaves the engine stopped.
    /// Idempotent.
    pub fn stop(&mut self) {
        // Dropping the sender wakes the tick thread out of its wait
        self.cancel.take();
        self.join();
        self.engine.stop();
    }

    /// Blocks until the tick thread exits on its own (batch limit reached or
    /// engine stopped elsewhere). Never returns for an uncancelled real-time run.
    pub fn wait(&mut self) {
        self.join();
    }

    fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("scheduler thread panicked");
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |t| t.is_finished())
    }

    pub fn report(&self) -> SchedulerReport {
        self.stats.report()
    }

    pub fn metrics(&self) -> MetricsReport {
        self.metrics.report()
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
