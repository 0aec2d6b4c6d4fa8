//! Simulation engine - owns the control loop and exposes the control and
//! presentation surfaces.
//!
//! Data flow per tick:
//!
//! ```text
//! control signal ──► PlantModel ──► + noise ──► LowPassFilter ──► PidController
//!       ▲                                                              │
//!       └──────────────────────────── next control signal ◄────────────┘
//!                                          │
//!                                          ▼
//!                     SampleRecord ──► history (latest state)
//!                                  └─► RecordPublisher (storage queue)
//! ```

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use crate::actuator::controller::{ControllerState, PidController};
use crate::config::{ParameterUpdate, SimulationParameters};
use crate::error::{ConfigurationError, EngineError};
use crate::ipc::channels::{RecordPublisher, StorageHealth, StorageHealthReport};
use crate::ipc::shared_resource::{ParameterStore, SampleHistory};
use crate::plant::{HeaterConfig, PlantModel};
use crate::sensor::{LowPassFilter, MeasurementNoise};

// ============================================================================
// ENGINE STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    Stopped,
    Running,
    /// An in-flight tick is finishing before the engine halts.
    Stopping,
}

impl std::fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineStatus::Stopped => write!(f, "Stopped"),
            EngineStatus::Running => write!(f, "Running"),
            EngineStatus::Stopping => write!(f, "Stopping"),
        }
    }
}

// ============================================================================
// SAMPLE RECORD
// ============================================================================

/// One tick of the control loop. Carries everything needed to rebuild the
/// trace offline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    /// 1-based tick number since the last `start`.
    pub sequence: u64,
    /// Simulated time in seconds since the last `start`.
    pub timestamp: f64,
    pub raw_temperature: f64,
    pub filtered_temperature: f64,
    pub setpoint: f64,
    /// Clamped output computed from this tick's measurement, applied next tick.
    pub control_signal: f64,
    pub kp: f64,
    pub ti: f64,
}

/// Read-only view of the tick-thread state, for inspection after a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopSnapshot {
    pub true_temperature: f64,
    pub filtered_temperature: Option<f64>,
    pub controller: ControllerState,
    pub delay_steps: usize,
    pub elapsed: f64,
}

// ============================================================================
// CONTROL LOOP - never leaves the tick context
// ============================================================================

struct ControlLoop {
    plant: PlantModel,
    filter: LowPassFilter,
    pid: PidController,
    noise: MeasurementNoise,
    control_signal: f64,
    elapsed: f64,
    sequence: u64,
}

impl ControlLoop {
    fn new(params: &SimulationParameters) -> Result<Self, ConfigurationError> {
        Ok(Self {
            plant: PlantModel::new(HeaterConfig::from(params), params.initial_temperature),
            filter: LowPassFilter::new(params.filter_time_constant, params.tick_period),
            pid: PidController::from_parameters(params)?,
            noise: MeasurementNoise::new(params.noise_seed),
            control_signal: 0.0_f64.clamp(params.output_min, params.output_max),
            elapsed: 0.0,
            sequence: 0,
        })
    }

    fn advance(&mut self, params: &SimulationParameters) -> SampleRecord {
        let dt = params.tick_period;
        self.plant.retune(HeaterConfig::from(params));
        self.filter.retune(params.filter_time_constant, dt);
        self.pid.retune(params);

        // Limits may have changed since the signal was computed
        let applied = self
            .control_signal
            .clamp(params.output_min, params.output_max);
        let temperature = self.plant.step(applied);
        let raw = self.noise.measure(temperature, params.noise_amplitude);
        let filtered = self.filter.update(raw);
        let control = self.pid.compute(params.setpoint, filtered, dt);

        self.control_signal = control;
        self.elapsed += dt;
        self.sequence += 1;

        SampleRecord {
            sequence: self.sequence,
            timestamp: self.elapsed,
            raw_temperature: raw,
            filtered_temperature: filtered,
            setpoint: params.setpoint,
            control_signal: control,
            kp: params.kp,
            ti: params.ti,
        }
    }

    fn snapshot(&self) -> LoopSnapshot {
        LoopSnapshot {
            true_temperature: self.plant.temperature(),
            filtered_temperature: self.filter.value(),
            controller: self.pid.state(),
            delay_steps: self.plant.delay_len(),
            elapsed: self.elapsed,
        }
    }
}

// ============================================================================
// SIMULATION ENGINE
// ============================================================================

pub struct SimulationEngine {
    // Lock order: control_loop before status
    control_loop: Mutex<Option<ControlLoop>>,
    status: RwLock<EngineStatus>,
    params: ParameterStore,
    history: SampleHistory,
    ticks: AtomicU64,
    publisher: Option<RecordPublisher>,
    storage_health: Arc<StorageHealth>,
}

impl SimulationEngine {
    pub fn new(history_capacity: usize) -> Self {
        Self {
            control_loop: Mutex::new(None),
            status: RwLock::new(EngineStatus::Stopped),
            params: ParameterStore::new(SimulationParameters::default()),
            history: SampleHistory::new(history_capacity),
            ticks: AtomicU64::new(0),
            publisher: None,
            storage_health: StorageHealth::new(),
        }
    }

    /// Routes every produced record to the storage queue behind `publisher`.
    pub fn with_publisher(mut self, publisher: RecordPublisher) -> Self {
        self.storage_health = publisher.health();
        self.publisher = Some(publisher);
        self
    }

    // ------------------------------------------------------------------------
    // Control surface
    // ------------------------------------------------------------------------

    /// Initializes plant, filter and controller state and starts running.
    /// Configuration errors leave the engine stopped.
    pub fn start(&self, params: SimulationParameters) -> Result<(), EngineError> {
        let mut control_loop = self.control_loop.lock();
        let mut status = self.status.write();
        if *status != EngineStatus::Stopped {
            return Err(EngineError::Transition {
                operation: "start",
                status: *status,
            });
        }
        params.validate()?;

        *control_loop = Some(ControlLoop::new(&params)?);
        info!(
            setpoint = params.setpoint,
            kp = params.kp,
            ti = params.ti,
            tick_period = params.tick_period,
            "simulation started"
        );
        self.params.replace(params);
        self.history.clear();
        self.ticks.store(0, Ordering::Relaxed);
        *status = EngineStatus::Running;
        Ok(())
    }

    /// Advances the simulation by one tick. Fails if the engine is not running.
    pub fn tick(&self) -> Result<SampleRecord, EngineError> {
        let record = {
            let mut guard = self.control_loop.lock();
            let status = *self.status.read();
            let control_loop = match (status, guard.as_mut()) {
                (EngineStatus::Running, Some(control_loop)) => control_loop,
                _ => {
                    return Err(EngineError::Transition {
                        operation: "tick",
                        status,
                    })
                }
            };

            let params = self.params.snapshot();
            let record = control_loop.advance(&params);
            self.history.push(record);
            self.ticks.fetch_add(1, Ordering::Relaxed);
            record
        };

        debug!(
            sequence = record.sequence,
            filtered = record.filtered_temperature,
            control = record.control_signal,
            "tick"
        );
        if let Some(publisher) = &self.publisher {
            publisher.publish(record);
        }
        Ok(record)
    }

    /// Halts the engine after any in-flight tick and returns once it is `Stopped`,
    /// also when another caller's stop is already in progress. Stopping a stopped
    /// engine is a no-op.
    pub fn stop(&self) {
        let initiated = {
            let mut status = self.status.write();
            match *status {
                EngineStatus::Stopped => return,
                EngineStatus::Stopping => false,
                EngineStatus::Running => {
                    *status = EngineStatus::Stopping;
                    true
                }
            }
        };

        // Waits out a concurrent tick; loop state stays for inspection
        let _control_loop = self.control_loop.lock();
        let mut status = self.status.write();
        if *status == EngineStatus::Stopping {
            *status = EngineStatus::Stopped;
        }
        drop(status);
        if initiated {
            info!(ticks = self.ticks(), "simulation stopped");
        }
    }

    /// Merges `update` into the live parameters. Takes effect at the next tick.
    pub fn update_parameters(
        &self,
        update: &ParameterUpdate,
    ) -> Result<Arc<SimulationParameters>, ConfigurationError> {
        let params = self.params.merge(update)?;
        if !update.is_empty() {
            debug!(?update, "parameters updated");
        }
        Ok(params)
    }

    // ------------------------------------------------------------------------
    // Presentation surface
    // ------------------------------------------------------------------------

    pub fn current_status(&self) -> EngineStatus {
        *self.status.read()
    }

    pub fn latest_sample(&self) -> Option<SampleRecord> {
        self.history.latest()
    }

    /// Up to `n` most recent samples, oldest first.
    pub fn recent_history(&self, n: usize) -> Vec<SampleRecord> {
        self.history.recent(n)
    }

    pub fn parameters(&self) -> Arc<SimulationParameters> {
        self.params.snapshot()
    }

    pub fn storage_health(&self) -> StorageHealthReport {
        self.storage_health.report()
    }

    /// Samples produced since the last `start`.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// State of the last (or current) run, `None` before the first `start`.
    pub fn inspect(&self) -> Option<LoopSnapshot> {
        self.control_loop.lock().as_ref().map(ControlLoop::snapshot)
    }
}
