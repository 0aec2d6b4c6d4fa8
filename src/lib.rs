//! Air heater simulation under closed-loop PI(D) control.
//!
//! A [`SimulationEngine`] owns the plant, filter and controller state and produces
//! one [`SampleRecord`] per tick. A [`Scheduler`] paces ticks on its own thread
//! while other threads change parameters and read the latest samples.

pub mod actuator;
pub mod config;
pub mod engine;
pub mod error;
pub mod ipc;
pub mod metrics;
pub mod plant;
pub mod sensor;
pub mod storage;
pub mod threaded_impl;

pub use actuator::{AntiWindup, ControllerState, PidController, PidGains};
pub use config::{load_config, AppConfig, ParameterUpdate, RuntimeConfig, SimulationParameters};
pub use engine::{EngineStatus, LoopSnapshot, SampleRecord, SimulationEngine};
pub use error::{ConfigLoadError, ConfigurationError, EngineError, StorageError};
pub use ipc::{record_channel, RecordPublisher, StorageHealthReport};
pub use metrics::{MetricsReport, TickMetrics};
pub use plant::{HeaterConfig, PlantModel};
pub use sensor::{LowPassFilter, MeasurementNoise};
pub use storage::{read_last_record, JsonLinesSink, MemorySink, SampleSink};
pub use threaded_impl::{
    spawn_storage_thread, Pacing, Scheduler, SchedulerConfig, SchedulerHandle, SchedulerReport,
    StorageWorker,
};
