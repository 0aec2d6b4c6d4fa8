//! Error taxonomy for the simulation engine, its storage path and config loading.

use thiserror::Error;

use crate::engine::EngineStatus;

// ============================================================================
// CONFIGURATION ERRORS - fatal to `start`, rejected by parameter updates
// ============================================================================

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("plant time constant must be positive, got {0}")]
    NonPositivePlantTimeConstant(f64),

    #[error("plant delay must be non-negative, got {0}")]
    NegativeDelay(f64),

    #[error("tick period must be positive, got {0}")]
    NonPositiveTickPeriod(f64),

    #[error("filter time constant must be non-negative, got {0}")]
    NegativeFilterTimeConstant(f64),

    #[error("noise amplitude must be non-negative, got {0}")]
    NegativeNoiseAmplitude(f64),

    #[error("noise amplitude {amplitude} exceeds the maximum of {max}")]
    NoiseAmplitudeTooLarge { amplitude: f64, max: f64 },

    #[error("plant delay {delay}s spans more than {max_steps} ticks of {tick_period}s")]
    DelayTooLong {
        delay: f64,
        tick_period: f64,
        max_steps: usize,
    },

    #[error("output limits must satisfy min < max, got [{min}, {max}]")]
    InvalidOutputLimits { min: f64, max: f64 },

    #[error("tick period {tick_period}s exceeds plant time constant {time_constant}s")]
    TickPeriodExceedsPlantTimeConstant { tick_period: f64, time_constant: f64 },

    #[error("parameter `{0}` must be finite")]
    NonFinite(&'static str),
}

// ============================================================================
// ENGINE ERRORS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Invalid state-machine call. Always a programming error on the caller's side.
    #[error("cannot {operation} while engine is {status}")]
    Transition {
        operation: &'static str,
        status: EngineStatus,
    },
}

// ============================================================================
// STORAGE ERRORS - recoverable, never halt the tick loop
// ============================================================================

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize sample: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

// ============================================================================
// CONFIG FILE ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}
