// Simulation parameters, live parameter updates and file configuration

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::actuator::controller::AntiWindup;
use crate::engine::SampleRecord;
use crate::error::{ConfigLoadError, ConfigurationError};
use crate::plant::{delay_steps, MAX_DELAY_STEPS};

/// Largest accepted measurement noise amplitude, in °C.
pub const MAX_NOISE_AMPLITUDE: f64 = 1.0e3;

// ============================================================================
// SIMULATION PARAMETERS - one immutable snapshot, swapped wholesale
// ============================================================================

/// Every tunable of the control loop. Times are in seconds, temperatures in °C.
///
/// `ti <= 0` or `ti == f64::INFINITY` disables integral action.
/// `noise_seed` and `initial_temperature` are only read at `start`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationParameters {
    pub setpoint: f64,
    pub kp: f64,
    pub ti: f64,
    pub td: f64,
    pub output_min: f64,
    pub output_max: f64,
    pub anti_windup: AntiWindup,
    pub plant_gain: f64,
    pub plant_time_constant: f64,
    pub plant_delay: f64,
    pub ambient_temperature: f64,
    pub initial_temperature: f64,
    pub filter_time_constant: f64,
    pub noise_amplitude: f64,
    pub noise_seed: u64,
    pub tick_period: f64,
}

impl Default for SimulationParameters {
    fn default() -> Self {
        Self {
            setpoint: 25.0,
            kp: 2.0,
            ti: 7.5,
            td: 0.0,
            output_min: 0.0,
            output_max: 5.0,
            anti_windup: AntiWindup::ConditionalIntegration,
            plant_gain: 3.5,
            plant_time_constant: 22.0,
            plant_delay: 0.2,
            ambient_temperature: 21.5,
            initial_temperature: 21.5,
            filter_time_constant: 0.5,
            noise_amplitude: 0.05,
            noise_seed: 42,
            tick_period: 0.1,
        }
    }
}

impl SimulationParameters {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let finite = [
            ("setpoint", self.setpoint),
            ("kp", self.kp),
            ("td", self.td),
            ("output_min", self.output_min),
            ("output_max", self.output_max),
            ("plant_gain", self.plant_gain),
            ("plant_time_constant", self.plant_time_constant),
            ("plant_delay", self.plant_delay),
            ("ambient_temperature", self.ambient_temperature),
            ("initial_temperature", self.initial_temperature),
            ("filter_time_constant", self.filter_time_constant),
            ("noise_amplitude", self.noise_amplitude),
            ("tick_period", self.tick_period),
        ];
        for (name, value) in finite {
            if !value.is_finite() {
                return Err(ConfigurationError::NonFinite(name));
            }
        }
        if self.ti.is_nan() {
            return Err(ConfigurationError::NonFinite("ti"));
        }

        if self.plant_time_constant <= 0.0 {
            return Err(ConfigurationError::NonPositivePlantTimeConstant(
                self.plant_time_constant,
            ));
        }
        if self.plant_delay < 0.0 {
            return Err(ConfigurationError::NegativeDelay(self.plant_delay));
        }
        if self.tick_period <= 0.0 {
            return Err(ConfigurationError::NonPositiveTickPeriod(self.tick_period));
        }
        if self.filter_time_constant < 0.0 {
            return Err(ConfigurationError::NegativeFilterTimeConstant(
                self.filter_time_constant,
            ));
        }
        if self.noise_amplitude < 0.0 {
            return Err(ConfigurationError::NegativeNoiseAmplitude(self.noise_amplitude));
        }
        if self.noise_amplitude > MAX_NOISE_AMPLITUDE {
            return Err(ConfigurationError::NoiseAmplitudeTooLarge {
                amplitude: self.noise_amplitude,
                max: MAX_NOISE_AMPLITUDE,
            });
        }
        if self.output_min >= self.output_max {
            return Err(ConfigurationError::InvalidOutputLimits {
                min: self.output_min,
                max: self.output_max,
            });
        }
        // Explicit Euler leaves the monotone region of a first-order lag past dt = τ
        if self.tick_period > self.plant_time_constant {
            return Err(ConfigurationError::TickPeriodExceedsPlantTimeConstant {
                tick_period: self.tick_period,
                time_constant: self.plant_time_constant,
            });
        }
        if delay_steps(self.plant_delay, self.tick_period) > MAX_DELAY_STEPS {
            return Err(ConfigurationError::DelayTooLong {
                delay: self.plant_delay,
                tick_period: self.tick_period,
                max_steps: MAX_DELAY_STEPS,
            });
        }
        Ok(())
    }

    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(self.tick_period)
    }
}

// ============================================================================
// PARAMETER UPDATE - partial, merged atomically by the engine
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterUpdate {
    pub setpoint: Option<f64>,
    pub kp: Option<f64>,
    pub ti: Option<f64>,
    pub td: Option<f64>,
    pub output_min: Option<f64>,
    pub output_max: Option<f64>,
    pub anti_windup: Option<AntiWindup>,
    pub plant_gain: Option<f64>,
    pub plant_time_constant: Option<f64>,
    pub plant_delay: Option<f64>,
    pub ambient_temperature: Option<f64>,
    pub filter_time_constant: Option<f64>,
    pub noise_amplitude: Option<f64>,
    pub tick_period: Option<f64>,
}

impl ParameterUpdate {
    pub fn setpoint(mut self, setpoint: f64) -> Self {
        self.setpoint = Some(setpoint);
        self
    }

    /// Gains travel together so a reader never sees a half-applied pair.
    pub fn gains(mut self, kp: f64, ti: f64) -> Self {
        self.kp = Some(kp);
        self.ti = Some(ti);
        self
    }

    pub fn anti_windup(mut self, mode: AntiWindup) -> Self {
        self.anti_windup = Some(mode);
        self
    }

    /// Setpoint and gains carried by a persisted record, to resume a previous run.
    pub fn resume_from(record: &SampleRecord) -> Self {
        Self::default()
            .setpoint(record.setpoint)
            .gains(record.kp, record.ti)
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Returns a new parameter set with every present field replaced.
    pub fn apply_to(&self, base: &SimulationParameters) -> SimulationParameters {
        SimulationParameters {
            setpoint: self.setpoint.unwrap_or(base.setpoint),
            kp: self.kp.unwrap_or(base.kp),
            ti: self.ti.unwrap_or(base.ti),
            td: self.td.unwrap_or(base.td),
            output_min: self.output_min.unwrap_or(base.output_min),
            output_max: self.output_max.unwrap_or(base.output_max),
            anti_windup: self.anti_windup.unwrap_or(base.anti_windup),
            plant_gain: self.plant_gain.unwrap_or(base.plant_gain),
            plant_time_constant: self.plant_time_constant.unwrap_or(base.plant_time_constant),
            plant_delay: self.plant_delay.unwrap_or(base.plant_delay),
            ambient_temperature: self.ambient_temperature.unwrap_or(base.ambient_temperature),
            filter_time_constant: self
                .filter_time_constant
                .unwrap_or(base.filter_time_constant),
            noise_amplitude: self.noise_amplitude.unwrap_or(base.noise_amplitude),
            tick_period: self.tick_period.unwrap_or(base.tick_period),
            ..base.clone()
        }
    }
}

// ============================================================================
// CONFIG FILE LOADING
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub history_capacity: usize,
    pub record_queue_capacity: usize,
    pub enqueue_timeout_ms: u64,
    pub max_catch_up_ticks: u32,
    pub output_path: Option<PathBuf>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            history_capacity: 500,
            record_queue_capacity: 1024,
            enqueue_timeout_ms: 0,
            max_catch_up_ticks: 5,
            output_path: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub simulation: SimulationParameters,
    pub runtime: RuntimeConfig,
}

/// Loads a TOML config. A missing file yields the defaults.
pub fn load_config(path: impl AsRef<Path>) -> Result<AppConfig, ConfigLoadError> {
    let path = path.as_ref();
    match std::fs::read_to_string(path) {
        Ok(s) => Ok(toml::from_str::<AppConfig>(&s)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "config file not found, using defaults");
            Ok(AppConfig::default())
        }
        Err(e) => Err(e.into()),
    }
}
