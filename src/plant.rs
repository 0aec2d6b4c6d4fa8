//! Plant module - first-order thermal lag with input (transport) delay

use std::collections::VecDeque;

use tracing::debug;

use crate::config::SimulationParameters;

// ============================================================================
// HEATER CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeaterConfig {
    /// Steady-state gain, °C per unit of control signal.
    pub gain: f64,
    pub time_constant: f64,
    pub delay: f64,
    pub ambient_temperature: f64,
    pub tick_period: f64,
}

impl From<&SimulationParameters> for HeaterConfig {
    fn from(params: &SimulationParameters) -> Self {
        Self {
            gain: params.plant_gain,
            time_constant: params.plant_time_constant,
            delay: params.plant_delay,
            ambient_temperature: params.ambient_temperature,
            tick_period: params.tick_period,
        }
    }
}

/// Longest delay line accepted by validation, in ticks.
pub const MAX_DELAY_STEPS: usize = 100_000;

/// Number of whole ticks covered by `delay`. Rounds down; the residual
/// `delay - steps * dt` is dropped.
pub fn delay_steps(delay: f64, dt: f64) -> usize {
    if delay <= 0.0 || dt <= 0.0 {
        return 0;
    }
    // Absorbs representation error such as 0.3 / 0.1 = 2.9999999999999996
    (delay / dt + 1e-9).floor() as usize
}

// ============================================================================
// PLANT MODEL
// ============================================================================

pub struct PlantModel {
    config: HeaterConfig,
    temperature: f64,
    delay_buffer: VecDeque<f64>,
}

impl PlantModel {
    pub fn new(config: HeaterConfig, initial_temperature: f64) -> Self {
        let steps = delay_steps(config.delay, config.tick_period);
        Self::log_residual(&config, steps);
        Self {
            config,
            temperature: initial_temperature,
            delay_buffer: VecDeque::from(vec![0.0; steps]),
        }
    }

    fn log_residual(config: &HeaterConfig, steps: usize) {
        let residual = config.delay - steps as f64 * config.tick_period;
        if residual > 1e-9 {
            debug!(
                delay = config.delay,
                steps,
                residual,
                "plant delay is not a multiple of the tick period, rounding down"
            );
        }
    }

    /// Applies new plant parameters. A changed delay resizes the buffer: new slots
    /// hold zero, surplus entries are dropped oldest first.
    pub fn retune(&mut self, config: HeaterConfig) {
        if config == self.config {
            return;
        }
        let steps = delay_steps(config.delay, config.tick_period);
        if steps != self.delay_buffer.len() {
            Self::log_residual(&config, steps);
        }
        while self.delay_buffer.len() < steps {
            self.delay_buffer.push_front(0.0);
        }
        while self.delay_buffer.len() > steps {
            self.delay_buffer.pop_front();
        }
        self.config = config;
    }

    /// Advances one tick with `control_signal` and returns the new true temperature.
    pub fn step(&mut self, control_signal: f64) -> f64 {
        let delayed = if self.delay_buffer.is_empty() {
            control_signal
        } else {
            self.delay_buffer.push_back(control_signal);
            self.delay_buffer.pop_front().unwrap_or(0.0)
        };

        let c = &self.config;
        self.temperature += c.tick_period / c.time_constant
            * (c.gain * delayed + c.ambient_temperature - self.temperature);
        self.temperature
    }

    pub fn reset(&mut self, initial_temperature: f64) {
        self.temperature = initial_temperature;
        for slot in self.delay_buffer.iter_mut() {
            *slot = 0.0;
        }
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn delay_len(&self) -> usize {
        self.delay_buffer.len()
    }

    pub fn config(&self) -> &HeaterConfig {
        &self.config
    }
}
