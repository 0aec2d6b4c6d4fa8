use serde::{Deserialize, Serialize};

use crate::config::SimulationParameters;
use crate::error::ConfigurationError;

// ============================================================================
// GAINS AND MODES
// ============================================================================

/// Controller gains in ideal form: `u = kp · (e + ∫e/ti + td · de/dt)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PidGains {
    pub kp: f64,
    /// Integral time in seconds. `ti <= 0` or infinite means no integral action.
    pub ti: f64,
    /// Derivative time in seconds. Zero disables the derivative term.
    pub td: f64,
}

impl PidGains {
    pub fn pi(kp: f64, ti: f64) -> Self {
        Self { kp, ti, td: 0.0 }
    }

    pub fn has_integral_action(&self) -> bool {
        self.ti > 0.0 && self.ti.is_finite()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AntiWindup {
    /// Plain integration, the integrator keeps growing while saturated.
    Disabled,
    /// Commit the integral step only if it does not push further into saturation.
    #[default]
    ConditionalIntegration,
    /// Rewind the integrator so the control law reproduces the clamped output.
    BackCalculation,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ControllerState {
    /// Accumulated `∫ e dt`, in °C·s.
    pub integral: f64,
    pub previous_error: Option<f64>,
    /// Last clamped output.
    pub output: f64,
}

// ============================================================================
// PID CONTROLLER
// ============================================================================

pub struct PidController {
    gains: PidGains,
    output_min: f64,
    output_max: f64,
    anti_windup: AntiWindup,
    state: ControllerState,
}

impl PidController {
    pub fn new(gains: PidGains, output_min: f64, output_max: f64) -> Result<Self, ConfigurationError> {
        if !(output_min < output_max) {
            return Err(ConfigurationError::InvalidOutputLimits {
                min: output_min,
                max: output_max,
            });
        }
        Ok(Self {
            gains,
            output_min,
            output_max,
            anti_windup: AntiWindup::default(),
            state: ControllerState::default(),
        })
    }

    pub fn with_anti_windup(mut self, mode: AntiWindup) -> Self {
        self.anti_windup = mode;
        self
    }

    /// Builds a controller from a parameter set that already passed validation.
    pub fn from_parameters(params: &SimulationParameters) -> Result<Self, ConfigurationError> {
        Ok(Self::new(
            PidGains {
                kp: params.kp,
                ti: params.ti,
                td: params.td,
            },
            params.output_min,
            params.output_max,
        )?
        .with_anti_windup(params.anti_windup))
    }

    /// Picks up live gain, limit and mode changes. There is no bumpless transfer:
    /// a gain step produces an output step on the next `compute`.
    pub fn retune(&mut self, params: &SimulationParameters) {
        self.gains = PidGains {
            kp: params.kp,
            ti: params.ti,
            td: params.td,
        };
        if params.output_min < params.output_max {
            self.output_min = params.output_min;
            self.output_max = params.output_max;
        }
        self.anti_windup = params.anti_windup;
    }

    pub fn set_gains(&mut self, gains: PidGains) {
        self.gains = gains;
    }

    pub fn set_output_limits(&mut self, min: f64, max: f64) -> Result<(), ConfigurationError> {
        if !(min < max) {
            return Err(ConfigurationError::InvalidOutputLimits { min, max });
        }
        self.output_min = min;
        self.output_max = max;
        Ok(())
    }

    pub fn set_anti_windup(&mut self, mode: AntiWindup) {
        self.anti_windup = mode;
    }

    pub fn compute(&mut self, setpoint: f64, measured: f64, dt: f64) -> f64 {
        let PidGains { kp, ti, td } = self.gains;
        let error = setpoint - measured;
        let integrating = self.gains.has_integral_action();

        let candidate = if integrating {
            self.state.integral + error * dt
        } else {
            self.state.integral
        };
        let integral_term = if integrating { candidate / ti } else { 0.0 };

        let derivative = match self.state.previous_error {
            Some(prev) if td > 0.0 && dt > 0.0 => (error - prev) / dt,
            _ => 0.0,
        };

        let unclamped = kp * (error + integral_term + td * derivative);
        let output = unclamped.clamp(self.output_min, self.output_max);

        self.state.integral = match self.anti_windup {
            AntiWindup::Disabled => candidate,
            AntiWindup::ConditionalIntegration => {
                // Sign of the integral step's effect on the output
                let push = kp * error;
                let releases = (unclamped > self.output_max && push < 0.0)
                    || (unclamped < self.output_min && push > 0.0);
                if output == unclamped || releases {
                    candidate
                } else {
                    self.state.integral
                }
            }
            AntiWindup::BackCalculation => {
                if integrating && kp != 0.0 && output != unclamped {
                    candidate - ti * (unclamped - output) / kp
                } else {
                    candidate
                }
            }
        };

        self.state.previous_error = Some(error);
        self.state.output = output;
        output
    }

    pub fn reset(&mut self) {
        self.state = ControllerState::default();
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn gains(&self) -> PidGains {
        self.gains
    }

    pub fn output_limits(&self) -> (f64, f64) {
        (self.output_min, self.output_max)
    }

    pub fn anti_windup(&self) -> AntiWindup {
        self.anti_windup
    }
}
