// Exponential low-pass smoothing of the measured temperature

/// First-order low-pass filter: `y = α·x + (1-α)·y_prev`, `α = dt / (dt + τ)`.
///
/// The first sample seeds the state and passes through unchanged. `τ = 0` gives
/// `α = 1`, i.e. a pass-through.
#[derive(Debug, Clone)]
pub struct LowPassFilter {
    time_constant: f64,
    alpha: f64,
    value: Option<f64>,
}

impl LowPassFilter {
    pub fn new(time_constant: f64, dt: f64) -> Self {
        Self {
            time_constant,
            alpha: Self::coefficient(time_constant, dt),
            value: None,
        }
    }

    fn coefficient(time_constant: f64, dt: f64) -> f64 {
        if time_constant <= 0.0 {
            1.0
        } else {
            dt / (dt + time_constant)
        }
    }

    /// Recomputes α for a new time constant or tick period. Keeps the filtered value.
    pub fn retune(&mut self, time_constant: f64, dt: f64) {
        self.time_constant = time_constant;
        self.alpha = Self::coefficient(time_constant, dt);
    }

    pub fn update(&mut self, raw: f64) -> f64 {
        let filtered = match self.value {
            None => raw,
            Some(prev) => self.alpha * raw + (1.0 - self.alpha) * prev,
        };
        self.value = Some(filtered);
        filtered
    }

    /// Last filtered value, `None` until the first sample.
    pub fn value(&self) -> Option<f64> {
        self.value
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn time_constant(&self) -> f64 {
        self.time_constant
    }

    pub fn reset(&mut self) {
        self.value = None;
    }
}
