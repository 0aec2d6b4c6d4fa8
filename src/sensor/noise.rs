use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Seeded source of uniform measurement noise added to the true plant temperature.
pub struct MeasurementNoise {
    rng: StdRng,
    seed: u64,
}

impl MeasurementNoise {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            seed,
        }
    }

    /// Draws one sample in `[-amplitude, amplitude)`. A zero amplitude draws nothing,
    /// so noise-free runs leave the generator untouched.
    pub fn sample(&mut self, amplitude: f64) -> f64 {
        if amplitude <= 0.0 {
            return 0.0;
        }
        self.rng.gen_range(-amplitude..amplitude)
    }

    pub fn measure(&mut self, true_value: f64, amplitude: f64) -> f64 {
        true_value + self.sample(amplitude)
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}
