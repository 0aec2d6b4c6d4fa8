//! Sensor module - measurement noise and low-pass filtering of the heater temperature

pub mod filter;
pub mod noise;

pub use filter::LowPassFilter;
pub use noise::MeasurementNoise;
