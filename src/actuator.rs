//! Actuator module - PI(D) control of the heater power

pub mod controller;

pub use controller::{AntiWindup, ControllerState, PidController, PidGains};
