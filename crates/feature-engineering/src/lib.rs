//! Derives trend, rate of change, and risk features from aggregated vitals.

pub mod engine;
pub mod regression;

pub use engine::{FeatureConfig, FeatureEngineer};
pub use regression::{linear_fit, LinearFit};
