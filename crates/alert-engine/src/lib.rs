//! Threshold and trend alerting over the latest feature vectors.
//!
//! Rules are driven by the metric catalog rather than per-metric code
//! paths; cross-cycle alert state lives in an explicit registry keyed by
//! (subject, metric, condition) with cool-down deduplication.

pub mod engine;
pub mod registry;
pub mod rules;

pub use engine::{AlertConfig, AlertEngine};
pub use registry::{AlertKey, AlertRegistry};
pub use rules::{evaluate_metric, FiredRule};
