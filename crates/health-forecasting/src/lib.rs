//! Per-metric forecasting with confidence bounds.
//!
//! Two model variants sit behind one strategy interface: trend-aware double
//! exponential smoothing for metrics with enough history, and a
//! carry-forward fallback otherwise. Selection is automatic by data
//! sufficiency; a failed fit falls back instead of propagating.

pub mod engine;
pub mod model;

pub use engine::{ForecastConfig, ForecastEngine};
pub use model::{CarryForward, ForecastModel, ModelState, TrendSmoothing};
