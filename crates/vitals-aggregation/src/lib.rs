//! Rolling statistics per metric per subject over trailing windows.

pub mod engine;
pub mod series;

pub use engine::{Aggregator, HourlyBucket};
pub use series::{metric_names, metric_series, window_slice};
