use chrono::{DateTime, Utc};
use monitor_core::{ForecastModelKind, ForecastPoint, Horizon, PipelineError};

/// Fitted model state shared by every variant.
///
/// `level` is the fitted value at `origin`; `trend` is in value per hour;
/// `residual_std` scales the confidence bounds.
#[derive(Debug, Clone, Copy)]
pub struct ModelState {
    pub kind: ForecastModelKind,
    pub level: f64,
    pub trend: f64,
    pub residual_std: f64,
    pub origin: DateTime<Utc>,
}

impl ModelState {
    fn is_finite(&self) -> bool {
        self.level.is_finite() && self.trend.is_finite() && self.residual_std.is_finite()
    }
}

/// Strategy interface for forecast models: fit history into a state, then
/// predict a horizon from it. `z` is the standard-normal quantile for the
/// configured confidence level and affects bound widths only.
pub trait ForecastModel: Send + Sync {
    fn kind(&self) -> ForecastModelKind;

    fn fit(&self, series: &[(DateTime<Utc>, f64)]) -> Result<ModelState, PipelineError>;

    fn predict(&self, state: &ModelState, horizon: &Horizon, z: f64) -> Vec<ForecastPoint>;
}

/// Holt double exponential smoothing with bounds that widen with the square
/// root of forecast distance, scaled by the one-step-ahead residual spread.
#[derive(Debug, Clone, Copy)]
pub struct TrendSmoothing {
    pub alpha: f64,
    pub beta: f64,
    pub min_history: usize,
}

impl ForecastModel for TrendSmoothing {
    fn kind(&self) -> ForecastModelKind {
        ForecastModelKind::TrendSmoothing
    }

    fn fit(&self, series: &[(DateTime<Utc>, f64)]) -> Result<ModelState, PipelineError> {
        if series.len() < self.min_history.max(2) {
            return Err(PipelineError::InsufficientData(format!(
                "{} samples, need {}",
                series.len(),
                self.min_history.max(2)
            )));
        }

        let values: Vec<f64> = series.iter().map(|(_, v)| *v).collect();

        let mut level = values[0];
        let mut trend = values[1] - values[0];
        let mut squared_residuals = 0.0;

        for &value in &values[1..] {
            let forecast = level + trend;
            let residual = value - forecast;
            squared_residuals += residual * residual;

            let prev_level = level;
            level = self.alpha * value + (1.0 - self.alpha) * (level + trend);
            trend = self.beta * (level - prev_level) + (1.0 - self.beta) * trend;
        }

        let residual_std = (squared_residuals / (values.len() - 1) as f64).sqrt();

        // Per-step trend -> per-hour, from the mean sample spacing
        let (first_ts, _) = series[0];
        let (last_ts, _) = series[series.len() - 1];
        let span_hours = (last_ts - first_ts).num_milliseconds() as f64 / 3_600_000.0;
        let mean_spacing_hours = span_hours / (series.len() - 1) as f64;
        let trend_per_hour = if mean_spacing_hours > 0.0 {
            trend / mean_spacing_hours
        } else {
            0.0
        };

        let state = ModelState {
            kind: self.kind(),
            level,
            trend: trend_per_hour,
            residual_std,
            origin: last_ts,
        };

        if !state.is_finite() {
            return Err(PipelineError::ModelFitFailure(
                "smoothing produced non-finite state".to_string(),
            ));
        }

        Ok(state)
    }

    fn predict(&self, state: &ModelState, horizon: &Horizon, z: f64) -> Vec<ForecastPoint> {
        let spacing_hours = horizon.spacing.num_milliseconds() as f64 / 3_600_000.0;

        (1..=horizon.steps)
            .map(|step| {
                let estimate = state.level + state.trend * spacing_hours * step as f64;
                let half_width = z * state.residual_std * (step as f64).sqrt();
                ForecastPoint {
                    timestamp: state.origin + horizon.spacing * step as i32,
                    estimate,
                    lower: estimate - half_width,
                    upper: estimate + half_width,
                }
            })
            .collect()
    }
}

/// Fallback for insufficient history: the last observed value carried
/// forward, with bounds widening linearly under a conservative default
/// spread.
#[derive(Debug, Clone, Copy)]
pub struct CarryForward {
    pub default_sigma: f64,
}

impl ForecastModel for CarryForward {
    fn kind(&self) -> ForecastModelKind {
        ForecastModelKind::CarryForward
    }

    fn fit(&self, series: &[(DateTime<Utc>, f64)]) -> Result<ModelState, PipelineError> {
        let (last_ts, last_value) = series
            .last()
            .copied()
            .ok_or_else(|| PipelineError::InsufficientData("empty history".to_string()))?;

        let state = ModelState {
            kind: self.kind(),
            level: last_value,
            trend: 0.0,
            residual_std: self.default_sigma,
            origin: last_ts,
        };

        if !state.is_finite() {
            return Err(PipelineError::ModelFitFailure(
                "non-finite last observation".to_string(),
            ));
        }

        Ok(state)
    }

    fn predict(&self, state: &ModelState, horizon: &Horizon, z: f64) -> Vec<ForecastPoint> {
        (1..=horizon.steps)
            .map(|step| {
                let half_width = z * state.residual_std * step as f64;
                ForecastPoint {
                    timestamp: state.origin + horizon.spacing * step as i32,
                    estimate: state.level,
                    lower: state.level - half_width,
                    upper: state.level + half_width,
                }
            })
            .collect()
    }
}
