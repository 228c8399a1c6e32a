use chrono::{DateTime, Utc};
use monitor_core::{ForecastResult, Horizon, PipelineError, Reading};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use std::collections::BTreeMap;
use tracing::{debug, warn};
use vitals_aggregation::{metric_names, metric_series};

use crate::model::{CarryForward, ForecastModel, TrendSmoothing};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastConfig {
    /// Two-sided confidence level for the bounds, in (0, 1)
    pub confidence_level: f64,
    /// Minimum history length for the trend-aware model
    pub min_history: usize,
    /// Level smoothing factor
    pub alpha: f64,
    /// Trend smoothing factor
    pub beta: f64,
    /// Conservative spread used by the carry-forward fallback
    pub default_sigma: f64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            confidence_level: 0.95,
            min_history: 10,
            alpha: 0.3,
            beta: 0.1,
            default_sigma: 1.0,
        }
    }
}

/// Per-metric forecaster. Model selection is automatic: the trend-aware
/// variant when enough history exists and the fit stays finite, the
/// carry-forward fallback otherwise.
pub struct ForecastEngine {
    smoothing: TrendSmoothing,
    fallback: CarryForward,
    z: f64,
}

impl ForecastEngine {
    pub fn new(config: ForecastConfig) -> Result<Self, PipelineError> {
        if !(0.0 < config.confidence_level && config.confidence_level < 1.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "confidence level must be in (0, 1), got {}",
                config.confidence_level
            )));
        }
        if !(0.0 < config.alpha && config.alpha <= 1.0) || !(0.0 < config.beta && config.beta <= 1.0)
        {
            return Err(PipelineError::InvalidConfig(
                "smoothing factors must be in (0, 1]".to_string(),
            ));
        }

        let standard_normal = Normal::new(0.0, 1.0)
            .map_err(|e| PipelineError::InvalidConfig(format!("standard normal: {e}")))?;
        let z = standard_normal.inverse_cdf(0.5 + config.confidence_level / 2.0);

        Ok(Self {
            smoothing: TrendSmoothing {
                alpha: config.alpha,
                beta: config.beta,
                min_history: config.min_history,
            },
            fallback: CarryForward {
                default_sigma: config.default_sigma,
            },
            z,
        })
    }

    /// Forecast one metric's series. Returns `None` only when there is no
    /// history at all to carry forward.
    pub fn forecast_series(
        &self,
        metric: &str,
        series: &[(DateTime<Utc>, f64)],
        horizon: &Horizon,
    ) -> Option<ForecastResult> {
        match self.smoothing.fit(series) {
            Ok(state) => {
                return Some(ForecastResult {
                    metric: metric.to_string(),
                    model: state.kind,
                    points: self.smoothing.predict(&state, horizon, self.z),
                    low_confidence: false,
                });
            }
            Err(PipelineError::InsufficientData(reason)) => {
                debug!(metric, reason = %reason, "falling back to carry-forward");
            }
            Err(e) => {
                warn!(metric, error = %e, "model fit failed, falling back to carry-forward");
            }
        }

        // Carry forward the last finite observation
        let finite_tail: Vec<(DateTime<Utc>, f64)> = series
            .iter()
            .filter(|(_, v)| v.is_finite())
            .copied()
            .collect();

        match self.fallback.fit(&finite_tail) {
            Ok(state) => Some(ForecastResult {
                metric: metric.to_string(),
                model: state.kind,
                points: self.fallback.predict(&state, horizon, self.z),
                low_confidence: true,
            }),
            Err(e) => {
                debug!(metric, error = %e, "no forecast possible");
                None
            }
        }
    }

    /// Carry-forward-only forecasts for every metric; the cheap path used
    /// when the full fit exceeded its budget and nothing is cached.
    pub fn carry_forward_all(
        &self,
        readings: &[Reading],
        horizon: &Horizon,
    ) -> BTreeMap<String, ForecastResult> {
        let mut out = BTreeMap::new();
        for metric in metric_names(readings) {
            let series: Vec<(DateTime<Utc>, f64)> = metric_series(readings, &metric)
                .into_iter()
                .filter(|(_, v)| v.is_finite())
                .collect();
            if let Ok(state) = self.fallback.fit(&series) {
                out.insert(
                    metric.clone(),
                    ForecastResult {
                        metric,
                        model: state.kind,
                        points: self.fallback.predict(&state, horizon, self.z),
                        low_confidence: true,
                    },
                );
            }
        }
        out
    }

    /// Forecast every metric present in the readings, independently; one
    /// metric failing never blocks the others.
    pub fn forecast_all(
        &self,
        readings: &[Reading],
        horizon: &Horizon,
    ) -> BTreeMap<String, ForecastResult> {
        let mut out = BTreeMap::new();
        for metric in metric_names(readings) {
            let series = metric_series(readings, &metric);
            if let Some(result) = self.forecast_series(&metric, &series, horizon) {
                out.insert(metric, result);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use monitor_core::ForecastModelKind;

    fn series(values: &[f64], spacing_minutes: i64) -> Vec<(DateTime<Utc>, f64)> {
        let start = Utc::now();
        values
            .iter()
            .enumerate()
            .map(|(i, v)| (start + Duration::minutes(spacing_minutes * i as i64), *v))
            .collect()
    }

    fn engine() -> ForecastEngine {
        ForecastEngine::new(ForecastConfig::default()).unwrap()
    }

    #[test]
    fn rejects_invalid_confidence_level() {
        let config = ForecastConfig {
            confidence_level: 1.5,
            ..ForecastConfig::default()
        };
        assert!(matches!(
            ForecastEngine::new(config),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn sufficient_history_uses_trend_model() {
        let values: Vec<f64> = (0..15).map(|i| 70.0 + i as f64).collect();
        let result = engine()
            .forecast_series("heart_rate", &series(&values, 60), &Horizon::hourly(3))
            .unwrap();

        assert_eq!(result.model, ForecastModelKind::TrendSmoothing);
        assert!(!result.low_confidence);
        assert_eq!(result.points.len(), 3);
    }

    #[test]
    fn short_history_falls_back_to_carry_forward() {
        let result = engine()
            .forecast_series("heart_rate", &series(&[70.0, 72.0], 60), &Horizon::hourly(3))
            .unwrap();

        assert_eq!(result.model, ForecastModelKind::CarryForward);
        assert!(result.low_confidence);
        for point in &result.points {
            assert_eq!(point.estimate, 72.0);
        }
    }

    #[test]
    fn nan_in_history_recovers_via_fallback() {
        let mut values = vec![70.0; 15];
        values[7] = f64::NAN;
        let result = engine()
            .forecast_series("heart_rate", &series(&values, 60), &Horizon::hourly(2))
            .unwrap();

        assert_eq!(result.model, ForecastModelKind::CarryForward);
        assert_eq!(result.points[0].estimate, 70.0);
    }

    #[test]
    fn empty_history_yields_no_forecast() {
        assert!(engine()
            .forecast_series("heart_rate", &[], &Horizon::hourly(3))
            .is_none());
    }

    #[test]
    fn confidence_level_changes_bounds_not_estimates() {
        let values: Vec<f64> = (0..20)
            .map(|i| 70.0 + i as f64 + if i % 2 == 0 { 1.0 } else { -1.0 })
            .collect();
        let history = series(&values, 60);
        let horizon = Horizon::hourly(3);

        let narrow = ForecastEngine::new(ForecastConfig {
            confidence_level: 0.80,
            ..ForecastConfig::default()
        })
        .unwrap()
        .forecast_series("heart_rate", &history, &horizon)
        .unwrap();

        let wide = ForecastEngine::new(ForecastConfig {
            confidence_level: 0.99,
            ..ForecastConfig::default()
        })
        .unwrap()
        .forecast_series("heart_rate", &history, &horizon)
        .unwrap();

        for (n, w) in narrow.points.iter().zip(wide.points.iter()) {
            assert!((n.estimate - w.estimate).abs() < 1e-12);
            assert!((w.upper - w.lower) > (n.upper - n.lower));
        }
    }

    #[test]
    fn carry_forward_all_holds_last_values() {
        let start = Utc::now();
        let readings: Vec<Reading> = (0..15)
            .map(|i| {
                Reading::new(1, start + Duration::hours(i))
                    .with_value("heart_rate", 70.0 + i as f64)
                    .with_value("temperature", 37.0)
            })
            .collect();

        let forecasts = engine().carry_forward_all(&readings, &Horizon::hourly(3));
        assert_eq!(
            forecasts["heart_rate"].model,
            ForecastModelKind::CarryForward
        );
        assert_eq!(forecasts["heart_rate"].points[2].estimate, 84.0);
        assert_eq!(forecasts["temperature"].points[0].estimate, 37.0);
    }

    #[test]
    fn one_bad_metric_does_not_block_others() {
        let start = Utc::now();
        let mut readings: Vec<Reading> = (0..15)
            .map(|i| {
                Reading::new(1, start + Duration::hours(i)).with_value("heart_rate", 70.0 + i as f64)
            })
            .collect();
        // A metric with a single sample still gets a carry-forward forecast
        readings[14]
            .values
            .insert("temperature".to_string(), 37.0);

        let forecasts = engine().forecast_all(&readings, &Horizon::hourly(4));
        assert_eq!(
            forecasts["heart_rate"].model,
            ForecastModelKind::TrendSmoothing
        );
        assert_eq!(
            forecasts["temperature"].model,
            ForecastModelKind::CarryForward
        );
    }
}
