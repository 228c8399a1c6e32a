use chrono::{DateTime, Utc};
use monitor_core::{
    Alert, AlertSummary, FeatureVector, ForecastResponse, ForecastResult, HealthSummary,
    MetricForecastSeries,
};
use std::collections::BTreeMap;

/// Merge features, forecast highlights, and active alerts into one
/// per-subject summary. Pure merge; no computation beyond allocation.
pub fn compose_summary(
    subject_id: i64,
    generated_at: DateTime<Utc>,
    features: &BTreeMap<String, FeatureVector>,
    forecasts: Option<&BTreeMap<String, ForecastResult>>,
    alerts: &[Alert],
) -> HealthSummary {
    let forecast_highlights = forecasts
        .map(|results| {
            results
                .iter()
                .filter_map(|(metric, result)| {
                    result
                        .horizon_end_estimate()
                        .map(|estimate| (metric.clone(), estimate))
                })
                .collect()
        })
        .unwrap_or_default();

    HealthSummary {
        subject_id,
        generated_at,
        metrics: features.clone(),
        forecast_highlights,
        alerts: alerts
            .iter()
            .map(|alert| AlertSummary {
                severity: alert.severity,
                message: alert.message.clone(),
                timestamp: alert.last_triggered_at,
            })
            .collect(),
    }
}

/// Shape per-metric forecast results into the co-indexed array form.
pub fn forecast_response(
    subject_id: i64,
    horizon_hours: u32,
    generated_at: DateTime<Utc>,
    results: &BTreeMap<String, ForecastResult>,
) -> ForecastResponse {
    ForecastResponse {
        subject_id,
        horizon_hours,
        generated_at,
        forecasts: results
            .iter()
            .map(|(metric, result)| (metric.clone(), MetricForecastSeries::from(result)))
            .collect(),
    }
}
