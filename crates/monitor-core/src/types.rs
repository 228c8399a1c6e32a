use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One time-stamped set of measurements for a subject
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reading {
    pub subject_id: i64,
    pub timestamp: DateTime<Utc>,
    /// Metric name -> measured value; absent keys are missing measurements
    #[serde(default)]
    pub values: BTreeMap<String, f64>,
}

impl Reading {
    pub fn new(subject_id: i64, timestamp: DateTime<Utc>) -> Self {
        Self {
            subject_id,
            timestamp,
            values: BTreeMap::new(),
        }
    }

    pub fn with_value(mut self, metric: &str, value: f64) -> Self {
        self.values.insert(metric.to_string(), value);
        self
    }

    pub fn value(&self, metric: &str) -> Option<f64> {
        self.values.get(metric).copied()
    }
}

/// A trailing evaluation window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub duration: Duration,
    /// Sample count below which statistics are marked low-confidence
    pub min_samples: usize,
}

impl Window {
    pub fn hours(hours: i64, min_samples: usize) -> Self {
        Self {
            duration: Duration::hours(hours),
            min_samples,
        }
    }

    pub fn minutes(minutes: i64, min_samples: usize) -> Self {
        Self {
            duration: Duration::minutes(minutes),
            min_samples,
        }
    }

    /// Short label used as a map key when several windows are computed
    pub fn label(&self) -> String {
        let minutes = self.duration.num_minutes();
        if minutes % 60 == 0 {
            format!("{}h", minutes / 60)
        } else {
            format!("{}m", minutes)
        }
    }
}

/// Rolling statistics for one metric over one window.
///
/// The numeric fields are `None` when the window holds no samples; that case
/// is reported as-is rather than as a numeric zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateStats {
    pub metric: String,
    pub window: String,
    pub count: usize,
    pub mean: Option<f64>,
    pub std_dev: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub last_value: Option<f64>,
    pub last_timestamp: Option<DateTime<Utc>>,
    pub low_confidence: bool,
}

impl AggregateStats {
    pub fn insufficient(metric: &str, window: &str) -> Self {
        Self {
            metric: metric.to_string(),
            window: window.to_string(),
            count: 0,
            mean: None,
            std_dev: None,
            min: None,
            max: None,
            last_value: None,
            last_timestamp: None,
            low_confidence: true,
        }
    }
}

/// Classified direction of a metric over a window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

impl TrendDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendDirection::Increasing => "increasing",
            TrendDirection::Decreasing => "decreasing",
            TrendDirection::Stable => "stable",
        }
    }
}

/// Risk bucket derived from the normalized risk score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskCategory {
    Normal,
    Elevated,
    Critical,
}

impl RiskCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskCategory::Normal => "normal",
            RiskCategory::Elevated => "elevated",
            RiskCategory::Critical => "critical",
        }
    }
}

/// Derived features for one metric, recomputed each evaluation cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureVector {
    pub metric: String,
    pub current_value: f64,
    pub trend: TrendDirection,
    /// Slope of the linear fit, in value per hour
    pub rate_of_change: f64,
    pub risk_score: f64,
    pub risk_category: RiskCategory,
    pub low_confidence: bool,
}

/// Forecast horizon: how many future points, at what spacing
#[derive(Debug, Clone, Copy)]
pub struct Horizon {
    pub steps: usize,
    pub spacing: Duration,
}

impl Horizon {
    pub fn hourly(steps: usize) -> Self {
        Self {
            steps,
            spacing: Duration::hours(1),
        }
    }

    pub fn minutes(steps: usize, spacing_minutes: i64) -> Self {
        Self {
            steps,
            spacing: Duration::minutes(spacing_minutes),
        }
    }
}

/// Which model variant produced a forecast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastModelKind {
    TrendSmoothing,
    CarryForward,
}

/// One predicted point with its confidence bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub timestamp: DateTime<Utc>,
    pub estimate: f64,
    pub lower: f64,
    pub upper: f64,
}

/// Forecast for one metric over a horizon
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastResult {
    pub metric: String,
    pub model: ForecastModelKind,
    pub points: Vec<ForecastPoint>,
    pub low_confidence: bool,
}

impl ForecastResult {
    /// Point estimate at the end of the horizon
    pub fn horizon_end_estimate(&self) -> Option<f64> {
        self.points.last().map(|p| p.estimate)
    }
}

/// Alert severity; ordering is `Critical > Warning > Info`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Info => "info",
            AlertSeverity::Warning => "warning",
            AlertSeverity::Critical => "critical",
        }
    }
}

/// Typed triggering condition; part of the alert dedup key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertCondition {
    ThresholdHigh,
    ThresholdLow,
    AdverseTrend,
}

/// An active or recently retired alert
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub subject_id: i64,
    pub metric: String,
    pub severity: AlertSeverity,
    pub condition: AlertCondition,
    pub message: String,
    pub first_triggered_at: DateTime<Utc>,
    pub last_triggered_at: DateTime<Utc>,
}

/// Compact alert form embedded in the per-subject summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertSummary {
    pub severity: AlertSeverity,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Merged per-subject health summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSummary {
    pub subject_id: i64,
    pub generated_at: DateTime<Utc>,
    /// Metric name -> feature vector
    pub metrics: BTreeMap<String, FeatureVector>,
    /// Metric name -> forecast horizon-end estimate
    pub forecast_highlights: BTreeMap<String, f64>,
    pub alerts: Vec<AlertSummary>,
}

impl HealthSummary {
    pub fn empty(subject_id: i64, generated_at: DateTime<Utc>) -> Self {
        Self {
            subject_id,
            generated_at,
            metrics: BTreeMap::new(),
            forecast_highlights: BTreeMap::new(),
            alerts: Vec::new(),
        }
    }
}

/// Co-indexed forecast arrays for one metric, the shape handed to callers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricForecastSeries {
    pub timestamps: Vec<DateTime<Utc>>,
    pub forecast_values: Vec<f64>,
    pub lower_bound: Vec<f64>,
    pub upper_bound: Vec<f64>,
}

impl From<&ForecastResult> for MetricForecastSeries {
    fn from(result: &ForecastResult) -> Self {
        Self {
            timestamps: result.points.iter().map(|p| p.timestamp).collect(),
            forecast_values: result.points.iter().map(|p| p.estimate).collect(),
            lower_bound: result.points.iter().map(|p| p.lower).collect(),
            upper_bound: result.points.iter().map(|p| p.upper).collect(),
        }
    }
}

/// Forecast query response for one subject
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastResponse {
    pub subject_id: i64,
    pub horizon_hours: u32,
    pub generated_at: DateTime<Utc>,
    pub forecasts: BTreeMap<String, MetricForecastSeries>,
}

impl ForecastResponse {
    pub fn empty(subject_id: i64, horizon_hours: u32, generated_at: DateTime<Utc>) -> Self {
        Self {
            subject_id,
            horizon_hours,
            generated_at,
            forecasts: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering_is_critical_first() {
        assert!(AlertSeverity::Critical > AlertSeverity::Warning);
        assert!(AlertSeverity::Warning > AlertSeverity::Info);

        let mut severities = vec![
            AlertSeverity::Info,
            AlertSeverity::Critical,
            AlertSeverity::Warning,
        ];
        severities.sort_by(|a, b| b.cmp(a));
        assert_eq!(
            severities,
            vec![
                AlertSeverity::Critical,
                AlertSeverity::Warning,
                AlertSeverity::Info
            ]
        );
    }

    #[test]
    fn risk_category_ordering() {
        assert!(RiskCategory::Critical > RiskCategory::Elevated);
        assert!(RiskCategory::Elevated > RiskCategory::Normal);
    }

    #[test]
    fn window_label_formats() {
        assert_eq!(Window::hours(24, 5).label(), "24h");
        assert_eq!(Window::hours(1, 3).label(), "1h");
        assert_eq!(Window::minutes(30, 3).label(), "30m");
    }

    #[test]
    fn forecast_series_arrays_are_co_indexed() {
        let now = Utc::now();
        let result = ForecastResult {
            metric: "heart_rate".to_string(),
            model: ForecastModelKind::TrendSmoothing,
            points: (1..=3)
                .map(|i| ForecastPoint {
                    timestamp: now + Duration::hours(i),
                    estimate: 70.0 + i as f64,
                    lower: 65.0,
                    upper: 75.0 + i as f64,
                })
                .collect(),
            low_confidence: false,
        };

        let series = MetricForecastSeries::from(&result);
        assert_eq!(series.timestamps.len(), 3);
        assert_eq!(series.forecast_values.len(), 3);
        assert_eq!(series.lower_bound.len(), 3);
        assert_eq!(series.upper_bound.len(), 3);
        assert_eq!(result.horizon_end_estimate(), Some(73.0));
    }
}
