use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which trend direction is adverse for a metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdverseDirection {
    /// Rising values are adverse
    High,
    /// Falling values are adverse
    Low,
    /// Moving away from the normal range on either side is adverse
    Both,
}

/// Per-metric reference ranges and rule parameters.
///
/// Alerting and risk scoring consult this table instead of branching per
/// metric; adding a metric is configuration, not code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricProfile {
    pub metric: String,
    pub label: String,
    pub unit: String,
    pub normal_low: f64,
    pub normal_high: f64,
    pub critical_low: Option<f64>,
    pub critical_high: Option<f64>,
    /// Values outside this range are rejected at the ingestion boundary
    pub plausible_low: f64,
    pub plausible_high: f64,
    pub adverse: AdverseDirection,
    /// Trend epsilon as a fraction of the normal range, per hour
    pub trend_epsilon_fraction: f64,
}

impl MetricProfile {
    pub fn normal_range(&self) -> f64 {
        self.normal_high - self.normal_low
    }

    /// Slope threshold (value per hour) below which a trend reads as stable
    pub fn trend_epsilon(&self) -> f64 {
        self.trend_epsilon_fraction * self.normal_range()
    }

    pub fn plausible(&self, value: f64) -> bool {
        value.is_finite() && value >= self.plausible_low && value <= self.plausible_high
    }

    /// Normalized deviation of `value` from the normal range, clipped to [0, 1].
    ///
    /// Values inside the normal range score 0; values at or beyond the
    /// critical bound score 1. A side without a configured critical bound
    /// contributes no risk.
    pub fn risk_score(&self, value: f64) -> f64 {
        if value > self.normal_high {
            match self.critical_high {
                Some(critical) if critical > self.normal_high => {
                    ((value - self.normal_high) / (critical - self.normal_high)).clamp(0.0, 1.0)
                }
                _ => 0.0,
            }
        } else if value < self.normal_low {
            match self.critical_low {
                Some(critical) if critical < self.normal_low => {
                    ((self.normal_low - value) / (self.normal_low - critical)).clamp(0.0, 1.0)
                }
                _ => 0.0,
            }
        } else {
            0.0
        }
    }
}

/// The configured set of monitored metrics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricCatalog {
    profiles: BTreeMap<String, MetricProfile>,
}

impl MetricCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, profile: MetricProfile) {
        self.profiles.insert(profile.metric.clone(), profile);
    }

    pub fn get(&self, metric: &str) -> Option<&MetricProfile> {
        self.profiles.get(metric)
    }

    pub fn contains(&self, metric: &str) -> bool {
        self.profiles.contains_key(metric)
    }

    pub fn metrics(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(|k| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &MetricProfile> {
        self.profiles.values()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Default catalog covering the standard monitored vitals.
    ///
    /// Ranges follow the clinical defaults of the upstream monitoring
    /// deployment; override via configuration where a deployment differs.
    pub fn standard_vitals() -> Self {
        let mut catalog = Self::new();

        catalog.insert(MetricProfile {
            metric: "heart_rate".to_string(),
            label: "Heart rate".to_string(),
            unit: "bpm".to_string(),
            normal_low: 60.0,
            normal_high: 100.0,
            critical_low: Some(50.0),
            critical_high: Some(120.0),
            plausible_low: 0.0,
            plausible_high: 300.0,
            adverse: AdverseDirection::Both,
            trend_epsilon_fraction: 0.02,
        });

        catalog.insert(MetricProfile {
            metric: "systolic".to_string(),
            label: "Systolic blood pressure".to_string(),
            unit: "mmHg".to_string(),
            normal_low: 90.0,
            normal_high: 140.0,
            critical_low: Some(80.0),
            critical_high: Some(180.0),
            plausible_low: 40.0,
            plausible_high: 300.0,
            adverse: AdverseDirection::Both,
            trend_epsilon_fraction: 0.02,
        });

        catalog.insert(MetricProfile {
            metric: "diastolic".to_string(),
            label: "Diastolic blood pressure".to_string(),
            unit: "mmHg".to_string(),
            normal_low: 60.0,
            normal_high: 90.0,
            critical_low: Some(50.0),
            critical_high: Some(120.0),
            plausible_low: 20.0,
            plausible_high: 200.0,
            adverse: AdverseDirection::Both,
            trend_epsilon_fraction: 0.02,
        });

        catalog.insert(MetricProfile {
            metric: "temperature".to_string(),
            label: "Body temperature".to_string(),
            unit: "°C".to_string(),
            normal_low: 36.0,
            normal_high: 38.0,
            critical_low: Some(35.0),
            critical_high: Some(39.0),
            plausible_low: 30.0,
            plausible_high: 45.0,
            adverse: AdverseDirection::Both,
            trend_epsilon_fraction: 0.02,
        });

        catalog.insert(MetricProfile {
            metric: "respiration".to_string(),
            label: "Respiration rate".to_string(),
            unit: "breaths/min".to_string(),
            normal_low: 12.0,
            normal_high: 20.0,
            critical_low: Some(8.0),
            critical_high: Some(25.0),
            plausible_low: 0.0,
            plausible_high: 100.0,
            adverse: AdverseDirection::Both,
            trend_epsilon_fraction: 0.02,
        });

        catalog.insert(MetricProfile {
            metric: "oxygen_saturation".to_string(),
            label: "Oxygen saturation".to_string(),
            unit: "%".to_string(),
            normal_low: 95.0,
            normal_high: 100.0,
            critical_low: Some(90.0),
            critical_high: None,
            plausible_low: 0.0,
            plausible_high: 100.0,
            adverse: AdverseDirection::Low,
            trend_epsilon_fraction: 0.02,
        });

        catalog
    }
}
