use chrono::{DateTime, Utc};
use monitor_core::{
    AggregateStats, FeatureVector, MetricCatalog, MetricProfile, Reading, RiskCategory,
    TrendDirection, Window,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;
use vitals_aggregation::{metric_series, window_slice};

use crate::regression::linear_fit;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Raw recent reading tail length used for the trend fit
    pub recent_tail: usize,
    /// Below this many in-window samples the single-point fallback applies
    pub min_trend_samples: usize,
    /// Risk score at or above which the category is Elevated
    pub risk_elevated: f64,
    /// Risk score at or above which the category is Critical
    pub risk_critical: f64,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            recent_tail: 10,
            min_trend_samples: 3,
            risk_elevated: 0.33,
            risk_critical: 0.66,
        }
    }
}

/// Derives a `FeatureVector` per metric from aggregated statistics and the
/// raw recent reading tail.
pub struct FeatureEngineer {
    catalog: MetricCatalog,
    config: FeatureConfig,
}

impl FeatureEngineer {
    pub fn new(catalog: MetricCatalog) -> Self {
        Self::with_config(catalog, FeatureConfig::default())
    }

    pub fn with_config(catalog: MetricCatalog, config: FeatureConfig) -> Self {
        Self { catalog, config }
    }

    pub fn catalog(&self) -> &MetricCatalog {
        &self.catalog
    }

    /// Compute features for every cataloged metric present in `stats`.
    ///
    /// `stats` is the aggregation of the primary `window`; `readings` is the
    /// subject's full fetched history, from which the in-window tail is
    /// taken for the trend fit.
    pub fn compute(
        &self,
        stats: &BTreeMap<String, AggregateStats>,
        readings: &[Reading],
        now: DateTime<Utc>,
        window: &Window,
    ) -> BTreeMap<String, FeatureVector> {
        let mut features = BTreeMap::new();

        for (metric, metric_stats) in stats {
            let Some(profile) = self.catalog.get(metric) else {
                debug!(metric = %metric, "no profile configured, skipping features");
                continue;
            };

            let series = metric_series(readings, metric);
            if series.is_empty() {
                continue;
            }

            let in_window = window_slice(&series, now, window.duration);
            let tail_start = in_window.len().saturating_sub(self.config.recent_tail);
            let tail = &in_window[tail_start..];

            features.insert(
                metric.clone(),
                self.compute_metric(profile, metric_stats, tail, &series),
            );
        }

        features
    }

    fn compute_metric(
        &self,
        profile: &MetricProfile,
        stats: &AggregateStats,
        tail: &[(DateTime<Utc>, f64)],
        full_series: &[(DateTime<Utc>, f64)],
    ) -> FeatureVector {
        // Single-point fallback: not enough in-window samples for a fit.
        // Risk still comes from the latest raw value, even one outside the
        // window.
        if tail.len() < self.config.min_trend_samples {
            let current_value = tail
                .last()
                .or_else(|| full_series.last())
                .map(|(_, v)| *v)
                .unwrap_or_default();
            let risk_score = profile.risk_score(current_value);

            return FeatureVector {
                metric: profile.metric.clone(),
                current_value,
                trend: TrendDirection::Stable,
                rate_of_change: 0.0,
                risk_score,
                risk_category: self.categorize(risk_score),
                low_confidence: true,
            };
        }

        let current_value = tail[tail.len() - 1].1;
        let epsilon = profile.trend_epsilon();

        let (trend, rate_of_change) = match linear_fit(tail) {
            Some(fit) => {
                let slope = fit.slope_per_hour;
                let trend = if slope > epsilon {
                    TrendDirection::Increasing
                } else if slope < -epsilon {
                    TrendDirection::Decreasing
                } else {
                    TrendDirection::Stable
                };
                (trend, slope)
            }
            None => (TrendDirection::Stable, 0.0),
        };

        let risk_score = profile.risk_score(current_value);

        FeatureVector {
            metric: profile.metric.clone(),
            current_value,
            trend,
            rate_of_change,
            risk_score,
            risk_category: self.categorize(risk_score),
            low_confidence: stats.low_confidence,
        }
    }

    fn categorize(&self, risk_score: f64) -> RiskCategory {
        if risk_score >= self.config.risk_critical {
            RiskCategory::Critical
        } else if risk_score >= self.config.risk_elevated {
            RiskCategory::Elevated
        } else {
            RiskCategory::Normal
        }
    }
}
