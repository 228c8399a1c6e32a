use chrono::{DateTime, Duration, Utc};
use monitor_core::{Alert, FeatureVector, ForecastResult, MetricCatalog};
use std::collections::BTreeMap;
use tracing::info;

use crate::registry::AlertRegistry;
use crate::rules::{evaluate_metric, FiredRule};

#[derive(Debug, Clone)]
pub struct AlertConfig {
    /// Window during which a repeated condition dedups onto the existing
    /// alert instead of surfacing as a new one
    pub cooldown: Duration,
    /// Fraction of the normal-to-critical gap treated as "approaching
    /// critical" for threshold severity
    pub approach_margin: f64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            cooldown: Duration::minutes(15),
            approach_margin: 0.10,
        }
    }
}

/// Evaluates the rule table against the latest features (and optional
/// forecasts) and owns the cross-cycle alert registry.
pub struct AlertEngine {
    catalog: MetricCatalog,
    config: AlertConfig,
    registry: AlertRegistry,
}

impl AlertEngine {
    pub fn new(catalog: MetricCatalog) -> Self {
        Self::with_config(catalog, AlertConfig::default())
    }

    pub fn with_config(catalog: MetricCatalog, config: AlertConfig) -> Self {
        Self {
            catalog,
            config,
            registry: AlertRegistry::new(),
        }
    }

    /// Run one evaluation cycle for a subject and return its active alerts,
    /// most severe first.
    pub fn evaluate(
        &self,
        subject_id: i64,
        features: &BTreeMap<String, FeatureVector>,
        forecasts: Option<&BTreeMap<String, ForecastResult>>,
        now: DateTime<Utc>,
    ) -> Vec<Alert> {
        let mut fired: Vec<(String, FiredRule)> = Vec::new();

        for (metric, feature) in features {
            let Some(profile) = self.catalog.get(metric) else {
                continue;
            };
            let forecast = forecasts.and_then(|f| f.get(metric));
            for rule in evaluate_metric(profile, feature, forecast, self.config.approach_margin) {
                fired.push((metric.clone(), rule));
            }
        }

        if !fired.is_empty() {
            info!(subject_id, fired = fired.len(), "alert conditions fired");
        }

        self.registry
            .apply_cycle(subject_id, &fired, now, self.config.cooldown);
        self.registry.active_alerts(subject_id)
    }

    /// Active alerts without running an evaluation cycle.
    pub fn active_alerts(&self, subject_id: i64) -> Vec<Alert> {
        self.registry.active_alerts(subject_id)
    }
}
