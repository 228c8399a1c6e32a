//! Per-subject evaluation pipeline.
//!
//! Ties the engines together in strict producer-before-consumer order
//! (aggregation and features complete before forecasting or alerting),
//! keeps TTL caches with per-key single-flight, and runs forecast fits off
//! the synchronous request path behind a budget: a fit that exceeds its
//! timeout is abandoned and the caller gets the last cached result, or the
//! carry-forward fallback if none exists yet.

mod cache;
pub mod summary;


pub use cache::TtlCache;
pub use summary::{compose_summary, forecast_response};

use alert_engine::{AlertConfig, AlertEngine};
use chrono::{Duration, Utc};
use feature_engineering::{FeatureConfig, FeatureEngineer};
use futures_util::future::join_all;
use health_forecasting::{ForecastConfig, ForecastEngine};
use monitor_core::{
    AggregateStats, Alert, FeatureVector, ForecastResponse, ForecastResult, HealthSummary,
    Horizon, MetricCatalog, PipelineError, Reading, ReadingStore, Window,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};
use vitals_aggregation::{metric_names, metric_series, Aggregator, HourlyBucket};

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Window feeding the feature engineer and alert rules
    pub primary_window: Window,
    /// Windows exposed by the statistics query
    pub windows: Vec<Window>,
    /// How far back readings are fetched per cycle
    pub history: Duration,
    pub default_horizon_hours: u32,
    pub horizon_spacing: Duration,
    pub cache_ttl: Duration,
    /// Budget for one subject's forecast fits
    pub forecast_timeout: std::time::Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            primary_window: Window::hours(24, 3),
            windows: vec![Window::hours(1, 3), Window::hours(24, 5)],
            history: Duration::days(7),
            default_horizon_hours: 24,
            horizon_spacing: Duration::hours(1),
            cache_ttl: Duration::minutes(5),
            forecast_timeout: std::time::Duration::from_secs(10),
        }
    }
}

/// Bundled configuration for the whole pipeline
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub orchestrator: OrchestratorConfig,
    pub features: FeatureConfig,
    pub forecast: ForecastConfig,
    pub alerts: AlertConfig,
}

pub struct MonitorOrchestrator {
    store: Arc<dyn ReadingStore>,
    aggregator: Aggregator,
    feature_engineer: FeatureEngineer,
    forecast_engine: Arc<ForecastEngine>,
    alert_engine: AlertEngine,
    config: OrchestratorConfig,
    feature_cache: TtlCache<i64, BTreeMap<String, FeatureVector>>,
    forecast_cache: TtlCache<(i64, u32), BTreeMap<String, ForecastResult>>,
}

impl MonitorOrchestrator {
    pub fn new(store: Arc<dyn ReadingStore>, catalog: MetricCatalog) -> Result<Self, PipelineError> {
        Self::with_config(store, catalog, PipelineConfig::default())
    }

    pub fn with_config(
        store: Arc<dyn ReadingStore>,
        catalog: MetricCatalog,
        config: PipelineConfig,
    ) -> Result<Self, PipelineError> {
        let forecast_engine = Arc::new(ForecastEngine::new(config.forecast)?);

        Ok(Self {
            store,
            aggregator: Aggregator::new(),
            feature_engineer: FeatureEngineer::with_config(catalog.clone(), config.features),
            forecast_engine,
            alert_engine: AlertEngine::with_config(catalog, config.alerts),
            feature_cache: TtlCache::new(config.orchestrator.cache_ttl),
            forecast_cache: TtlCache::new(config.orchestrator.cache_ttl),
            config: config.orchestrator,
        })
    }

    /// Feature/summary query: features for every metric plus active alerts.
    /// Never waits on forecast fitting; at most it reads the last cached
    /// forecast for trend-rule escalation.
    pub async fn health_summary(&self, subject_id: i64) -> Result<HealthSummary, PipelineError> {
        let now = Utc::now();
        let features = self.features_cached(subject_id).await?;

        if features.is_empty() {
            // Still run a cycle so stale alerts retire
            self.alert_engine.evaluate(subject_id, &features, None, now);
            return Ok(HealthSummary::empty(subject_id, now));
        }

        let cached_forecast = self
            .forecast_cache
            .get_any(&(subject_id, self.config.default_horizon_hours));
        let alerts = self
            .alert_engine
            .evaluate(subject_id, &features, cached_forecast.as_ref(), now);

        Ok(compose_summary(
            subject_id,
            now,
            &features,
            cached_forecast.as_ref(),
            &alerts,
        ))
    }

    /// Forecast query for an arbitrary horizon, served from cache when
    /// fresh, single-flighted otherwise.
    pub async fn forecast(
        &self,
        subject_id: i64,
        horizon_hours: u32,
    ) -> Result<ForecastResponse, PipelineError> {
        let now = Utc::now();
        let key = (subject_id, horizon_hours);

        if let Some(results) = self.forecast_cache.get(&key) {
            return Ok(forecast_response(subject_id, horizon_hours, now, &results));
        }

        let lock = self.forecast_cache.key_lock(&key);
        let _guard = lock.lock().await;
        if let Some(results) = self.forecast_cache.get(&key) {
            return Ok(forecast_response(subject_id, horizon_hours, now, &results));
        }

        let readings = self.fetch_history(subject_id).await?;
        if readings.is_empty() {
            return Ok(ForecastResponse::empty(subject_id, horizon_hours, now));
        }

        let horizon = self.horizon(horizon_hours);
        let results = self
            .forecast_with_budget(subject_id, key, &readings, horizon)
            .await;
        Ok(forecast_response(subject_id, horizon_hours, now, &results))
    }

    /// Alerts query: active alerts, most severe first, refreshed against
    /// the latest features.
    pub async fn active_alerts(&self, subject_id: i64) -> Result<Vec<Alert>, PipelineError> {
        let now = Utc::now();
        let features = self.features_cached(subject_id).await?;
        let cached_forecast = self
            .forecast_cache
            .get_any(&(subject_id, self.config.default_horizon_hours));
        Ok(self
            .alert_engine
            .evaluate(subject_id, &features, cached_forecast.as_ref(), now))
    }

    /// One full evaluation cycle: aggregate, derive features, forecast,
    /// alert, summarize. Aggregation and features always complete before
    /// the forecaster or alert engine run.
    pub async fn evaluate_subject(&self, subject_id: i64) -> Result<HealthSummary, PipelineError> {
        let now = Utc::now();
        let readings = self.fetch_history(subject_id).await?;

        if readings.is_empty() {
            self.alert_engine
                .evaluate(subject_id, &BTreeMap::new(), None, now);
            return Ok(HealthSummary::empty(subject_id, now));
        }

        let stats = self
            .aggregator
            .aggregate(&readings, now, &self.config.primary_window);
        let features =
            self.feature_engineer
                .compute(&stats, &readings, now, &self.config.primary_window);
        self.feature_cache.insert(subject_id, features.clone());

        let horizon_hours = self.config.default_horizon_hours;
        let horizon = self.horizon(horizon_hours);
        let forecasts = self
            .forecast_with_budget(subject_id, (subject_id, horizon_hours), &readings, horizon)
            .await;

        let alerts = self
            .alert_engine
            .evaluate(subject_id, &features, Some(&forecasts), now);

        info!(
            subject_id,
            metrics = features.len(),
            alerts = alerts.len(),
            "evaluation cycle complete"
        );
        Ok(compose_summary(
            subject_id,
            now,
            &features,
            Some(&forecasts),
            &alerts,
        ))
    }

    /// Evaluate many subjects concurrently; subjects share no mutable state
    /// so cycles are independent.
    pub async fn evaluate_subjects(
        &self,
        subject_ids: &[i64],
    ) -> Vec<(i64, Result<HealthSummary, PipelineError>)> {
        join_all(
            subject_ids
                .iter()
                .map(|&id| async move { (id, self.evaluate_subject(id).await) }),
        )
        .await
    }

    /// Rolling statistics for every configured window.
    pub async fn window_stats(
        &self,
        subject_id: i64,
    ) -> Result<BTreeMap<String, BTreeMap<String, AggregateStats>>, PipelineError> {
        let now = Utc::now();
        let readings = self.fetch_history(subject_id).await?;
        Ok(self
            .aggregator
            .aggregate_windows(&readings, now, &self.config.windows))
    }

    /// Hourly bucketed series for one metric over the primary window.
    pub async fn hourly_series(
        &self,
        subject_id: i64,
        metric: &str,
    ) -> Result<Vec<HourlyBucket>, PipelineError> {
        let now = Utc::now();
        let readings = self.fetch_history(subject_id).await?;
        Ok(self
            .aggregator
            .hourly_buckets(&readings, metric, now, &self.config.primary_window))
    }

    async fn features_cached(
        &self,
        subject_id: i64,
    ) -> Result<BTreeMap<String, FeatureVector>, PipelineError> {
        self.feature_cache
            .get_or_compute(subject_id, || async {
                let now = Utc::now();
                let readings = self.fetch_history(subject_id).await?;
                let stats = self
                    .aggregator
                    .aggregate(&readings, now, &self.config.primary_window);
                Ok(self.feature_engineer.compute(
                    &stats,
                    &readings,
                    now,
                    &self.config.primary_window,
                ))
            })
            .await
    }

    /// Run per-metric forecast fits concurrently on blocking workers, under
    /// the configured budget. On timeout the fits are abandoned and the
    /// last cached result (or the cheap carry-forward fallback) is served;
    /// neither is written back to the cache, so the next query retries a
    /// full fit.
    async fn forecast_with_budget(
        &self,
        subject_id: i64,
        key: (i64, u32),
        readings: &[Reading],
        horizon: Horizon,
    ) -> BTreeMap<String, ForecastResult> {
        let work = run_forecast_tasks(Arc::clone(&self.forecast_engine), readings, horizon);

        match tokio::time::timeout(self.config.forecast_timeout, work).await {
            Ok(results) => {
                self.forecast_cache.insert(key, results.clone());
                results
            }
            Err(_) => {
                warn!(
                    subject_id,
                    budget_ms = self.config.forecast_timeout.as_millis() as u64,
                    "forecast exceeded budget, serving cached or fallback"
                );
                self.forecast_cache.get_any(&key).unwrap_or_else(|| {
                    self.forecast_engine.carry_forward_all(readings, &horizon)
                })
            }
        }
    }

    async fn fetch_history(&self, subject_id: i64) -> Result<Vec<Reading>, PipelineError> {
        self.store
            .readings_since(subject_id, Utc::now() - self.config.history)
            .await
    }

    fn horizon(&self, hours: u32) -> Horizon {
        Horizon {
            steps: hours as usize,
            spacing: self.config.horizon_spacing,
        }
    }
}

async fn run_forecast_tasks(
    engine: Arc<ForecastEngine>,
    readings: &[Reading],
    horizon: Horizon,
) -> BTreeMap<String, ForecastResult> {
    let mut tasks = Vec::new();
    for metric in metric_names(readings) {
        let engine = Arc::clone(&engine);
        let series = metric_series(readings, &metric);
        tasks.push(tokio::task::spawn_blocking(move || {
            engine
                .forecast_series(&metric, &series, &horizon)
                .map(|result| (metric, result))
        }));
    }

    let mut out = BTreeMap::new();
    for joined in join_all(tasks).await {
        match joined {
            Ok(Some((metric, result))) => {
                out.insert(metric, result);
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "forecast task failed"),
        }
    }
    out
}
