use chrono::{DateTime, Utc};
use monitor_core::{AggregateStats, Reading, Window};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::series::{metric_names, metric_series, window_slice};

/// Computes rolling statistics per metric over one or more windows.
///
/// Readings outside a window are ignored for that window, never deleted;
/// each requested window is computed independently of the others.
#[derive(Debug, Default)]
pub struct Aggregator;

/// Fixed hourly bucket with per-bucket summary statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HourlyBucket {
    pub bucket_start: DateTime<Utc>,
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

impl Aggregator {
    pub fn new() -> Self {
        Self
    }

    /// Aggregate every metric present in `readings` over one window,
    /// anchored at `now`. Metrics with zero in-window samples yield an
    /// insufficient-data result.
    pub fn aggregate(
        &self,
        readings: &[Reading],
        now: DateTime<Utc>,
        window: &Window,
    ) -> BTreeMap<String, AggregateStats> {
        let label = window.label();
        let mut out = BTreeMap::new();

        for metric in metric_names(readings) {
            let series = metric_series(readings, &metric);
            let in_window = window_slice(&series, now, window.duration);
            out.insert(
                metric.clone(),
                compute_stats(&metric, &label, in_window, window.min_samples),
            );
        }

        debug!(window = %label, metrics = out.len(), "aggregated window");
        out
    }

    /// Aggregate over several windows at once, keyed by window label.
    pub fn aggregate_windows(
        &self,
        readings: &[Reading],
        now: DateTime<Utc>,
        windows: &[Window],
    ) -> BTreeMap<String, BTreeMap<String, AggregateStats>> {
        windows
            .iter()
            .map(|w| (w.label(), self.aggregate(readings, now, w)))
            .collect()
    }

    /// Group one metric's in-window readings into fixed hourly buckets with
    /// per-bucket mean/min/max, ordered by bucket start.
    pub fn hourly_buckets(
        &self,
        readings: &[Reading],
        metric: &str,
        now: DateTime<Utc>,
        window: &Window,
    ) -> Vec<HourlyBucket> {
        let series = metric_series(readings, metric);
        let in_window = window_slice(&series, now, window.duration);

        let mut buckets: BTreeMap<i64, Vec<f64>> = BTreeMap::new();
        for (ts, value) in in_window {
            let secs = ts.timestamp();
            buckets
                .entry(secs - secs.rem_euclid(3600))
                .or_default()
                .push(*value);
        }

        buckets
            .into_iter()
            .filter_map(|(start_secs, values)| {
                let bucket_start = DateTime::<Utc>::from_timestamp(start_secs, 0)?;
                let count = values.len();
                let sum: f64 = values.iter().sum();
                let min = values.iter().copied().fold(f64::INFINITY, f64::min);
                let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                Some(HourlyBucket {
                    bucket_start,
                    count,
                    mean: sum / count as f64,
                    min,
                    max,
                })
            })
            .collect()
    }
}

fn compute_stats(
    metric: &str,
    window_label: &str,
    samples: &[(DateTime<Utc>, f64)],
    min_samples: usize,
) -> AggregateStats {
    if samples.is_empty() {
        return AggregateStats::insufficient(metric, window_label);
    }

    let count = samples.len();
    let values: Vec<f64> = samples.iter().map(|(_, v)| *v).collect();
    let sum: f64 = values.iter().sum();
    let mean = sum / count as f64;

    // Sample standard deviation; undefined below two samples
    let std_dev = if count >= 2 {
        let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
        Some((ss / (count - 1) as f64).sqrt())
    } else {
        None
    };

    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let (last_timestamp, last_value) = samples[count - 1];

    AggregateStats {
        metric: metric.to_string(),
        window: window_label.to_string(),
        count,
        mean: Some(mean),
        std_dev,
        min: Some(min),
        max: Some(max),
        last_value: Some(last_value),
        last_timestamp: Some(last_timestamp),
        low_confidence: count < min_samples,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn reading(subject: i64, minutes_ago: i64, now: DateTime<Utc>, hr: f64) -> Reading {
        Reading::new(subject, now - Duration::minutes(minutes_ago)).with_value("heart_rate", hr)
    }

    #[test]
    fn mean_matches_arithmetic_mean_of_window() {
        let now = Utc::now();
        let readings = vec![
            reading(1, 30, now, 70.0),
            reading(1, 20, now, 80.0),
            reading(1, 10, now, 90.0),
        ];

        let stats = Aggregator::new().aggregate(&readings, now, &Window::hours(1, 2));
        let hr = &stats["heart_rate"];
        assert_eq!(hr.count, 3);
        assert!((hr.mean.unwrap() - 80.0).abs() < 1e-9);
        assert_eq!(hr.min, Some(70.0));
        assert_eq!(hr.max, Some(90.0));
        assert_eq!(hr.last_value, Some(90.0));
        assert!(!hr.low_confidence);
    }

    #[test]
    fn reading_outside_window_does_not_change_result() {
        let now = Utc::now();
        let mut readings = vec![
            reading(1, 30, now, 70.0),
            reading(1, 20, now, 80.0),
            reading(1, 10, now, 90.0),
        ];

        let window = Window::hours(1, 2);
        let before = Aggregator::new().aggregate(&readings, now, &window);

        // A far-out reading must be ignored for this window, not deleted
        readings.insert(0, reading(1, 300, now, 200.0));
        let after = Aggregator::new().aggregate(&readings, now, &window);

        assert_eq!(
            before["heart_rate"].mean.unwrap(),
            after["heart_rate"].mean.unwrap()
        );
        assert_eq!(before["heart_rate"].count, after["heart_rate"].count);
    }

    #[test]
    fn zero_samples_is_marked_insufficient_not_zero() {
        let now = Utc::now();
        let readings = vec![reading(1, 300, now, 70.0)];

        let stats = Aggregator::new().aggregate(&readings, now, &Window::hours(1, 2));
        let hr = &stats["heart_rate"];
        assert_eq!(hr.count, 0);
        assert!(hr.mean.is_none());
        assert!(hr.last_value.is_none());
        assert!(hr.low_confidence);
    }

    #[test]
    fn below_min_samples_is_low_confidence() {
        let now = Utc::now();
        let readings = vec![reading(1, 10, now, 70.0)];

        let stats = Aggregator::new().aggregate(&readings, now, &Window::hours(1, 3));
        let hr = &stats["heart_rate"];
        assert_eq!(hr.count, 1);
        assert!(hr.low_confidence);
        assert!(hr.std_dev.is_none());
    }

    #[test]
    fn windows_do_not_interfere() {
        let now = Utc::now();
        let readings = vec![
            reading(1, 90, now, 60.0),
            reading(1, 30, now, 70.0),
            reading(1, 10, now, 80.0),
        ];

        let windows = [Window::hours(1, 2), Window::hours(24, 2)];
        let by_window = Aggregator::new().aggregate_windows(&readings, now, &windows);

        assert_eq!(by_window["1h"]["heart_rate"].count, 2);
        assert_eq!(by_window["24h"]["heart_rate"].count, 3);
        assert!((by_window["1h"]["heart_rate"].mean.unwrap() - 75.0).abs() < 1e-9);
        assert!((by_window["24h"]["heart_rate"].mean.unwrap() - 70.0).abs() < 1e-9);
    }

    #[test]
    fn hourly_buckets_partition_without_overlap() {
        let now = Utc::now();
        // Two readings roughly an hour apart plus one close neighbor
        let readings = vec![
            reading(1, 70, now, 60.0),
            reading(1, 65, now, 70.0),
            reading(1, 5, now, 90.0),
        ];

        let buckets =
            Aggregator::new().hourly_buckets(&readings, "heart_rate", now, &Window::hours(24, 1));

        let total: usize = buckets.iter().map(|b| b.count).sum();
        assert_eq!(total, 3);
        for bucket in &buckets {
            assert!(bucket.min <= bucket.mean && bucket.mean <= bucket.max);
            assert_eq!(bucket.bucket_start.timestamp() % 3600, 0);
        }
    }
}
