use chrono::{DateTime, Duration, Utc};
use monitor_core::Reading;
use std::collections::BTreeSet;

/// Extract the ordered (timestamp, value) series for one metric.
///
/// Input readings are ordered by timestamp with insertion order preserved
/// for equal timestamps, so a duplicate timestamp keeps the most recently
/// ingested value.
pub fn metric_series(readings: &[Reading], metric: &str) -> Vec<(DateTime<Utc>, f64)> {
    let mut series: Vec<(DateTime<Utc>, f64)> = Vec::new();

    for reading in readings {
        if let Some(value) = reading.value(metric) {
            match series.last_mut() {
                Some(last) if last.0 == reading.timestamp => last.1 = value,
                _ => series.push((reading.timestamp, value)),
            }
        }
    }

    series
}

/// The subsequence of `series` with timestamps in `[now - duration, now]`.
pub fn window_slice(
    series: &[(DateTime<Utc>, f64)],
    now: DateTime<Utc>,
    duration: Duration,
) -> &[(DateTime<Utc>, f64)] {
    let cutoff = now - duration;
    let start = series.partition_point(|(ts, _)| *ts < cutoff);
    let end = series.partition_point(|(ts, _)| *ts <= now);
    &series[start..end]
}

/// Every metric name appearing anywhere in the reading sequence.
pub fn metric_names(readings: &[Reading]) -> BTreeSet<String> {
    readings
        .iter()
        .flat_map(|r| r.values.keys().cloned())
        .collect()
}
