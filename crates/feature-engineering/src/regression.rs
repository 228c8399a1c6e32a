use chrono::{DateTime, Utc};

/// Least-squares linear fit of value against elapsed time
#[derive(Debug, Clone, Copy)]
pub struct LinearFit {
    /// Slope in value per hour
    pub slope_per_hour: f64,
    /// Fitted value at the first sample's timestamp
    pub intercept: f64,
}

/// Fit value against elapsed hours since the first sample.
///
/// Returns `None` for fewer than two samples or a series with no time
/// spread (all samples at one timestamp).
pub fn linear_fit(series: &[(DateTime<Utc>, f64)]) -> Option<LinearFit> {
    if series.len() < 2 {
        return None;
    }

    let t0 = series[0].0;
    let n = series.len() as f64;

    let hours: Vec<f64> = series
        .iter()
        .map(|(ts, _)| (*ts - t0).num_milliseconds() as f64 / 3_600_000.0)
        .collect();
    let values: Vec<f64> = series.iter().map(|(_, v)| *v).collect();

    let t_mean = hours.iter().sum::<f64>() / n;
    let v_mean = values.iter().sum::<f64>() / n;

    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (t, v) in hours.iter().zip(values.iter()) {
        numerator += (t - t_mean) * (v - v_mean);
        denominator += (t - t_mean).powi(2);
    }

    if denominator == 0.0 {
        return None;
    }

    let slope = numerator / denominator;
    Some(LinearFit {
        slope_per_hour: slope,
        intercept: v_mean - slope * t_mean,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn fits_exact_line() {
        let now = Utc::now();
        // 2 units per minute = 120 per hour
        let series: Vec<_> = (0..6)
            .map(|i| (now + Duration::minutes(i), 70.0 + 2.0 * i as f64))
            .collect();

        let fit = linear_fit(&series).unwrap();
        assert!((fit.slope_per_hour - 120.0).abs() < 1e-6);
        assert!((fit.intercept - 70.0).abs() < 1e-6);
    }

    #[test]
    fn constant_series_has_zero_slope() {
        let now = Utc::now();
        let series: Vec<_> = (0..5).map(|i| (now + Duration::minutes(i), 37.0)).collect();

        let fit = linear_fit(&series).unwrap();
        assert!(fit.slope_per_hour.abs() < 1e-12);
    }

    #[test]
    fn too_few_or_degenerate_samples_yield_none() {
        let now = Utc::now();
        assert!(linear_fit(&[(now, 1.0)]).is_none());
        assert!(linear_fit(&[(now, 1.0), (now, 2.0)]).is_none());
    }
}
