use monitor_core::{
    AdverseDirection, AlertCondition, AlertSeverity, FeatureVector, ForecastResult, MetricProfile,
    RiskCategory, TrendDirection,
};

/// One rule firing for one metric in one evaluation cycle
#[derive(Debug, Clone)]
pub struct FiredRule {
    pub condition: AlertCondition,
    pub severity: AlertSeverity,
    pub message: String,
}

/// Evaluate the threshold and trend rules for one metric. Both rule classes
/// may fire independently.
///
/// Threshold severity: at or beyond a critical bound is `Critical`; outside
/// the normal range and within `approach_margin` of the normal-to-critical
/// gap is `Warning`; otherwise outside the normal range is `Info`.
pub fn evaluate_metric(
    profile: &MetricProfile,
    feature: &FeatureVector,
    forecast: Option<&ForecastResult>,
    approach_margin: f64,
) -> Vec<FiredRule> {
    let mut fired = Vec::new();

    if let Some(rule) = threshold_rule(profile, feature, approach_margin) {
        fired.push(rule);
    }
    if let Some(rule) = trend_rule(profile, feature, forecast) {
        fired.push(rule);
    }

    fired
}

fn threshold_rule(
    profile: &MetricProfile,
    feature: &FeatureVector,
    approach_margin: f64,
) -> Option<FiredRule> {
    let value = feature.current_value;

    if value > profile.normal_high {
        let severity = match profile.critical_high {
            Some(critical) if value >= critical => AlertSeverity::Critical,
            Some(critical) => {
                let band = approach_margin * (critical - profile.normal_high);
                if value >= critical - band {
                    AlertSeverity::Warning
                } else {
                    AlertSeverity::Info
                }
            }
            None => AlertSeverity::Info,
        };
        return Some(FiredRule {
            condition: AlertCondition::ThresholdHigh,
            severity,
            message: format!(
                "{} high: {:.1} {} (normal up to {:.1})",
                profile.label, value, profile.unit, profile.normal_high
            ),
        });
    }

    if value < profile.normal_low {
        let severity = match profile.critical_low {
            Some(critical) if value <= critical => AlertSeverity::Critical,
            Some(critical) => {
                let band = approach_margin * (profile.normal_low - critical);
                if value <= critical + band {
                    AlertSeverity::Warning
                } else {
                    AlertSeverity::Info
                }
            }
            None => AlertSeverity::Info,
        };
        return Some(FiredRule {
            condition: AlertCondition::ThresholdLow,
            severity,
            message: format!(
                "{} low: {:.1} {} (normal from {:.1})",
                profile.label, value, profile.unit, profile.normal_low
            ),
        });
    }

    None
}

fn trend_rule(
    profile: &MetricProfile,
    feature: &FeatureVector,
    forecast: Option<&ForecastResult>,
) -> Option<FiredRule> {
    if !trend_is_adverse(profile, feature) || feature.risk_category < RiskCategory::Elevated {
        return None;
    }

    let crosses_critical = forecast
        .map(|f| forecast_crosses_critical(profile, feature.trend, f))
        .unwrap_or(false);

    let severity = if crosses_critical {
        AlertSeverity::Critical
    } else {
        AlertSeverity::Warning
    };

    let message = if crosses_critical {
        format!(
            "{} {} at {:.2} {}/h, forecast crosses critical bound",
            profile.label,
            feature.trend.as_str(),
            feature.rate_of_change,
            profile.unit
        )
    } else {
        format!(
            "{} {} at {:.2} {}/h with {} risk",
            profile.label,
            feature.trend.as_str(),
            feature.rate_of_change,
            profile.unit,
            feature.risk_category.as_str()
        )
    };

    Some(FiredRule {
        condition: AlertCondition::AdverseTrend,
        severity,
        message,
    })
}

fn trend_is_adverse(profile: &MetricProfile, feature: &FeatureVector) -> bool {
    match profile.adverse {
        AdverseDirection::High => feature.trend == TrendDirection::Increasing,
        AdverseDirection::Low => feature.trend == TrendDirection::Decreasing,
        // For two-sided metrics, adverse means moving further outside the
        // normal range, not merely moving.
        AdverseDirection::Both => {
            (feature.trend == TrendDirection::Increasing
                && feature.current_value >= profile.normal_high)
                || (feature.trend == TrendDirection::Decreasing
                    && feature.current_value <= profile.normal_low)
        }
    }
}

fn forecast_crosses_critical(
    profile: &MetricProfile,
    trend: TrendDirection,
    forecast: &ForecastResult,
) -> bool {
    let Some(horizon_end) = forecast.horizon_end_estimate() else {
        return false;
    };

    match trend {
        TrendDirection::Increasing => profile
            .critical_high
            .map(|critical| horizon_end >= critical)
            .unwrap_or(false),
        TrendDirection::Decreasing => profile
            .critical_low
            .map(|critical| horizon_end <= critical)
            .unwrap_or(false),
        TrendDirection::Stable => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use monitor_core::{ForecastModelKind, ForecastPoint, MetricCatalog};

    fn profile() -> MetricProfile {
        MetricCatalog::standard_vitals()
            .get("heart_rate")
            .unwrap()
            .clone()
    }

    fn feature(value: f64, trend: TrendDirection, category: RiskCategory) -> FeatureVector {
        FeatureVector {
            metric: "heart_rate".to_string(),
            current_value: value,
            trend,
            rate_of_change: 2.0,
            risk_score: 0.5,
            risk_category: category,
            low_confidence: false,
        }
    }

    fn forecast_ending_at(estimate: f64) -> ForecastResult {
        ForecastResult {
            metric: "heart_rate".to_string(),
            model: ForecastModelKind::TrendSmoothing,
            points: vec![ForecastPoint {
                timestamp: Utc::now(),
                estimate,
                lower: estimate - 1.0,
                upper: estimate + 1.0,
            }],
            low_confidence: false,
        }
    }

    #[test]
    fn value_beyond_critical_bound_is_critical() {
        let fired = evaluate_metric(
            &profile(),
            &feature(130.0, TrendDirection::Stable, RiskCategory::Critical),
            None,
            0.10,
        );
        assert!(fired
            .iter()
            .any(|r| r.condition == AlertCondition::ThresholdHigh
                && r.severity == AlertSeverity::Critical));
    }

    #[test]
    fn value_approaching_critical_bound_is_warning() {
        // Warning band: within 10% of the 100..120 gap, i.e. >= 118
        let fired = evaluate_metric(
            &profile(),
            &feature(119.0, TrendDirection::Stable, RiskCategory::Critical),
            None,
            0.10,
        );
        assert_eq!(fired[0].severity, AlertSeverity::Warning);

        let fired = evaluate_metric(
            &profile(),
            &feature(110.0, TrendDirection::Stable, RiskCategory::Elevated),
            None,
            0.10,
        );
        assert_eq!(fired[0].severity, AlertSeverity::Info);
    }

    #[test]
    fn low_side_mirrors_high_side() {
        let fired = evaluate_metric(
            &profile(),
            &feature(45.0, TrendDirection::Stable, RiskCategory::Critical),
            None,
            0.10,
        );
        assert_eq!(fired[0].condition, AlertCondition::ThresholdLow);
        assert_eq!(fired[0].severity, AlertSeverity::Critical);
    }

    #[test]
    fn normal_value_fires_nothing() {
        let fired = evaluate_metric(
            &profile(),
            &feature(80.0, TrendDirection::Stable, RiskCategory::Normal),
            None,
            0.10,
        );
        assert!(fired.is_empty());
    }

    #[test]
    fn adverse_trend_with_elevated_risk_warns() {
        let fired = evaluate_metric(
            &profile(),
            &feature(110.0, TrendDirection::Increasing, RiskCategory::Elevated),
            None,
            0.10,
        );
        assert!(fired
            .iter()
            .any(|r| r.condition == AlertCondition::AdverseTrend
                && r.severity == AlertSeverity::Warning));
    }

    #[test]
    fn adverse_trend_escalates_when_forecast_crosses_critical() {
        let fired = evaluate_metric(
            &profile(),
            &feature(110.0, TrendDirection::Increasing, RiskCategory::Elevated),
            Some(&forecast_ending_at(125.0)),
            0.10,
        );
        let trend_rule = fired
            .iter()
            .find(|r| r.condition == AlertCondition::AdverseTrend)
            .unwrap();
        assert_eq!(trend_rule.severity, AlertSeverity::Critical);
    }

    #[test]
    fn improving_trend_on_two_sided_metric_is_not_adverse() {
        // Heart rate high but falling back toward normal
        let fired = evaluate_metric(
            &profile(),
            &feature(110.0, TrendDirection::Decreasing, RiskCategory::Elevated),
            None,
            0.10,
        );
        assert!(!fired
            .iter()
            .any(|r| r.condition == AlertCondition::AdverseTrend));
    }

    #[test]
    fn normal_risk_suppresses_trend_rule() {
        let fired = evaluate_metric(
            &profile(),
            &feature(80.0, TrendDirection::Increasing, RiskCategory::Normal),
            None,
            0.10,
        );
        assert!(fired.is_empty());
    }

    #[test]
    fn falling_oxygen_is_adverse() {
        let catalog = MetricCatalog::standard_vitals();
        let spo2 = catalog.get("oxygen_saturation").unwrap();
        let mut f = feature(93.0, TrendDirection::Decreasing, RiskCategory::Elevated);
        f.metric = "oxygen_saturation".to_string();

        let fired = evaluate_metric(spo2, &f, None, 0.10);
        assert!(fired
            .iter()
            .any(|r| r.condition == AlertCondition::AdverseTrend));
    }
}
