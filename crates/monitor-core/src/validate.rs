use crate::{MetricCatalog, PipelineError, Reading};
use tracing::{debug, info};

/// Ingestion-boundary validation.
///
/// Rejects malformed readings and strips out-of-domain values before they
/// enter the pipeline's data model; everything downstream assumes validated
/// readings. Plausibility ranges come from the metric catalog.
pub struct ReadingValidator {
    catalog: MetricCatalog,
}

impl ReadingValidator {
    pub fn new(catalog: MetricCatalog) -> Self {
        Self { catalog }
    }

    /// Validate one reading. Implausible or non-finite values are dropped
    /// from the reading; an unusable reading (bad subject id) is rejected
    /// outright.
    pub fn validate(&self, mut reading: Reading) -> Result<Reading, PipelineError> {
        if reading.subject_id <= 0 {
            return Err(PipelineError::InvalidReading(format!(
                "invalid subject id: {}",
                reading.subject_id
            )));
        }

        reading.values.retain(|metric, value| {
            if !value.is_finite() {
                debug!(metric = %metric, "dropping non-finite value");
                return false;
            }
            match self.catalog.get(metric) {
                Some(profile) if !profile.plausible(*value) => {
                    debug!(
                        metric = %metric,
                        value = *value,
                        low = profile.plausible_low,
                        high = profile.plausible_high,
                        "dropping implausible value"
                    );
                    false
                }
                // Metrics without a profile pass through; only finiteness is
                // enforced for them.
                _ => true,
            }
        });

        Ok(reading)
    }

    /// Validate a batch, returning the cleaned readings plus a description
    /// of every rejection.
    pub fn validate_batch(&self, readings: Vec<Reading>) -> (Vec<Reading>, Vec<String>) {
        let total = readings.len();
        let mut cleaned = Vec::with_capacity(total);
        let mut errors = Vec::new();

        for reading in readings {
            let before = reading.values.len();
            match self.validate(reading) {
                Ok(valid) => {
                    let dropped = before - valid.values.len();
                    if dropped > 0 {
                        errors.push(format!(
                            "subject {}: dropped {dropped} out-of-domain value(s) at {}",
                            valid.subject_id, valid.timestamp
                        ));
                    }
                    cleaned.push(valid);
                }
                Err(e) => errors.push(e.to_string()),
            }
        }

        info!(
            total,
            accepted = cleaned.len(),
            issues = errors.len(),
            "reading batch validated"
        );
        (cleaned, errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn validator() -> ReadingValidator {
        ReadingValidator::new(MetricCatalog::standard_vitals())
    }

    #[test]
    fn rejects_non_positive_subject_id() {
        let reading = Reading::new(0, Utc::now()).with_value("heart_rate", 70.0);
        assert!(validator().validate(reading).is_err());
    }

    #[test]
    fn drops_implausible_values_keeps_rest() {
        let reading = Reading::new(1, Utc::now())
            .with_value("heart_rate", 500.0) // above plausible 300
            .with_value("temperature", 37.0);

        let cleaned = validator().validate(reading).unwrap();
        assert!(cleaned.value("heart_rate").is_none());
        assert_eq!(cleaned.value("temperature"), Some(37.0));
    }

    #[test]
    fn drops_non_finite_values() {
        let reading = Reading::new(1, Utc::now())
            .with_value("heart_rate", f64::NAN)
            .with_value("respiration", f64::INFINITY)
            .with_value("temperature", 36.5);

        let cleaned = validator().validate(reading).unwrap();
        assert_eq!(cleaned.values.len(), 1);
        assert_eq!(cleaned.value("temperature"), Some(36.5));
    }

    #[test]
    fn batch_reports_rejections() {
        let now = Utc::now();
        let batch = vec![
            Reading::new(1, now).with_value("heart_rate", 70.0),
            Reading::new(-5, now).with_value("heart_rate", 70.0),
            Reading::new(2, now).with_value("temperature", 60.0), // implausible
        ];

        let (cleaned, errors) = validator().validate_batch(batch);
        assert_eq!(cleaned.len(), 2);
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn unknown_metric_passes_through() {
        let reading = Reading::new(1, Utc::now()).with_value("glucose", 5.4);
        let cleaned = validator().validate(reading).unwrap();
        assert_eq!(cleaned.value("glucose"), Some(5.4));
    }
}
