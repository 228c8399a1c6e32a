use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use monitor_core::{Alert, AlertCondition};
use tracing::debug;

use crate::rules::FiredRule;

/// Dedup key for active alerts
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AlertKey {
    pub subject_id: i64,
    pub metric: String,
    pub condition: AlertCondition,
}

#[derive(Debug, Clone)]
struct AlertRecord {
    alert: Alert,
    active: bool,
    retired_at: Option<DateTime<Utc>>,
}

/// Cross-cycle alert state, keyed by (subject, metric, condition).
///
/// An alert stays unique per key while active; re-triggering updates
/// `last_triggered_at`. A condition that stops holding retires the alert,
/// and the retired record is kept for the cool-down window so a quick
/// re-trigger does not surface as a brand-new alert.
#[derive(Default)]
pub struct AlertRegistry {
    entries: DashMap<AlertKey, AlertRecord>,
}

impl AlertRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one evaluation cycle's fired rules for a subject: upsert every
    /// fired condition, retire every previously-active condition that did
    /// not fire, and drop retired records older than the cool-down.
    pub fn apply_cycle(
        &self,
        subject_id: i64,
        fired: &[(String, FiredRule)],
        now: DateTime<Utc>,
        cooldown: Duration,
    ) {
        for (metric, rule) in fired {
            let key = AlertKey {
                subject_id,
                metric: metric.clone(),
                condition: rule.condition,
            };

            // The guard ref must drop before insert touches the same shard
            let refreshed = match self.entries.get_mut(&key) {
                Some(mut record) if record.active => {
                    record.alert.last_triggered_at = now;
                    record.alert.severity = rule.severity;
                    record.alert.message = rule.message.clone();
                    true
                }
                Some(mut record)
                    if record
                        .retired_at
                        .map(|t| now - t <= cooldown)
                        .unwrap_or(false) =>
                {
                    // Re-trigger within the cool-down: reactivate in place
                    debug!(subject_id, metric = %metric, "alert reactivated within cool-down");
                    record.active = true;
                    record.retired_at = None;
                    record.alert.last_triggered_at = now;
                    record.alert.severity = rule.severity;
                    record.alert.message = rule.message.clone();
                    true
                }
                _ => false,
            };

            if !refreshed {
                self.entries.insert(
                    key,
                    AlertRecord {
                        alert: Alert {
                            subject_id,
                            metric: metric.clone(),
                            severity: rule.severity,
                            condition: rule.condition,
                            message: rule.message.clone(),
                            first_triggered_at: now,
                            last_triggered_at: now,
                        },
                        active: true,
                        retired_at: None,
                    },
                );
            }
        }

        // Retire active alerts whose condition did not hold this cycle
        for mut entry in self.entries.iter_mut() {
            if entry.key().subject_id != subject_id || !entry.active {
                continue;
            }
            let held = fired.iter().any(|(metric, rule)| {
                *metric == entry.key().metric && rule.condition == entry.key().condition
            });
            if !held {
                debug!(
                    subject_id,
                    metric = %entry.key().metric,
                    "alert condition cleared, retiring"
                );
                entry.active = false;
                entry.retired_at = Some(now);
            }
        }

        self.entries.retain(|_, record| {
            record.active
                || record
                    .retired_at
                    .map(|t| now - t <= cooldown)
                    .unwrap_or(true)
        });
    }

    /// Active alerts for a subject, most severe first, ties broken by most
    /// recent `last_triggered_at`.
    pub fn active_alerts(&self, subject_id: i64) -> Vec<Alert> {
        let mut alerts: Vec<Alert> = self
            .entries
            .iter()
            .filter(|entry| entry.key().subject_id == subject_id && entry.active)
            .map(|entry| entry.alert.clone())
            .collect();

        alerts.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then(b.last_triggered_at.cmp(&a.last_triggered_at))
        });
        alerts
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
