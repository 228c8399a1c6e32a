use crate::{PipelineError, Reading, ReadingStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory `ReadingStore` for tests and embedded use.
#[derive(Default)]
pub struct MemoryReadingStore {
    inner: RwLock<HashMap<i64, Vec<Reading>>>,
}

impl MemoryReadingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one reading, keeping the per-subject sequence ordered by
    /// timestamp. Equal timestamps keep insertion order, so the most
    /// recently ingested value wins downstream.
    pub fn ingest(&self, reading: Reading) {
        let mut inner = self.inner.write().expect("store lock poisoned");
        let series = inner.entry(reading.subject_id).or_default();
        series.push(reading);
        series.sort_by_key(|r| r.timestamp);
    }

    pub fn ingest_batch(&self, readings: Vec<Reading>) {
        for reading in readings {
            self.ingest(reading);
        }
    }

    pub fn reading_count(&self, subject_id: i64) -> usize {
        self.inner
            .read()
            .expect("store lock poisoned")
            .get(&subject_id)
            .map(|s| s.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl ReadingStore for MemoryReadingStore {
    async fn readings_since(
        &self,
        subject_id: i64,
        since: DateTime<Utc>,
    ) -> Result<Vec<Reading>, PipelineError> {
        let inner = self
            .inner
            .read()
            .map_err(|e| PipelineError::StoreError(e.to_string()))?;

        Ok(inner
            .get(&subject_id)
            .map(|series| {
                series
                    .iter()
                    .filter(|r| r.timestamp >= since)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn subjects(&self) -> Result<Vec<i64>, PipelineError> {
        let inner = self
            .inner
            .read()
            .map_err(|e| PipelineError::StoreError(e.to_string()))?;

        let mut ids: Vec<i64> = inner.keys().copied().collect();
        ids.sort_unstable();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn readings_since_filters_and_orders() {
        let store = MemoryReadingStore::new();
        let now = Utc::now();

        // Ingest out of order
        store.ingest(Reading::new(1, now).with_value("heart_rate", 80.0));
        store.ingest(Reading::new(1, now - Duration::hours(2)).with_value("heart_rate", 70.0));
        store.ingest(Reading::new(1, now - Duration::hours(1)).with_value("heart_rate", 75.0));
        store.ingest(Reading::new(2, now).with_value("heart_rate", 90.0));

        let readings = store
            .readings_since(1, now - Duration::minutes(90))
            .await
            .unwrap();
        assert_eq!(readings.len(), 2);
        assert!(readings[0].timestamp < readings[1].timestamp);

        let subjects = store.subjects().await.unwrap();
        assert_eq!(subjects, vec![1, 2]);
    }

    #[tokio::test]
    async fn unknown_subject_is_empty_not_error() {
        let store = MemoryReadingStore::new();
        let readings = store.readings_since(42, Utc::now()).await.unwrap();
        assert!(readings.is_empty());
    }
}
