use crate::{PipelineError, Reading};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Source of validated readings, implemented by the ingestion collaborator.
///
/// Readings are returned ordered by timestamp ascending. The pipeline never
/// mutates readings; it only derives from them.
#[async_trait]
pub trait ReadingStore: Send + Sync {
    /// All readings for `subject_id` with `timestamp >= since`, ordered by
    /// timestamp ascending.
    async fn readings_since(
        &self,
        subject_id: i64,
        since: DateTime<Utc>,
    ) -> Result<Vec<Reading>, PipelineError>;

    /// Subjects with at least one stored reading.
    async fn subjects(&self) -> Result<Vec<i64>, PipelineError>;
}
