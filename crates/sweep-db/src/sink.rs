//! Checkpointing into the run database.

use crate::results::save_results;
use sqlx::{Pool, Sqlite};
use sweep_core::{CheckpointSink, Item, ResultTag, RunId, SinkError};

/// [`CheckpointSink`] that writes each snapshot into `run_results`.
///
/// The run row must exist before the first flush (see
/// [`crate::runs::create_or_resume_run`]).
#[derive(Debug, Clone)]
pub struct SqliteSink {
    pool: Pool<Sqlite>,
    run_id: RunId,
    items: Vec<Item>,
}

impl SqliteSink {
    /// Sink for `run_id`; `items` is stored next to each result.
    #[must_use]
    pub fn new(pool: Pool<Sqlite>, run_id: RunId, items: Vec<Item>) -> Self {
        Self {
            pool,
            run_id,
            items,
        }
    }

    /// The run this sink writes to.
    #[must_use]
    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }
}

#[async_trait::async_trait]
impl CheckpointSink for SqliteSink {
    async fn flush(&self, results: &[ResultTag]) -> Result<(), SinkError> {
        save_results(&self.pool, &self.run_id, &self.items, results)
            .await
            .map_err(|e| SinkError::Store(e.to_string()))
    }
}
