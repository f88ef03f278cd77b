//! Run bookkeeping: one row per resumable orchestrator run.

use crate::error::{DatabaseError, Result};
use chrono::{DateTime, Utc};
use sqlx::{Pool, Row, Sqlite};
use sweep_core::RunId;

/// A stored run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    /// Run identifier
    pub id: RunId,
    /// Extractor name the run was started with
    pub extractor: String,
    /// Length of the item list the results are aligned with
    pub item_count: usize,
    /// When the run was first created
    pub created_at: DateTime<Utc>,
    /// Last checkpoint time
    pub updated_at: DateTime<Utc>,
}

/// Create the run, or return the existing one with the same id.
///
/// An existing run keeps its extractor; a different `item_count` is
/// recorded so padding on load tracks the current input length.
///
/// # Errors
/// Returns `DatabaseError::Decode` if the run exists for another
/// extractor, or a storage error.
pub async fn create_or_resume_run(
    pool: &Pool<Sqlite>,
    id: &RunId,
    extractor: &str,
    item_count: usize,
) -> Result<Run> {
    if let Some(mut existing) = get_run(pool, id).await? {
        if existing.extractor != extractor {
            return Err(DatabaseError::Decode(format!(
                "run '{id}' was started with extractor '{}', not '{extractor}'",
                existing.extractor
            )));
        }
        if existing.item_count != item_count {
            tracing::warn!(
                "Run '{}' had {} items, input now has {}",
                id,
                existing.item_count,
                item_count
            );
            sqlx::query("UPDATE runs SET item_count = ? WHERE id = ?")
                .bind(count_to_i64(item_count))
                .bind(id.as_str())
                .execute(pool)
                .await?;
            existing.item_count = item_count;
        }
        tracing::info!("Resuming run '{}'", id);
        return Ok(existing);
    }

    let now = Utc::now();
    sqlx::query(
        "INSERT INTO runs (id, extractor, item_count, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(id.as_str())
    .bind(extractor)
    .bind(count_to_i64(item_count))
    .bind(now.to_rfc3339())
    .bind(now.to_rfc3339())
    .execute(pool)
    .await?;

    tracing::info!("Created run '{}' for {} items", id, item_count);

    Ok(Run {
        id: id.clone(),
        extractor: extractor.to_string(),
        item_count,
        created_at: now,
        updated_at: now,
    })
}

/// Look up a run by id.
///
/// # Errors
/// Returns `DatabaseError` if the query fails or a stored column is malformed.
pub async fn get_run(pool: &Pool<Sqlite>, id: &RunId) -> Result<Option<Run>> {
    let row = sqlx::query(
        "SELECT id, extractor, item_count, created_at, updated_at FROM runs WHERE id = ?",
    )
    .bind(id.as_str())
    .fetch_optional(pool)
    .await?;

    row.map(|row| row_to_run(&row)).transpose()
}

/// All runs, most recently updated first.
///
/// # Errors
/// Returns `DatabaseError` if the query fails or a stored column is malformed.
pub async fn list_runs(pool: &Pool<Sqlite>) -> Result<Vec<Run>> {
    let rows = sqlx::query(
        "SELECT id, extractor, item_count, created_at, updated_at FROM runs
         ORDER BY updated_at DESC",
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_run).collect()
}

/// Delete a run and, by cascade, its results.
///
/// # Errors
/// Returns `DatabaseError::NotFoundWithMessage` if no such run exists.
pub async fn delete_run(pool: &Pool<Sqlite>, id: &RunId) -> Result<()> {
    let result = sqlx::query("DELETE FROM runs WHERE id = ?")
        .bind(id.as_str())
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFoundWithMessage(format!(
            "Run '{id}' not found"
        )));
    }
    Ok(())
}

pub(crate) fn count_to_i64(count: usize) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

fn row_to_run(row: &sqlx::sqlite::SqliteRow) -> Result<Run> {
    let id: String = row.try_get("id")?;
    let id = RunId::new(id).map_err(|e| DatabaseError::Decode(e.to_string()))?;
    let item_count: i64 = row.try_get("item_count")?;
    let item_count = usize::try_from(item_count)
        .map_err(|_| DatabaseError::Decode(format!("negative item_count {item_count}")))?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(Run {
        id,
        extractor: row.try_get("extractor")?,
        item_count,
        created_at: parse_time(&created_at)?,
        updated_at: parse_time(&updated_at)?,
    })
}

fn parse_time(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::Decode(format!("invalid timestamp '{value}': {e}")))
}
