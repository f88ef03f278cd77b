//! Index-aligned result storage.
//!
//! Each flush rewrites the whole snapshot inside one transaction, so a
//! reader never sees half of a checkpoint.

use crate::error::{DatabaseError, Result};
use crate::runs::{count_to_i64, get_run};
use chrono::Utc;
use sqlx::{Pool, Row, Sqlite};
use sweep_core::{Item, ResultKind, ResultTag, RunId};

/// Persist a full snapshot of `results` for `run_id`.
///
/// `items` is stored alongside for inspection and may be shorter than
/// `results` (missing items are stored as NULL).
///
/// # Errors
/// Returns `DatabaseError::NotFoundWithMessage` if the run does not exist,
/// or a storage/serialization error. The transaction is rolled back on
/// any failure.
pub async fn save_results(
    pool: &Pool<Sqlite>,
    run_id: &RunId,
    items: &[Item],
    results: &[ResultTag],
) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    let mut tx = pool.begin().await?;

    let touched = sqlx::query("UPDATE runs SET updated_at = ? WHERE id = ?")
        .bind(&now)
        .bind(run_id.as_str())
        .execute(&mut *tx)
        .await?;
    if touched.rows_affected() == 0 {
        return Err(DatabaseError::NotFoundWithMessage(format!(
            "Run '{run_id}' not found"
        )));
    }

    for (idx, result) in results.iter().enumerate() {
        let payload = serde_json::to_string(result)?;
        sqlx::query(
            "INSERT INTO run_results (run_id, idx, item, kind, payload, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(run_id, idx) DO UPDATE SET
                item = excluded.item,
                kind = excluded.kind,
                payload = excluded.payload,
                updated_at = excluded.updated_at",
        )
        .bind(run_id.as_str())
        .bind(count_to_i64(idx))
        .bind(items.get(idx).map(Item::as_str))
        .bind(result.kind().as_str())
        .bind(payload)
        .bind(&now)
        .execute(&mut *tx)
        .await?;
    }

    // A shorter snapshot than last time drops the trailing rows
    sqlx::query("DELETE FROM run_results WHERE run_id = ? AND idx >= ?")
        .bind(run_id.as_str())
        .bind(count_to_i64(results.len()))
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::debug!("Saved {} results for run '{}'", results.len(), run_id);
    Ok(())
}

/// Load the stored results of a run, padded with `Unprocessed` up to the
/// run's `item_count`.
///
/// An unknown run yields an empty list.
///
/// # Errors
/// Returns `DatabaseError` if the query fails or a stored payload cannot
/// be decoded.
pub async fn load_results(pool: &Pool<Sqlite>, run_id: &RunId) -> Result<Vec<ResultTag>> {
    let Some(run) = get_run(pool, run_id).await? else {
        return Ok(Vec::new());
    };

    let rows = sqlx::query("SELECT idx, payload FROM run_results WHERE run_id = ? ORDER BY idx")
        .bind(run_id.as_str())
        .fetch_all(pool)
        .await?;

    let mut results = vec![ResultTag::Unprocessed; run.item_count];
    for row in rows {
        let idx: i64 = row.try_get("idx")?;
        let payload: String = row.try_get("payload")?;
        let Some(slot) = usize::try_from(idx).ok().and_then(|i| results.get_mut(i)) else {
            continue;
        };
        *slot = serde_json::from_str(&payload).map_err(|e| {
            DatabaseError::Decode(format!("invalid result at index {idx} of run '{run_id}': {e}"))
        })?;
    }

    Ok(results)
}

/// The items stored next to each result, padded with empty items up to
/// the run's `item_count`.
///
/// # Errors
/// Returns `DatabaseError` if the query fails.
pub async fn load_items(pool: &Pool<Sqlite>, run_id: &RunId) -> Result<Vec<Item>> {
    let Some(run) = get_run(pool, run_id).await? else {
        return Ok(Vec::new());
    };

    let rows = sqlx::query_as::<_, (i64, Option<String>)>(
        "SELECT idx, item FROM run_results WHERE run_id = ? ORDER BY idx",
    )
    .bind(run_id.as_str())
    .fetch_all(pool)
    .await?;

    let mut items = vec![Item::from(""); run.item_count];
    for (idx, item) in rows {
        let Some(item) = item else { continue };
        if let Some(slot) = usize::try_from(idx).ok().and_then(|i| items.get_mut(i)) {
            *slot = Item::from(item);
        }
    }
    Ok(items)
}

/// Number of stored results of each kind, for summaries.
///
/// # Errors
/// Returns `DatabaseError` if the query fails or a kind is unrecognized.
pub async fn count_by_kind(pool: &Pool<Sqlite>, run_id: &RunId) -> Result<Vec<(ResultKind, u64)>> {
    let rows = sqlx::query_as::<_, (String, i64)>(
        "SELECT kind, COUNT(*) FROM run_results WHERE run_id = ? GROUP BY kind ORDER BY kind",
    )
    .bind(run_id.as_str())
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|(kind, count)| {
            let kind: ResultKind = serde_json::from_str(&format!("\"{kind}\"")).map_err(|e| {
                DatabaseError::Decode(format!("Invalid kind '{kind}' in run_results table: {e}"))
            })?;
            Ok((kind, u64::try_from(count).unwrap_or(0)))
        })
        .collect()
}
