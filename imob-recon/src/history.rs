//! Status history ledger
//!
//! Append-only record of status transitions. A row is written only when
//! the status actually changed, and only after the core status write has
//! committed; failures here are advisory and never abort the update.

use crate::error::UpdateResult;
use sqlx::SqlitePool;
use tracing::{debug, info};

/// Append a history row if the status transitioned. Returns whether a row
/// was written. `old == new` is a no-op; a transition to "no status" is
/// not ledgered (the ledger records arrivals at a status).
pub async fn append_if_changed(
    pool: &SqlitePool,
    imovel_id: i64,
    old_status: Option<i64>,
    new_status: Option<i64>,
    actor: &str,
) -> UpdateResult<bool> {
    let Some(new_status) = new_status else {
        return Ok(false);
    };
    if old_status == Some(new_status) {
        debug!(imovel_id, status = new_status, "Status unchanged, no history row");
        return Ok(false);
    }

    sqlx::query(
        r#"
        INSERT INTO imovel_status (imovel_fk, status_fk, created_by, created_at)
        VALUES (?, ?, ?, datetime('now'))
        "#,
    )
    .bind(imovel_id)
    .bind(new_status)
    .bind(actor)
    .execute(pool)
    .await?;

    info!(imovel_id, from = ?old_status, to = new_status, "Status history appended");
    Ok(true)
}
