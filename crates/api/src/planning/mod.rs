//! Scenario planning service.
//!
//! Handlers delegate here for anything that reads a consistent plan
//! snapshot or writes into a scenario. Reads run in a `REPEATABLE READ,
//! READ ONLY` transaction. Writes run at `REPEATABLE READ` too and start by
//! locking the affected scenario rows, so changes to one scenario
//! serialize and a writer that lost the race fails with a retryable
//! conflict.

pub mod merge;
pub mod overlay;
pub mod scenario;
pub mod snapshot;

use sqlx::PgConnection;

use capplan_core::types::DbId;
use capplan_db::models::scenario::Scenario;
use capplan_db::repositories::ScenarioRepo;

use crate::error::{AppError, AppResult};

/// Lock one scenario row for the rest of the transaction.
pub(crate) async fn lock_scenario(conn: &mut PgConnection, id: DbId) -> AppResult<Scenario> {
    ScenarioRepo::lock(conn, id).await?.ok_or_else(|| AppError::not_found("Scenario", id))
}

/// Lock two scenario rows in ascending id order, so concurrent merges in
/// opposite directions cannot deadlock.
pub(crate) async fn lock_pair(conn: &mut PgConnection, a: DbId, b: DbId) -> AppResult<()> {
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    lock_scenario(&mut *conn, first).await?;
    if second != first {
        lock_scenario(&mut *conn, second).await?;
    }
    Ok(())
}
