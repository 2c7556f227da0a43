//! Access to `plan_revision_seq`, the global change counter.

use sqlx::PgConnection;

use capplan_core::types::Revision;

pub struct RevisionRepo;

impl RevisionRepo {
    /// Draw the next revision.
    pub async fn next(conn: &mut PgConnection) -> Result<Revision, sqlx::Error> {
        let row: (Revision,) = sqlx::query_as("SELECT nextval('plan_revision_seq')")
            .fetch_one(conn)
            .await?;
        Ok(row.0)
    }
}
