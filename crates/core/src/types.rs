/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Value drawn from the global `plan_revision_seq` sequence.
///
/// Every overlay row, every baseline record write and every fork receives a
/// fresh revision, so revisions totally order plan changes.
pub type Revision = i64;
