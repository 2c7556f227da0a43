//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async query methods.
//! Simple lookups accept `&PgPool`; anything that takes part in a planning
//! transaction accepts `&mut PgConnection` so callers can pass `&mut *tx`.

pub mod baseline_repo;
pub mod merge_conflict_repo;
pub mod merge_repo;
pub mod overlay_repo;
pub mod revision_repo;
pub mod scenario_repo;

pub use baseline_repo::BaselineRepo;
pub use merge_conflict_repo::MergeConflictRepo;
pub use merge_repo::MergeRepo;
pub use overlay_repo::OverlayRepo;
pub use revision_repo::RevisionRepo;
pub use scenario_repo::ScenarioRepo;
