//! Shared query parameter types for API handlers.

use serde::Deserialize;

/// Query parameters for list endpoints that support an `include_archived` flag.
#[derive(Debug, Deserialize)]
pub struct IncludeArchivedParams {
    #[serde(default)]
    pub include_archived: bool,
}

/// Query parameters for removing an entity from a scenario.
#[derive(Debug, Deserialize)]
pub struct RemoveOverlayParams {
    pub removed_by: Option<String>,
}
