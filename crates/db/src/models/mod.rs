//! Row structs and DTOs.
//!
//! Each submodule contains a `FromRow` + `Serialize` struct per table plus
//! the `Deserialize` inputs the API accepts, and the conversions into the
//! pure types of `capplan_core`.

pub mod baseline;
pub mod merge;
pub mod overlay;
pub mod scenario;
