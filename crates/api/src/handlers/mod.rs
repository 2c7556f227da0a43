pub mod merges;
pub mod overlays;
pub mod scenarios;
