//! Domain core for scenario-based capacity planning.
//!
//! Everything in this crate is pure: it operates on an in-memory snapshot
//! of scenarios, baseline records and overlays ([`resolver::PlanData`]) and
//! never touches the database. Persistence lives in `capplan-db`; the HTTP
//! surface and transactional orchestration live in `capplan-api`.

pub mod comparison;
pub mod conflict;
pub mod error;
pub mod merge;
pub mod overlay;
pub mod resolver;
pub mod scenario;
pub mod types;

#[cfg(test)]
mod test_support;
