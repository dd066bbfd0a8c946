//! Core rust implementation of ormopt, a crate for building optimization models whose sets,
//! parameters and variables are declared against relational records.
//!
//! The crate is split into three layers:
//! - [`store`]: typed records, schemas, filtered querysets and the [`store::RecordStore`] trait
//! - [`optimize`]: an abstract/concrete optimization model and solver backends
//! - [`orm`]: the mapping between the two, including index set inference, data projection,
//!   component wrappers, the [`orm::problem::Problem`] orchestrator and the run ledger

pub mod configuration;
pub mod optimize;
pub mod orm;
pub mod store;
