//! das-harvest: download every image in a DAS-indexed collection whose
//! metadata carries a given trait.
//!
//! The binary is a thin shell over [`harvest::Harvester`]; the network
//! pieces live in the `das-core` crate.

pub mod config;
pub mod harvest;

pub use config::{Config, Overrides};
pub use harvest::{Harvester, RunSummary};
