#![forbid(unsafe_code)]
//! hyperdp-core: relation sets, join trees, ids, configs, and errors.
//!
//! Everything here is plain data. Hypergraph construction and the DPhyp
//! search live in `hyperdp-planner`; this crate only defines what they read.

pub mod config;
pub mod error;
pub mod id;
pub mod prelude;
pub mod relset;
pub mod tree;

pub use config::EnumeratorConfig;
pub use error::{Error, Result};
pub use relset::{RelSet, MAX_RELATIONS};
