//! dcsim-core: Core types for the dcsim datacenter simulator
//!
//! This crate provides the fundamental types used throughout dcsim:
//! - Workloads, machines, datacenters and workload pools
//! - Per-tick history records
//! - Configuration types
//! - Error handling

pub mod config;
pub mod error;
pub mod history;
pub mod model;

pub use config::*;
pub use error::*;
pub use history::*;
pub use model::*;
