//! dcsim-engine: Tick-driven simulation of one experiment
//!
//! An `Experiment` binds a datacenter, a workload pool and a scheduler, and
//! runs ticks until every workload has completed. Cyclic dependencies,
//! scheduler stalls and contract violations fail the experiment.

pub mod experiment;
pub mod graph;

pub use experiment::{Experiment, ExperimentState, ExperimentSummary};
pub use graph::verify_acyclic;
