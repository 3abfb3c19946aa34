//! Error types for dcsim

use thiserror::Error;

/// Main error type for dcsim
#[derive(Error, Debug)]
pub enum DcsimError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A model definition violates an invariant (empty datacenter, zero-core machine, ...)
    #[error("Invalid model: {0}")]
    Model(String),

    /// A machine was given a second task within one tick
    #[error("Machine {machine_id} is already assigned to workload {workload_id} this tick")]
    MachineAlreadyAssigned {
        /// Stored machine id
        machine_id: i64,
        /// Stored id of the workload the machine is already serving
        workload_id: i64,
    },

    /// The stored scheduler name does not match any known strategy
    #[error("Unknown scheduler: {0}")]
    UnknownScheduler(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for dcsim operations
pub type DcsimResult<T> = Result<T, DcsimError>;

impl From<serde_json::Error> for DcsimError {
    fn from(err: serde_json::Error) -> Self {
        DcsimError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for DcsimError {
    fn from(err: toml::de::Error) -> Self {
        DcsimError::Config(err.to_string())
    }
}

/// Errors that end a single experiment.
///
/// These never abort the worker: the experiment is marked failed and the
/// worker moves on to the next queued id.
#[derive(Error, Debug)]
pub enum SimulationError {
    /// The dependency relation of the workload pool is not a DAG
    #[error("Cyclic dependency among workloads {workloads:?}")]
    CyclicDependency {
        /// Stored ids of the workloads that sit on or behind a cycle
        workloads: Vec<i64>,
    },

    /// A tick produced no assignments while eligible workloads remained
    #[error("Scheduling stalled at tick {tick} with {eligible} eligible workloads")]
    SchedulingStall {
        /// Tick at which no machine was assigned
        tick: u64,
        /// Number of eligible workloads offered to the scheduler
        eligible: usize,
    },

    /// The scheduler produced an assignment the engine cannot accept
    #[error("Scheduler contract violated at tick {tick}: {reason}")]
    SchedulerContract {
        /// Tick of the offending assignment
        tick: u64,
        /// What was wrong
        reason: String,
    },

    /// The experiment had already failed when it was stepped again
    #[error("Experiment already failed: {0}")]
    AlreadyFailed(String),

    /// Model-level failure raised while scheduling
    #[error(transparent)]
    Model(#[from] DcsimError),
}

/// Result type for engine operations
pub type SimulationResult<T> = Result<T, SimulationError>;
