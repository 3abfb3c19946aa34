//! Per-tick history records of an experiment

use serde::{Deserialize, Serialize};

/// What one machine did during a tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineLoad {
    /// Stored machine id
    pub machine_id: i64,
    /// Stored id of the workload served, if the machine was assigned
    pub workload_id: Option<i64>,
    /// Fraction of the machine's cores that did useful work (0.0 - 1.0)
    pub load_fraction: f64,
}

/// What one workload received during a tick
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadProgress {
    /// Stored workload id
    pub workload_id: i64,
    /// Cores allocated to the workload in this tick
    pub cores_received: u64,
    /// Core-ticks still missing after this tick
    pub work_remaining: u64,
}

/// Utilization snapshot of a single tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickSnapshot {
    /// Tick index, starting at zero
    pub tick: u64,
    /// Useful core-ticks over total cores of the datacenter
    pub utilization: f64,
    /// Per-machine load, in machine order
    pub machines: Vec<MachineLoad>,
    /// Workloads that received cores, in eligible-queue order
    pub workloads: Vec<WorkloadProgress>,
}

/// Append-only record of an experiment run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct History {
    /// Experiment the record belongs to
    pub experiment_id: i64,
    ticks: Vec<TickSnapshot>,
}

impl History {
    /// Create an empty history
    pub fn new(experiment_id: i64) -> Self {
        Self {
            experiment_id,
            ticks: Vec::new(),
        }
    }

    /// Append the snapshot of the next tick
    pub fn push(&mut self, snapshot: TickSnapshot) {
        self.ticks.push(snapshot);
    }

    /// Recorded snapshots in tick order
    pub fn ticks(&self) -> &[TickSnapshot] {
        &self.ticks
    }

    /// Number of recorded ticks
    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    /// Check if nothing has been recorded yet
    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    /// Index of the last recorded tick
    pub fn last_tick(&self) -> Option<u64> {
        self.ticks.last().map(|s| s.tick)
    }

    /// Mean utilization over all recorded ticks
    pub fn average_utilization(&self) -> f64 {
        if self.ticks.is_empty() {
            return 0.0;
        }
        self.ticks.iter().map(|s| s.utilization).sum::<f64>() / self.ticks.len() as f64
    }
}
