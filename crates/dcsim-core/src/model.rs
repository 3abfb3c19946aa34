//! Workload, Machine, Datacenter and WorkloadPool type definitions
//!
//! Machines and workloads live in index-stable arenas ([`Datacenter`] and
//! [`WorkloadPool`]); schedulers and the engine refer to them through
//! [`MachineId`] and [`WorkloadId`] rather than holding references.

use crate::{DcsimError, DcsimResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::{Index, IndexMut};

/// Position of a workload inside its [`WorkloadPool`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkloadId(pub usize);

/// Position of a machine inside its [`Datacenter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MachineId(pub usize);

/// Stored definition of a workload, as read from a trace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadSpec {
    /// Workload id, unique within its trace
    pub id: i64,
    /// Ids of the workloads that must complete first
    pub dependencies: Vec<i64>,
    /// Whether the workload may be spread over several machines in one tick
    pub parallelizable: bool,
    /// Core-ticks needed to complete the workload
    pub work_required: u64,
}

impl WorkloadSpec {
    /// Create a sequential workload spec without dependencies
    pub fn new(id: i64, work_required: u64) -> Self {
        Self {
            id,
            dependencies: Vec::new(),
            parallelizable: false,
            work_required,
        }
    }

    /// Mark the workload as parallelizable
    pub fn parallelizable(mut self) -> Self {
        self.parallelizable = true;
        self
    }

    /// Add prerequisite workloads
    pub fn depends_on(mut self, ids: &[i64]) -> Self {
        self.dependencies.extend_from_slice(ids);
        self
    }
}

/// A simulated unit of work
#[derive(Debug, Clone)]
pub struct Workload {
    /// Workload id from the trace
    pub id: i64,
    /// Whether the workload may be spread over several machines in one tick
    pub parallelizable: bool,
    /// True once every prerequisite has completed
    pub dependency_finished: bool,
    /// Cores allocated to this workload in the current tick
    pub cores_used: u64,
    work_required: u64,
    work_done: u64,
    dependencies: Vec<WorkloadId>,
}

impl Workload {
    /// Prerequisites of this workload
    pub fn dependencies(&self) -> &[WorkloadId] {
        &self.dependencies
    }

    /// Total core-ticks needed
    pub fn work_required(&self) -> u64 {
        self.work_required
    }

    /// Core-ticks received so far, across the whole experiment
    pub fn work_done(&self) -> u64 {
        self.work_done
    }

    /// Core-ticks still missing
    pub fn remaining(&self) -> u64 {
        self.work_required.saturating_sub(self.work_done)
    }

    /// Check whether the required work has been fully served
    pub fn is_complete(&self) -> bool {
        self.work_done >= self.work_required
    }

    /// Check whether the workload may be offered to a scheduler
    pub fn is_eligible(&self) -> bool {
        self.dependency_finished && !self.is_complete()
    }

    /// Credit up to `core_ticks` of work and return how much was actually needed
    pub fn record_work(&mut self, core_ticks: u64) -> u64 {
        let delivered = core_ticks.min(self.remaining());
        self.work_done += delivered;
        delivered
    }
}

/// A simulated machine with a fixed number of cores
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Machine {
    /// Stored machine id
    pub id: i64,
    number_of_cores: u32,
    #[serde(skip)]
    task: Option<WorkloadId>,
}

impl Machine {
    /// Create a new idle machine
    pub fn new(id: i64, number_of_cores: u32) -> Self {
        Self {
            id,
            number_of_cores,
            task: None,
        }
    }

    /// Core capacity, fixed for the experiment
    pub fn number_of_cores(&self) -> u32 {
        self.number_of_cores
    }

    /// Workload served during the current tick, if any
    pub fn task(&self) -> Option<WorkloadId> {
        self.task
    }

    /// Record that this machine serves `workload` for the current tick
    ///
    /// Adds the machine's cores to the workload's `cores_used`. A machine
    /// serves at most one workload per tick; a second assignment is rejected.
    pub fn assign(&mut self, workload_id: WorkloadId, workload: &mut Workload) -> DcsimResult<()> {
        if self.task.is_some() {
            return Err(DcsimError::MachineAlreadyAssigned {
                machine_id: self.id,
                workload_id: workload.id,
            });
        }

        self.task = Some(workload_id);
        workload.cores_used += u64::from(self.number_of_cores);
        Ok(())
    }

    /// Drop the assignment of the previous tick
    pub fn release(&mut self) {
        self.task = None;
    }
}

/// A named, ordered, non-empty collection of machines
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Datacenter {
    /// Stored datacenter id
    pub id: i64,
    machines: Vec<Machine>,
}

impl Datacenter {
    /// Create a datacenter, rejecting empty fleets and zero-core machines
    pub fn new(id: i64, machines: Vec<Machine>) -> DcsimResult<Self> {
        if machines.is_empty() {
            return Err(DcsimError::Model(format!(
                "datacenter {} has no machines",
                id
            )));
        }

        if let Some(machine) = machines.iter().find(|m| m.number_of_cores == 0) {
            return Err(DcsimError::Model(format!(
                "machine {} in datacenter {} has no cores",
                machine.id, id
            )));
        }

        Ok(Self { id, machines })
    }

    /// Machines in their stored order
    pub fn machines(&self) -> &[Machine] {
        &self.machines
    }

    /// Mutable access to the machines, order preserved
    pub fn machines_mut(&mut self) -> &mut [Machine] {
        &mut self.machines
    }

    /// Sum of cores across the fleet; bounds the work schedulable per tick
    pub fn total_cores(&self) -> u64 {
        self.machines
            .iter()
            .map(|m| u64::from(m.number_of_cores))
            .sum()
    }

    /// Clear every machine's assignment
    pub fn release_all(&mut self) {
        for machine in &mut self.machines {
            machine.release();
        }
    }
}

impl Index<MachineId> for Datacenter {
    type Output = Machine;

    fn index(&self, id: MachineId) -> &Machine {
        &self.machines[id.0]
    }
}

/// The full set of workloads of one experiment
#[derive(Debug, Clone)]
pub struct WorkloadPool {
    /// Stored trace id the pool was loaded from
    pub trace_id: i64,
    workloads: Vec<Workload>,
    by_trace_id: HashMap<i64, WorkloadId>,
}

impl WorkloadPool {
    /// Build a pool from trace definitions, resolving dependency ids
    ///
    /// Duplicate ids and dependencies on workloads outside the trace are
    /// rejected. Cycles are not checked here; the engine does that when an
    /// experiment starts.
    pub fn from_specs(trace_id: i64, specs: Vec<WorkloadSpec>) -> DcsimResult<Self> {
        let mut by_trace_id = HashMap::with_capacity(specs.len());
        for (index, spec) in specs.iter().enumerate() {
            if by_trace_id.insert(spec.id, WorkloadId(index)).is_some() {
                return Err(DcsimError::Model(format!(
                    "workload {} appears twice in trace {}",
                    spec.id, trace_id
                )));
            }
        }

        let mut workloads = Vec::with_capacity(specs.len());
        for spec in specs {
            let dependencies = spec
                .dependencies
                .iter()
                .map(|dep| {
                    by_trace_id.get(dep).copied().ok_or_else(|| {
                        DcsimError::Model(format!(
                            "workload {} depends on unknown workload {}",
                            spec.id, dep
                        ))
                    })
                })
                .collect::<DcsimResult<Vec<_>>>()?;

            workloads.push(Workload {
                id: spec.id,
                parallelizable: spec.parallelizable,
                dependency_finished: dependencies.is_empty(),
                cores_used: 0,
                work_required: spec.work_required,
                work_done: 0,
                dependencies,
            });
        }

        Ok(Self {
            trace_id,
            workloads,
            by_trace_id,
        })
    }

    /// Number of workloads
    pub fn len(&self) -> usize {
        self.workloads.len()
    }

    /// Check if the pool holds no workloads
    pub fn is_empty(&self) -> bool {
        self.workloads.is_empty()
    }

    /// Resolve a trace id to its arena position
    pub fn lookup(&self, trace_id: i64) -> Option<WorkloadId> {
        self.by_trace_id.get(&trace_id).copied()
    }

    /// Iterate over workloads in pool order
    pub fn iter(&self) -> impl Iterator<Item = (WorkloadId, &Workload)> {
        self.workloads
            .iter()
            .enumerate()
            .map(|(i, w)| (WorkloadId(i), w))
    }

    /// All arena positions in pool order
    pub fn ids(&self) -> impl Iterator<Item = WorkloadId> {
        (0..self.workloads.len()).map(WorkloadId)
    }

    /// Check whether every workload has completed
    pub fn all_complete(&self) -> bool {
        self.workloads.iter().all(Workload::is_complete)
    }

    /// Set `cores_used` to zero for the given workloads
    pub fn reset_core_usage(&mut self, ids: &[WorkloadId]) {
        for id in ids {
            self.workloads[id.0].cores_used = 0;
        }
    }
}

impl Index<WorkloadId> for WorkloadPool {
    type Output = Workload;

    fn index(&self, id: WorkloadId) -> &Workload {
        &self.workloads[id.0]
    }
}

impl IndexMut<WorkloadId> for WorkloadPool {
    fn index_mut(&mut self, id: WorkloadId) -> &mut Workload {
        &mut self.workloads[id.0]
    }
}
