//! Experiment state machine and tick loop

use std::collections::{HashMap, HashSet};

use dcsim_core::{
    Datacenter, History, MachineLoad, SimulationError, SimulationResult, TickSnapshot,
    WorkloadId, WorkloadPool, WorkloadProgress,
};
use dcsim_scheduler::Scheduler;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::graph::verify_acyclic;

/// Lifecycle of an experiment run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperimentState {
    /// Inputs bound, no tick run yet
    Initialized,
    /// Ticks are being simulated
    Running,
    /// Every workload has completed
    Completed,
    /// The run hit a cycle, a stall or a contract violation
    Failed,
}

impl std::fmt::Display for ExperimentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExperimentState::Initialized => write!(f, "Initialized"),
            ExperimentState::Running => write!(f, "Running"),
            ExperimentState::Completed => write!(f, "Completed"),
            ExperimentState::Failed => write!(f, "Failed"),
        }
    }
}

/// Outcome of a completed run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentSummary {
    /// Experiment id
    pub experiment_id: i64,
    /// Strategy the run used
    pub scheduler: String,
    /// Final state
    pub state: ExperimentState,
    /// Number of simulated ticks
    pub ticks: u64,
    /// Mean utilization across ticks
    pub average_utilization: f64,
}

/// One simulation run over a datacenter and a workload pool
pub struct Experiment {
    id: i64,
    datacenter: Datacenter,
    workloads: WorkloadPool,
    scheduler: Box<dyn Scheduler>,
    history: History,
    state: ExperimentState,
    tick: u64,
    /// Eligible workloads in the order they became eligible
    ready: Vec<WorkloadId>,
    entered: Vec<bool>,
    failure: Option<String>,
}

impl Experiment {
    /// Bind the inputs of a run
    pub fn new(
        id: i64,
        datacenter: Datacenter,
        workloads: WorkloadPool,
        scheduler: Box<dyn Scheduler>,
    ) -> Self {
        let entered = vec![false; workloads.len()];
        Self {
            id,
            datacenter,
            workloads,
            scheduler,
            history: History::new(id),
            state: ExperimentState::Initialized,
            tick: 0,
            ready: Vec::new(),
            entered,
            failure: None,
        }
    }

    /// Experiment id
    pub fn id(&self) -> i64 {
        self.id
    }

    /// Current lifecycle state
    pub fn state(&self) -> ExperimentState {
        self.state
    }

    /// Number of ticks simulated so far
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Accumulated history
    pub fn history(&self) -> &History {
        &self.history
    }

    /// Consume the experiment, keeping its history
    pub fn into_history(self) -> History {
        self.history
    }

    /// Simulated machines
    pub fn datacenter(&self) -> &Datacenter {
        &self.datacenter
    }

    /// Simulated workloads
    pub fn workloads(&self) -> &WorkloadPool {
        &self.workloads
    }

    /// Eligible workloads for the next tick, oldest first
    pub fn ready(&self) -> &[WorkloadId] {
        &self.ready
    }

    /// Reason of the failure, once failed
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Summary of the run so far
    pub fn summary(&self) -> ExperimentSummary {
        ExperimentSummary {
            experiment_id: self.id,
            scheduler: self.scheduler.name().to_string(),
            state: self.state,
            ticks: self.tick,
            average_utilization: self.history.average_utilization(),
        }
    }

    /// Run ticks until the experiment completes or fails
    pub fn run(&mut self) -> SimulationResult<ExperimentSummary> {
        loop {
            match self.step()? {
                ExperimentState::Completed => return Ok(self.summary()),
                ExperimentState::Failed => {
                    let reason = self.failure.clone().unwrap_or_default();
                    return Err(SimulationError::AlreadyFailed(reason));
                }
                ExperimentState::Initialized | ExperimentState::Running => {}
            }
        }
    }

    /// Advance by one tick, starting the experiment first if needed
    ///
    /// Any error moves the experiment to `Failed`. Stepping a terminal
    /// experiment returns its state unchanged.
    pub fn step(&mut self) -> SimulationResult<ExperimentState> {
        let result = match self.state {
            ExperimentState::Completed | ExperimentState::Failed => return Ok(self.state),
            ExperimentState::Initialized => self.start(),
            ExperimentState::Running => self.run_tick(),
        };

        if let Err(err) = result {
            warn!(
                experiment_id = self.id,
                tick = self.tick,
                error = %err,
                "Experiment failed"
            );
            self.state = ExperimentState::Failed;
            self.failure = Some(err.to_string());
            return Err(err);
        }

        Ok(self.state)
    }

    fn start(&mut self) -> SimulationResult<()> {
        verify_acyclic(&self.workloads)?;

        info!(
            experiment_id = self.id,
            scheduler = self.scheduler.name(),
            machines = self.datacenter.machines().len(),
            total_cores = self.datacenter.total_cores(),
            workloads = self.workloads.len(),
            "Starting experiment"
        );

        self.state = ExperimentState::Running;
        self.finish_if_complete();
        Ok(())
    }

    fn run_tick(&mut self) -> SimulationResult<()> {
        let tick = self.tick;
        self.refresh_ready();

        let eligible = self.ready.clone();
        if eligible.is_empty() {
            return Err(SimulationError::SchedulingStall { tick, eligible: 0 });
        }

        self.datacenter.release_all();
        let all: Vec<WorkloadId> = self.workloads.ids().collect();
        self.workloads.reset_core_usage(&all);

        self.scheduler
            .schedule(self.datacenter.machines_mut(), &mut self.workloads, &eligible)?;
        self.check_assignments(tick, &eligible)?;

        let total_cores = self.datacenter.total_cores();
        let mut delivered_total = 0u64;
        let mut machines = Vec::with_capacity(self.datacenter.machines().len());
        for machine in self.datacenter.machines() {
            let cores = u64::from(machine.number_of_cores());
            let (workload_id, delivered) = match machine.task() {
                Some(id) => {
                    let delivered = self.workloads[id].record_work(cores);
                    (Some(self.workloads[id].id), delivered)
                }
                None => (None, 0),
            };
            delivered_total += delivered;
            machines.push(MachineLoad {
                machine_id: machine.id,
                workload_id,
                load_fraction: delivered as f64 / cores as f64,
            });
        }

        let workloads = eligible
            .iter()
            .map(|id| &self.workloads[*id])
            .filter(|w| w.cores_used > 0)
            .map(|w| WorkloadProgress {
                workload_id: w.id,
                cores_received: w.cores_used,
                work_remaining: w.remaining(),
            })
            .collect::<Vec<_>>();

        debug!(
            experiment_id = self.id,
            tick = tick,
            eligible = eligible.len(),
            served = workloads.len(),
            delivered = delivered_total,
            "Tick simulated"
        );

        self.history.push(TickSnapshot {
            tick,
            utilization: delivered_total as f64 / total_cores as f64,
            machines,
            workloads,
        });

        self.tick += 1;
        self.finish_if_complete();
        Ok(())
    }

    /// Recompute dependency flags and append newly unlocked workloads
    fn refresh_ready(&mut self) {
        let workloads = &self.workloads;
        self.ready.retain(|id| !workloads[*id].is_complete());

        for id in self.workloads.ids().collect::<Vec<_>>() {
            let finished = self.workloads[id]
                .dependencies()
                .iter()
                .all(|dep| self.workloads[*dep].is_complete());
            self.workloads[id].dependency_finished = finished;

            if finished && !self.entered[id.0] && !self.workloads[id].is_complete() {
                self.entered[id.0] = true;
                self.ready.push(id);
            }
        }
    }

    /// Validate what the scheduler produced for this tick
    fn check_assignments(&self, tick: u64, eligible: &[WorkloadId]) -> SimulationResult<()> {
        let offered: HashSet<WorkloadId> = eligible.iter().copied().collect();
        let mut machines_per_workload: HashMap<WorkloadId, (u32, u64)> = HashMap::new();

        for machine in self.datacenter.machines() {
            let Some(id) = machine.task() else {
                continue;
            };

            if !offered.contains(&id) {
                return Err(SimulationError::SchedulerContract {
                    tick,
                    reason: format!(
                        "machine {} assigned to ineligible workload {}",
                        machine.id, self.workloads[id].id
                    ),
                });
            }

            let entry = machines_per_workload.entry(id).or_insert((0, 0));
            entry.0 += 1;
            entry.1 += u64::from(machine.number_of_cores());
        }

        if machines_per_workload.is_empty() {
            return Err(SimulationError::SchedulingStall {
                tick,
                eligible: eligible.len(),
            });
        }

        for (id, (count, cores)) in machines_per_workload {
            let workload = &self.workloads[id];
            if !workload.parallelizable && count > 1 {
                return Err(SimulationError::SchedulerContract {
                    tick,
                    reason: format!(
                        "sequential workload {} got {} machines",
                        workload.id, count
                    ),
                });
            }
            if workload.cores_used != cores {
                return Err(SimulationError::SchedulerContract {
                    tick,
                    reason: format!(
                        "workload {} reports {} cores but holds {}",
                        workload.id, workload.cores_used, cores
                    ),
                });
            }
        }

        Ok(())
    }

    fn finish_if_complete(&mut self) {
        if self.workloads.all_complete() {
            self.state = ExperimentState::Completed;
            info!(
                experiment_id = self.id,
                ticks = self.tick,
                average_utilization = self.history.average_utilization(),
                "Experiment completed"
            );
        }
    }
}
