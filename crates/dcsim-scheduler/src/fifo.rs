//! First-in-first-out allocation

use dcsim_core::{DcsimResult, Machine, WorkloadId, WorkloadPool};
use tracing::trace;

use crate::scheduler::Scheduler;

/// Distributes machines over eligible workloads in queue order
pub struct FifoScheduler;

impl Scheduler for FifoScheduler {
    fn name(&self) -> &'static str {
        "FIFO"
    }

    fn schedule(
        &mut self,
        machines: &mut [Machine],
        workloads: &mut WorkloadPool,
        eligible: &[WorkloadId],
    ) -> DcsimResult<()> {
        allocate(machines, workloads, eligible)
    }
}

/// Walk the machines in order, handing each to the workload under a cursor
///
/// Workloads whose dependencies are unfinished are dropped from the working
/// set first. A non-parallelizable workload leaves the working set as soon as
/// it gets a machine, so the cursor now points at its successor. A
/// parallelizable workload stays, and the cursor moves on round-robin.
/// Stops when every machine has been visited or the working set is empty.
pub fn allocate(
    machines: &mut [Machine],
    workloads: &mut WorkloadPool,
    queue: &[WorkloadId],
) -> DcsimResult<()> {
    let mut working: Vec<WorkloadId> = queue
        .iter()
        .copied()
        .filter(|id| workloads[*id].dependency_finished)
        .collect();

    if working.is_empty() {
        return Ok(());
    }

    workloads.reset_core_usage(&working);

    let mut cursor = 0;
    for machine in machines.iter_mut() {
        let id = working[cursor];
        machine.assign(id, &mut workloads[id])?;

        trace!(
            machine_id = machine.id,
            workload_id = workloads[id].id,
            cores_used = workloads[id].cores_used,
            "Assigned machine"
        );

        if !workloads[id].parallelizable {
            working.remove(cursor);
            if working.is_empty() {
                break;
            }
            cursor %= working.len();
        } else {
            cursor = (cursor + 1) % working.len();
        }
    }

    Ok(())
}
