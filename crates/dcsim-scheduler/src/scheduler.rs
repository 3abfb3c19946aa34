//! Scheduler trait and strategy selection

use dcsim_core::{DcsimResult, Machine, SchedulerKind, WorkloadId, WorkloadPool};

use crate::fifo::FifoScheduler;
use crate::sorting::{RandomPolicy, SortedScheduler, SrtfPolicy};

/// Strategy that distributes eligible workloads over machines for one tick
///
/// Implementations assign machines in place through [`Machine::assign`]. They
/// may reorder or filter `eligible` internally, but must only assign
/// workloads taken from it, and must not touch `dependency_finished`.
pub trait Scheduler: Send {
    /// Name of the strategy, as stored on experiment definitions
    fn name(&self) -> &'static str;

    /// Produce the assignments of the current tick
    fn schedule(
        &mut self,
        machines: &mut [Machine],
        workloads: &mut WorkloadPool,
        eligible: &[WorkloadId],
    ) -> DcsimResult<()>;
}

/// Build the strategy stored on an experiment
///
/// `seed` feeds strategies with randomness so that a rerun of the same
/// experiment reproduces the same assignments.
pub fn build_scheduler(kind: SchedulerKind, seed: u64) -> Box<dyn Scheduler> {
    match kind {
        SchedulerKind::Fifo => Box::new(FifoScheduler),
        SchedulerKind::Srtf => Box::new(SortedScheduler::new(SrtfPolicy)),
        SchedulerKind::Random => Box::new(SortedScheduler::new(RandomPolicy::seeded(seed))),
    }
}
