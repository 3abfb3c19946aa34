//! Queue sorting policies layered on top of the FIFO allocation walk

use dcsim_core::{DcsimResult, Machine, WorkloadId, WorkloadPool};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::debug;

use crate::fifo::allocate;
use crate::scheduler::Scheduler;

/// Reorders the eligible queue before machines are handed out
pub trait SortingPolicy: Send {
    /// Name of the resulting strategy
    fn name(&self) -> &'static str;

    /// Reorder `queue` in place
    fn sort(&mut self, queue: &mut [WorkloadId], workloads: &WorkloadPool);
}

/// Shortest remaining work first; ties keep their queue order
pub struct SrtfPolicy;

impl SortingPolicy for SrtfPolicy {
    fn name(&self) -> &'static str {
        "SRTF"
    }

    fn sort(&mut self, queue: &mut [WorkloadId], workloads: &WorkloadPool) {
        queue.sort_by_key(|id| workloads[*id].remaining());
    }
}

/// Seeded shuffle, reproducible for a given seed
pub struct RandomPolicy {
    rng: StdRng,
}

impl RandomPolicy {
    /// Create a policy whose shuffles are determined by `seed`
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl SortingPolicy for RandomPolicy {
    fn name(&self) -> &'static str {
        "RANDOM"
    }

    fn sort(&mut self, queue: &mut [WorkloadId], _workloads: &WorkloadPool) {
        queue.shuffle(&mut self.rng);
    }
}

/// Scheduler that sorts the queue with a policy, then allocates like FIFO
pub struct SortedScheduler<P> {
    policy: P,
}

impl<P: SortingPolicy> SortedScheduler<P> {
    /// Wrap a sorting policy
    pub fn new(policy: P) -> Self {
        Self { policy }
    }
}

impl<P: SortingPolicy> Scheduler for SortedScheduler<P> {
    fn name(&self) -> &'static str {
        self.policy.name()
    }

    fn schedule(
        &mut self,
        machines: &mut [Machine],
        workloads: &mut WorkloadPool,
        eligible: &[WorkloadId],
    ) -> DcsimResult<()> {
        let mut queue = eligible.to_vec();
        self.policy.sort(&mut queue, workloads);

        debug!(
            policy = self.policy.name(),
            queued = queue.len(),
            "Sorted eligible workloads"
        );

        allocate(machines, workloads, &queue)
    }
}
