//! Dependency graph checks

use dcsim_core::{SimulationError, SimulationResult, WorkloadPool};
use std::collections::VecDeque;

/// Verify that the dependency relation of `pool` is acyclic
///
/// Runs Kahn's algorithm over arena positions. Workloads left unordered sit
/// on a cycle or depend on one; their stored ids are reported.
pub fn verify_acyclic(pool: &WorkloadPool) -> SimulationResult<()> {
    let mut pending: Vec<usize> = vec![0; pool.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); pool.len()];

    for (id, workload) in pool.iter() {
        pending[id.0] = workload.dependencies().len();
        for dependency in workload.dependencies() {
            dependents[dependency.0].push(id.0);
        }
    }

    let mut ready: VecDeque<usize> = pending
        .iter()
        .enumerate()
        .filter(|(_, count)| **count == 0)
        .map(|(index, _)| index)
        .collect();

    let mut ordered = 0;
    while let Some(index) = ready.pop_front() {
        ordered += 1;
        for &dependent in &dependents[index] {
            pending[dependent] -= 1;
            if pending[dependent] == 0 {
                ready.push_back(dependent);
            }
        }
    }

    if ordered == pool.len() {
        return Ok(());
    }

    let workloads = pool
        .iter()
        .filter(|(id, _)| pending[id.0] > 0)
        .map(|(_, w)| w.id)
        .collect();

    Err(SimulationError::CyclicDependency { workloads })
}
