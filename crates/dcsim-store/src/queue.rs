//! Experiment queue shared by simulation workers
//!
//! Presence of an id in `queued_experiments` means the experiment is waiting.
//! A worker claims an id by deleting its backlog row inside a transaction; the
//! delete succeeds for exactly one claimant, every other claimant sees zero
//! affected rows and goes back to polling. Completion is recorded separately
//! on the experiment row so that it can be repeated safely.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use dcsim_core::{
    Datacenter, DcsimError, History, Machine, SchedulerKind, TickSnapshot, WorkloadPool,
    WorkloadSpec,
};
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::gateway::{ColumnType, PersistenceGateway, Statement};

/// Result of a claim attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// This worker now exclusively owns the experiment
    Claimed,
    /// Another worker removed the entry first
    Missed,
}

/// Persisted lifecycle of an experiment row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExperimentStatus {
    Queued,
    Simulating,
    Finished,
    Failed,
}

impl ExperimentStatus {
    /// Stored text of the state
    pub fn as_str(&self) -> &'static str {
        match self {
            ExperimentStatus::Queued => "QUEUED",
            ExperimentStatus::Simulating => "SIMULATING",
            ExperimentStatus::Finished => "FINISHED",
            ExperimentStatus::Failed => "FAILED",
        }
    }
}

impl FromStr for ExperimentStatus {
    type Err = DcsimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "QUEUED" => Ok(ExperimentStatus::Queued),
            "SIMULATING" => Ok(ExperimentStatus::Simulating),
            "FINISHED" => Ok(ExperimentStatus::Finished),
            "FAILED" => Ok(ExperimentStatus::Failed),
            other => Err(DcsimError::Model(format!("unknown experiment state {}", other))),
        }
    }
}

impl fmt::Display for ExperimentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted bookkeeping of one experiment
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentProgress {
    /// Lifecycle state
    pub status: ExperimentStatus,
    /// Last tick written to the history
    pub last_simulated_tick: i64,
    /// Why the experiment failed, if it did
    pub failure_reason: Option<String>,
    /// RFC 3339 timestamp of the first finish or failure
    pub finished_at: Option<String>,
}

/// Inputs of an experiment reconstructed from the store
#[derive(Debug, Clone)]
pub struct ExperimentDefinition {
    /// Experiment id
    pub id: i64,
    /// Human-readable name
    pub name: String,
    /// Machines to simulate
    pub datacenter: Datacenter,
    /// Workloads to run
    pub workloads: WorkloadPool,
    /// Strategy to schedule with
    pub scheduler: SchedulerKind,
}

/// Claim protocol over the shared backlog of queued experiments
#[derive(Clone)]
pub struct ExperimentQueue {
    gateway: Arc<dyn PersistenceGateway>,
}

impl ExperimentQueue {
    /// Create a queue on top of a gateway
    pub fn new(gateway: Arc<dyn PersistenceGateway>) -> Self {
        Self { gateway }
    }

    /// Gateway the queue runs on
    pub fn gateway(&self) -> &dyn PersistenceGateway {
        self.gateway.as_ref()
    }

    /// Append an experiment id to the backlog
    ///
    /// The experiment must already be stored; unknown ids are rejected and
    /// nothing is queued.
    pub async fn enqueue(&self, experiment_id: i64) -> StoreResult<()> {
        let mut tx = self.gateway.begin().await?;
        let updated = tx
            .execute(
                &Statement::new("UPDATE experiments SET state = ? WHERE id = ?")
                    .bind(ExperimentStatus::Queued.as_str())
                    .bind(experiment_id),
            )
            .await?;

        if updated == 0 {
            tx.rollback().await?;
            return Err(StoreError::ExperimentNotFound(experiment_id));
        }

        tx.execute(
            &Statement::new("INSERT OR IGNORE INTO queued_experiments (experiment_id) VALUES (?)")
                .bind(experiment_id),
        )
        .await?;
        tx.commit().await?;

        debug!(experiment_id = experiment_id, "Experiment queued");
        Ok(())
    }

    /// Oldest queued experiment id, without changing anything
    pub async fn poll_queued(&self) -> StoreResult<Option<i64>> {
        let rows = self
            .gateway
            .query(
                &Statement::new(
                    "SELECT experiment_id FROM queued_experiments ORDER BY position LIMIT 1",
                )
                .returning(&[ColumnType::Integer]),
            )
            .await?;

        rows.first().map(|row| row.get_i64(0)).transpose()
    }

    /// Take exclusive ownership of a queued experiment
    ///
    /// The backlog row is deleted and the experiment marked `SIMULATING` in
    /// one transaction. If the row is already gone the transaction is rolled
    /// back and [`ClaimOutcome::Missed`] returned.
    pub async fn claim(&self, experiment_id: i64) -> StoreResult<ClaimOutcome> {
        let mut tx = self.gateway.begin().await?;

        let removed = tx
            .execute(
                &Statement::new("DELETE FROM queued_experiments WHERE experiment_id = ?")
                    .bind(experiment_id),
            )
            .await?;

        if removed == 0 {
            tx.rollback().await?;
            debug!(experiment_id = experiment_id, "Claim missed");
            return Ok(ClaimOutcome::Missed);
        }

        tx.execute(
            &Statement::new("UPDATE experiments SET state = ? WHERE id = ?")
                .bind(ExperimentStatus::Simulating.as_str())
                .bind(experiment_id),
        )
        .await?;
        tx.commit().await?;

        info!(experiment_id = experiment_id, "Experiment claimed");
        Ok(ClaimOutcome::Claimed)
    }

    /// Poll and claim until an experiment is owned or the backlog is empty
    pub async fn next_claimed(&self) -> StoreResult<Option<i64>> {
        while let Some(experiment_id) = self.poll_queued().await? {
            match self.claim(experiment_id).await? {
                ClaimOutcome::Claimed => return Ok(Some(experiment_id)),
                ClaimOutcome::Missed => continue,
            }
        }
        Ok(None)
    }

    /// Rebuild the inputs of an experiment from its stored definitions
    pub async fn hydrate(&self, experiment_id: i64) -> StoreResult<ExperimentDefinition> {
        let rows = self
            .gateway
            .query(
                &Statement::new(
                    "SELECT name, datacenter_id, trace_id, scheduler_name FROM experiments WHERE id = ?",
                )
                .bind(experiment_id)
                .returning(&[
                    ColumnType::Text,
                    ColumnType::Integer,
                    ColumnType::Integer,
                    ColumnType::Text,
                ]),
            )
            .await?;

        let row = rows
            .first()
            .ok_or(StoreError::ExperimentNotFound(experiment_id))?;
        let name = row.get_text(0)?.to_string();
        let datacenter_id = row.get_i64(1)?;
        let trace_id = row.get_i64(2)?;
        let scheduler: SchedulerKind = row.get_text(3)?.parse()?;

        let datacenter = self.load_datacenter(datacenter_id).await?;
        let workloads = self.load_workloads(trace_id).await?;

        debug!(
            experiment_id = experiment_id,
            datacenter_id = datacenter_id,
            trace_id = trace_id,
            scheduler = %scheduler,
            "Experiment hydrated"
        );

        Ok(ExperimentDefinition {
            id: experiment_id,
            name,
            datacenter,
            workloads,
            scheduler,
        })
    }

    async fn load_datacenter(&self, datacenter_id: i64) -> StoreResult<Datacenter> {
        let rows = self
            .gateway
            .query(
                &Statement::new(
                    "SELECT id, number_of_cores FROM machines WHERE datacenter_id = ? ORDER BY position, id",
                )
                .bind(datacenter_id)
                .returning(&[ColumnType::Integer, ColumnType::Integer]),
            )
            .await?;

        let machines = rows
            .iter()
            .map(|row| {
                let cores = u32::try_from(row.get_i64(1)?).map_err(|_| StoreError::Decode {
                    column: 1,
                    expected: "a core count",
                })?;
                Ok(Machine::new(row.get_i64(0)?, cores))
            })
            .collect::<StoreResult<Vec<_>>>()?;

        Ok(Datacenter::new(datacenter_id, machines)?)
    }

    async fn load_workloads(&self, trace_id: i64) -> StoreResult<WorkloadPool> {
        let rows = self
            .gateway
            .query(
                &Statement::new(
                    "SELECT id, work_required, parallelizable FROM workloads WHERE trace_id = ? ORDER BY position, id",
                )
                .bind(trace_id)
                .returning(&[ColumnType::Integer, ColumnType::Integer, ColumnType::Integer]),
            )
            .await?;

        let mut specs = rows
            .iter()
            .map(|row| {
                let work_required =
                    u64::try_from(row.get_i64(1)?).map_err(|_| StoreError::Decode {
                        column: 1,
                        expected: "a work amount",
                    })?;
                Ok(WorkloadSpec {
                    id: row.get_i64(0)?,
                    dependencies: Vec::new(),
                    parallelizable: row.get_bool(2)?,
                    work_required,
                })
            })
            .collect::<StoreResult<Vec<_>>>()?;

        let dependencies = self
            .gateway
            .query(
                &Statement::new(
                    "SELECT workload_id, depends_on FROM workload_dependencies WHERE trace_id = ? ORDER BY workload_id, depends_on",
                )
                .bind(trace_id)
                .returning(&[ColumnType::Integer, ColumnType::Integer]),
            )
            .await?;

        let positions: HashMap<i64, usize> = specs
            .iter()
            .enumerate()
            .map(|(index, spec)| (spec.id, index))
            .collect();

        for row in &dependencies {
            let workload_id = row.get_i64(0)?;
            let depends_on = row.get_i64(1)?;
            match positions.get(&workload_id) {
                Some(&index) => specs[index].dependencies.push(depends_on),
                None => {
                    return Err(DcsimError::Model(format!(
                        "dependency recorded for unknown workload {} in trace {}",
                        workload_id, trace_id
                    ))
                    .into())
                }
            }
        }

        Ok(WorkloadPool::from_specs(trace_id, specs)?)
    }

    /// Mark a claimed experiment as finished
    ///
    /// Repeating the call leaves the stored state unchanged.
    pub async fn finish(&self, experiment_id: i64) -> StoreResult<()> {
        let updated = self
            .gateway
            .execute(
                &Statement::new(
                    "UPDATE experiments SET state = ?, finished_at = COALESCE(finished_at, ?) WHERE id = ?",
                )
                .bind(ExperimentStatus::Finished.as_str())
                .bind(Utc::now().to_rfc3339())
                .bind(experiment_id),
            )
            .await?;

        if updated == 0 {
            return Err(StoreError::ExperimentNotFound(experiment_id));
        }

        info!(experiment_id = experiment_id, "Experiment finished");
        Ok(())
    }

    /// Mark a claimed experiment as failed, keeping the first reason recorded
    pub async fn fail(&self, experiment_id: i64, reason: &str) -> StoreResult<()> {
        let updated = self
            .gateway
            .execute(
                &Statement::new(
                    "UPDATE experiments SET state = ?, failure_reason = COALESCE(failure_reason, ?), finished_at = COALESCE(finished_at, ?) WHERE id = ?",
                )
                .bind(ExperimentStatus::Failed.as_str())
                .bind(reason)
                .bind(Utc::now().to_rfc3339())
                .bind(experiment_id),
            )
            .await?;

        if updated == 0 {
            return Err(StoreError::ExperimentNotFound(experiment_id));
        }

        warn!(experiment_id = experiment_id, reason = reason, "Experiment failed");
        Ok(())
    }

    /// Append the history of a run; ticks already stored are left untouched
    ///
    /// Returns the number of tick rows written.
    pub async fn write_history(&self, history: &History) -> StoreResult<u64> {
        let mut tx = self.gateway.begin().await?;

        let mut written = 0;
        for snapshot in history.ticks() {
            written += tx
                .execute(
                    &Statement::new(
                        "INSERT OR IGNORE INTO experiment_history (experiment_id, tick, utilization, snapshot) VALUES (?, ?, ?, ?)",
                    )
                    .bind(history.experiment_id)
                    .bind(snapshot.tick as i64)
                    .bind(snapshot.utilization)
                    .bind(serde_json::to_string(snapshot)?),
                )
                .await?;
        }

        if let Some(last_tick) = history.last_tick() {
            tx.execute(
                &Statement::new(
                    "UPDATE experiments SET last_simulated_tick = MAX(last_simulated_tick, ?) WHERE id = ?",
                )
                .bind(last_tick as i64)
                .bind(history.experiment_id),
            )
            .await?;
        }

        tx.commit().await?;

        debug!(
            experiment_id = history.experiment_id,
            ticks = history.len(),
            written = written,
            "History written"
        );
        Ok(written)
    }

    /// Read back the stored history of an experiment, in tick order
    pub async fn load_history(&self, experiment_id: i64) -> StoreResult<History> {
        let rows = self
            .gateway
            .query(
                &Statement::new(
                    "SELECT snapshot FROM experiment_history WHERE experiment_id = ? ORDER BY tick",
                )
                .bind(experiment_id)
                .returning(&[ColumnType::Text]),
            )
            .await?;

        let mut history = History::new(experiment_id);
        for row in &rows {
            let snapshot: TickSnapshot = serde_json::from_str(row.get_text(0)?)?;
            history.push(snapshot);
        }
        Ok(history)
    }

    /// Stored bookkeeping of an experiment
    pub async fn progress(&self, experiment_id: i64) -> StoreResult<ExperimentProgress> {
        let rows = self
            .gateway
            .query(
                &Statement::new(
                    "SELECT state, last_simulated_tick, failure_reason, finished_at FROM experiments WHERE id = ?",
                )
                .bind(experiment_id)
                .returning(&[
                    ColumnType::Text,
                    ColumnType::Integer,
                    ColumnType::Text,
                    ColumnType::Text,
                ]),
            )
            .await?;

        let row = rows
            .first()
            .ok_or(StoreError::ExperimentNotFound(experiment_id))?;

        Ok(ExperimentProgress {
            status: row.get_text(0)?.parse()?,
            last_simulated_tick: row.get_i64(1)?,
            failure_reason: row.get_opt_text(2)?.map(str::to_string),
            finished_at: row.get_opt_text(3)?.map(str::to_string),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definitions::{store_datacenter, store_experiment, store_trace, ExperimentRecord};
    use crate::{schema, SqliteGateway};
    use dcsim_core::{MachineLoad, WorkloadId};

    async fn queue() -> ExperimentQueue {
        let gateway = SqliteGateway::in_memory().await.unwrap();
        schema::initialize(&gateway).await.unwrap();
        ExperimentQueue::new(Arc::new(gateway))
    }

    async fn seed(queue: &ExperimentQueue, ids: &[i64]) {
        let gateway = queue.gateway();
        store_datacenter(gateway, 1, &[Machine::new(10, 4), Machine::new(11, 4)])
            .await
            .unwrap();
        store_trace(
            gateway,
            1,
            &[
                WorkloadSpec::new(1, 8),
                WorkloadSpec::new(2, 12).parallelizable(),
                WorkloadSpec::new(3, 4).depends_on(&[1, 2]),
            ],
        )
        .await
        .unwrap();
        for id in ids {
            store_experiment(
                gateway,
                &ExperimentRecord::new(*id, &format!("experiment-{}", id), 1, 1, "FIFO"),
            )
            .await
            .unwrap();
            queue.enqueue(*id).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_poll_follows_arrival_order() {
        let queue = queue().await;
        seed(&queue, &[5, 7, 9]).await;

        assert_eq!(queue.poll_queued().await.unwrap(), Some(5));
        assert_eq!(queue.poll_queued().await.unwrap(), Some(5));

        assert_eq!(queue.claim(5).await.unwrap(), ClaimOutcome::Claimed);
        assert_eq!(queue.poll_queued().await.unwrap(), Some(7));

        assert_eq!(queue.claim(9).await.unwrap(), ClaimOutcome::Claimed);
        assert_eq!(queue.poll_queued().await.unwrap(), Some(7));
    }

    #[tokio::test]
    async fn test_arrival_order_is_not_id_order() {
        let queue = queue().await;
        seed(&queue, &[9, 5]).await;

        assert_eq!(queue.next_claimed().await.unwrap(), Some(9));
        assert_eq!(queue.next_claimed().await.unwrap(), Some(5));
        assert_eq!(queue.next_claimed().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_empty_backlog_polls_none() {
        let queue = queue().await;
        assert_eq!(queue.poll_queued().await.unwrap(), None);
        assert_eq!(queue.next_claimed().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_second_claim_misses() {
        let queue = queue().await;
        seed(&queue, &[5]).await;

        assert_eq!(queue.claim(5).await.unwrap(), ClaimOutcome::Claimed);
        assert_eq!(queue.claim(5).await.unwrap(), ClaimOutcome::Missed);

        let progress = queue.progress(5).await.unwrap();
        assert_eq!(progress.status, ExperimentStatus::Simulating);
    }

    #[tokio::test]
    async fn test_concurrent_claims_exactly_one_wins() {
        let queue = queue().await;
        seed(&queue, &[5]).await;
        let other = queue.clone();

        let (first, second) = tokio::join!(queue.claim(5), other.claim(5));
        let outcomes = [first.unwrap(), second.unwrap()];

        let claimed = outcomes
            .iter()
            .filter(|o| **o == ClaimOutcome::Claimed)
            .count();
        assert_eq!(claimed, 1);
        assert!(outcomes.contains(&ClaimOutcome::Missed));
    }

    #[tokio::test]
    async fn test_many_workers_drain_backlog_once() {
        let queue = queue().await;
        let ids: Vec<i64> = (1..=12).collect();
        seed(&queue, &ids).await;

        let mut handles = Vec::new();
        for _ in 0..4 {
            let worker = queue.clone();
            handles.push(tokio::spawn(async move {
                let mut owned = Vec::new();
                while let Some(id) = worker.next_claimed().await.unwrap() {
                    owned.push(id);
                }
                owned
            }));
        }

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.await.unwrap());
        }
        all.sort();
        assert_eq!(all, ids);
    }

    #[tokio::test]
    async fn test_enqueue_rejects_unknown_experiment() {
        let queue = queue().await;

        let err = queue.enqueue(42).await.unwrap_err();
        assert!(matches!(err, StoreError::ExperimentNotFound(42)));
        assert_eq!(queue.poll_queued().await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_claims_race_across_connections() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("queue.db").display());

        let first = SqliteGateway::connect(&url, 2).await.unwrap();
        schema::initialize(&first).await.unwrap();
        let first = ExperimentQueue::new(Arc::new(first));
        let ids: Vec<i64> = (1..=30).collect();
        seed(&first, &ids).await;

        let second = ExperimentQueue::new(Arc::new(SqliteGateway::connect(&url, 2).await.unwrap()));

        let mut handles = Vec::new();
        for queue in [first.clone(), second.clone(), first, second] {
            handles.push(tokio::spawn(async move {
                let mut owned = Vec::new();
                while let Some(id) = queue.next_claimed().await.unwrap() {
                    owned.push(id);
                }
                owned
            }));
        }

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.await.unwrap());
        }
        all.sort();
        assert_eq!(all, ids);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_same_id_claimed_once_across_connections() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("queue.db").display());

        let first = SqliteGateway::connect(&url, 1).await.unwrap();
        schema::initialize(&first).await.unwrap();
        let first = ExperimentQueue::new(Arc::new(first));
        seed(&first, &[5]).await;
        let second = ExperimentQueue::new(Arc::new(SqliteGateway::connect(&url, 1).await.unwrap()));

        let a = tokio::spawn(async move { first.claim(5).await.unwrap() });
        let b = tokio::spawn(async move { second.claim(5).await.unwrap() });
        let outcomes = [a.await.unwrap(), b.await.unwrap()];

        assert!(outcomes.contains(&ClaimOutcome::Claimed));
        assert!(outcomes.contains(&ClaimOutcome::Missed));
    }

    #[tokio::test]
    async fn test_hydrate_rebuilds_inputs() {
        let queue = queue().await;
        seed(&queue, &[5]).await;

        let definition = queue.hydrate(5).await.unwrap();
        let again = queue.hydrate(5).await.unwrap();

        assert_eq!(definition.name, "experiment-5");
        assert_eq!(definition.scheduler, SchedulerKind::Fifo);
        assert_eq!(definition.datacenter.total_cores(), 8);
        assert_eq!(definition.datacenter.machines()[0].id, 10);
        assert_eq!(definition.workloads.len(), 3);
        assert!(definition.workloads[WorkloadId(1)].parallelizable);
        assert_eq!(
            definition.workloads[WorkloadId(2)].dependencies(),
            &[WorkloadId(0), WorkloadId(1)]
        );
        assert_eq!(again.workloads.len(), definition.workloads.len());
    }

    #[tokio::test]
    async fn test_hydrate_unknown_experiment() {
        let queue = queue().await;
        let err = queue.hydrate(42).await.unwrap_err();
        assert!(matches!(err, StoreError::ExperimentNotFound(42)));
    }

    #[tokio::test]
    async fn test_hydrate_unknown_scheduler() {
        let queue = queue().await;
        seed(&queue, &[]).await;
        store_experiment(
            queue.gateway(),
            &ExperimentRecord::new(6, "odd", 1, 1, "LIFO"),
        )
        .await
        .unwrap();

        let err = queue.hydrate(6).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Definition(DcsimError::UnknownScheduler(_))
        ));
        assert!(err.is_definition_error());
    }

    #[tokio::test]
    async fn test_hydrate_empty_datacenter() {
        let queue = queue().await;
        seed(&queue, &[]).await;
        store_experiment(
            queue.gateway(),
            &ExperimentRecord::new(6, "nowhere", 99, 1, "FIFO"),
        )
        .await
        .unwrap();

        let err = queue.hydrate(6).await.unwrap_err();
        assert!(matches!(err, StoreError::Definition(DcsimError::Model(_))));
    }

    #[tokio::test]
    async fn test_finish_is_idempotent() {
        let queue = queue().await;
        seed(&queue, &[5]).await;
        queue.claim(5).await.unwrap();

        queue.finish(5).await.unwrap();
        let once = queue.progress(5).await.unwrap();
        queue.finish(5).await.unwrap();
        let twice = queue.progress(5).await.unwrap();

        assert_eq!(once.status, ExperimentStatus::Finished);
        assert!(once.finished_at.is_some());
        assert_eq!(once, twice);
    }

    #[tokio::test]
    async fn test_finish_unknown_experiment() {
        let queue = queue().await;
        assert!(matches!(
            queue.finish(3).await,
            Err(StoreError::ExperimentNotFound(3))
        ));
    }

    #[tokio::test]
    async fn test_fail_keeps_first_reason() {
        let queue = queue().await;
        seed(&queue, &[5]).await;
        queue.claim(5).await.unwrap();

        queue.fail(5, "cycle").await.unwrap();
        queue.fail(5, "something else").await.unwrap();

        let progress = queue.progress(5).await.unwrap();
        assert_eq!(progress.status, ExperimentStatus::Failed);
        assert_eq!(progress.failure_reason.as_deref(), Some("cycle"));
    }

    #[tokio::test]
    async fn test_write_history_appends_only() {
        let queue = queue().await;
        seed(&queue, &[5]).await;

        let snapshot = |tick: u64, utilization: f64| TickSnapshot {
            tick,
            utilization,
            machines: vec![MachineLoad {
                machine_id: 10,
                workload_id: Some(1),
                load_fraction: utilization,
            }],
            workloads: Vec::new(),
        };

        let mut history = History::new(5);
        history.push(snapshot(0, 1.0));
        history.push(snapshot(1, 0.5));
        assert_eq!(queue.write_history(&history).await.unwrap(), 2);

        let mut replay = History::new(5);
        replay.push(snapshot(0, 0.0));
        replay.push(snapshot(1, 0.0));
        replay.push(snapshot(2, 0.25));
        assert_eq!(queue.write_history(&replay).await.unwrap(), 1);

        let stored = queue.load_history(5).await.unwrap();
        assert_eq!(stored.len(), 3);
        assert_eq!(stored.ticks()[0], snapshot(0, 1.0));
        assert_eq!(stored.ticks()[2], snapshot(2, 0.25));
        assert_eq!(queue.progress(5).await.unwrap().last_simulated_tick, 2);
    }
}
