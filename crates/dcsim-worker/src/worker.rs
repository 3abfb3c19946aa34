//! Simulation worker
//!
//! The worker repeatedly claims the oldest queued experiment, rebuilds its
//! inputs, simulates it to the end and records the outcome. Failures that
//! belong to a single experiment mark that experiment failed; only store
//! errors stop the worker.

use std::time::Duration;

use dcsim_core::PollConfig;
use dcsim_engine::{Experiment, ExperimentSummary};
use dcsim_scheduler::build_scheduler;
use dcsim_store::{ExperimentQueue, StoreError, StoreResult};
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Outcome of one claimed experiment
#[derive(Debug, Clone)]
pub enum ProcessedExperiment {
    /// Every workload completed
    Finished {
        experiment_id: i64,
        summary: ExperimentSummary,
    },
    /// The experiment was marked failed
    Failed { experiment_id: i64, reason: String },
}

impl ProcessedExperiment {
    /// Id of the processed experiment
    pub fn experiment_id(&self) -> i64 {
        match self {
            ProcessedExperiment::Finished { experiment_id, .. }
            | ProcessedExperiment::Failed { experiment_id, .. } => *experiment_id,
        }
    }
}

/// Counters of a worker run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub finished: u64,
    pub failed: u64,
}

impl WorkerReport {
    /// Number of experiments taken off the queue
    pub fn processed(&self) -> u64 {
        self.finished + self.failed
    }
}

/// A single simulation worker competing for queued experiments
pub struct Worker {
    worker_id: Uuid,
    queue: ExperimentQueue,
    config: PollConfig,
}

impl Worker {
    /// Create a worker with a fresh id
    pub fn new(queue: ExperimentQueue, config: PollConfig) -> Self {
        Self {
            worker_id: Uuid::new_v4(),
            queue,
            config,
        }
    }

    /// Identifier used in this worker's log lines
    pub fn worker_id(&self) -> Uuid {
        self.worker_id
    }

    /// Claim and process the oldest queued experiment
    ///
    /// Returns `None` when the backlog is empty.
    pub async fn process_next(&self) -> StoreResult<Option<ProcessedExperiment>> {
        let Some(experiment_id) = self.queue.next_claimed().await? else {
            return Ok(None);
        };

        info!(
            worker_id = %self.worker_id,
            experiment_id = experiment_id,
            "Processing experiment"
        );

        match self.simulate(experiment_id).await? {
            Ok(summary) => {
                self.queue.finish(experiment_id).await?;
                info!(
                    worker_id = %self.worker_id,
                    experiment_id = experiment_id,
                    ticks = summary.ticks,
                    average_utilization = summary.average_utilization,
                    "Experiment simulated"
                );
                Ok(Some(ProcessedExperiment::Finished {
                    experiment_id,
                    summary,
                }))
            }
            Err(reason) => {
                match self.queue.fail(experiment_id, &reason).await {
                    Ok(()) => {}
                    Err(StoreError::ExperimentNotFound(_)) => {
                        warn!(
                            worker_id = %self.worker_id,
                            experiment_id = experiment_id,
                            "Queued experiment has no stored definition"
                        );
                    }
                    Err(err) => return Err(err),
                }
                warn!(
                    worker_id = %self.worker_id,
                    experiment_id = experiment_id,
                    reason = %reason,
                    "Experiment could not be simulated"
                );
                Ok(Some(ProcessedExperiment::Failed {
                    experiment_id,
                    reason,
                }))
            }
        }
    }

    /// Simulate a claimed experiment and store its history
    ///
    /// The inner error is the reason the experiment failed.
    async fn simulate(&self, experiment_id: i64) -> StoreResult<Result<ExperimentSummary, String>> {
        let definition = match self.queue.hydrate(experiment_id).await {
            Ok(definition) => definition,
            Err(err) if err.is_definition_error() => return Ok(Err(err.to_string())),
            Err(err) => return Err(err),
        };

        debug!(
            worker_id = %self.worker_id,
            experiment_id = experiment_id,
            name = %definition.name,
            scheduler = %definition.scheduler,
            "Hydrated experiment"
        );

        let scheduler = build_scheduler(definition.scheduler, experiment_id as u64);
        let task = tokio::task::spawn_blocking(move || {
            let mut experiment = Experiment::new(
                definition.id,
                definition.datacenter,
                definition.workloads,
                scheduler,
            );
            let outcome = experiment.run().map_err(|e| e.to_string());
            (outcome, experiment.into_history())
        });

        let (outcome, history) = match task.await {
            Ok(result) => result,
            Err(err) => return Ok(Err(format!("simulation task aborted: {}", err))),
        };

        self.queue.write_history(&history).await?;
        Ok(outcome)
    }

    /// Process experiments until shutdown, drain or the configured limit
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> StoreResult<WorkerReport> {
        info!(
            worker_id = %self.worker_id,
            poll_interval_ms = self.config.poll_interval_ms,
            drain = self.config.drain,
            max_experiments = self.config.max_experiments,
            "Starting worker"
        );

        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);
        let mut report = WorkerReport::default();

        loop {
            if *shutdown.borrow() {
                info!(worker_id = %self.worker_id, "Shutdown signal received");
                break;
            }

            if self.config.max_experiments > 0 && report.processed() >= self.config.max_experiments
            {
                info!(
                    worker_id = %self.worker_id,
                    processed = report.processed(),
                    "Experiment limit reached"
                );
                break;
            }

            match self.process_next().await {
                Ok(Some(processed)) => {
                    let experiment_id = processed.experiment_id();
                    match processed {
                        ProcessedExperiment::Finished { summary, .. } => {
                            debug!(
                                worker_id = %self.worker_id,
                                experiment_id = experiment_id,
                                state = %summary.state,
                                "Experiment processed"
                            );
                            report.finished += 1;
                        }
                        ProcessedExperiment::Failed { reason, .. } => {
                            debug!(
                                worker_id = %self.worker_id,
                                experiment_id = experiment_id,
                                reason = %reason,
                                "Experiment processed"
                            );
                            report.failed += 1;
                        }
                    }
                }
                Ok(None) if self.config.drain => {
                    info!(worker_id = %self.worker_id, "Backlog drained");
                    break;
                }
                Ok(None) => {
                    tokio::select! {
                        changed = shutdown.changed() => {
                            if changed.is_err() || *shutdown.borrow() {
                                info!(worker_id = %self.worker_id, "Shutdown signal received during poll wait");
                                break;
                            }
                        }
                        _ = sleep(poll_interval) => {}
                    }
                }
                Err(err) => {
                    warn!(worker_id = %self.worker_id, error = %err, "Worker stopping on store error");
                    return Err(err);
                }
            }
        }

        info!(
            worker_id = %self.worker_id,
            finished = report.finished,
            failed = report.failed,
            "Worker stopped"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use dcsim_core::{Machine, WorkloadSpec};
    use dcsim_store::{
        schema, store_datacenter, store_experiment, store_trace, ExperimentRecord,
        ExperimentStatus, PersistenceGateway, SqliteGateway, Statement,
    };

    async fn queue() -> ExperimentQueue {
        let gateway = SqliteGateway::in_memory().await.unwrap();
        schema::initialize(&gateway).await.unwrap();
        let queue = ExperimentQueue::new(Arc::new(gateway));

        store_datacenter(
            queue.gateway(),
            1,
            &[Machine::new(1, 4), Machine::new(2, 4)],
        )
        .await
        .unwrap();
        store_trace(
            queue.gateway(),
            1,
            &[
                WorkloadSpec::new(1, 8),
                WorkloadSpec::new(2, 12).parallelizable(),
                WorkloadSpec::new(3, 4).depends_on(&[1, 2]),
            ],
        )
        .await
        .unwrap();
        store_trace(
            queue.gateway(),
            2,
            &[
                WorkloadSpec::new(1, 3).depends_on(&[2]),
                WorkloadSpec::new(2, 3).depends_on(&[1]),
            ],
        )
        .await
        .unwrap();
        queue
    }

    async fn submit(queue: &ExperimentQueue, id: i64, trace_id: i64, scheduler: &str) {
        store_experiment(
            queue.gateway(),
            &ExperimentRecord::new(id, &format!("experiment-{}", id), 1, trace_id, scheduler),
        )
        .await
        .unwrap();
        queue.enqueue(id).await.unwrap();
    }

    fn drain_config() -> PollConfig {
        PollConfig {
            poll_interval_ms: 10,
            drain: true,
            max_experiments: 0,
        }
    }

    #[tokio::test]
    async fn test_process_next_finishes_experiment() {
        let queue = queue().await;
        submit(&queue, 1, 1, "FIFO").await;
        let worker = Worker::new(queue.clone(), drain_config());

        let processed = worker.process_next().await.unwrap().unwrap();
        match processed {
            ProcessedExperiment::Finished {
                experiment_id,
                summary,
            } => {
                assert_eq!(experiment_id, 1);
                assert_eq!(summary.scheduler, "FIFO");
                assert!(summary.ticks > 0);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }

        let progress = queue.progress(1).await.unwrap();
        assert_eq!(progress.status, ExperimentStatus::Finished);

        let history = queue.load_history(1).await.unwrap();
        assert!(!history.is_empty());
        assert_eq!(
            progress.last_simulated_tick,
            history.last_tick().unwrap() as i64
        );

        assert!(worker.process_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cyclic_trace_marks_experiment_failed() {
        let queue = queue().await;
        submit(&queue, 4, 2, "SRTF").await;
        let worker = Worker::new(queue.clone(), drain_config());

        let processed = worker.process_next().await.unwrap().unwrap();
        assert!(matches!(
            processed,
            ProcessedExperiment::Failed { experiment_id: 4, .. }
        ));

        let progress = queue.progress(4).await.unwrap();
        assert_eq!(progress.status, ExperimentStatus::Failed);
        assert!(progress.failure_reason.unwrap().contains("Cyclic"));
    }

    #[tokio::test]
    async fn test_unknown_scheduler_marks_experiment_failed() {
        let queue = queue().await;
        submit(&queue, 5, 1, "LIFO").await;
        let worker = Worker::new(queue.clone(), drain_config());

        let processed = worker.process_next().await.unwrap().unwrap();
        match processed {
            ProcessedExperiment::Failed { reason, .. } => assert!(reason.contains("LIFO")),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(queue.load_history(5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_backlog_entry_without_experiment_row() {
        let queue = queue().await;
        queue
            .gateway()
            .execute(
                &Statement::new("INSERT INTO queued_experiments (experiment_id) VALUES (?)")
                    .bind(42i64),
            )
            .await
            .unwrap();
        submit(&queue, 1, 1, "FIFO").await;

        let worker = Worker::new(queue.clone(), drain_config());
        let (_tx, rx) = watch::channel(false);
        let report = worker.run(rx).await.unwrap();

        assert_eq!(report, WorkerReport { finished: 1, failed: 1 });
        assert_eq!(queue.poll_queued().await.unwrap(), None);
        assert!(matches!(
            queue.progress(42).await,
            Err(StoreError::ExperimentNotFound(42))
        ));
    }

    #[tokio::test]
    async fn test_run_drains_mixed_backlog() {
        let queue = queue().await;
        submit(&queue, 1, 1, "FIFO").await;
        submit(&queue, 2, 2, "FIFO").await;
        submit(&queue, 3, 1, "random").await;
        submit(&queue, 4, 1, "LIFO").await;

        let worker = Worker::new(queue.clone(), drain_config());
        let (_tx, rx) = watch::channel(false);
        let report = worker.run(rx).await.unwrap();

        assert_eq!(report, WorkerReport { finished: 2, failed: 2 });
        assert_eq!(queue.poll_queued().await.unwrap(), None);
        assert_eq!(
            queue.progress(3).await.unwrap().status,
            ExperimentStatus::Finished
        );
    }

    #[tokio::test]
    async fn test_run_stops_at_experiment_limit() {
        let queue = queue().await;
        submit(&queue, 1, 1, "FIFO").await;
        submit(&queue, 2, 1, "SRTF").await;

        let worker = Worker::new(
            queue.clone(),
            PollConfig {
                poll_interval_ms: 10,
                drain: false,
                max_experiments: 1,
            },
        );
        let (_tx, rx) = watch::channel(false);
        let report = worker.run(rx).await.unwrap();

        assert_eq!(report.processed(), 1);
        assert_eq!(queue.poll_queued().await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_run_exits_on_shutdown_while_idle() {
        let queue = queue().await;
        let worker = Worker::new(
            queue,
            PollConfig {
                poll_interval_ms: 60_000,
                drain: false,
                max_experiments: 0,
            },
        );

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(async move { worker.run(rx).await });
        tx.send(true).unwrap();

        let report = handle.await.unwrap().unwrap();
        assert_eq!(report.processed(), 0);
    }
}
