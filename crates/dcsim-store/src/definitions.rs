//! Writers for experiment input definitions

use dcsim_core::{DcsimError, Machine, WorkloadSpec};
use tracing::debug;

use crate::error::StoreResult;
use crate::gateway::{PersistenceGateway, Statement};

/// Stored experiment definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentRecord {
    /// Experiment id
    pub id: i64,
    /// Human-readable name
    pub name: String,
    /// Datacenter the experiment runs on
    pub datacenter_id: i64,
    /// Trace providing the workloads
    pub trace_id: i64,
    /// Stored scheduler name (e.g. "FIFO")
    pub scheduler_name: String,
}

impl ExperimentRecord {
    /// Create a new experiment record
    pub fn new(id: i64, name: &str, datacenter_id: i64, trace_id: i64, scheduler_name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            datacenter_id,
            trace_id,
            scheduler_name: scheduler_name.to_string(),
        }
    }
}

/// Write the machines of a datacenter, keeping their order
pub async fn store_datacenter(
    gateway: &dyn PersistenceGateway,
    datacenter_id: i64,
    machines: &[Machine],
) -> StoreResult<()> {
    let mut tx = gateway.begin().await?;
    for (position, machine) in machines.iter().enumerate() {
        tx.execute(
            &Statement::new(
                "INSERT INTO machines (datacenter_id, id, position, number_of_cores) VALUES (?, ?, ?, ?)",
            )
            .bind(datacenter_id)
            .bind(machine.id)
            .bind(position as i64)
            .bind(machine.number_of_cores()),
        )
        .await?;
    }
    tx.commit().await?;

    debug!(
        datacenter_id = datacenter_id,
        machines = machines.len(),
        "Stored datacenter"
    );
    Ok(())
}

/// Write the workloads of a trace with their dependencies
pub async fn store_trace(
    gateway: &dyn PersistenceGateway,
    trace_id: i64,
    workloads: &[WorkloadSpec],
) -> StoreResult<()> {
    let mut tx = gateway.begin().await?;
    for (position, spec) in workloads.iter().enumerate() {
        let work_required = i64::try_from(spec.work_required).map_err(|_| {
            DcsimError::Model(format!(
                "workload {} in trace {} needs more work than the store can hold",
                spec.id, trace_id
            ))
        })?;

        tx.execute(
            &Statement::new(
                "INSERT INTO workloads (trace_id, id, position, work_required, parallelizable) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(trace_id)
            .bind(spec.id)
            .bind(position as i64)
            .bind(work_required)
            .bind(spec.parallelizable),
        )
        .await?;

        for dependency in &spec.dependencies {
            tx.execute(
                &Statement::new(
                    "INSERT INTO workload_dependencies (trace_id, workload_id, depends_on) VALUES (?, ?, ?)",
                )
                .bind(trace_id)
                .bind(spec.id)
                .bind(*dependency),
            )
            .await?;
        }
    }
    tx.commit().await?;

    debug!(
        trace_id = trace_id,
        workloads = workloads.len(),
        "Stored trace"
    );
    Ok(())
}

/// Write an experiment definition in the `QUEUED` state
pub async fn store_experiment(
    gateway: &dyn PersistenceGateway,
    record: &ExperimentRecord,
) -> StoreResult<()> {
    gateway
        .execute(
            &Statement::new(
                "INSERT INTO experiments (id, name, datacenter_id, trace_id, scheduler_name) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(record.id)
            .bind(record.name.as_str())
            .bind(record.datacenter_id)
            .bind(record.trace_id)
            .bind(record.scheduler_name.as_str()),
        )
        .await?;

    debug!(experiment_id = record.id, "Stored experiment");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::ColumnType;
    use crate::{schema, SqliteGateway};

    #[tokio::test]
    async fn test_store_trace_writes_dependencies() {
        let gateway = SqliteGateway::in_memory().await.unwrap();
        schema::initialize(&gateway).await.unwrap();

        store_trace(
            &gateway,
            3,
            &[
                WorkloadSpec::new(1, 10),
                WorkloadSpec::new(2, 5).parallelizable().depends_on(&[1]),
            ],
        )
        .await
        .unwrap();

        let rows = gateway
            .query(
                &Statement::new("SELECT workload_id, depends_on FROM workload_dependencies WHERE trace_id = ?")
                    .bind(3i64)
                    .returning(&[ColumnType::Integer, ColumnType::Integer]),
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_i64(0).unwrap(), 2);
        assert_eq!(rows[0].get_i64(1).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_oversized_work_is_rejected() {
        let gateway = SqliteGateway::in_memory().await.unwrap();
        schema::initialize(&gateway).await.unwrap();

        let result = store_trace(
            &gateway,
            3,
            &[WorkloadSpec::new(1, 10), WorkloadSpec::new(2, u64::MAX)],
        )
        .await;
        assert!(matches!(
            result,
            Err(crate::StoreError::Definition(DcsimError::Model(_)))
        ));

        let rows = gateway
            .query(&Statement::new("SELECT id FROM workloads").returning(&[ColumnType::Integer]))
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_machine_rolls_back_datacenter() {
        let gateway = SqliteGateway::in_memory().await.unwrap();
        schema::initialize(&gateway).await.unwrap();

        let result = store_datacenter(
            &gateway,
            1,
            &[Machine::new(1, 4), Machine::new(1, 8)],
        )
        .await;
        assert!(result.is_err());

        let rows = gateway
            .query(&Statement::new("SELECT id FROM machines").returning(&[ColumnType::Integer]))
            .await
            .unwrap();
        assert!(rows.is_empty());
    }
}
