//! Table layout of the experiment store

use tracing::info;

use crate::error::StoreResult;
use crate::gateway::{PersistenceGateway, Statement};

const TABLES: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS experiments (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        datacenter_id INTEGER NOT NULL,
        trace_id INTEGER NOT NULL,
        scheduler_name TEXT NOT NULL,
        state TEXT NOT NULL DEFAULT 'QUEUED',
        last_simulated_tick INTEGER NOT NULL DEFAULT 0,
        failure_reason TEXT,
        finished_at TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS queued_experiments (
        position INTEGER PRIMARY KEY AUTOINCREMENT,
        experiment_id INTEGER NOT NULL UNIQUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS machines (
        datacenter_id INTEGER NOT NULL,
        id INTEGER NOT NULL,
        position INTEGER NOT NULL,
        number_of_cores INTEGER NOT NULL,
        PRIMARY KEY (datacenter_id, id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS workloads (
        trace_id INTEGER NOT NULL,
        id INTEGER NOT NULL,
        position INTEGER NOT NULL,
        work_required INTEGER NOT NULL,
        parallelizable INTEGER NOT NULL,
        PRIMARY KEY (trace_id, id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS workload_dependencies (
        trace_id INTEGER NOT NULL,
        workload_id INTEGER NOT NULL,
        depends_on INTEGER NOT NULL,
        PRIMARY KEY (trace_id, workload_id, depends_on)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS experiment_history (
        experiment_id INTEGER NOT NULL,
        tick INTEGER NOT NULL,
        utilization REAL NOT NULL,
        snapshot TEXT NOT NULL,
        PRIMARY KEY (experiment_id, tick)
    )
    "#,
];

/// Create every table that does not exist yet
pub async fn initialize(gateway: &dyn PersistenceGateway) -> StoreResult<()> {
    let mut tx = gateway.begin().await?;
    for ddl in TABLES {
        tx.execute(&Statement::new(*ddl)).await?;
    }
    tx.commit().await?;

    info!(tables = TABLES.len(), "Experiment store schema ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::ColumnType;
    use crate::SqliteGateway;

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let gateway = SqliteGateway::in_memory().await.unwrap();

        initialize(&gateway).await.unwrap();
        initialize(&gateway).await.unwrap();

        let rows = gateway
            .query(
                &Statement::new(
                    "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
                )
                .returning(&[ColumnType::Text]),
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), TABLES.len());
    }
}
