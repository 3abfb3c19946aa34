//! SQLite-backed persistence gateway

use async_trait::async_trait;
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Transaction};
use tracing::{debug, info};

use crate::error::StoreResult;
use crate::gateway::{
    ColumnType, GatewayTransaction, PersistenceGateway, ResultRow, Statement, Value,
};

/// Gateway over a pooled SQLite database
#[derive(Clone)]
pub struct SqliteGateway {
    pool: SqlitePool,
}

impl SqliteGateway {
    /// Connect to the database at `url`
    pub async fn connect(url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;

        info!(
            url = url,
            max_connections = max_connections,
            "Connected to experiment store"
        );

        Ok(Self { pool })
    }

    /// Private in-memory database on a single long-lived connection
    pub async fn in_memory() -> StoreResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        Ok(Self { pool })
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn prepare(statement: &Statement) -> Query<'_, Sqlite, SqliteArguments<'_>> {
    let mut query = sqlx::query(statement.sql());
    for value in statement.params() {
        query = match value {
            Value::Null => query.bind(None::<i64>),
            Value::Integer(v) => query.bind(*v),
            Value::Real(v) => query.bind(*v),
            Value::Text(v) => query.bind(v.as_str()),
        };
    }
    query
}

fn decode(row: &SqliteRow, columns: &[ColumnType]) -> StoreResult<ResultRow> {
    let mut values = Vec::with_capacity(columns.len());
    for (index, column) in columns.iter().enumerate() {
        let value = match column {
            ColumnType::Integer => row.try_get::<Option<i64>, _>(index)?.map(Value::Integer),
            ColumnType::Real => row.try_get::<Option<f64>, _>(index)?.map(Value::Real),
            ColumnType::Text => row.try_get::<Option<String>, _>(index)?.map(Value::Text),
        };
        values.push(value.unwrap_or(Value::Null));
    }
    Ok(ResultRow::new(values))
}

fn decode_all(rows: &[SqliteRow], columns: &[ColumnType]) -> StoreResult<Vec<ResultRow>> {
    rows.iter().map(|row| decode(row, columns)).collect()
}

#[async_trait]
impl PersistenceGateway for SqliteGateway {
    async fn execute(&self, statement: &Statement) -> StoreResult<u64> {
        let result = prepare(statement).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn query(&self, statement: &Statement) -> StoreResult<Vec<ResultRow>> {
        let rows = prepare(statement).fetch_all(&self.pool).await?;
        decode_all(&rows, statement.columns())
    }

    async fn begin(&self) -> StoreResult<Box<dyn GatewayTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(SqliteTransaction { tx }))
    }
}

/// Open transaction on a pooled connection
pub struct SqliteTransaction {
    tx: Transaction<'static, Sqlite>,
}

#[async_trait]
impl GatewayTransaction for SqliteTransaction {
    async fn execute(&mut self, statement: &Statement) -> StoreResult<u64> {
        let result = prepare(statement).execute(&mut *self.tx).await?;
        Ok(result.rows_affected())
    }

    async fn query(&mut self, statement: &Statement) -> StoreResult<Vec<ResultRow>> {
        let rows = prepare(statement).fetch_all(&mut *self.tx).await?;
        decode_all(&rows, statement.columns())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let SqliteTransaction { tx } = *self;
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        let SqliteTransaction { tx } = *self;
        tx.rollback().await?;
        debug!("Transaction rolled back");
        Ok(())
    }
}
