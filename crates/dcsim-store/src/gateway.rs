//! Persistence gateway trait definitions
//!
//! The queue talks to the store only through parameterized statements and
//! typed result rows, so the backing database can be swapped without touching
//! the claim protocol.

use async_trait::async_trait;

use crate::error::{StoreError, StoreResult};

/// A value bound to a statement parameter or read from a result column
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL
    Null,
    /// 64-bit integer
    Integer(i64),
    /// Double precision float
    Real(f64),
    /// UTF-8 text
    Text(String),
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Integer(i64::from(value))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Integer(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Real(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

/// Declared type of a result column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Real,
    Text,
}

/// A parameterized statement with its bound values and expected columns
#[derive(Debug, Clone)]
pub struct Statement {
    sql: String,
    params: Vec<Value>,
    columns: Vec<ColumnType>,
}

impl Statement {
    /// Create a statement without parameters or result columns
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
            columns: Vec::new(),
        }
    }

    /// Bind the next positional parameter
    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.params.push(value.into());
        self
    }

    /// Declare the types of the result columns, in select order
    pub fn returning(mut self, columns: &[ColumnType]) -> Self {
        self.columns = columns.to_vec();
        self
    }

    /// SQL text
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Bound parameters
    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Declared result columns
    pub fn columns(&self) -> &[ColumnType] {
        &self.columns
    }
}

/// One row of a query result with typed positional access
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    values: Vec<Value>,
}

impl ResultRow {
    /// Wrap decoded column values
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// Integer column
    pub fn get_i64(&self, column: usize) -> StoreResult<i64> {
        match self.values.get(column) {
            Some(Value::Integer(v)) => Ok(*v),
            _ => Err(StoreError::Decode {
                column,
                expected: "an integer",
            }),
        }
    }

    /// Integer column read as a flag
    pub fn get_bool(&self, column: usize) -> StoreResult<bool> {
        self.get_i64(column).map(|v| v != 0)
    }

    /// Real column
    pub fn get_f64(&self, column: usize) -> StoreResult<f64> {
        match self.values.get(column) {
            Some(Value::Real(v)) => Ok(*v),
            Some(Value::Integer(v)) => Ok(*v as f64),
            _ => Err(StoreError::Decode {
                column,
                expected: "a real",
            }),
        }
    }

    /// Text column
    pub fn get_text(&self, column: usize) -> StoreResult<&str> {
        match self.values.get(column) {
            Some(Value::Text(v)) => Ok(v),
            _ => Err(StoreError::Decode {
                column,
                expected: "text",
            }),
        }
    }

    /// Nullable text column
    pub fn get_opt_text(&self, column: usize) -> StoreResult<Option<&str>> {
        match self.values.get(column) {
            Some(Value::Null) => Ok(None),
            _ => self.get_text(column).map(Some),
        }
    }
}

/// Statement execution against the experiment store
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Execute a statement and return the number of affected rows
    async fn execute(&self, statement: &Statement) -> StoreResult<u64>;

    /// Run a query and decode every row with the statement's declared columns
    async fn query(&self, statement: &Statement) -> StoreResult<Vec<ResultRow>>;

    /// Open a transaction; dropping it without commit rolls it back
    async fn begin(&self) -> StoreResult<Box<dyn GatewayTransaction>>;
}

/// Statements grouped into one atomic unit
#[async_trait]
pub trait GatewayTransaction: Send {
    /// Execute a statement inside the transaction
    async fn execute(&mut self, statement: &Statement) -> StoreResult<u64>;

    /// Run a query inside the transaction
    async fn query(&mut self, statement: &Statement) -> StoreResult<Vec<ResultRow>>;

    /// Make every statement of the transaction durable
    async fn commit(self: Box<Self>) -> StoreResult<()>;

    /// Discard every statement of the transaction
    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_builder() {
        let statement = Statement::new("SELECT id FROM experiments WHERE id = ?")
            .bind(5i64)
            .bind(true)
            .returning(&[ColumnType::Integer]);

        assert_eq!(statement.params(), &[Value::Integer(5), Value::Integer(1)]);
        assert_eq!(statement.columns(), &[ColumnType::Integer]);
    }

    #[test]
    fn test_row_typed_access() {
        let row = ResultRow::new(vec![
            Value::Integer(3),
            Value::Text("FIFO".to_string()),
            Value::Null,
            Value::Real(0.5),
        ]);

        assert_eq!(row.get_i64(0).unwrap(), 3);
        assert!(row.get_bool(0).unwrap());
        assert_eq!(row.get_text(1).unwrap(), "FIFO");
        assert_eq!(row.get_opt_text(2).unwrap(), None);
        assert_eq!(row.get_f64(3).unwrap(), 0.5);
        assert!(matches!(
            row.get_i64(1),
            Err(StoreError::Decode { column: 1, .. })
        ));
        assert!(row.get_text(9).is_err());
    }
}
