//! dcsim-store: Experiment persistence
//!
//! This crate provides the persistence side of dcsim:
//! - A statement-level gateway over the experiment store
//! - A SQLite implementation on sqlx
//! - The shared experiment queue and its claim protocol
//! - Schema setup and writers for experiment definitions

pub mod definitions;
pub mod error;
pub mod gateway;
pub mod queue;
pub mod schema;
pub mod sqlite;

pub use definitions::{store_datacenter, store_experiment, store_trace, ExperimentRecord};
pub use error::{StoreError, StoreResult};
pub use gateway::{ColumnType, GatewayTransaction, PersistenceGateway, ResultRow, Statement, Value};
pub use queue::{
    ClaimOutcome, ExperimentDefinition, ExperimentProgress, ExperimentQueue, ExperimentStatus,
};
pub use sqlite::SqliteGateway;
