//! Error types for quarry.

use thiserror::Error;

use crate::dialect::{Engine, NodeKind, Scope};
use crate::migrate::Direction;
use crate::transaction::TransactionState;

/// The main error type for quarry operations.
#[derive(Debug, Error)]
pub enum QuarryError {
    /// The driver rejected or failed to run a statement.
    #[error("Query failed during {operation} on '{table}': {source}")]
    QueryFailed {
        operation: &'static str,
        table: String,
        #[source]
        source: sqlx::Error,
    },

    /// A migration's up/down step failed; later migrations were not run.
    #[error("Migration '{migration}' failed ({direction}): {source}")]
    MigrationFailed {
        migration: String,
        direction: Direction,
        #[source]
        source: Box<QuarryError>,
    },

    /// No renderer registered for this engine/scope/node triple.
    #[error("No interpreter registered for {engine} {scope}::{node}")]
    MissingInterpreter {
        engine: Engine,
        scope: Scope,
        node: NodeKind,
    },

    /// A `*_or_fail` lookup matched nothing.
    #[error("No matching row found in '{table}'")]
    NotFound { table: String },

    /// The transaction was never started or has already been finalised.
    #[error("Transaction is not active (state: {state})")]
    InactiveTransaction { state: TransactionState },

    #[error("Transaction already started")]
    TransactionAlreadyStarted,

    /// The engine has no way to express the requested operation.
    #[error("{engine} does not support {feature}")]
    Unsupported { engine: Engine, feature: String },

    /// Update/delete by primary key on a model whose key is unset.
    #[error("Model for '{table}' has no primary key value")]
    MissingPrimaryKey { table: String },

    /// A row value could not be coerced into the declared field type.
    #[error("Cannot decode column '{column}' as {expected}")]
    Decode {
        column: String,
        expected: &'static str,
    },

    /// Invalid comparison operator.
    #[error("Invalid operator: '{0}'")]
    InvalidOperator(String),

    /// Payload rejected before reaching the database.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Terminal query operation on a builder created without a data source.
    #[error("Query builder has no data source attached")]
    NoDataSource,

    /// The pool could not be opened or could not hand out a connection.
    #[error("Connection error: {0}")]
    Connection(#[source] sqlx::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl QuarryError {
    /// Wrap a driver error with the operation and table it happened on.
    pub fn query(operation: &'static str, table: impl Into<String>, source: sqlx::Error) -> Self {
        Self::QueryFailed {
            operation,
            table: table.into(),
            source,
        }
    }

    pub fn unsupported(engine: Engine, feature: impl Into<String>) -> Self {
        Self::Unsupported {
            engine,
            feature: feature.into(),
        }
    }

    pub fn decode(column: impl Into<String>, expected: &'static str) -> Self {
        Self::Decode {
            column: column.into(),
            expected,
        }
    }
}

/// Result type alias for quarry operations.
pub type QuarryResult<T> = Result<T, QuarryError>;
