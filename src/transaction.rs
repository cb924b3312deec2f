//! Explicit transactions over one checked-out connection.

use std::fmt;

use tracing::debug;

use crate::dialect::{Node, Registry};
use crate::engine::{DataSource, DbTransaction, Session};
use crate::error::{QuarryError, QuarryResult};
use crate::manager;
use crate::model::Model;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Inactive,
    Active,
    Committed,
    RolledBack,
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransactionState::Inactive => "inactive",
            TransactionState::Active => "active",
            TransactionState::Committed => "committed",
            TransactionState::RolledBack => "rolled back",
        })
    }
}

/// `Inactive → Active → Committed | RolledBack`.
///
/// While active the transaction holds its connection exclusively. Dropping
/// an active transaction rolls it back and returns the connection to the
/// pool.
pub struct Transaction {
    source: DataSource,
    state: TransactionState,
    inner: Option<DbTransaction>,
}

impl Transaction {
    pub fn new(source: DataSource) -> Self {
        Self {
            source,
            state: TransactionState::Inactive,
            inner: None,
        }
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    /// Check out a connection and begin.
    pub async fn start(&mut self) -> QuarryResult<()> {
        match self.state {
            TransactionState::Inactive => {}
            TransactionState::Active => return Err(QuarryError::TransactionAlreadyStarted),
            state => return Err(QuarryError::InactiveTransaction { state }),
        }
        let tx = self.source.begin().await?;
        self.inner = Some(tx);
        self.state = TransactionState::Active;
        debug!(engine = %self.source.engine(), "transaction started");
        Ok(())
    }

    pub async fn commit(&mut self) -> QuarryResult<()> {
        let tx = self.take()?;
        match tx.commit().await {
            Ok(()) => {
                self.state = TransactionState::Committed;
                debug!("transaction committed");
                Ok(())
            }
            Err(e) => {
                // The connection is gone with the failed commit; nothing
                // can be retried on it.
                self.state = TransactionState::RolledBack;
                Err(QuarryError::query("commit", "", e))
            }
        }
    }

    pub async fn rollback(&mut self) -> QuarryResult<()> {
        let tx = self.take()?;
        self.state = TransactionState::RolledBack;
        tx.rollback()
            .await
            .map_err(|e| QuarryError::query("rollback", "", e))?;
        debug!("transaction rolled back");
        Ok(())
    }

    /// Insert `model` and return it as stored, generated key included.
    pub async fn query_insert<M: Model>(&mut self, model: &M) -> QuarryResult<Option<M>> {
        let mut session = self.session()?;
        manager::insert_model(&mut session, model).await
    }

    /// Update the row matching `model`'s primary key. Returns rows affected.
    pub async fn query_update<M: Model>(&mut self, model: &M) -> QuarryResult<u64> {
        let mut session = self.session()?;
        manager::update_model(&mut session, model).await
    }

    /// Delete the row matching `model`'s primary key. Returns rows affected.
    pub async fn query_delete<M: Model>(&mut self, model: &M) -> QuarryResult<u64> {
        let mut session = self.session()?;
        manager::delete_model(&mut session, model).await
    }

    /// Create a named savepoint within the current transaction.
    pub async fn savepoint(&mut self, name: &str) -> QuarryResult<()> {
        self.control(Node::Savepoint(name)).await
    }

    /// Discard everything since the named savepoint, keeping the
    /// transaction open.
    pub async fn rollback_to(&mut self, name: &str) -> QuarryResult<()> {
        self.control(Node::RollbackToSavepoint(name)).await
    }

    pub async fn release_savepoint(&mut self, name: &str) -> QuarryResult<()> {
        self.control(Node::ReleaseSavepoint(name)).await
    }

    async fn control(&mut self, node: Node<'_>) -> QuarryResult<()> {
        let engine = self.source.engine();
        let statement = Registry::global()
            .render_one(engine, node)?
            .to_statement(engine.generator());
        self.session()?
            .execute(&statement, "savepoint", "")
            .await?;
        Ok(())
    }

    /// The held connection, for running statements inside the transaction.
    pub fn session(&mut self) -> QuarryResult<Session<'_>> {
        let state = self.state;
        let engine = self.source.engine();
        let logs = self.source.logs();
        match (state, self.inner.as_mut()) {
            (TransactionState::Active, Some(tx)) => Ok(Session::new(tx.as_conn(), engine, logs)),
            _ => Err(QuarryError::InactiveTransaction { state }),
        }
    }

    fn take(&mut self) -> QuarryResult<DbTransaction> {
        match (self.state, self.inner.take()) {
            (TransactionState::Active, Some(tx)) => Ok(tx),
            (state, _) => Err(QuarryError::InactiveTransaction { state }),
        }
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("engine", &self.source.engine())
            .field("state", &self.state)
            .finish()
    }
}
