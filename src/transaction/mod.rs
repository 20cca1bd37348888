// Transaction module - connection ownership and commit/rollback boundary

use std::sync::Arc;
use crate::core::DatabaseError;
use crate::storage::{Connection, Driver};

/// Unit of work over one store connection
pub trait Transaction: Send {
    /// The connection, opened on first use
    fn connection(&mut self) -> Result<&mut dyn Connection, DatabaseError>;

    fn commit(&mut self) -> Result<(), DatabaseError>;

    fn rollback(&mut self) -> Result<(), DatabaseError>;

    fn close(&mut self) -> Result<(), DatabaseError>;

    fn is_auto_commit(&self) -> bool;
}

/// Transaction that manages its own connection from a `Driver`.
/// Commit and rollback only reach the connection when auto-commit is off.
pub struct DriverTransaction {
    driver: Arc<dyn Driver>,
    connection: Option<Box<dyn Connection>>,
    auto_commit: bool,
    closed: bool,
}

impl DriverTransaction {
    pub fn new(driver: Arc<dyn Driver>, auto_commit: bool) -> Self {
        Self {
            driver,
            connection: None,
            auto_commit,
            closed: false,
        }
    }

    /// Whether a connection has been opened yet
    pub const fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    fn ensure_open(&self) -> Result<(), DatabaseError> {
        if self.closed {
            Err(DatabaseError::Closed("Transaction"))
        } else {
            Ok(())
        }
    }
}

impl Transaction for DriverTransaction {
    fn connection(&mut self) -> Result<&mut dyn Connection, DatabaseError> {
        self.ensure_open()?;
        if self.connection.is_none() {
            let mut connection = self.driver.connect()?;
            connection.set_auto_commit(self.auto_commit)?;
            tracing::debug!(auto_commit = self.auto_commit, "opened connection");
            self.connection = Some(connection);
        }
        match self.connection.as_deref_mut() {
            Some(connection) => Ok(connection),
            None => Err(DatabaseError::Closed("Connection")),
        }
    }

    fn commit(&mut self) -> Result<(), DatabaseError> {
        self.ensure_open()?;
        match self.connection.as_mut() {
            Some(connection) if !self.auto_commit => {
                tracing::debug!("committing connection");
                connection.commit()
            }
            _ => Ok(()),
        }
    }

    fn rollback(&mut self) -> Result<(), DatabaseError> {
        self.ensure_open()?;
        match self.connection.as_mut() {
            Some(connection) if !self.auto_commit => {
                tracing::debug!("rolling back connection");
                connection.rollback()
            }
            _ => Ok(()),
        }
    }

    fn close(&mut self) -> Result<(), DatabaseError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if let Some(mut connection) = self.connection.take() {
            tracing::debug!("closing connection");
            connection.close()?;
        }
        Ok(())
    }

    fn is_auto_commit(&self) -> bool {
        self.auto_commit
    }
}
