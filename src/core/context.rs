use tokio_util::sync::CancellationToken;
use super::error::DatabaseError;

/// Per-call context threaded through sessions, interceptors and executors
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    cancellation: CancellationToken,
}

impl ExecutionContext {
    pub fn new(cancellation: CancellationToken) -> Self {
        Self { cancellation }
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Fails with `Cancelled` once the token fired. Called before store
    /// access and again before any cache is populated.
    pub fn ensure_active(&self) -> Result<(), DatabaseError> {
        if self.is_cancelled() {
            Err(DatabaseError::Cancelled)
        } else {
            Ok(())
        }
    }
}
