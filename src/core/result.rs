use serde::{Deserialize, Serialize};
use super::row::{Row, RowSet};

/// Row count reported by a write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateCount {
    Rows(u64),
    /// Queued by a batch executor; the real count arrives with `flush_statements`
    Deferred,
}

impl UpdateCount {
    #[must_use]
    pub const fn rows(&self) -> Option<u64> {
        match self {
            Self::Rows(n) => Some(*n),
            Self::Deferred => None,
        }
    }
}

/// Outcome of one queued batch operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchOutcome {
    Applied(u64),
    Failed(String),
}

/// Per-operation result returned by a batch flush, in submission order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub statement_id: String,
    pub sql: String,
    pub outcome: BatchOutcome,
}

impl BatchResult {
    #[must_use]
    pub const fn is_applied(&self) -> bool {
        matches!(self.outcome, BatchOutcome::Applied(_))
    }
}

/// Result of any intercepted call
#[derive(Debug, Clone, PartialEq)]
pub enum StatementResult {
    Row(Option<Row>),
    RowSet(RowSet),
    Affected(UpdateCount),
    Batch(Vec<BatchResult>),
    /// A cursor was opened for the named statement; the cursor itself is
    /// handed to the caller outside the chain
    CursorOpened(String),
    /// Lifecycle calls (commit, rollback) that produce nothing
    Unit,
}

impl StatementResult {
    pub fn into_row(self) -> Option<Option<Row>> {
        match self {
            Self::Row(row) => Some(row),
            _ => None,
        }
    }

    pub fn into_row_set(self) -> Option<RowSet> {
        match self {
            Self::RowSet(rows) => Some(rows),
            _ => None,
        }
    }

    #[must_use]
    pub const fn update_count(&self) -> Option<UpdateCount> {
        match self {
            Self::Affected(count) => Some(*count),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Row(_) => "row",
            Self::RowSet(_) => "row set",
            Self::Affected(_) => "update count",
            Self::Batch(_) => "batch",
            Self::CursorOpened(_) => "cursor",
            Self::Unit => "unit",
        }
    }
}
