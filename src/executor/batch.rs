/// Deferred writes.
///
/// Updates are queued instead of executed. Consecutive updates with the same
/// statement and SQL share one prepared handle. The queue runs on flush, on
/// commit and before any query.

use crate::core::{
    BatchOutcome, BatchResult, BoundSql, DatabaseError, MappedStatement, Row, UpdateCount, Value,
};
use crate::storage::PreparedStatement;
use crate::transaction::Transaction;
use super::base::ExecutionStrategy;
use super::simple::SimpleStrategy;

struct PendingBatch {
    statement_id: String,
    sql: String,
    statement: Box<dyn PreparedStatement>,
    arguments: Vec<Vec<Value>>,
}

#[derive(Default)]
pub struct BatchStrategy {
    batches: Vec<PendingBatch>,
}

impl BatchStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Operations waiting for the next flush
    pub fn pending(&self) -> usize {
        self.batches.iter().map(|b| b.arguments.len()).sum()
    }

    /// Prepared handles held by the queue
    pub fn pending_statements(&self) -> usize {
        self.batches.len()
    }
}

impl ExecutionStrategy for BatchStrategy {
    fn name(&self) -> &'static str {
        "batch"
    }

    fn do_update(
        &mut self,
        tx: &mut dyn Transaction,
        ms: &MappedStatement,
        bound_sql: &BoundSql,
    ) -> Result<UpdateCount, DatabaseError> {
        let args = bound_sql.positional_args()?;
        match self.batches.last_mut() {
            Some(last) if last.sql == bound_sql.sql && last.statement_id == ms.id => {
                last.arguments.push(args);
            }
            _ => {
                let statement = tx.connection()?.prepare(&bound_sql.sql)?;
                self.batches.push(PendingBatch {
                    statement_id: ms.id.clone(),
                    sql: bound_sql.sql.clone(),
                    statement,
                    arguments: vec![args],
                });
            }
        }
        Ok(UpdateCount::Deferred)
    }

    fn do_query(
        &mut self,
        tx: &mut dyn Transaction,
        ms: &MappedStatement,
        bound_sql: &BoundSql,
    ) -> Result<Vec<Row>, DatabaseError> {
        let flushed = require_applied(self.do_flush(tx, false)?)?;
        if !flushed.is_empty() {
            tracing::debug!(operations = flushed.len(), "flushed batch before query");
        }
        SimpleStrategy.do_query(tx, ms, bound_sql)
    }

    /// Runs every queued operation in submission order; a failed operation
    /// is reported and the rest still run
    fn do_flush(
        &mut self,
        _tx: &mut dyn Transaction,
        is_rollback: bool,
    ) -> Result<Vec<BatchResult>, DatabaseError> {
        let batches = std::mem::take(&mut self.batches);
        let mut results = Vec::new();
        for mut batch in batches {
            if !is_rollback {
                for args in &batch.arguments {
                    let outcome = match batch.statement.execute(args) {
                        Ok(outcome) => BatchOutcome::Applied(outcome.rows_affected),
                        Err(e) => {
                            tracing::warn!(statement = %batch.statement_id, error = %e, "batch operation failed");
                            BatchOutcome::Failed(e.to_string())
                        }
                    };
                    results.push(BatchResult {
                        statement_id: batch.statement_id.clone(),
                        sql: batch.sql.clone(),
                        outcome,
                    });
                }
            }
            batch.statement.close();
        }
        Ok(results)
    }
}

/// Hands back `results` when every operation applied, otherwise fails with
/// all of them so the caller can see which ones did not
pub(crate) fn require_applied(results: Vec<BatchResult>) -> Result<Vec<BatchResult>, DatabaseError> {
    let failed = results.iter().filter(|r| !r.is_applied()).count();
    if failed == 0 {
        Ok(results)
    } else {
        Err(DatabaseError::BatchFailed { failed, results })
    }
}
