use std::collections::hash_map::Entry;
use std::collections::HashMap;
use crate::core::{BatchResult, BoundSql, DatabaseError, MappedStatement, Row, UpdateCount, Value};
use crate::storage::PreparedStatement;
use crate::transaction::Transaction;
use super::base::ExecutionStrategy;

/// Keeps prepared handles per SQL text for the life of the transaction
#[derive(Default)]
pub struct ReuseStrategy {
    statements: HashMap<String, Box<dyn PreparedStatement>>,
}

impl ReuseStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live handles
    pub fn cached_statements(&self) -> usize {
        self.statements.len()
    }

    pub fn has_statement(&self, sql: &str) -> bool {
        self.statements.contains_key(sql)
    }

    /// Handle for `sql`, re-prepared when the cached one is closed or was
    /// prepared for a different number of arguments
    fn statement(
        &mut self,
        tx: &mut dyn Transaction,
        sql: &str,
        arg_count: usize,
    ) -> Result<&mut Box<dyn PreparedStatement>, DatabaseError> {
        let stale = self
            .statements
            .get(sql)
            .is_some_and(|s| s.is_closed() || s.parameter_count() != arg_count);
        if stale {
            tracing::debug!(sql, "discarding stale prepared statement");
            if let Some(mut statement) = self.statements.remove(sql) {
                statement.close();
            }
        }
        match self.statements.entry(sql.to_string()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => Ok(entry.insert(tx.connection()?.prepare(sql)?)),
        }
    }

    fn execute(
        &mut self,
        tx: &mut dyn Transaction,
        bound_sql: &BoundSql,
    ) -> Result<crate::storage::StoreOutcome, DatabaseError> {
        let args: Vec<Value> = bound_sql.positional_args()?;
        self.statement(tx, &bound_sql.sql, args.len())?.execute(&args)
    }

    fn close_all(&mut self) {
        for (_, mut statement) in self.statements.drain() {
            statement.close();
        }
    }
}

impl ExecutionStrategy for ReuseStrategy {
    fn name(&self) -> &'static str {
        "reuse"
    }

    fn do_update(
        &mut self,
        tx: &mut dyn Transaction,
        _ms: &MappedStatement,
        bound_sql: &BoundSql,
    ) -> Result<UpdateCount, DatabaseError> {
        let outcome = self.execute(tx, bound_sql)?;
        Ok(UpdateCount::Rows(outcome.rows_affected))
    }

    fn do_query(
        &mut self,
        tx: &mut dyn Transaction,
        _ms: &MappedStatement,
        bound_sql: &BoundSql,
    ) -> Result<Vec<Row>, DatabaseError> {
        Ok(self.execute(tx, bound_sql)?.rows)
    }

    fn do_flush(
        &mut self,
        _tx: &mut dyn Transaction,
        _is_rollback: bool,
    ) -> Result<Vec<BatchResult>, DatabaseError> {
        self.close_all();
        Ok(Vec::new())
    }
}
