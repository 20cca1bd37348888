use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use crate::core::{
    BatchResult, DatabaseError, ExecutionContext, Parameter, Row, RowBounds, RowSet,
    StatementResult, UpdateCount,
};
use crate::executor::cursor::CursorHandle;
use crate::executor::{Cursor, Executor};
use crate::plugin::{Arguments, InterceptorChain, Signature};
use super::config::Configuration;
use super::mapper::Mapper;

/// A unit of work.
///
/// Writes mark the session dirty; `commit` and `rollback` only reach the
/// transaction when the session is dirty (and not auto-commit) or when
/// forced. Closing rolls back uncommitted writes.
pub struct Session {
    configuration: Arc<Configuration>,
    executor: Box<dyn Executor>,
    auto_commit: bool,
    dirty: bool,
    closed: bool,
    cursors: Vec<CursorHandle>,
    cancellation: CancellationToken,
}

impl Session {
    pub(crate) fn new(configuration: Arc<Configuration>, executor: Box<dyn Executor>, auto_commit: bool) -> Self {
        Self {
            configuration,
            executor,
            auto_commit,
            dirty: false,
            closed: false,
            cursors: Vec::new(),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    pub fn interceptor_chain(&self) -> &InterceptorChain {
        self.configuration.interceptor_chain()
    }

    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    pub const fn is_auto_commit(&self) -> bool {
        self.auto_commit
    }

    /// Token that cancels every later call on this session
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    pub fn context(&self) -> ExecutionContext {
        ExecutionContext::new(self.cancellation.clone())
    }

    fn ensure_open(&self) -> Result<(), DatabaseError> {
        if self.closed {
            Err(DatabaseError::Closed("Session"))
        } else {
            Ok(())
        }
    }

    /// Zero rows give `None`; more than one is an error
    pub fn select_one(&mut self, statement: &str, parameter: impl Into<Parameter>) -> Result<Option<Row>, DatabaseError> {
        let result = self.intercepted(
            "select_one",
            Arguments::statement(statement, parameter.into()),
            |session, args| {
                let id = statement_id(&args)?;
                let rows = session.rows(id, &args.parameter, args.bounds)?;
                match rows.len() {
                    0 => Ok(StatementResult::Row(None)),
                    1 => Ok(StatementResult::Row(rows.first().cloned())),
                    count => Err(DatabaseError::TooManyResults {
                        statement: id.to_string(),
                        count,
                    }),
                }
            },
        )?;
        match result {
            StatementResult::Row(row) => Ok(row),
            other => Err(unexpected("select_one", &other)),
        }
    }

    pub fn select_list(&mut self, statement: &str, parameter: impl Into<Parameter>) -> Result<RowSet, DatabaseError> {
        self.select_list_with_bounds(statement, parameter, RowBounds::DEFAULT)
    }

    pub fn select_list_with_bounds(
        &mut self,
        statement: &str,
        parameter: impl Into<Parameter>,
        bounds: RowBounds,
    ) -> Result<RowSet, DatabaseError> {
        let result = self.intercepted(
            "select_list",
            Arguments::statement(statement, parameter.into()).with_bounds(bounds),
            |session, args| {
                let id = statement_id(&args)?;
                session.rows(id, &args.parameter, args.bounds).map(StatementResult::RowSet)
            },
        )?;
        match result {
            StatementResult::RowSet(rows) => Ok(rows),
            other => Err(unexpected("select_list", &other)),
        }
    }

    /// Rows keyed by the text of `column`; a later row wins a duplicate key
    pub fn select_map(
        &mut self,
        statement: &str,
        parameter: impl Into<Parameter>,
        column: &str,
    ) -> Result<HashMap<String, Row>, DatabaseError> {
        let rows = self.select_list(statement, parameter)?;
        Ok(rows
            .iter()
            .filter_map(|row| row.column(column).map(|key| (key.to_string(), row.clone())))
            .collect())
    }

    /// Streams rows lazily; the cursor is closed with the session at the latest.
    ///
    /// Interceptors see this call as `session.select_cursor`; the target
    /// reports `StatementResult::CursorOpened` while the cursor itself is
    /// returned here. Reading the cursor blocks the calling thread, so do not
    /// iterate it from inside an async runtime worker.
    pub fn select_cursor(
        &mut self,
        statement: &str,
        parameter: impl Into<Parameter>,
        bounds: RowBounds,
    ) -> Result<Cursor, DatabaseError> {
        let mut opened = None;
        let result = self.intercepted(
            "select_cursor",
            Arguments::statement(statement, parameter.into()).with_bounds(bounds),
            |session, args| {
                let ms = session.configuration.mapped_statement(statement_id(&args)?)?;
                let ctx = session.context();
                let cursor = session.executor.query_cursor(&ms, &args.parameter, args.bounds, &ctx)?;
                opened = Some(cursor);
                Ok(StatementResult::CursorOpened(ms.id.clone()))
            },
        )?;
        let cursor = opened.ok_or_else(|| unexpected("select_cursor", &result))?;
        self.cursors.retain(CursorHandle::is_alive);
        self.cursors.push(cursor.handle());
        Ok(cursor)
    }

    pub fn insert(&mut self, statement: &str, parameter: impl Into<Parameter>) -> Result<UpdateCount, DatabaseError> {
        self.write("insert", statement, parameter.into())
    }

    pub fn update(&mut self, statement: &str, parameter: impl Into<Parameter>) -> Result<UpdateCount, DatabaseError> {
        self.write("update", statement, parameter.into())
    }

    pub fn delete(&mut self, statement: &str, parameter: impl Into<Parameter>) -> Result<UpdateCount, DatabaseError> {
        self.write("delete", statement, parameter.into())
    }

    fn write(&mut self, method: &str, statement: &str, parameter: Parameter) -> Result<UpdateCount, DatabaseError> {
        let result = self.intercepted(method, Arguments::statement(statement, parameter), |session, args| {
            let ms = session.configuration.mapped_statement(statement_id(&args)?)?;
            session.dirty = true;
            let ctx = session.context();
            session
                .executor
                .update(&ms, &args.parameter, &ctx)
                .map(StatementResult::Affected)
        })?;
        result.update_count().ok_or_else(|| unexpected(method, &result))
    }

    pub fn commit(&mut self) -> Result<(), DatabaseError> {
        self.finish(true, false)
    }

    /// Commits even when nothing was written
    pub fn commit_force(&mut self) -> Result<(), DatabaseError> {
        self.finish(true, true)
    }

    pub fn rollback(&mut self) -> Result<(), DatabaseError> {
        self.finish(false, false)
    }

    pub fn rollback_force(&mut self) -> Result<(), DatabaseError> {
        self.finish(false, true)
    }

    fn finish(&mut self, commit: bool, force: bool) -> Result<(), DatabaseError> {
        self.ensure_open()?;
        let required = self.commit_or_rollback_required(force);
        if commit {
            self.executor.commit(required)?;
        } else {
            self.executor.rollback(required)?;
        }
        self.dirty = false;
        Ok(())
    }

    const fn commit_or_rollback_required(&self, force: bool) -> bool {
        (!self.auto_commit && self.dirty) || force
    }

    /// Runs queued batch operations now
    pub fn flush_statements(&mut self) -> Result<Vec<BatchResult>, DatabaseError> {
        self.ensure_open()?;
        self.executor.flush_statements()
    }

    /// Empties the first-level cache
    pub fn clear_cache(&mut self) {
        self.executor.clear_local_cache();
    }

    pub fn mapper(&self, namespace: &str) -> Result<Mapper, DatabaseError> {
        self.configuration.mapper(namespace)
    }

    pub fn close(&mut self) -> Result<(), DatabaseError> {
        if self.closed {
            return Ok(());
        }
        for cursor in self.cursors.drain(..) {
            cursor.close();
        }
        let force_rollback = self.commit_or_rollback_required(false);
        if force_rollback {
            tracing::warn!("closing session with uncommitted changes, rolling back");
        }
        self.closed = true;
        self.dirty = false;
        self.executor.close(force_rollback)
    }

    fn intercepted<F>(&mut self, method: &str, args: Arguments, mut dispatch: F) -> Result<StatementResult, DatabaseError>
    where
        F: FnMut(&mut Self, Arguments) -> Result<StatementResult, DatabaseError>,
    {
        self.ensure_open()?;
        let chain = self.configuration.interceptor_chain().clone();
        let ctx = self.context();
        chain.invoke(Signature::session(method), args, &ctx, |args, _| dispatch(self, args))
    }

    fn rows(&mut self, statement: &str, parameter: &Parameter, bounds: RowBounds) -> Result<RowSet, DatabaseError> {
        let ms = self.configuration.mapped_statement(statement)?;
        let ctx = self.context();
        self.executor.query(&ms, parameter, bounds, None, &ctx)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(error = %e, "failed to close session");
        }
    }
}

fn statement_id(args: &Arguments) -> Result<&str, DatabaseError> {
    args.statement
        .as_deref()
        .ok_or_else(|| DatabaseError::StatementNotFound(String::new()))
}

fn unexpected(method: &str, result: &StatementResult) -> DatabaseError {
    DatabaseError::UnexpectedResult {
        method: method.to_string(),
        found: result.kind(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Value;
    use crate::executor::ExecutorType;
    use crate::session::test_support::factory;

    #[test]
    fn test_select_one_cardinality() {
        let (factory, _driver) = factory();
        let mut session = factory.open_session();

        let row = session.select_one("user.findById", 1_i64).unwrap();
        assert_eq!(row.unwrap().column("name"), Some(&Value::from("alice")));
        assert_eq!(session.select_one("user.findById", 99_i64).unwrap(), None);
        assert!(matches!(
            session.select_one("user.findAll", ()),
            Err(DatabaseError::TooManyResults { count: 3, .. })
        ));
    }

    #[test]
    fn test_unknown_statement() {
        let (factory, _driver) = factory();
        let mut session = factory.open_session();
        assert!(matches!(
            session.select_list("user.nope", ()),
            Err(DatabaseError::StatementNotFound(id)) if id == "user.nope"
        ));
    }

    #[test]
    fn test_select_map_by_column() {
        let (factory, _driver) = factory();
        let mut session = factory.open_session();
        let by_name = session.select_map("user.findAll", (), "name").unwrap();
        assert_eq!(by_name.len(), 3);
        assert_eq!(by_name["bob"].column("id"), Some(&Value::Integer(2)));
    }

    #[test]
    fn test_commit_without_writes_skips_transaction() {
        let (factory, driver) = factory();
        let mut session = factory.open_session();
        session.select_list("user.findAll", ()).unwrap();
        session.commit().unwrap();
        assert_eq!(driver.stats().commits, 0);

        session.commit_force().unwrap();
        assert_eq!(driver.stats().commits, 1);
    }

    #[test]
    fn test_write_marks_dirty_until_commit() {
        let (factory, driver) = factory();
        let mut session = factory.open_session();
        session.delete("user.delete", 3_i64).unwrap();
        assert!(session.is_dirty());
        session.commit().unwrap();
        assert!(!session.is_dirty());
        assert_eq!(driver.stats().commits, 1);
        assert_eq!(driver.rows("users").len(), 2);
    }

    #[test]
    fn test_close_rolls_back_dirty_session() {
        let (factory, driver) = factory();
        let mut session = factory.open_session();
        session
            .insert("user.insert", Parameter::named([("id", Value::Integer(4)), ("name", Value::from("dave"))]))
            .unwrap();
        session.close().unwrap();
        session.close().unwrap();
        assert_eq!(driver.rows("users").len(), 3);
        assert!(matches!(session.select_list("user.findAll", ()), Err(DatabaseError::Closed(_))));
    }

    #[test]
    fn test_close_closes_cursors() {
        let (factory, _driver) = factory();
        let mut session = factory.open_session();
        let mut cursor = session.select_cursor("user.findAll", (), RowBounds::DEFAULT).unwrap();
        assert!(cursor.next_row().is_some());
        session.close().unwrap();
        assert!(!cursor.is_open());
        assert_eq!(cursor.next_row(), None);
    }

    #[test]
    fn test_cancelled_session() {
        let (factory, driver) = factory();
        let mut session = factory.open_session();
        session.cancellation_token().cancel();
        assert!(matches!(session.select_list("user.findAll", ()), Err(DatabaseError::Cancelled)));
        assert_eq!(driver.stats().executions, 0);
    }

    #[test]
    fn test_batch_session_flush() {
        let (factory, driver) = factory();
        let mut session = factory.open_session_with(ExecutorType::Batch, false);
        assert_eq!(session.delete("user.delete", 1_i64).unwrap(), UpdateCount::Deferred);
        assert_eq!(session.delete("user.delete", 2_i64).unwrap(), UpdateCount::Deferred);
        let results = session.flush_statements().unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(BatchResult::is_applied));
        session.commit().unwrap();
        assert_eq!(driver.rows("users").len(), 1);
    }
}
