use std::sync::Arc;
use crate::cache::{Cache, CacheKey, PerpetualCache};
use crate::core::{
    BatchResult, BoundSql, DatabaseError, ExecutionContext, MappedStatement, Parameter, Row,
    RowBounds, RowSet, UpdateCount,
};
use crate::transaction::Transaction;
use super::batch::require_applied;
use super::cursor::{Cursor, DEFAULT_CURSOR_CAPACITY};
use super::{Executor, LocalCacheScope};

/// How statements reach the connection
pub trait ExecutionStrategy: Send {
    fn name(&self) -> &'static str;

    fn do_update(
        &mut self,
        tx: &mut dyn Transaction,
        ms: &MappedStatement,
        bound_sql: &BoundSql,
    ) -> Result<UpdateCount, DatabaseError>;

    fn do_query(
        &mut self,
        tx: &mut dyn Transaction,
        ms: &MappedStatement,
        bound_sql: &BoundSql,
    ) -> Result<Vec<Row>, DatabaseError>;

    /// Executes or, on rollback, discards pending work and releases handles
    fn do_flush(
        &mut self,
        tx: &mut dyn Transaction,
        is_rollback: bool,
    ) -> Result<Vec<BatchResult>, DatabaseError>;
}

/// Executor with a first-level cache private to its session
pub struct BaseExecutor<S: ExecutionStrategy> {
    strategy: S,
    transaction: Box<dyn Transaction>,
    local_cache: PerpetualCache,
    local_cache_scope: LocalCacheScope,
    environment: String,
    cursor_capacity: usize,
    closed: bool,
}

impl<S: ExecutionStrategy> BaseExecutor<S> {
    pub fn new(strategy: S, transaction: Box<dyn Transaction>, environment: &str) -> Self {
        Self {
            strategy,
            transaction,
            local_cache: PerpetualCache::new("LocalCache"),
            local_cache_scope: LocalCacheScope::default(),
            environment: environment.to_string(),
            cursor_capacity: DEFAULT_CURSOR_CAPACITY,
            closed: false,
        }
    }

    #[must_use]
    pub fn with_local_cache_scope(mut self, scope: LocalCacheScope) -> Self {
        self.local_cache_scope = scope;
        self
    }

    /// Channel size for cursors of statements without a fetch size
    #[must_use]
    pub fn with_cursor_capacity(mut self, capacity: usize) -> Self {
        self.cursor_capacity = capacity;
        self
    }

    pub const fn strategy(&self) -> &S {
        &self.strategy
    }

    pub fn local_cache_size(&self) -> usize {
        self.local_cache.size()
    }

    fn ensure_open(&self) -> Result<(), DatabaseError> {
        if self.closed {
            Err(DatabaseError::Closed("Executor"))
        } else {
            Ok(())
        }
    }
}

impl<S: ExecutionStrategy> Executor for BaseExecutor<S> {
    fn update(
        &mut self,
        ms: &MappedStatement,
        parameter: &Parameter,
        ctx: &ExecutionContext,
    ) -> Result<UpdateCount, DatabaseError> {
        self.ensure_open()?;
        self.clear_local_cache();
        ctx.ensure_active()?;
        let bound_sql = ms.bound_sql(parameter)?;
        tracing::debug!(statement = %ms.id, strategy = self.strategy.name(), "executing update");
        self.strategy.do_update(self.transaction.as_mut(), ms, &bound_sql)
    }

    fn query(
        &mut self,
        ms: &MappedStatement,
        parameter: &Parameter,
        bounds: RowBounds,
        key: Option<CacheKey>,
        ctx: &ExecutionContext,
    ) -> Result<RowSet, DatabaseError> {
        self.ensure_open()?;
        let bound_sql = ms.bound_sql(parameter)?;
        let key = match key {
            Some(key) => key,
            None => self.create_cache_key(ms, parameter, bounds, &bound_sql),
        };
        if ms.flush_cache_required {
            self.clear_local_cache();
        }
        if let Some(rows) = self.local_cache.get(&key) {
            tracing::debug!(statement = %ms.id, "local cache hit");
            return Ok(rows);
        }

        ctx.ensure_active()?;
        tracing::debug!(statement = %ms.id, strategy = self.strategy.name(), "querying store");
        let rows = self.strategy.do_query(self.transaction.as_mut(), ms, &bound_sql)?;
        let rows: RowSet = Arc::new(bounds.apply(rows));
        ctx.ensure_active()?;

        match self.local_cache_scope {
            LocalCacheScope::Session => self.local_cache.put(key, Arc::clone(&rows)),
            LocalCacheScope::Statement => self.clear_local_cache(),
        }
        Ok(rows)
    }

    fn query_cursor(
        &mut self,
        ms: &MappedStatement,
        parameter: &Parameter,
        bounds: RowBounds,
        ctx: &ExecutionContext,
    ) -> Result<Cursor, DatabaseError> {
        self.ensure_open()?;
        ctx.ensure_active()?;
        let bound_sql = ms.bound_sql(parameter)?;
        let rows = self.strategy.do_query(self.transaction.as_mut(), ms, &bound_sql)?;
        let capacity = ms
            .fetch_size
            .map_or(self.cursor_capacity, |size| size as usize);
        Cursor::open(ms.id.as_str(), rows, bounds, capacity, ctx)
    }

    fn flush_statements(&mut self) -> Result<Vec<BatchResult>, DatabaseError> {
        self.ensure_open()?;
        self.strategy.do_flush(self.transaction.as_mut(), false)
    }

    fn commit(&mut self, required: bool) -> Result<(), DatabaseError> {
        self.ensure_open()?;
        self.clear_local_cache();
        require_applied(self.flush_statements()?)?;
        if required {
            self.transaction.commit()?;
        }
        Ok(())
    }

    fn rollback(&mut self, required: bool) -> Result<(), DatabaseError> {
        self.ensure_open()?;
        self.clear_local_cache();
        self.strategy.do_flush(self.transaction.as_mut(), true)?;
        if required {
            self.transaction.rollback()?;
        }
        Ok(())
    }

    fn close(&mut self, force_rollback: bool) -> Result<(), DatabaseError> {
        if self.closed {
            return Ok(());
        }
        let rolled_back = self.rollback(force_rollback);
        if let Err(e) = &rolled_back {
            tracing::warn!(error = %e, "rollback while closing executor failed");
        }
        self.closed = true;
        self.local_cache.clear();
        let closed = self.transaction.close();
        rolled_back.and(closed)
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn create_cache_key(
        &self,
        ms: &MappedStatement,
        parameter: &Parameter,
        bounds: RowBounds,
        bound_sql: &BoundSql,
    ) -> CacheKey {
        CacheKey::new()
            .with(ms.id.as_str())
            .with(bounds.offset)
            .with(bounds.limit)
            .with(bound_sql.sql.as_str())
            .with(parameter.clone())
            .with(self.environment.as_str())
    }

    fn is_cached(&self, _ms: &MappedStatement, key: &CacheKey) -> bool {
        self.local_cache.contains(key)
    }

    fn clear_local_cache(&mut self) {
        if !self.closed {
            self.local_cache.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Limit, Value};
    use crate::executor::test_support::{fixture, parameter};
    use crate::executor::SimpleStrategy;
    use tokio_util::sync::CancellationToken;

    fn executor(f: &crate::executor::test_support::Fixture) -> BaseExecutor<SimpleStrategy> {
        BaseExecutor::new(SimpleStrategy, f.transaction(), "test")
    }

    #[test]
    fn test_local_cache_serves_repeat_query() {
        let f = fixture();
        let mut executor = executor(&f);
        let ctx = ExecutionContext::default();

        let first = executor.query(&f.find_by_id, &parameter(1), RowBounds::DEFAULT, None, &ctx).unwrap();
        let second = executor.query(&f.find_by_id, &parameter(1), RowBounds::DEFAULT, None, &ctx).unwrap();
        assert_eq!(first, second);
        assert_eq!(f.driver.stats().executions, 1);
        assert_eq!(executor.local_cache_size(), 1);
    }

    #[test]
    fn test_update_clears_local_cache() {
        let f = fixture();
        let mut executor = executor(&f);
        let ctx = ExecutionContext::default();

        executor.query(&f.find_by_id, &parameter(1), RowBounds::DEFAULT, None, &ctx).unwrap();
        let update = Parameter::named([("name", Value::from("changed")), ("id", Value::Integer(1))]);
        assert_eq!(executor.update(&f.rename, &update, &ctx).unwrap(), UpdateCount::Rows(1));
        assert_eq!(executor.local_cache_size(), 0);

        let rows = executor.query(&f.find_by_id, &parameter(1), RowBounds::DEFAULT, None, &ctx).unwrap();
        assert_eq!(rows[0].column("name"), Some(&Value::from("changed")));
        assert_eq!(f.driver.stats().executions, 3);
    }

    #[test]
    fn test_bounds_part_of_key() {
        let f = fixture();
        let mut executor = executor(&f);
        let ctx = ExecutionContext::default();

        let all = executor.query(&f.find_all, &Parameter::None, RowBounds::DEFAULT, None, &ctx).unwrap();
        let window = executor.query(&f.find_all, &Parameter::None, RowBounds::new(1, 1), None, &ctx).unwrap();
        let empty = executor.query(&f.find_all, &Parameter::None, RowBounds { offset: 0, limit: Limit::Rows(0) }, None, &ctx).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(window.len(), 1);
        assert!(empty.is_empty());
        assert_eq!(executor.local_cache_size(), 3);
    }

    #[test]
    fn test_statement_scope_does_not_retain() {
        let f = fixture();
        let mut executor = executor(&f).with_local_cache_scope(LocalCacheScope::Statement);
        let ctx = ExecutionContext::default();

        executor.query(&f.find_by_id, &parameter(1), RowBounds::DEFAULT, None, &ctx).unwrap();
        executor.query(&f.find_by_id, &parameter(1), RowBounds::DEFAULT, None, &ctx).unwrap();
        assert_eq!(f.driver.stats().executions, 2);
    }

    #[test]
    fn test_cancelled_query_caches_nothing() {
        let f = fixture();
        let mut executor = executor(&f);
        let token = CancellationToken::new();
        token.cancel();
        let ctx = ExecutionContext::new(token);

        let result = executor.query(&f.find_by_id, &parameter(1), RowBounds::DEFAULT, None, &ctx);
        assert!(matches!(result, Err(DatabaseError::Cancelled)));
        assert_eq!(executor.local_cache_size(), 0);
        assert_eq!(f.driver.stats().executions, 0);
    }

    #[test]
    fn test_failed_query_caches_nothing() {
        let f = fixture();
        let mut executor = executor(&f);
        let ctx = ExecutionContext::default();
        assert!(executor.query(&f.broken, &Parameter::None, RowBounds::DEFAULT, None, &ctx).is_err());
        assert_eq!(executor.local_cache_size(), 0);
    }

    #[test]
    fn test_closed_executor_rejects_calls() {
        let f = fixture();
        let mut executor = executor(&f);
        let ctx = ExecutionContext::default();
        executor.close(false).unwrap();
        executor.close(false).unwrap();

        assert!(executor.is_closed());
        assert!(matches!(
            executor.query(&f.find_by_id, &parameter(1), RowBounds::DEFAULT, None, &ctx),
            Err(DatabaseError::Closed(_))
        ));
        assert!(matches!(executor.commit(true), Err(DatabaseError::Closed(_))));
    }

    #[test]
    fn test_cache_key_reflects_inputs() {
        let f = fixture();
        let executor = executor(&f);
        let bound = f.find_by_id.bound_sql(&parameter(1)).unwrap();
        let a = executor.create_cache_key(&f.find_by_id, &parameter(1), RowBounds::DEFAULT, &bound);
        let b = executor.create_cache_key(&f.find_by_id, &parameter(1), RowBounds::DEFAULT, &bound);
        let c = executor.create_cache_key(&f.find_by_id, &parameter(2), RowBounds::DEFAULT, &bound);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(!executor.is_cached(&f.find_by_id, &a));
    }

    #[test]
    fn test_rollback_required_reaches_store() {
        let f = fixture();
        let mut executor = executor(&f);
        let ctx = ExecutionContext::default();
        let insert = Parameter::named([("id", Value::Integer(9)), ("name", Value::from("zed"))]);
        executor.update(&f.insert, &insert, &ctx).unwrap();
        executor.rollback(false).unwrap();
        assert_eq!(f.driver.rows("users").len(), 4);
        executor.rollback(true).unwrap();
        assert_eq!(f.driver.rows("users").len(), 3);
    }

    #[test]
    fn test_cursor_streams_rows() {
        let f = fixture();
        let mut executor = executor(&f);
        let cursor = executor
            .query_cursor(&f.find_all, &Parameter::None, RowBounds::DEFAULT, &ExecutionContext::default())
            .unwrap();
        assert_eq!(cursor.count(), 3);
        assert_eq!(executor.local_cache_size(), 0);
    }
}
