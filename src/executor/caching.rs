/// Second-level cache tier.
///
/// Wraps any executor. Reads of statements that belong to a cached namespace
/// go through the session's transactional view of the shared cache, so rows
/// a transaction loads only become visible to other sessions once it commits.

use crate::cache::{CacheKey, TransactionalCacheManager};
use crate::core::{
    BatchResult, BoundSql, DatabaseError, ExecutionContext, MappedStatement, Parameter, RowBounds,
    RowSet, UpdateCount,
};
use super::{Cursor, Executor};

pub struct CachingExecutor {
    delegate: Box<dyn Executor>,
    tcm: TransactionalCacheManager,
}

impl CachingExecutor {
    pub fn new(delegate: Box<dyn Executor>) -> Self {
        Self {
            delegate,
            tcm: TransactionalCacheManager::new(),
        }
    }

    fn flush_cache_if_required(&mut self, ms: &MappedStatement) {
        if let Some(cache) = &ms.cache {
            if ms.flush_cache_required {
                self.tcm.clear(cache);
            }
        }
    }
}

impl Executor for CachingExecutor {
    /// Writes clear the shared cache before they run and again when the
    /// transaction commits
    fn update(
        &mut self,
        ms: &MappedStatement,
        parameter: &Parameter,
        ctx: &ExecutionContext,
    ) -> Result<UpdateCount, DatabaseError> {
        ctx.ensure_active()?;
        if let Some(cache) = &ms.cache {
            if ms.flush_cache_required && !self.delegate.is_closed() {
                tracing::debug!(cache = cache.id(), statement = %ms.id, "clearing shared cache before write");
                cache.clear();
                self.tcm.clear(cache);
            }
        }
        self.delegate.update(ms, parameter, ctx)
    }

    fn query(
        &mut self,
        ms: &MappedStatement,
        parameter: &Parameter,
        bounds: RowBounds,
        key: Option<CacheKey>,
        ctx: &ExecutionContext,
    ) -> Result<RowSet, DatabaseError> {
        if self.delegate.is_closed() {
            return Err(DatabaseError::Closed("Executor"));
        }
        ctx.ensure_active()?;
        let Some(cache) = ms.cache.as_ref() else {
            return self.delegate.query(ms, parameter, bounds, key, ctx);
        };
        self.flush_cache_if_required(ms);
        if !ms.use_cache {
            return self.delegate.query(ms, parameter, bounds, key, ctx);
        }

        let key = match key {
            Some(key) => key,
            None => {
                let bound_sql = ms.bound_sql(parameter)?;
                self.delegate.create_cache_key(ms, parameter, bounds, &bound_sql)
            }
        };
        if let Some(rows) = self.tcm.get(cache, &key) {
            tracing::debug!(cache = cache.id(), statement = %ms.id, "shared cache hit");
            return Ok(rows);
        }

        match self.delegate.query(ms, parameter, bounds, Some(key.clone()), ctx) {
            Ok(rows) => {
                self.tcm.put(cache, key, rows.clone());
                Ok(rows)
            }
            Err(e) => {
                self.tcm.release(cache, &key);
                Err(e)
            }
        }
    }

    fn query_cursor(
        &mut self,
        ms: &MappedStatement,
        parameter: &Parameter,
        bounds: RowBounds,
        ctx: &ExecutionContext,
    ) -> Result<Cursor, DatabaseError> {
        ctx.ensure_active()?;
        self.flush_cache_if_required(ms);
        self.delegate.query_cursor(ms, parameter, bounds, ctx)
    }

    fn flush_statements(&mut self) -> Result<Vec<BatchResult>, DatabaseError> {
        self.delegate.flush_statements()
    }

    fn commit(&mut self, required: bool) -> Result<(), DatabaseError> {
        self.delegate.commit(required)?;
        self.tcm.commit();
        Ok(())
    }

    fn rollback(&mut self, required: bool) -> Result<(), DatabaseError> {
        let result = self.delegate.rollback(required);
        self.tcm.rollback();
        result
    }

    fn close(&mut self, force_rollback: bool) -> Result<(), DatabaseError> {
        if force_rollback {
            self.tcm.rollback();
        } else {
            self.tcm.commit();
        }
        self.delegate.close(force_rollback)
    }

    fn is_closed(&self) -> bool {
        self.delegate.is_closed()
    }

    fn create_cache_key(
        &self,
        ms: &MappedStatement,
        parameter: &Parameter,
        bounds: RowBounds,
        bound_sql: &BoundSql,
    ) -> CacheKey {
        self.delegate.create_cache_key(ms, parameter, bounds, bound_sql)
    }

    fn is_cached(&self, ms: &MappedStatement, key: &CacheKey) -> bool {
        self.delegate.is_cached(ms, key)
    }

    fn clear_local_cache(&mut self) {
        self.delegate.clear_local_cache();
    }
}
