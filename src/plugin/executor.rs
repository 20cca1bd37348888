use crate::cache::CacheKey;
use crate::core::{
    BatchResult, BoundSql, DatabaseError, ExecutionContext, MappedStatement, Parameter, RowBounds,
    RowSet, StatementResult, UpdateCount,
};
use crate::executor::{Cursor, Executor};
use super::chain::InterceptorChain;
use super::invocation::Arguments;
use super::Signature;

/// Routes `update`, `query`, `query_cursor`, `commit` and `rollback`
/// through the chain.
///
/// Interceptors here may rewrite the parameter and the row bounds. The
/// mapped statement is fixed by the caller, so a rewritten `statement`
/// argument is not followed; retarget calls at the session or mapper level.
pub struct InterceptingExecutor {
    delegate: Box<dyn Executor>,
    chain: InterceptorChain,
}

impl InterceptingExecutor {
    pub fn new(delegate: Box<dyn Executor>, chain: InterceptorChain) -> Self {
        Self { delegate, chain }
    }

    /// Wraps `delegate` only when there is something to intercept
    pub fn wrap(delegate: Box<dyn Executor>, chain: &InterceptorChain) -> Box<dyn Executor> {
        if chain.is_empty() {
            delegate
        } else {
            Box::new(Self::new(delegate, chain.clone()))
        }
    }
}

fn unexpected(method: &str, result: &StatementResult) -> DatabaseError {
    DatabaseError::UnexpectedResult {
        method: method.to_string(),
        found: result.kind(),
    }
}

fn warn_if_retargeted(ms: &MappedStatement, args: &Arguments) {
    if let Some(statement) = args.statement.as_deref().filter(|s| *s != ms.id) {
        tracing::warn!(
            statement = %ms.id,
            requested = statement,
            "executor interceptors cannot change the statement; running the original"
        );
    }
}

impl Executor for InterceptingExecutor {
    fn update(
        &mut self,
        ms: &MappedStatement,
        parameter: &Parameter,
        ctx: &ExecutionContext,
    ) -> Result<UpdateCount, DatabaseError> {
        let delegate = &mut self.delegate;
        let result = self.chain.invoke(
            Signature::executor("update"),
            Arguments::statement(ms.id.as_str(), parameter.clone()),
            ctx,
            |args, ctx| {
                warn_if_retargeted(ms, &args);
                delegate.update(ms, &args.parameter, ctx).map(StatementResult::Affected)
            },
        )?;
        result.update_count().ok_or_else(|| unexpected("update", &result))
    }

    fn query(
        &mut self,
        ms: &MappedStatement,
        parameter: &Parameter,
        bounds: RowBounds,
        key: Option<CacheKey>,
        ctx: &ExecutionContext,
    ) -> Result<RowSet, DatabaseError> {
        let delegate = &mut self.delegate;
        let mut key = key;
        let result = self.chain.invoke(
            Signature::executor("query"),
            Arguments::statement(ms.id.as_str(), parameter.clone()).with_bounds(bounds),
            ctx,
            |args, ctx| {
                warn_if_retargeted(ms, &args);
                // A precomputed key is stale once an interceptor rewrote the inputs
                let key = key
                    .take()
                    .filter(|_| args.parameter == *parameter && args.bounds == bounds);
                delegate
                    .query(ms, &args.parameter, args.bounds, key, ctx)
                    .map(StatementResult::RowSet)
            },
        )?;
        match result {
            StatementResult::RowSet(rows) => Ok(rows),
            other => Err(unexpected("query", &other)),
        }
    }

    fn query_cursor(
        &mut self,
        ms: &MappedStatement,
        parameter: &Parameter,
        bounds: RowBounds,
        ctx: &ExecutionContext,
    ) -> Result<Cursor, DatabaseError> {
        let delegate = &mut self.delegate;
        let mut opened = None;
        let result = self.chain.invoke(
            Signature::executor("query_cursor"),
            Arguments::statement(ms.id.as_str(), parameter.clone()).with_bounds(bounds),
            ctx,
            |args, ctx| {
                opened = Some(delegate.query_cursor(ms, &args.parameter, args.bounds, ctx)?);
                Ok(StatementResult::CursorOpened(ms.id.clone()))
            },
        )?;
        opened.ok_or_else(|| unexpected("query_cursor", &result))
    }

    fn flush_statements(&mut self) -> Result<Vec<BatchResult>, DatabaseError> {
        self.delegate.flush_statements()
    }

    fn commit(&mut self, required: bool) -> Result<(), DatabaseError> {
        let delegate = &mut self.delegate;
        self.chain
            .invoke(
                Signature::executor("commit"),
                Arguments::flag(required),
                &ExecutionContext::default(),
                |args, _| delegate.commit(args.flag).map(|()| StatementResult::Unit),
            )
            .map(|_| ())
    }

    fn rollback(&mut self, required: bool) -> Result<(), DatabaseError> {
        let delegate = &mut self.delegate;
        self.chain
            .invoke(
                Signature::executor("rollback"),
                Arguments::flag(required),
                &ExecutionContext::default(),
                |args, _| delegate.rollback(args.flag).map(|()| StatementResult::Unit),
            )
            .map(|_| ())
    }

    fn close(&mut self, force_rollback: bool) -> Result<(), DatabaseError> {
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
