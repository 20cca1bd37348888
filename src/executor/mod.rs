/// Executor module - runs mapped statements against a transaction
///
/// Structure:
/// - base: local (first-level) cache, lifecycle, cancellation checks
/// - simple / reuse / batch: how statements are prepared and executed
/// - caching: shared (second-level) cache in front of any executor
/// - cursor: lazy row streaming

pub mod base;
pub mod simple;
pub mod reuse;
pub mod batch;
pub mod caching;
pub mod cursor;

pub use base::{BaseExecutor, ExecutionStrategy};
pub use simple::SimpleStrategy;
pub use reuse::ReuseStrategy;
pub use batch::BatchStrategy;
pub use caching::CachingExecutor;
pub use cursor::{Cursor, DEFAULT_CURSOR_CAPACITY};

use serde::{Deserialize, Serialize};
use crate::cache::CacheKey;
use crate::core::{
    BatchResult, BoundSql, DatabaseError, ExecutionContext, MappedStatement, Parameter, RowBounds,
    RowSet, UpdateCount,
};
use crate::transaction::Transaction;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorType {
    #[default]
    Simple,
    Reuse,
    Batch,
}

/// Lifetime of first-level cache entries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocalCacheScope {
    /// Entries live until the next write, commit or rollback
    #[default]
    Session,
    /// Entries are dropped after every query
    Statement,
}

/// Statement execution against one transaction
pub trait Executor: Send {
    fn update(
        &mut self,
        ms: &MappedStatement,
        parameter: &Parameter,
        ctx: &ExecutionContext,
    ) -> Result<UpdateCount, DatabaseError>;

    /// `key` is computed from the other arguments when absent
    fn query(
        &mut self,
        ms: &MappedStatement,
        parameter: &Parameter,
        bounds: RowBounds,
        key: Option<CacheKey>,
        ctx: &ExecutionContext,
    ) -> Result<RowSet, DatabaseError>;

    fn query_cursor(
        &mut self,
        ms: &MappedStatement,
        parameter: &Parameter,
        bounds: RowBounds,
        ctx: &ExecutionContext,
    ) -> Result<Cursor, DatabaseError>;

    fn flush_statements(&mut self) -> Result<Vec<BatchResult>, DatabaseError>;

    fn commit(&mut self, required: bool) -> Result<(), DatabaseError>;

    fn rollback(&mut self, required: bool) -> Result<(), DatabaseError>;

    fn close(&mut self, force_rollback: bool) -> Result<(), DatabaseError>;

    fn is_closed(&self) -> bool;

    fn create_cache_key(
        &self,
        ms: &MappedStatement,
        parameter: &Parameter,
        bounds: RowBounds,
        bound_sql: &BoundSql,
    ) -> CacheKey;

    /// Whether the local cache holds `key`
    fn is_cached(&self, ms: &MappedStatement, key: &CacheKey) -> bool;

    fn clear_local_cache(&mut self);
}

/// Per-session executor settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorOptions {
    pub environment: String,
    pub local_cache_scope: LocalCacheScope,
    pub cache_enabled: bool,
    pub cursor_capacity: usize,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            environment: "default".to_string(),
            local_cache_scope: LocalCacheScope::default(),
            cache_enabled: true,
            cursor_capacity: DEFAULT_CURSOR_CAPACITY,
        }
    }
}

/// Builds the executor stack for one session: a strategy executor, wrapped
/// by the shared-cache tier when caching is enabled
pub fn new_executor(
    executor_type: ExecutorType,
    transaction: Box<dyn Transaction>,
    options: &ExecutorOptions,
) -> Box<dyn Executor> {
    fn base<S: ExecutionStrategy + 'static>(
        strategy: S,
        transaction: Box<dyn Transaction>,
        options: &ExecutorOptions,
    ) -> Box<dyn Executor> {
        Box::new(
            BaseExecutor::new(strategy, transaction, &options.environment)
                .with_local_cache_scope(options.local_cache_scope)
                .with_cursor_capacity(options.cursor_capacity),
        )
    }

    let executor = match executor_type {
        ExecutorType::Simple => base(SimpleStrategy, transaction, options),
        ExecutorType::Reuse => base(ReuseStrategy::new(), transaction, options),
        ExecutorType::Batch => base(BatchStrategy::new(), transaction, options),
    };
    if options.cache_enabled {
        Box::new(CachingExecutor::new(executor))
    } else {
        executor
    }
}
