// mapperust - statement execution pipeline for a data-mapping layer
// Cache keys, layered caches, executors, sessions and interceptors

// Clippy configuration
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::significant_drop_tightening)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::type_complexity)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::new_without_default)]

// Values, rows, parameters, mapped statements, errors
pub mod core;

// Cache keys and the decorator-based cache hierarchy
pub mod cache;

// Backing store boundary and the in-memory driver
pub mod storage;

// Connection ownership, commit and rollback
pub mod transaction;

// Local cache executor, strategies, shared-cache tier, cursors
pub mod executor;

// Interceptor chain and plugin registry
pub mod plugin;

// Sessions, session factory, configuration, mapper dispatch
pub mod session;

// Re-export commonly used types for convenience
pub use core::{
    DatabaseError, ExecutionContext, MappedStatement, Parameter, Row, RowBounds, RowSet,
    SqlCommandType, StatementResult, StaticSqlSource, UpdateCount, Value,
};
pub use cache::{Cache, CacheBuilder, CacheKey, CacheLayer, CacheSettings};
pub use executor::{Cursor, Executor, ExecutorType};
pub use plugin::{Interceptor, Invocation, PluginRegistry, Signature};
pub use session::{Configuration, Mapper, MapperDefinition, ReturnKind, Session, SessionFactory, Settings};
pub use storage::{Driver, MemoryDriver};
