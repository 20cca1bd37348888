// Module declarations
pub mod error;
pub mod value;
pub mod row;
pub mod parameter;
pub mod bounds;
pub mod statement;
pub mod result;
pub mod context;

// Re-exports for convenience
pub use error::DatabaseError;
pub use value::Value;
pub use row::{Row, RowSet};
pub use parameter::Parameter;
pub use bounds::{Limit, RowBounds};
pub use statement::{
    BoundSql, MappedStatement, MappedStatementBuilder, SqlCommandType, SqlSource, StatementType,
    StaticSqlSource,
};
pub use result::{BatchOutcome, BatchResult, StatementResult, UpdateCount};
pub use context::ExecutionContext;
