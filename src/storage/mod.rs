// Storage module - backing store driver boundary and the in-memory driver

pub mod memory;

pub use memory::{MemoryDriver, MemoryStats, MemoryTable, MemoryTables};

use crate::core::{DatabaseError, Row, Value};

/// What the store returns for one execution
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreOutcome {
    pub rows: Vec<Row>,
    pub rows_affected: u64,
}

impl StoreOutcome {
    pub const fn affected(rows_affected: u64) -> Self {
        Self {
            rows: Vec::new(),
            rows_affected,
        }
    }

    pub fn rows(rows: Vec<Row>) -> Self {
        Self {
            rows,
            rows_affected: 0,
        }
    }
}

/// Entry point of a backing store
pub trait Driver: Send + Sync {
    fn connect(&self) -> Result<Box<dyn Connection>, DatabaseError>;
}

/// One store connection, owned by a single transaction
pub trait Connection: Send {
    fn prepare(&mut self, sql: &str) -> Result<Box<dyn PreparedStatement>, DatabaseError>;

    fn set_auto_commit(&mut self, auto_commit: bool) -> Result<(), DatabaseError>;

    fn auto_commit(&self) -> bool;

    fn commit(&mut self) -> Result<(), DatabaseError>;

    fn rollback(&mut self) -> Result<(), DatabaseError>;

    fn close(&mut self) -> Result<(), DatabaseError>;

    fn is_closed(&self) -> bool;
}

/// Prepared handle; arguments are rebound on every `execute`
pub trait PreparedStatement: Send {
    fn sql(&self) -> &str;

    /// Number of positional placeholders the handle was prepared with
    fn parameter_count(&self) -> usize;

    fn execute(&mut self, args: &[Value]) -> Result<StoreOutcome, DatabaseError>;

    fn is_closed(&self) -> bool {
        false
    }

    fn close(&mut self) {}
}

/// Counts `?` placeholders outside single-quoted literals
pub fn count_placeholders(sql: &str) -> usize {
    let mut in_literal = false;
    sql.chars()
        .filter(|c| {
            if *c == '\'' {
                in_literal = !in_literal;
            }
            *c == '?' && !in_literal
        })
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_placeholders() {
        assert_eq!(count_placeholders("SELECT * FROM t WHERE a = ? AND b = ?"), 2);
        assert_eq!(count_placeholders("SELECT '?' FROM t WHERE a = ?"), 1);
        assert_eq!(count_placeholders("SELECT 1"), 0);
    }
}
