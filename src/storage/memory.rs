/// In-memory backing store.
///
/// Tables are plain row vectors behind one lock. Every SQL text the store
/// understands is registered up front together with a handler that runs it
/// against the tables; preparing anything else fails. A connection with
/// auto-commit off snapshots the tables on its first execution and restores
/// the snapshot on rollback.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use parking_lot::{Mutex, RwLock};
use crate::core::{DatabaseError, Row, Value};
use super::{count_placeholders, Connection, Driver, PreparedStatement, StoreOutcome};

pub type Handler =
    Arc<dyn Fn(&mut MemoryTables, &[Value]) -> Result<StoreOutcome, DatabaseError> + Send + Sync>;

#[derive(Debug, Clone)]
pub struct MemoryTable {
    columns: Arc<[String]>,
    rows: Vec<Row>,
}

impl MemoryTable {
    pub fn new(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn column_index(&self, name: &str) -> Result<usize, DatabaseError> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
            .ok_or_else(|| DatabaseError::Store(format!("Column '{name}' does not exist")))
    }

    pub fn insert(&mut self, values: Vec<Value>) -> Result<(), DatabaseError> {
        if values.len() != self.columns.len() {
            return Err(DatabaseError::Store(format!(
                "Expected {} values, got {}",
                self.columns.len(),
                values.len()
            )));
        }
        self.rows.push(Row::with_columns(Arc::clone(&self.columns), values));
        Ok(())
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn update_where<F, U>(&mut self, predicate: F, updater: U) -> usize
    where
        F: Fn(&Row) -> bool,
        U: Fn(&mut Row),
    {
        let mut updated = 0;
        for row in self.rows.iter_mut().filter(|r| predicate(r)) {
            updater(row);
            updated += 1;
        }
        updated
    }

    pub fn delete_where<F>(&mut self, predicate: F) -> usize
    where
        F: Fn(&Row) -> bool,
    {
        let before = self.rows.len();
        self.rows.retain(|r| !predicate(r));
        before - self.rows.len()
    }

    pub fn count(&self) -> usize {
        self.rows.len()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryTables {
    tables: HashMap<String, MemoryTable>,
}

impl MemoryTables {
    pub fn create_table(&mut self, name: &str, columns: &[&str]) {
        self.tables.insert(name.to_string(), MemoryTable::new(columns));
    }

    pub fn table(&self, name: &str) -> Result<&MemoryTable, DatabaseError> {
        self.tables
            .get(name)
            .ok_or_else(|| DatabaseError::Store(format!("Table '{name}' does not exist")))
    }

    pub fn table_mut(&mut self, name: &str) -> Result<&mut MemoryTable, DatabaseError> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| DatabaseError::Store(format!("Table '{name}' does not exist")))
    }
}

/// Counters of driver activity since creation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStats {
    pub connections: u64,
    pub prepares: u64,
    pub executions: u64,
    pub commits: u64,
    pub rollbacks: u64,
}

#[derive(Default)]
struct Counters {
    connections: AtomicU64,
    prepares: AtomicU64,
    executions: AtomicU64,
    commits: AtomicU64,
    rollbacks: AtomicU64,
}

#[derive(Default)]
struct Shared {
    tables: RwLock<MemoryTables>,
    handlers: RwLock<HashMap<String, Handler>>,
    counters: Counters,
    executed: Mutex<Vec<String>>,
    latency: Mutex<Option<Duration>>,
}

/// Cloning shares the same tables, handlers and counters
#[derive(Clone, Default)]
pub struct MemoryDriver {
    shared: Arc<Shared>,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_table(&self, name: &str, columns: &[&str]) {
        self.shared.tables.write().create_table(name, columns);
    }

    /// Loads a row directly, outside any connection
    pub fn insert_row(&self, table: &str, values: Vec<Value>) -> Result<(), DatabaseError> {
        self.shared.tables.write().table_mut(table)?.insert(values)
    }

    /// Committed-or-dirty contents of a table; empty for unknown tables
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.shared
            .tables
            .read()
            .table(table)
            .map(|t| t.rows().to_vec())
            .unwrap_or_default()
    }

    /// Registers the handler that runs `sql`
    pub fn on<F>(&self, sql: &str, handler: F)
    where
        F: Fn(&mut MemoryTables, &[Value]) -> Result<StoreOutcome, DatabaseError> + Send + Sync + 'static,
    {
        self.shared.handlers.write().insert(sql.to_string(), Arc::new(handler));
    }

    /// `sql` returns every row of `table`
    pub fn select_all(&self, sql: &str, table: &str) {
        let table = table.to_string();
        self.on(sql, move |tables, _| {
            Ok(StoreOutcome::rows(tables.table(&table)?.rows().to_vec()))
        });
    }

    /// `sql` returns the rows whose `column` equals the first argument
    pub fn select_by(&self, sql: &str, table: &str, column: &str) {
        let (table, column) = (table.to_string(), column.to_string());
        self.on(sql, move |tables, args| {
            let key = first_arg(args)?;
            let table = tables.table(&table)?;
            let idx = table.column_index(&column)?;
            let rows = table
                .rows()
                .iter()
                .filter(|r| r.get(idx) == Some(key))
                .cloned()
                .collect();
            Ok(StoreOutcome::rows(rows))
        });
    }

    /// `sql` inserts its arguments as one row
    pub fn insert_into(&self, sql: &str, table: &str) {
        let table = table.to_string();
        self.on(sql, move |tables, args| {
            tables.table_mut(&table)?.insert(args.to_vec())?;
            Ok(StoreOutcome::affected(1))
        });
    }

    /// `sql` sets `set_column` to the first argument where `key_column` equals the second
    pub fn update_by(&self, sql: &str, table: &str, set_column: &str, key_column: &str) {
        let (table, set_column, key_column) =
            (table.to_string(), set_column.to_string(), key_column.to_string());
        self.on(sql, move |tables, args| {
            let (new_value, key) = match args {
                [new_value, key, ..] => (new_value.clone(), key.clone()),
                _ => return Err(DatabaseError::Store("Expected 2 arguments".to_string())),
            };
            let table = tables.table_mut(&table)?;
            let set_idx = table.column_index(&set_column)?;
            let key_idx = table.column_index(&key_column)?;
            let updated = table.update_where(
                |r| r.get(key_idx) == Some(&key),
                |r| r.values[set_idx] = new_value.clone(),
            );
            Ok(StoreOutcome::affected(updated as u64))
        });
    }

    /// `sql` deletes the rows whose `column` equals the first argument
    pub fn delete_by(&self, sql: &str, table: &str, column: &str) {
        let (table, column) = (table.to_string(), column.to_string());
        self.on(sql, move |tables, args| {
            let key = first_arg(args)?.clone();
            let table = tables.table_mut(&table)?;
            let idx = table.column_index(&column)?;
            let deleted = table.delete_where(|r| r.get(idx) == Some(&key));
            Ok(StoreOutcome::affected(deleted as u64))
        });
    }

    /// `sql` always fails with `message`
    pub fn fail(&self, sql: &str, message: &str) {
        let message = message.to_string();
        self.on(sql, move |_, _| Err(DatabaseError::Store(message.clone())));
    }

    /// Delay added to every execution
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.shared.latency.lock() = latency;
    }

    pub fn stats(&self) -> MemoryStats {
        let c = &self.shared.counters;
        MemoryStats {
            connections: c.connections.load(Ordering::SeqCst),
            prepares: c.prepares.load(Ordering::SeqCst),
            executions: c.executions.load(Ordering::SeqCst),
            commits: c.commits.load(Ordering::SeqCst),
            rollbacks: c.rollbacks.load(Ordering::SeqCst),
        }
    }

    /// SQL texts in execution order
    pub fn executed(&self) -> Vec<String> {
        self.shared.executed.lock().clone()
    }

    /// Number of executions of one SQL text
    pub fn executions_of(&self, sql: &str) -> usize {
        self.shared.executed.lock().iter().filter(|s| *s == sql).count()
    }
}

fn first_arg(args: &[Value]) -> Result<&Value, DatabaseError> {
    args.first()
        .ok_or_else(|| DatabaseError::Store("Expected 1 argument".to_string()))
}

impl Driver for MemoryDriver {
    fn connect(&self) -> Result<Box<dyn Connection>, DatabaseError> {
        self.shared.counters.connections.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryConnection {
            shared: Arc::clone(&self.shared),
            state: Arc::new(Mutex::new(ConnectionState {
                auto_commit: true,
                snapshot: None,
                closed: false,
            })),
        }))
    }
}

struct ConnectionState {
    auto_commit: bool,
    /// Tables as they were before this connection's first uncommitted execution
    snapshot: Option<MemoryTables>,
    closed: bool,
}

struct MemoryConnection {
    shared: Arc<Shared>,
    state: Arc<Mutex<ConnectionState>>,
}

impl MemoryConnection {
    fn ensure_open(&self) -> Result<(), DatabaseError> {
        if self.state.lock().closed {
            Err(DatabaseError::Closed("Connection"))
        } else {
            Ok(())
        }
    }

    fn restore_snapshot(&self) {
        if let Some(snapshot) = self.state.lock().snapshot.take() {
            *self.shared.tables.write() = snapshot;
        }
    }
}

impl Connection for MemoryConnection {
    fn prepare(&mut self, sql: &str) -> Result<Box<dyn PreparedStatement>, DatabaseError> {
        self.ensure_open()?;
        let handler = self
            .shared
            .handlers
            .read()
            .get(sql)
            .cloned()
            .ok_or_else(|| DatabaseError::Store(format!("Unsupported statement: {sql}")))?;
        self.shared.counters.prepares.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryStatement {
            sql: sql.to_string(),
            parameter_count: count_placeholders(sql),
            handler,
            shared: Arc::clone(&self.shared),
            state: Arc::clone(&self.state),
            closed: false,
        }))
    }

    fn set_auto_commit(&mut self, auto_commit: bool) -> Result<(), DatabaseError> {
        self.ensure_open()?;
        let mut state = self.state.lock();
        if auto_commit && !state.auto_commit {
            state.snapshot = None;
        }
        state.auto_commit = auto_commit;
        Ok(())
    }

    fn auto_commit(&self) -> bool {
        self.state.lock().auto_commit
    }

    fn commit(&mut self) -> Result<(), DatabaseError> {
        self.ensure_open()?;
        self.state.lock().snapshot = None;
        self.shared.counters.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), DatabaseError> {
        self.ensure_open()?;
        self.restore_snapshot();
        self.shared.counters.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Uncommitted work is rolled back
    fn close(&mut self) -> Result<(), DatabaseError> {
        if self.state.lock().closed {
            return Ok(());
        }
        self.restore_snapshot();
        self.state.lock().closed = true;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

struct MemoryStatement {
    sql: String,
    parameter_count: usize,
    handler: Handler,
    shared: Arc<Shared>,
    state: Arc<Mutex<ConnectionState>>,
    closed: bool,
}

impl PreparedStatement for MemoryStatement {
    fn sql(&self) -> &str {
        &self.sql
    }

    fn parameter_count(&self) -> usize {
        self.parameter_count
    }

    fn execute(&mut self, args: &[Value]) -> Result<StoreOutcome, DatabaseError> {
        if self.closed {
            return Err(DatabaseError::Closed("Statement"));
        }
        if args.len() != self.parameter_count {
            return Err(DatabaseError::Store(format!(
                "Statement expects {} parameters, got {}",
                self.parameter_count,
                args.len()
            )));
        }
        let latency = *self.shared.latency.lock();
        if let Some(latency) = latency {
            std::thread::sleep(latency);
        }

        let mut state = self.state.lock();
        if state.closed {
            return Err(DatabaseError::Closed("Connection"));
        }
        self.shared.counters.executions.fetch_add(1, Ordering::SeqCst);
        self.shared.executed.lock().push(self.sql.clone());

        let mut tables = self.shared.tables.write();
        if !state.auto_commit && state.snapshot.is_none() {
            state.snapshot = Some(tables.clone());
        }
        drop(state);
        (self.handler)(&mut tables, args)
    }

    fn is_closed(&self) -> bool {
        self.closed || self.state.lock().closed
    }

    fn close(&mut self) {
        self.closed = true;
    }
}
