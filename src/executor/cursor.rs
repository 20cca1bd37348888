/// Lazy row streaming.
///
/// A producer thread feeds rows through a bounded channel; the consumer pulls
/// them one at a time. The producer stops early when the execution context is
/// cancelled or the cursor is closed.

use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use crate::core::{DatabaseError, ExecutionContext, Row, RowBounds};

pub const DEFAULT_CURSOR_CAPACITY: usize = 64;

struct CursorState {
    rx: mpsc::Receiver<Row>,
    producer: Option<JoinHandle<()>>,
    open: bool,
}

impl CursorState {
    fn close(&mut self) {
        if !self.open {
            return;
        }
        self.open = false;
        self.rx.close();
        while self.rx.try_recv().is_ok() {}
        if let Some(producer) = self.producer.take() {
            if producer.join().is_err() {
                tracing::warn!("cursor producer panicked");
            }
        }
    }
}

/// Row stream over one query.
///
/// `next_row` and the `Iterator` impl block the calling thread until the
/// producer delivers a row. Calling them from inside a tokio runtime panics;
/// move the cursor onto `tokio::task::spawn_blocking` or a plain thread first.
pub struct Cursor {
    statement_id: String,
    state: Arc<Mutex<CursorState>>,
    consumed: usize,
}

impl Cursor {
    /// Starts streaming `rows` windowed by `bounds`
    pub fn open(
        statement_id: impl Into<String>,
        rows: Vec<Row>,
        bounds: RowBounds,
        capacity: usize,
        ctx: &ExecutionContext,
    ) -> Result<Self, DatabaseError> {
        let statement_id = statement_id.into();
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let ctx = ctx.clone();
        let producer = std::thread::Builder::new()
            .name(format!("cursor-{statement_id}"))
            .spawn(move || {
                for row in bounds.apply(rows) {
                    if ctx.is_cancelled() || tx.blocking_send(row).is_err() {
                        break;
                    }
                }
            })
            .map_err(|e| DatabaseError::Store(format!("failed to start cursor: {e}")))?;

        Ok(Self {
            statement_id,
            state: Arc::new(Mutex::new(CursorState {
                rx,
                producer: Some(producer),
                open: true,
            })),
            consumed: 0,
        })
    }

    pub fn statement_id(&self) -> &str {
        &self.statement_id
    }

    /// Rows handed out so far
    pub const fn consumed(&self) -> usize {
        self.consumed
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().open
    }

    /// Next row, or `None` once the stream is exhausted or closed.
    ///
    /// # Panics
    ///
    /// Panics when called from an async execution context.
    pub fn next_row(&mut self) -> Option<Row> {
        let mut state = self.state.lock();
        if !state.open {
            return None;
        }
        let row = state.rx.blocking_recv();
        match row {
            Some(row) => {
                self.consumed += 1;
                Some(row)
            }
            None => {
                state.close();
                None
            }
        }
    }

    pub fn close(&mut self) {
        self.state.lock().close();
    }

    /// Handle the owning session uses to close the cursor
    pub(crate) fn handle(&self) -> CursorHandle {
        CursorHandle(Arc::downgrade(&self.state))
    }
}

impl Iterator for Cursor {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        self.next_row()
    }
}

impl Drop for Cursor {
    fn drop(&mut self) {
        self.close();
    }
}

/// Non-owning reference to a cursor's stream
pub(crate) struct CursorHandle(Weak<Mutex<CursorState>>);

impl CursorHandle {
    /// Closes the cursor if it is still alive; returns whether it was open
    pub fn close(&self) -> bool {
        self.0.upgrade().is_some_and(|state| {
            let mut state = state.lock();
            let was_open = state.open;
            state.close();
            was_open
        })
    }

    pub fn is_alive(&self) -> bool {
        self.0.upgrade().is_some_and(|state| state.lock().open)
    }
}
