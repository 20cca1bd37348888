use serde::{Deserialize, Serialize};
use std::sync::Arc;
use super::value::Value;

/// One result row as returned by the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Row {
    pub values: Vec<Value>,
    /// Column labels shared by every row of one result set (empty if the store has none)
    #[serde(default = "no_columns")]
    pub columns: Arc<[String]>,
}

fn no_columns() -> Arc<[String]> {
    Arc::from(Vec::new())
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            values,
            columns: no_columns(),
        }
    }

    pub fn with_columns(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Self { values, columns }
    }

    /// Value at a column position
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Value of a labelled column
    pub fn column(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
            .and_then(|idx| self.values.get(idx))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Rows produced by one query, shared between caches and callers
pub type RowSet = Arc<Vec<Row>>;
