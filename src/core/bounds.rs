use serde::{Deserialize, Serialize};

/// Upper bound on the number of rows a query may return
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Limit {
    /// No limit. Distinct from `Rows(0)`, which returns nothing
    Unbounded,
    Rows(usize),
}

impl std::fmt::Display for Limit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unbounded => write!(f, "unbounded"),
            Self::Rows(n) => write!(f, "{n}"),
        }
    }
}

/// Offset/limit window applied to a result set before it is cached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RowBounds {
    pub offset: usize,
    pub limit: Limit,
}

impl RowBounds {
    pub const DEFAULT: Self = Self {
        offset: 0,
        limit: Limit::Unbounded,
    };

    #[must_use]
    pub const fn new(offset: usize, limit: usize) -> Self {
        Self {
            offset,
            limit: Limit::Rows(limit),
        }
    }

    #[must_use]
    pub const fn is_default(&self) -> bool {
        self.offset == 0 && matches!(self.limit, Limit::Unbounded)
    }

    /// Applies the window to a full result
    pub fn apply<T>(&self, rows: Vec<T>) -> Vec<T> {
        if self.is_default() {
            return rows;
        }
        let iter = rows.into_iter().skip(self.offset);
        match self.limit {
            Limit::Unbounded => iter.collect(),
            Limit::Rows(n) => iter.take(n).collect(),
        }
    }
}

impl Default for RowBounds {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_window() {
        let rows: Vec<i32> = (0..10).collect();
        assert_eq!(RowBounds::new(2, 3).apply(rows.clone()), vec![2, 3, 4]);
        assert_eq!(RowBounds::DEFAULT.apply(rows.clone()), rows);
        assert!(RowBounds::new(0, 0).apply(rows).is_empty());
    }

    #[test]
    fn test_unbounded_is_not_zero() {
        assert_ne!(Limit::Unbounded, Limit::Rows(0));
        assert!(!RowBounds::new(0, 0).is_default());
    }
}
