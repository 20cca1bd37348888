use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use super::value::Value;

/// Parameter object handed to a mapped statement.
///
/// Compared by deep value equality, never by identity: two separately built
/// parameters with the same content produce the same cache key.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub enum Parameter {
    #[default]
    None,
    /// A single scalar; it satisfies every property lookup
    Single(Value),
    /// Ordered arguments, addressable as `param1..N`, `arg0..N-1` or plain indices
    Positional(Vec<Value>),
    /// Named properties
    Named(BTreeMap<String, Value>),
}

impl Parameter {
    /// Builds a named parameter from `(name, value)` pairs
    pub fn named<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self::Named(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Resolves a property name to a value
    pub fn property(&self, name: &str) -> Option<&Value> {
        match self {
            Self::None => None,
            Self::Single(value) => Some(value),
            Self::Named(map) => map.get(name),
            Self::Positional(values) => positional_index(name).and_then(|idx| values.get(idx)),
        }
    }

    #[must_use]
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

fn positional_index(name: &str) -> Option<usize> {
    if let Some(n) = name.strip_prefix("param") {
        return n.parse::<usize>().ok().and_then(|n| n.checked_sub(1));
    }
    if let Some(n) = name.strip_prefix("arg") {
        return n.parse().ok();
    }
    name.parse().ok()
}

impl From<Value> for Parameter {
    fn from(value: Value) -> Self {
        Self::Single(value)
    }
}

impl From<i64> for Parameter {
    fn from(value: i64) -> Self {
        Self::Single(Value::Integer(value))
    }
}

impl From<&str> for Parameter {
    fn from(value: &str) -> Self {
        Self::Single(Value::Text(value.to_string()))
    }
}

impl From<Vec<Value>> for Parameter {
    fn from(values: Vec<Value>) -> Self {
        Self::Positional(values)
    }
}

impl From<()> for Parameter {
    fn from((): ()) -> Self {
        Self::None
    }
}
