/// Mapped statements and the SQL they resolve to.
///
/// A `MappedStatement` is registered once at startup and shared read-only by
/// every session. Resolving it against a parameter yields a `BoundSql`
/// owned by the single invocation that produced it.

use std::fmt;
use std::sync::Arc;
use serde::{Deserialize, Serialize};
use crate::cache::Cache;
use super::error::DatabaseError;
use super::parameter::Parameter;
use super::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SqlCommandType {
    Unknown,
    Select,
    Insert,
    Update,
    Delete,
}

impl SqlCommandType {
    #[must_use]
    pub const fn is_select(&self) -> bool {
        matches!(self, Self::Select)
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Select => "select",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// Resolved SQL text plus the ordered names of the properties bound to its placeholders
#[derive(Debug, Clone, PartialEq)]
pub struct BoundSql {
    pub sql: String,
    pub parameter_mappings: Vec<String>,
    pub parameter: Parameter,
}

impl BoundSql {
    pub fn new(sql: impl Into<String>, parameter_mappings: Vec<String>, parameter: Parameter) -> Self {
        Self {
            sql: sql.into(),
            parameter_mappings,
            parameter,
        }
    }

    /// Positional arguments in placeholder order
    pub fn positional_args(&self) -> Result<Vec<Value>, DatabaseError> {
        self.parameter_mappings
            .iter()
            .map(|name| {
                self.parameter
                    .property(name)
                    .cloned()
                    .ok_or_else(|| DatabaseError::MissingParameter(name.clone()))
            })
            .collect()
    }
}

/// Produces the final SQL for a parameter. The templating engine that
/// implements dynamic sources lives outside this crate.
pub trait SqlSource: Send + Sync {
    fn bound_sql(&self, parameter: &Parameter) -> Result<BoundSql, DatabaseError>;
}

/// SQL whose text does not depend on the parameter
#[derive(Debug, Clone)]
pub struct StaticSqlSource {
    sql: String,
    parameter_mappings: Vec<String>,
}

impl StaticSqlSource {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            parameter_mappings: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_mappings<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.parameter_mappings = names.into_iter().map(Into::into).collect();
        self
    }
}

impl SqlSource for StaticSqlSource {
    fn bound_sql(&self, parameter: &Parameter) -> Result<BoundSql, DatabaseError> {
        Ok(BoundSql::new(
            self.sql.clone(),
            self.parameter_mappings.clone(),
            parameter.clone(),
        ))
    }
}

/// Driver-level statement kind hint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatementType {
    Statement,
    #[default]
    Prepared,
    Callable,
}

/// A registered, namespace-qualified statement
pub struct MappedStatement {
    pub id: String,
    pub command_type: SqlCommandType,
    pub sql_source: Arc<dyn SqlSource>,
    pub statement_type: StatementType,
    pub use_cache: bool,
    pub flush_cache_required: bool,
    /// Rows arrive ordered by their grouping key, so nested results can be released early
    pub result_ordered: bool,
    pub fetch_size: Option<u32>,
    /// Shared second-level cache of the statement's namespace
    pub cache: Option<Arc<dyn Cache>>,
}

impl MappedStatement {
    /// Starts a builder with the cache flags defaulted from the command type
    pub fn builder(id: impl Into<String>, command_type: SqlCommandType, sql_source: Arc<dyn SqlSource>) -> MappedStatementBuilder {
        let is_select = command_type.is_select();
        MappedStatementBuilder {
            statement: Self {
                id: id.into(),
                command_type,
                sql_source,
                statement_type: StatementType::default(),
                use_cache: is_select,
                flush_cache_required: !is_select,
                result_ordered: false,
                fetch_size: None,
                cache: None,
            },
        }
    }

    pub fn bound_sql(&self, parameter: &Parameter) -> Result<BoundSql, DatabaseError> {
        self.sql_source.bound_sql(parameter)
    }

    /// Namespace part of the id (`"user.findById"` -> `"user"`)
    pub fn namespace(&self) -> &str {
        self.id.rsplit_once('.').map_or("", |(ns, _)| ns)
    }
}

impl fmt::Debug for MappedStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappedStatement")
            .field("id", &self.id)
            .field("command_type", &self.command_type)
            .field("use_cache", &self.use_cache)
            .field("flush_cache_required", &self.flush_cache_required)
            .field("cache", &self.cache.as_ref().map(|c| c.id().to_string()))
            .finish_non_exhaustive()
    }
}

pub struct MappedStatementBuilder {
    statement: MappedStatement,
}

impl MappedStatementBuilder {
    #[must_use]
    pub fn use_cache(mut self, use_cache: bool) -> Self {
        self.statement.use_cache = use_cache;
        self
    }

    #[must_use]
    pub fn flush_cache_required(mut self, flush: bool) -> Self {
        self.statement.flush_cache_required = flush;
        self
    }

    #[must_use]
    pub fn statement_type(mut self, statement_type: StatementType) -> Self {
        self.statement.statement_type = statement_type;
        self
    }

    #[must_use]
    pub fn result_ordered(mut self, ordered: bool) -> Self {
        self.statement.result_ordered = ordered;
        self
    }

    #[must_use]
    pub fn fetch_size(mut self, fetch_size: Option<u32>) -> Self {
        self.statement.fetch_size = fetch_size;
        self
    }

    #[must_use]
    pub fn cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.statement.cache = Some(cache);
        self
    }

    pub fn build(self) -> MappedStatement {
        self.statement
    }
}
