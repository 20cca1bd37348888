use thiserror::Error;
use super::result::BatchResult;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Mapped statement '{0}' not found")]
    StatementNotFound(String),
    #[error("Mapped statement '{0}' already exists")]
    StatementAlreadyExists(String),
    #[error("Expected one result (or none) from '{statement}', but found {count}")]
    TooManyResults { statement: String, count: usize },
    #[error("{0} is closed")]
    Closed(&'static str),
    #[error("Store error: {0}")]
    Store(String),
    #[error("Interceptor '{interceptor}' aborted the invocation: {reason}")]
    InterceptorAbort { interceptor: String, reason: String },
    #[error("'{method}' produced an unexpected {found} result")]
    UnexpectedResult { method: String, found: &'static str },
    #[error("{failed} of {} batch operations failed", .results.len())]
    BatchFailed { failed: usize, results: Vec<BatchResult> },
    #[error("Unit of work was cancelled")]
    Cancelled,
    #[error("Parameter '{0}' not found")]
    MissingParameter(String),
    #[error("Plugin '{0}' not found")]
    PluginNotFound(String),
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("JSON Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DatabaseError {
    /// Shorthand used by interceptors that decline to proceed.
    pub fn abort(interceptor: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InterceptorAbort {
            interceptor: interceptor.into(),
            reason: reason.into(),
        }
    }
}
