/// Plugin interception.
///
/// Interceptors wrap calls on executors, sessions and mappers. For each call
/// the chain keeps the interceptors whose `intercepts` accepts the call's
/// `Signature`, then runs them in order; each one decides whether and how to
/// `proceed` to the next, and the last `proceed` reaches the real target.

pub mod invocation;
pub mod chain;
pub mod executor;

pub use invocation::{Arguments, Invocation};
pub use chain::{InterceptorChain, PluginRegistry};
pub use executor::InterceptingExecutor;

use std::collections::HashMap;
use std::fmt;
use crate::core::{DatabaseError, StatementResult};

/// Plugin configuration values
pub type Properties = HashMap<String, serde_json::Value>;

/// Kind of object a call is made on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Executor,
    Session,
    Mapper,
}

impl Target {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Executor => "executor",
            Self::Session => "session",
            Self::Mapper => "mapper",
        }
    }
}

/// Target plus method name of an interceptable call
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    pub target: Target,
    pub method: String,
}

impl Signature {
    pub fn new(target: Target, method: impl Into<String>) -> Self {
        Self {
            target,
            method: method.into(),
        }
    }

    pub fn executor(method: impl Into<String>) -> Self {
        Self::new(Target::Executor, method)
    }

    pub fn session(method: impl Into<String>) -> Self {
        Self::new(Target::Session, method)
    }

    pub fn mapper(method: impl Into<String>) -> Self {
        Self::new(Target::Mapper, method)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.target.as_str(), self.method)
    }
}

pub trait Interceptor: Send + Sync {
    fn name(&self) -> &str;

    /// Lower runs first (outermost)
    fn order(&self) -> i32 {
        0
    }

    fn intercepts(&self, signature: &Signature) -> bool;

    fn set_properties(&mut self, _properties: &Properties) {}

    /// Runs around the call. Returning without calling `proceed` skips the
    /// rest of the chain and the target.
    fn intercept(&self, invocation: &mut Invocation<'_>) -> Result<StatementResult, DatabaseError>;
}
