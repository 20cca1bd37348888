use std::collections::HashMap;
use std::sync::Arc;
use crate::core::{DatabaseError, ExecutionContext, Parameter, RowBounds, StatementResult};
use super::{Interceptor, Signature, Target};

/// Arguments of an intercepted call. Interceptors may rewrite them before
/// proceeding; the target sees the final values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    /// Mapped statement id, or mapper method for mapper calls
    pub statement: Option<String>,
    pub parameter: Parameter,
    pub bounds: RowBounds,
    /// `required` of commit/rollback, `force` of the session variants
    pub flag: bool,
}

impl Arguments {
    pub fn statement(statement: impl Into<String>, parameter: Parameter) -> Self {
        Self {
            statement: Some(statement.into()),
            parameter,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_bounds(mut self, bounds: RowBounds) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn flag(flag: bool) -> Self {
        Self {
            flag,
            ..Self::default()
        }
    }
}

pub type Dispatch<'a> =
    dyn FnMut(Arguments, &ExecutionContext) -> Result<StatementResult, DatabaseError> + 'a;

/// One call travelling through the chain
pub struct Invocation<'a> {
    signature: Signature,
    args: Arguments,
    context: ExecutionContext,
    attributes: HashMap<String, serde_json::Value>,
    interceptors: Arc<[Arc<dyn Interceptor>]>,
    position: usize,
    target: &'a mut Dispatch<'a>,
}

impl<'a> Invocation<'a> {
    pub(crate) fn new(
        signature: Signature,
        args: Arguments,
        context: ExecutionContext,
        interceptors: Arc<[Arc<dyn Interceptor>]>,
        target: &'a mut Dispatch<'a>,
    ) -> Self {
        Self {
            signature,
            args,
            context,
            attributes: HashMap::new(),
            interceptors,
            position: 0,
            target,
        }
    }

    pub const fn signature(&self) -> &Signature {
        &self.signature
    }

    pub const fn target(&self) -> Target {
        self.signature.target
    }

    pub fn method(&self) -> &str {
        &self.signature.method
    }

    pub const fn args(&self) -> &Arguments {
        &self.args
    }

    pub fn args_mut(&mut self) -> &mut Arguments {
        &mut self.args
    }

    pub const fn context(&self) -> &ExecutionContext {
        &self.context
    }

    /// Scratch values shared by the interceptors of this call
    pub fn attribute(&self, name: &str) -> Option<&serde_json::Value> {
        self.attributes.get(name)
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: serde_json::Value) {
        self.attributes.insert(name.into(), value);
    }

    /// Runs the next interceptor, or the target once every interceptor has run
    pub fn proceed(&mut self) -> Result<StatementResult, DatabaseError> {
        match self.interceptors.get(self.position).cloned() {
            Some(next) => {
                self.position += 1;
                let result = next.intercept(self);
                self.position -= 1;
                result
            }
            None => (self.target)(self.args.clone(), &self.context),
        }
    }
}
