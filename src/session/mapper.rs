/// Mapper dispatch.
///
/// A mapper is a named set of methods, each bound to one mapped statement
/// and a result shape. Calls are looked up in the definition's table and
/// forwarded to the matching session operation; nothing is generated at
/// runtime.

use std::collections::HashMap;
use std::sync::Arc;
use crate::core::{DatabaseError, Parameter, SqlCommandType, StatementResult, Value};
use crate::plugin::{Arguments, Signature};
use super::session::Session;

/// What a mapper method hands back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnKind {
    /// At most one row
    One,
    Many,
    /// Row count of an insert, update or delete
    Affected,
    /// Results of the pending batch
    Flush,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapperMethod {
    pub statement: String,
    pub returns: ReturnKind,
    /// Property names for the call arguments, in order
    pub param_names: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct MapperDefinition {
    namespace: String,
    methods: HashMap<String, MapperMethod>,
}

impl MapperDefinition {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            methods: HashMap::new(),
        }
    }

    /// Binds `name` to `statement`; ids without a dot are taken relative to the namespace
    #[must_use]
    pub fn method(self, name: &str, statement: &str, returns: ReturnKind) -> Self {
        self.method_with_params(name, statement, returns, &[])
    }

    #[must_use]
    pub fn method_with_params(mut self, name: &str, statement: &str, returns: ReturnKind, params: &[&str]) -> Self {
        let statement = if statement.contains('.') {
            statement.to_string()
        } else {
            format!("{}.{statement}", self.namespace)
        };
        self.methods.insert(
            name.to_string(),
            MapperMethod {
                statement,
                returns,
                param_names: params.iter().map(|p| (*p).to_string()).collect(),
            },
        );
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn get(&self, method: &str) -> Option<&MapperMethod> {
        self.methods.get(method)
    }
}

impl MapperMethod {
    /// Packs call arguments into a statement parameter
    pub fn parameter(&self, args: Vec<Value>) -> Result<Parameter, DatabaseError> {
        if !self.param_names.is_empty() {
            if args.len() < self.param_names.len() {
                return Err(DatabaseError::MissingParameter(self.param_names[args.len()].clone()));
            }
            return Ok(Parameter::named(self.param_names.iter().cloned().zip(args)));
        }
        let mut args = args;
        Ok(match args.len() {
            0 => Parameter::None,
            1 => Parameter::Single(args.remove(0)),
            _ => Parameter::Positional(args),
        })
    }
}

/// Callable view of one mapper definition
#[derive(Debug, Clone)]
pub struct Mapper {
    definition: Arc<MapperDefinition>,
}

impl Mapper {
    pub const fn new(definition: Arc<MapperDefinition>) -> Self {
        Self { definition }
    }

    pub fn namespace(&self) -> &str {
        self.definition.namespace()
    }

    pub fn call(&self, session: &mut Session, method: &str, args: Vec<Value>) -> Result<StatementResult, DatabaseError> {
        let entry = self.definition.get(method).ok_or_else(|| {
            DatabaseError::StatementNotFound(format!("{}.{method}", self.definition.namespace()))
        })?;
        let parameter = entry.parameter(args)?;
        let chain = session.interceptor_chain().clone();
        let ctx = session.context();
        chain.invoke(
            Signature::mapper(method),
            Arguments::statement(entry.statement.as_str(), parameter),
            &ctx,
            |args, _| {
                let statement = args.statement.as_deref().unwrap_or(entry.statement.as_str());
                dispatch(session, statement, entry.returns, args.parameter)
            },
        )
    }
}

fn dispatch(
    session: &mut Session,
    statement: &str,
    returns: ReturnKind,
    parameter: Parameter,
) -> Result<StatementResult, DatabaseError> {
    match returns {
        ReturnKind::One => session.select_one(statement, parameter).map(StatementResult::Row),
        ReturnKind::Many => session.select_list(statement, parameter).map(StatementResult::RowSet),
        ReturnKind::Flush => session.flush_statements().map(StatementResult::Batch),
        ReturnKind::Affected => {
            let command = session.configuration().mapped_statement(statement)?.command_type;
            let count = match command {
                SqlCommandType::Insert => session.insert(statement, parameter),
                SqlCommandType::Delete => session.delete(statement, parameter),
                _ => session.update(statement, parameter),
            }?;
            Ok(StatementResult::Affected(count))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition() -> MapperDefinition {
        MapperDefinition::new("user")
            .method("findById", "findById", ReturnKind::One)
            .method_with_params("rename", "rename", ReturnKind::Affected, &["name", "id"])
            .method("report", "report.all", ReturnKind::Many)
    }

    #[test]
    fn test_statement_ids_qualified() {
        let definition = definition();
        assert_eq!(definition.get("findById").unwrap().statement, "user.findById");
        assert_eq!(definition.get("report").unwrap().statement, "report.all");
        assert!(definition.get("missing").is_none());
    }

    #[test]
    fn test_argument_marshalling() {
        let definition = definition();
        let find = definition.get("findById").unwrap();
        assert_eq!(find.parameter(vec![]).unwrap(), Parameter::None);
        assert_eq!(find.parameter(vec![Value::Integer(1)]).unwrap(), Parameter::Single(Value::Integer(1)));
        assert_eq!(
            find.parameter(vec![Value::Integer(1), Value::Integer(2)]).unwrap(),
            Parameter::Positional(vec![Value::Integer(1), Value::Integer(2)])
        );

        let rename = definition.get("rename").unwrap();
        let parameter = rename.parameter(vec![Value::from("bob"), Value::Integer(2)]).unwrap();
        assert_eq!(parameter.property("name"), Some(&Value::from("bob")));
        assert_eq!(parameter.property("id"), Some(&Value::Integer(2)));
        assert!(matches!(
            rename.parameter(vec![Value::from("bob")]),
            Err(DatabaseError::MissingParameter(name)) if name == "id"
        ));
    }
}
