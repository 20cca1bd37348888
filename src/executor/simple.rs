use crate::core::{BatchResult, BoundSql, DatabaseError, MappedStatement, Row, UpdateCount};
use crate::transaction::Transaction;
use super::base::ExecutionStrategy;

/// Prepares, executes and drops a handle on every call
#[derive(Debug, Default, Clone, Copy)]
pub struct SimpleStrategy;

impl ExecutionStrategy for SimpleStrategy {
    fn name(&self) -> &'static str {
        "simple"
    }

    fn do_update(
        &mut self,
        tx: &mut dyn Transaction,
        _ms: &MappedStatement,
        bound_sql: &BoundSql,
    ) -> Result<UpdateCount, DatabaseError> {
        let args = bound_sql.positional_args()?;
        let mut statement = tx.connection()?.prepare(&bound_sql.sql)?;
        let outcome = statement.execute(&args);
        statement.close();
        Ok(UpdateCount::Rows(outcome?.rows_affected))
    }

    fn do_query(
        &mut self,
        tx: &mut dyn Transaction,
        _ms: &MappedStatement,
        bound_sql: &BoundSql,
    ) -> Result<Vec<Row>, DatabaseError> {
        let args = bound_sql.positional_args()?;
        let mut statement = tx.connection()?.prepare(&bound_sql.sql)?;
        let outcome = statement.execute(&args);
        statement.close();
        Ok(outcome?.rows)
    }

    fn do_flush(
        &mut self,
        _tx: &mut dyn Transaction,
        _is_rollback: bool,
    ) -> Result<Vec<BatchResult>, DatabaseError> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Parameter, Value};
    use crate::executor::test_support::fixture;

    #[test]
    fn test_prepares_every_call() {
        let f = fixture();
        let mut tx = f.transaction();
        let mut strategy = SimpleStrategy;
        let bound = f.find_by_id.bound_sql(&Parameter::from(2_i64)).unwrap();

        let rows = strategy.do_query(tx.as_mut(), &f.find_by_id, &bound).unwrap();
        strategy.do_query(tx.as_mut(), &f.find_by_id, &bound).unwrap();
        assert_eq!(rows[0].column("name"), Some(&Value::from("bob")));
        assert_eq!(f.driver.stats().prepares, 2);
    }

    #[test]
    fn test_missing_parameter() {
        let f = fixture();
        let mut tx = f.transaction();
        let bound = f.rename.bound_sql(&Parameter::named([("id", 1)])).unwrap();
        let result = SimpleStrategy.do_update(tx.as_mut(), &f.rename, &bound);
        assert!(matches!(result, Err(DatabaseError::MissingParameter(name)) if name == "name"));
        assert_eq!(f.driver.stats().executions, 0);
    }
}
