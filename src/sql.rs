//! Syntax checks for rendered SQL using sqlparser-rs.

use sqlparser::dialect::{Dialect, DuckDbDialect, GenericDialect};
use sqlparser::parser::Parser;

use crate::error::{Error, Result};
use crate::schema::ExecutionTarget;

fn parser_dialect(target: ExecutionTarget) -> Box<dyn Dialect> {
    match target {
        ExecutionTarget::Local => Box::new(DuckDbDialect {}),
        // sqlparser has no Spark/Databricks dialect
        ExecutionTarget::Databricks => Box::new(GenericDialect {}),
    }
}

/// Parse `sql` for the pipeline's execution target.
///
/// # Errors
///
/// `Error::Validation` carrying the parser message when the text does not parse.
pub fn validate_sql(sql: &str, target: ExecutionTarget) -> Result<()> {
    let dialect = parser_dialect(target);
    Parser::parse_sql(&*dialect, sql)
        .map(|_| ())
        .map_err(|e| Error::validation(format!("Rendered SQL is invalid for {target:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_valid_sql() {
        let sql = "-- features: age\nSELECT\n  p.person_id AS person_id\nFROM semantic.patients p";
        validate_sql(sql, ExecutionTarget::Local).unwrap();
        validate_sql(sql, ExecutionTarget::Databricks).unwrap();
    }

    #[test]
    fn test_validate_invalid_sql() {
        let err = validate_sql("SELEC * FORM users", ExecutionTarget::Local).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
