//! SQL parsing helpers.
//!
//! Uses sqlparser-rs with the PostgreSQL dialect, which understands the
//! `$n` placeholders every statement here is written with.

use sqlparser::ast::Statement;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

/// Validates that a SQL string is syntactically valid.
///
/// # Example
///
/// ```
/// use reportkit::sql::validate_sql;
///
/// validate_sql("SELECT * FROM users WHERE id = $1").unwrap();
/// ```
pub fn validate_sql(sql: &str) -> Result<(), String> {
    Parser::parse_sql(&PostgreSqlDialect {}, sql)
        .map(|_| ())
        .map_err(|e| format!("Invalid SQL: {}\nSQL: {}", e, sql))
}

/// Parse `sql` and require exactly one read-only query statement.
pub fn parse_single_query(sql: &str) -> Result<Statement, String> {
    let mut statements =
        Parser::parse_sql(&PostgreSqlDialect {}, sql).map_err(|e| e.to_string())?;

    if statements.len() != 1 {
        return Err(format!(
            "expected a single statement, found {}",
            statements.len()
        ));
    }
    match statements.remove(0) {
        statement @ Statement::Query(_) => Ok(statement),
        other => Err(format!("only SELECT queries are allowed, found: {}", other)),
    }
}
