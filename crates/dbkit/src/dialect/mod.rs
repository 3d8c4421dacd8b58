//! Per-database SQL facts.
//!
//! A [`Dialect`] knows how a database spells identifiers, transaction
//! control and constraint toggling, which optional [`Feature`]s it has, and
//! how portable query constructs must be rewritten before compilation
//! (see [`translate`]). Every dialect is also its own
//! [`QueryCompiler`](crate::compiler::QueryCompiler).

mod mysql;
mod postgres;
mod sqlite;
mod sqlserver;
pub mod translate;

#[cfg(test)]
mod tests;

pub use mysql::Mysql;
pub use postgres::Postgres;
pub use sqlite::Sqlite;
pub use sqlserver::SqlServer;

use crate::compiler::QueryCompiler;
use crate::error::{DbError, DbResult};
use crate::expr::FunctionExpression;
use crate::query::Query;
use crate::quoter::IdentifierQuoter;
use crate::value::Value;
use std::fmt;
use std::sync::Arc;

/// Optional capabilities a database may advertise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    /// Common table expressions (`WITH`).
    Cte,
    Json,
    Savepoint,
    /// Foreign keys can be toggled outside of a transaction.
    DisableConstraintWithoutTransaction,
    TruncateWithConstraints,
    /// Window functions and the `WINDOW` clause.
    Window,
    Intersect,
    IntersectAll,
    /// Set operation branches may carry their own ORDER BY / LIMIT.
    SetOperationsOrderBy,
}

/// SQL facts for one database product.
pub trait Dialect: Send + Sync + fmt::Debug {
    /// Short lowercase name, e.g. `"postgres"`.
    fn name(&self) -> &'static str;

    /// Opening and closing identifier quote characters.
    fn quote_chars(&self) -> (&'static str, &'static str);

    fn supports(&self, feature: Feature) -> bool;

    /// The compiler that renders queries for this dialect.
    fn compiler(&self) -> &dyn QueryCompiler;

    fn quoter(&self) -> IdentifierQuoter {
        let (start, end) = self.quote_chars();
        IdentifierQuoter::new(start, end)
    }

    fn quote_identifier(&self, identifier: &str) -> String {
        self.quoter().quote_identifier(identifier)
    }

    /// A value rendered as a SQL literal, for schema statements.
    fn schema_value(&self, value: &Value) -> String {
        value.to_sql_literal()
    }

    /// Whether `DISTINCT ON (...)` is native; otherwise it becomes GROUP BY.
    fn supports_distinct_on(&self) -> bool {
        false
    }

    fn savepoint_sql(&self, name: &str) -> String {
        format!("SAVEPOINT LEVEL{name}")
    }

    /// `None` when the database has no release statement.
    fn release_savepoint_sql(&self, name: &str) -> Option<String> {
        Some(format!("RELEASE SAVEPOINT LEVEL{name}"))
    }

    fn rollback_savepoint_sql(&self, name: &str) -> String {
        format!("ROLLBACK TO SAVEPOINT LEVEL{name}")
    }

    fn disable_foreign_keys_sql(&self) -> &'static str;

    fn enable_foreign_keys_sql(&self) -> &'static str;

    /// Dialect specific rewrites of a SELECT, run after the portable ones.
    fn translate_select(&self, _query: &mut Query) -> DbResult<()> {
        Ok(())
    }

    fn translate_insert(&self, _query: &mut Query) -> DbResult<()> {
        Ok(())
    }

    /// Rewrite a portable function call (`CONCAT`, `NOW`, ...) into this
    /// dialect's spelling.
    fn rewrite_function(&self, _function: &mut FunctionExpression) {}
}

/// Look up a built-in dialect by name (`mysql`, `postgres`, `sqlite`,
/// `sqlserver`, plus a few common aliases).
pub fn by_name(name: &str) -> DbResult<Arc<dyn Dialect>> {
    let dialect: Arc<dyn Dialect> = match name.to_ascii_lowercase().as_str() {
        "mysql" | "mariadb" => Arc::new(Mysql::new()),
        "postgres" | "postgresql" | "pgsql" => Arc::new(Postgres::new()),
        "sqlite" | "sqlite3" => Arc::new(Sqlite::new()),
        "sqlserver" | "mssql" => Arc::new(SqlServer::new()),
        other => {
            return Err(DbError::Config(format!("Unknown SQL dialect `{other}`")));
        }
    };
    Ok(dialect)
}
