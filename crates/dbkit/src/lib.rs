//! # dbkit
//!
//! A dialect-aware SQL query builder with a driver/connection abstraction.
//!
//! ## Features
//!
//! - **One AST, many dialects**: queries are built once and compiled for
//!   MySQL, Postgres, SQLite or SQL Server
//! - **Parameterized by default**: every value becomes a named placeholder
//!   (`:p0`, `:p1`, ...) bound through a [`ValueBinder`]
//! - **Typed values**: a [`TypeRegistry`] converts values on the way in and
//!   casts result columns on the way out
//! - **Identifier quoting**: optional automatic quoting of table and column
//!   names right before compilation
//! - **Nested transactions**: savepoints when available, and a doomed outer
//!   transaction when a nested level rolls back without them
//! - **Reconnects**: statements interrupted by a lost connection are retried
//!   once on a fresh connection
//!
//! ## Example
//!
//! ```ignore
//! use dbkit::prelude::*;
//!
//! let registry = DriverRegistry::with_recording_drivers();
//! let conn = Connection::from_config(
//!     &ConnectionConfig::new("recording").dialect("sqlite"),
//!     &registry,
//! )?;
//!
//! // SELECT
//! let rows = conn
//!     .select_query()
//!     .select(["id", "title"])
//!     .from("articles")
//!     .where_([("author_id", 1)])?
//!     .order([("id", "DESC")])?
//!     .limit(5)
//!     .all()?;
//!
//! // INSERT
//! conn.insert_query("articles")
//!     .insert(["title", "author_id"])?
//!     .values([("title", Value::from("Hello")), ("author_id", Value::from(1))])?
//!     .execute()?;
//!
//! // UPDATE
//! conn.update_query("articles")
//!     .set("published", true)
//!     .where_([("id", 3)])?
//!     .execute()?;
//!
//! // DELETE
//! conn.delete_query("articles").where_([("id", 3)])?.execute()?;
//! # Ok::<(), dbkit::DbError>(())
//! ```

pub mod binder;
pub mod compiler;
pub mod config;
pub mod connection;
pub mod dialect;
pub mod driver;
pub mod error;
pub mod expr;
pub mod log;
pub mod prelude;
pub mod query;
pub mod quoter;
pub mod retry;
pub mod types;
pub mod value;

pub use binder::{Binding, ValueBinder};
pub use compiler::QueryCompiler;
pub use config::{ConnectionConfig, DriverConfig, RoleOverrides};
pub use connection::{Connection, ConnectionBuilder, TransactionOutcome};
pub use dialect::{Dialect, Feature, Mysql, Postgres, SqlServer, Sqlite};
pub use driver::{
    Driver, DriverRegistry, RecordedCall, RecordingDriver, RecordingHandle, Row, Statement,
};
pub use error::{DbError, DbResult};
pub use expr::{
    BetweenExpression, CaseExpression, CommonTableExpression, ComparisonExpression, Condition,
    Expression, Field, FunctionExpression, FunctionsBuilder, IdentifierExpression, IntoConditions,
    IntoOrderItems, Operand, OrderByExpression, OrderClauseExpression, OrderItem, QueryExpression,
    UnaryExpression, ValuesExpression, WindowExpression,
};
pub use log::{LoggedQuery, MemoryLogger, NoopLogger, QueryLogger, TracingLogger};
pub use query::{JoinType, Query, QueryType, ResultSet, Role, TableRef};
pub use quoter::IdentifierQuoter;
pub use retry::{CommandRetry, ReconnectStrategy, RetryStrategy};
pub use types::{FieldTypeConverter, SqlType, TypeMap, TypeRegistry};
pub use value::{BindingKind, FromValue, Value};
