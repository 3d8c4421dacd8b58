//! Convenient imports for typical `dbkit` usage.
//!
//! ```ignore
//! use dbkit::prelude::*;
//! ```

pub use crate::{
    Condition, Connection, ConnectionConfig, DbError, DbResult, DriverRegistry, Expression,
    Feature, JoinType, Query, QueryExpression, ResultSet, Row, TypeMap, Value, ValueBinder,
    WindowExpression,
};
