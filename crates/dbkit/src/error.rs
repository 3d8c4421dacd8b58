//! Error types for dbkit

use thiserror::Error;

/// Result type alias for dbkit operations
pub type DbResult<T> = Result<T, DbError>;

/// Message phrases drivers use when the server connection went away.
const CONNECTION_LOST_PHRASES: &[&str] = &[
    "gone away",
    "lost connection",
    "closed the connection unexpectedly",
    "closed unexpectedly",
    "connection reset by peer",
    "reset by peer",
    "no connection to the server",
    "broken pipe",
    "is dead or not enabled",
    "decryption failed or bad record mac",
    "ssl connection has been closed unexpectedly",
    "error writing data to the connection",
    "write failed",
    "communication link failure",
    "connection timed out",
    "query_wait_timeout",
    "terminate due to client_idle_limit",
];

/// Error types for query building, compilation and execution
#[derive(Debug, Error)]
pub enum DbError {
    /// No driver is registered under the configured name
    #[error("Database driver `{0}` could not be found")]
    MissingDriver(String),

    /// The driver exists but a native capability it needs is unavailable
    #[error("Database driver `{driver}` cannot be used due to a missing extension `{extension}`")]
    MissingExtension { driver: String, extension: String },

    /// An operation needed a live connection and none was available
    #[error("Connection to the database could not be established: {0}")]
    MissingConnection(String),

    /// A nested transaction was rolled back without savepoints
    #[error("{0}")]
    NestedTransactionRollback(String),

    /// The query lacks a clause required to compile it
    #[error("Incomplete query: {0}")]
    IncompleteQuery(String),

    /// An unknown clause was requested, or a clause cannot be applied
    #[error("Invalid clause: {0}")]
    InvalidClause(String),

    /// Malformed builder input
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A type identifier that is not registered
    #[error("Unknown type `{0}`")]
    UnknownType(String),

    /// The dialect does not support a feature the query needs
    #[error("Unsupported by {dialect}: {feature}")]
    Unsupported { dialect: String, feature: String },

    /// A value could not be converted by a type
    #[error("Cannot convert value for type `{type_name}`: {message}")]
    Conversion { type_name: String, message: String },

    /// The driver lost its connection to the server
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// Any other error raised by the driver
    #[error("Driver error: {message}{}", sql.as_deref().map(|s| format!(" (sql: {s})")).unwrap_or_default())]
    Driver {
        message: String,
        sql: Option<String>,
    },

    /// Invalid connection configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DbError {
    /// Create an invalid argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Create an invalid clause error
    pub fn invalid_clause(message: impl Into<String>) -> Self {
        Self::InvalidClause(message.into())
    }

    /// Create an incomplete query error
    pub fn incomplete(message: impl Into<String>) -> Self {
        Self::IncompleteQuery(message.into())
    }

    /// Create a conversion error for a specific type
    pub fn conversion(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Conversion {
            type_name: type_name.into(),
            message: message.into(),
        }
    }

    /// Create a generic driver error
    pub fn driver(message: impl Into<String>) -> Self {
        Self::Driver {
            message: message.into(),
            sql: None,
        }
    }

    /// Create an unsupported-feature error
    pub fn unsupported(dialect: impl Into<String>, feature: impl Into<String>) -> Self {
        Self::Unsupported {
            dialect: dialect.into(),
            feature: feature.into(),
        }
    }

    /// The error raised by a top-level commit after a nested rollback
    pub fn nested_rollback() -> Self {
        Self::NestedTransactionRollback(
            "Cannot commit transaction - rollback() has been already called in the nested transaction"
                .to_string(),
        )
    }

    /// Attach the SQL that was running to a driver error
    pub fn with_sql(self, sql: &str) -> Self {
        match self {
            Self::Driver { message, sql: None } => Self::Driver {
                message,
                sql: Some(sql.to_string()),
            },
            other => other,
        }
    }

    /// Check if this error means the connection to the server was lost
    pub fn is_connection_lost(&self) -> bool {
        match self {
            Self::ConnectionLost(_) => true,
            Self::Driver { message, .. } => {
                let message = message.to_lowercase();
                CONNECTION_LOST_PHRASES
                    .iter()
                    .any(|phrase| message.contains(phrase))
            }
            _ => false,
        }
    }

    /// Check if this is the nested-rollback poisoning error
    pub fn is_nested_rollback(&self) -> bool {
        matches!(self, Self::NestedTransactionRollback(_))
    }

    /// Check if this is an invalid argument error
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_lost_detection() {
        assert!(DbError::ConnectionLost("eof".into()).is_connection_lost());
        assert!(DbError::driver("MySQL server has gone away").is_connection_lost());
        assert!(
            DbError::driver("server closed the connection unexpectedly").is_connection_lost()
        );
        assert!(!DbError::driver("syntax error at or near \"FORM\"").is_connection_lost());
        assert!(!DbError::invalid_argument("gone away").is_connection_lost());
    }

    #[test]
    fn with_sql_only_decorates_driver_errors() {
        let err = DbError::driver("boom").with_sql("SELECT 1");
        assert_eq!(err.to_string(), "Driver error: boom (sql: SELECT 1)");

        let err = DbError::incomplete("no table").with_sql("SELECT 1");
        assert_eq!(err.to_string(), "Incomplete query: no table");
    }
}
