//! Query logging.
//!
//! When logging is enabled on a [`Connection`](crate::Connection), every
//! executed statement is reported to a [`QueryLogger`] as a [`LoggedQuery`].
//! The default logger emits `tracing` events under the `dbkit.sql` target.

use crate::query::Role;
use crate::value::Value;
use regex::Regex;
use std::fmt;
use std::sync::{Mutex, OnceLock, PoisonError};
use std::time::Duration;
use tracing::Level;

fn placeholder_token() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| {
        Regex::new(r":[A-Za-z_][A-Za-z0-9_]*").expect("invalid built-in placeholder regex")
    })
}

/// Cut `sql` to at most `max_bytes`, respecting char boundaries.
pub(crate) fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}

/// One executed statement.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedQuery {
    pub sql: String,
    /// Bound values by placeholder name (without `:`).
    pub params: Vec<(String, Value)>,
    pub took: Duration,
    pub num_rows: u64,
    pub role: Role,
    /// The error message, when the statement failed.
    pub error: Option<String>,
}

impl LoggedQuery {
    /// The SQL with every bound placeholder replaced by its literal value.
    /// For display only; never execute the result.
    pub fn interpolate(&self) -> String {
        placeholder_token()
            .replace_all(&self.sql, |caps: &regex::Captures<'_>| {
                let token = &caps[0];
                self.params
                    .iter()
                    .find(|(name, _)| name == &token[1..])
                    .map(|(_, value)| value.to_sql_literal())
                    .unwrap_or_else(|| token.to_string())
            })
            .into_owned()
    }
}

impl fmt::Display for LoggedQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "duration={} rows={} role={} {}",
            self.took.as_millis(),
            self.num_rows,
            self.role.as_str(),
            self.interpolate()
        )
    }
}

/// Receives executed statements.
pub trait QueryLogger: Send + Sync + fmt::Debug {
    fn log(&self, query: &LoggedQuery);
}

/// Emits each statement as a `tracing` event.
#[derive(Debug, Clone)]
pub struct TracingLogger {
    /// Tracing event level to emit at.
    pub level: Level,
    /// Truncate long SQL strings (in bytes). `None` means no truncation.
    pub max_sql_length: Option<usize>,
}

impl Default for TracingLogger {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
            max_sql_length: Some(200),
        }
    }
}

impl TracingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn max_sql_length(mut self, len: usize) -> Self {
        self.max_sql_length = Some(len);
        self
    }

    pub fn no_truncate(mut self) -> Self {
        self.max_sql_length = None;
        self
    }

    fn truncate_sql(&self, sql: &str) -> String {
        match self.max_sql_length {
            Some(max) if sql.len() > max => format!("{}...", truncate_sql_bytes(sql, max)),
            _ => sql.to_string(),
        }
    }
}

impl QueryLogger for TracingLogger {
    fn log(&self, query: &LoggedQuery) {
        /// Dispatch a tracing event at a runtime-determined level.
        macro_rules! emit_at_level {
            ($level:expr, $($field:tt)*) => {
                match $level {
                    Level::ERROR => tracing::error!($($field)*),
                    Level::WARN  => tracing::warn!($($field)*),
                    Level::INFO  => tracing::info!($($field)*),
                    Level::DEBUG => tracing::debug!($($field)*),
                    Level::TRACE => tracing::trace!($($field)*),
                }
            };
        }

        let sql = self.truncate_sql(&query.interpolate());
        let took_ms = query.took.as_millis() as u64;
        match &query.error {
            Some(error) => tracing::warn!(
                target: "dbkit.sql",
                role = query.role.as_str(),
                took_ms,
                error = %error,
                sql = %sql,
                "query failed"
            ),
            None => emit_at_level!(
                self.level,
                target: "dbkit.sql",
                role = query.role.as_str(),
                took_ms,
                num_rows = query.num_rows,
                param_count = query.params.len(),
                sql = %sql,
            ),
        }
    }
}

/// Keeps every logged statement in memory.
#[derive(Debug, Default)]
pub struct MemoryLogger {
    queries: Mutex<Vec<LoggedQuery>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queries(&self) -> Vec<LoggedQuery> {
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear(&self) {
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl QueryLogger for MemoryLogger {
    fn log(&self, query: &LoggedQuery) {
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(query.clone());
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLogger;

impl QueryLogger for NoopLogger {
    fn log(&self, _query: &LoggedQuery) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logged(sql: &str, params: Vec<(&str, Value)>) -> LoggedQuery {
        LoggedQuery {
            sql: sql.to_string(),
            params: params
                .into_iter()
                .map(|(n, v)| (n.to_string(), v))
                .collect(),
            took: Duration::from_millis(3),
            num_rows: 1,
            role: Role::Read,
            error: None,
        }
    }

    #[test]
    fn interpolate_replaces_known_placeholders() {
        let query = logged(
            "SELECT * FROM t WHERE a = :p0 AND b = :p1 AND c = :other",
            vec![("p0", Value::Int(1)), ("p1", Value::from("it's"))],
        );
        assert_eq!(
            query.interpolate(),
            "SELECT * FROM t WHERE a = 1 AND b = 'it''s' AND c = :other"
        );
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_sql_bytes("héllo", 2), "h");
        assert_eq!(truncate_sql_bytes("abc", 10), "abc");
        let logger = TracingLogger::new().max_sql_length(3);
        assert_eq!(logger.truncate_sql("SELECT 1"), "SEL...");
    }

    #[test]
    fn memory_logger_collects_queries() {
        let logger = MemoryLogger::new();
        logger.log(&logged("SELECT 1", Vec::new()));
        assert_eq!(logger.queries().len(), 1);
        logger.clear();
        assert!(logger.queries().is_empty());
    }
}
