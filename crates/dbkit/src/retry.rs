//! Bounded retry of database commands.
//!
//! [`CommandRetry`] re-runs an action while its [`RetryStrategy`] accepts
//! the error, up to a fixed number of retries. The connection wraps every
//! driver call in a [`ReconnectStrategy`], which only retries lost
//! connections and only outside of a transaction.

use crate::connection::Connection;
use crate::error::{DbError, DbResult};

/// Decides whether a failed command is worth another attempt.
pub trait RetryStrategy {
    /// `attempt` counts the retries already made, starting at 0.
    fn should_retry(&self, error: &DbError, attempt: u32) -> bool;
}

impl<F> RetryStrategy for F
where
    F: Fn(&DbError, u32) -> bool,
{
    fn should_retry(&self, error: &DbError, attempt: u32) -> bool {
        self(error, attempt)
    }
}

/// Runs a command, retrying it at most `max_retries` times.
#[derive(Debug, Clone)]
pub struct CommandRetry<S> {
    strategy: S,
    max_retries: u32,
}

impl<S: RetryStrategy> CommandRetry<S> {
    pub fn new(strategy: S, max_retries: u32) -> Self {
        Self {
            strategy,
            max_retries,
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Run `action` until it succeeds, the strategy declines, or the retry
    /// budget is spent. The last error is returned unchanged.
    pub fn run<T>(&self, mut action: impl FnMut() -> DbResult<T>) -> DbResult<T> {
        let mut attempt = 0;
        loop {
            match action() {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if attempt >= self.max_retries || !self.strategy.should_retry(&err, attempt) {
                        return Err(err);
                    }
                    attempt += 1;
                }
            }
        }
    }
}

/// Reconnects after a lost connection so the command can run again.
///
/// Inside a transaction the server side state is gone with the connection,
/// so nothing is retried there.
#[derive(Debug, Clone)]
pub struct ReconnectStrategy {
    connection: Connection,
}

impl ReconnectStrategy {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }
}

impl RetryStrategy for ReconnectStrategy {
    fn should_retry(&self, error: &DbError, attempt: u32) -> bool {
        if !error.is_connection_lost() || self.connection.in_transaction() {
            return false;
        }
        tracing::warn!(
            target: "dbkit.sql",
            attempt = attempt + 1,
            error = %error,
            "connection lost, reconnecting"
        );
        self.connection.disconnect();
        match self.connection.connect() {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(target: "dbkit.sql", error = %err, "reconnect failed");
                false
            }
        }
    }
}
