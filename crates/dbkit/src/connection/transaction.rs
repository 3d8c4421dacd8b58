//! Nested transactions and savepoints.
//!
//! Only the outermost `begin` / `commit` / `rollback` reach the database as
//! real transaction commands. Nested levels either map to savepoints (when
//! enabled and supported) or are bookkeeping only. A nested rollback
//! without savepoints cannot undo just its own work, so it marks the outer
//! transaction as doomed: the final `commit` rolls back instead and fails
//! with [`DbError::NestedTransactionRollback`].

use super::Connection;
use crate::dialect::Feature;
use crate::driver::Row;
use crate::error::{DbError, DbResult};
use crate::query::ResultSet;
use crate::value::Value;

/// Tells [`Connection::transactional`] whether the callback's result should
/// be committed.
///
/// `false` and `None` roll back; everything else commits.
pub trait TransactionOutcome {
    fn should_commit(&self) -> bool {
        true
    }
}

impl TransactionOutcome for bool {
    fn should_commit(&self) -> bool {
        *self
    }
}

impl<T> TransactionOutcome for Option<T> {
    fn should_commit(&self) -> bool {
        self.is_some()
    }
}

macro_rules! always_commit {
    ($($t:ty),* $(,)?) => {
        $(impl TransactionOutcome for $t {})*
    };
}

always_commit!((), u64, i64, u32, i32, usize, String, Value, Row, ResultSet);

impl<T> TransactionOutcome for Vec<T> {}

impl Connection {
    /// Start a transaction, or one more nesting level inside the current
    /// one (a savepoint when enabled).
    pub fn begin(&self) -> DbResult<()> {
        let nested = {
            let mut state = self.state();
            if state.active {
                state.level += 1;
                Some((state.level, state.savepoints))
            } else {
                None
            }
        };

        match nested {
            None => {
                self.control("BEGIN", |driver| driver.begin_transaction())?;
                let mut state = self.state();
                state.active = true;
                state.level = 0;
                state.poisoned = false;
            }
            Some((level, true)) => self.create_savepoint(level)?,
            Some(_) => {}
        }
        Ok(())
    }

    /// Commit the current level.
    ///
    /// Returns `Ok(false)` when no transaction is active. At the outermost
    /// level a transaction doomed by a nested rollback is rolled back and
    /// the nested-rollback error returned instead.
    pub fn commit(&self) -> DbResult<bool> {
        let (level, savepoints, poisoned) = {
            let state = self.state();
            if !state.active {
                return Ok(false);
            }
            (state.level, state.savepoints, state.poisoned)
        };

        if level > 0 {
            if savepoints {
                self.release_savepoint(level)?;
            }
            self.state().level = level - 1;
            return Ok(true);
        }

        {
            let mut state = self.state();
            state.active = false;
            state.poisoned = false;
        }
        if poisoned {
            tracing::warn!(
                target: "dbkit.transaction",
                "commit after a nested rollback, rolling back instead"
            );
            if let Err(err) = self.control_once("ROLLBACK", |driver| driver.rollback_transaction()) {
                tracing::warn!(target: "dbkit.transaction", error = %err, "rollback failed");
            }
            return Err(DbError::nested_rollback());
        }
        self.control_once("COMMIT", |driver| driver.commit_transaction())
    }

    /// Roll back the current level.
    ///
    /// `to_beginning` defaults to `true` without savepoints, since a nested
    /// level cannot be undone on its own then. Passing `Some(false)` in that
    /// case only marks the outer transaction as doomed.
    pub fn rollback(&self, to_beginning: Option<bool>) -> DbResult<bool> {
        let (level, savepoints) = {
            let state = self.state();
            if !state.active {
                return Ok(false);
            }
            (state.level, state.savepoints)
        };
        let to_beginning = to_beginning.unwrap_or(!savepoints);

        if level == 0 || to_beginning {
            {
                let mut state = self.state();
                state.level = 0;
                state.active = false;
                state.poisoned = false;
            }
            return self.control_once("ROLLBACK", |driver| driver.rollback_transaction());
        }

        self.state().level = level - 1;
        if savepoints {
            self.rollback_savepoint(level)?;
        } else {
            tracing::debug!(
                target: "dbkit.transaction",
                level,
                "nested rollback without savepoints, outer commit will fail"
            );
            self.state().poisoned = true;
        }
        Ok(true)
    }

    /// Run `f` inside a transaction.
    ///
    /// An error from `f` rolls back and is returned. A result asking for
    /// rollback (see [`TransactionOutcome`]) rolls back and is returned as
    /// is. Otherwise the transaction is committed.
    pub fn transactional<T, F>(&self, f: F) -> DbResult<T>
    where
        F: FnOnce(&Connection) -> DbResult<T>,
        T: TransactionOutcome,
    {
        self.begin()?;

        let result = match f(self) {
            Ok(result) => result,
            Err(err) => {
                self.rollback_after_failure();
                return Err(err);
            }
        };

        if !result.should_commit() {
            self.rollback(Some(false))?;
            return Ok(result);
        }

        match self.commit() {
            Ok(_) => Ok(result),
            Err(err) if err.is_nested_rollback() => {
                self.rollback_after_failure();
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    fn rollback_after_failure(&self) {
        if let Err(err) = self.rollback(Some(false)) {
            tracing::warn!(target: "dbkit.transaction", error = %err, "rollback failed");
        }
    }

    /// Run `f` with foreign key checks disabled. Checks are enabled again
    /// whether `f` succeeds or not.
    pub fn disable_constraints<T, F>(&self, mut f: F) -> DbResult<T>
    where
        F: FnMut(&Connection) -> DbResult<T>,
    {
        let dialect = self.dialect();
        self.retry().run(|| {
            self.run_command(dialect.disable_foreign_keys_sql())?;
            let result = f(self);
            let enabled = self.run_command(dialect.enable_foreign_keys_sql());
            let value = result?;
            enabled?;
            Ok(value)
        })
    }

    pub fn in_transaction(&self) -> bool {
        self.state().active
    }

    /// Nesting depth below the outermost transaction (0 when not nested).
    pub fn transaction_level(&self) -> u32 {
        self.state().level
    }

    /// Use savepoints for nested transactions. Returns whether they are
    /// enabled afterwards, which is never the case when the database lacks
    /// them.
    pub fn enable_savepoints(&self, enabled: bool) -> bool {
        let effective = enabled && self.supports(Feature::Savepoint);
        self.state().savepoints = effective;
        effective
    }

    pub fn is_savepoints_enabled(&self) -> bool {
        self.state().savepoints
    }

    pub fn create_savepoint(&self, name: impl ToString) -> DbResult<()> {
        let sql = self.inner.dialect.savepoint_sql(&name.to_string());
        self.run_command(&sql)
    }

    /// Release a savepoint. A no-op on databases without a release statement.
    pub fn release_savepoint(&self, name: impl ToString) -> DbResult<()> {
        match self.inner.dialect.release_savepoint_sql(&name.to_string()) {
            Some(sql) => self.run_command(&sql),
            None => Ok(()),
        }
    }

    pub fn rollback_savepoint(&self, name: impl ToString) -> DbResult<()> {
        let sql = self.inner.dialect.rollback_savepoint_sql(&name.to_string());
        self.run_command(&sql)
    }
}
