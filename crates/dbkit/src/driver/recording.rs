use super::{Driver, Row, Statement};
use crate::dialect::Dialect;
use crate::error::{DbError, DbResult};
use crate::value::{BindingKind, Value};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Message used for simulated disconnects; it matches the phrases the
/// connection layer treats as a lost connection.
const GONE_AWAY: &str = "MySQL server has gone away";

/// One statement the driver executed.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub sql: String,
    /// Bound values by placeholder name, in binding order.
    pub params: Vec<(String, Value)>,
}

#[derive(Debug, Clone)]
enum Failure {
    Lost,
    Driver(String),
}

#[derive(Debug, Clone)]
struct ScriptedResult {
    columns: Arc<[String]>,
    rows: Vec<Vec<Value>>,
    row_count: Option<u64>,
}

#[derive(Debug, Default)]
struct State {
    connected: bool,
    connects: usize,
    calls: Vec<RecordedCall>,
    results: VecDeque<ScriptedResult>,
    failures: VecDeque<Failure>,
    last_insert_id: Value,
}

impl State {
    fn take_failure(&mut self) -> DbResult<()> {
        match self.failures.pop_front() {
            None => Ok(()),
            Some(Failure::Lost) => {
                self.connected = false;
                Err(DbError::ConnectionLost(GONE_AWAY.to_string()))
            }
            Some(Failure::Driver(message)) => Err(DbError::driver(message)),
        }
    }

    fn record(&mut self, sql: &str, params: Vec<(String, Value)>) {
        self.calls.push(RecordedCall {
            sql: sql.to_string(),
            params,
        });
    }
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Inspects and scripts a [`RecordingDriver`] from the outside, after the
/// driver itself has been handed to a connection.
#[derive(Debug, Clone)]
pub struct RecordingHandle {
    state: Arc<Mutex<State>>,
}

impl RecordingHandle {
    /// Every executed statement, including transaction control.
    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.state).calls.clone()
    }

    /// Just the SQL of every executed statement.
    pub fn sql_log(&self) -> Vec<String> {
        lock(&self.state).calls.iter().map(|c| c.sql.clone()).collect()
    }

    pub fn last_call(&self) -> Option<RecordedCall> {
        lock(&self.state).calls.last().cloned()
    }

    pub fn clear(&self) {
        lock(&self.state).calls.clear();
    }

    /// Queue the rows returned by the next executed statement.
    pub fn push_result(&self, columns: &[&str], rows: Vec<Vec<Value>>) {
        let columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        lock(&self.state).results.push_back(ScriptedResult {
            columns: columns.into(),
            rows,
            row_count: None,
        });
    }

    /// Queue an affected-row count for the next executed statement.
    pub fn push_row_count(&self, count: u64) {
        lock(&self.state).results.push_back(ScriptedResult {
            columns: Vec::<String>::new().into(),
            rows: Vec::new(),
            row_count: Some(count),
        });
    }

    /// Make the next `count` statements (or transaction commands) fail as if
    /// the server dropped the connection.
    pub fn fail_next(&self, count: usize) {
        let mut state = lock(&self.state);
        state.failures.extend(std::iter::repeat_n(Failure::Lost, count));
    }

    /// Make the next statement fail with an ordinary driver error.
    pub fn fail_next_with(&self, message: &str) {
        lock(&self.state)
            .failures
            .push_back(Failure::Driver(message.to_string()));
    }

    /// How many times the driver (re)connected.
    pub fn connect_count(&self) -> usize {
        lock(&self.state).connects
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.state).connected
    }

    pub fn set_last_insert_id(&self, id: impl Into<Value>) {
        lock(&self.state).last_insert_id = id.into();
    }
}

/// An in-memory driver that records every statement instead of talking to
/// a server. Results are scripted through its [`RecordingHandle`].
pub struct RecordingDriver {
    dialect: Arc<dyn Dialect>,
    state: Arc<Mutex<State>>,
    auto_quote: bool,
}

impl RecordingDriver {
    pub fn new(dialect: Arc<dyn Dialect>) -> Self {
        Self {
            dialect,
            state: Arc::new(Mutex::new(State::default())),
            auto_quote: false,
        }
    }

    pub fn handle(&self) -> RecordingHandle {
        RecordingHandle {
            state: Arc::clone(&self.state),
        }
    }

    fn control(&mut self, sql: &str) -> DbResult<bool> {
        let mut state = lock(&self.state);
        if !state.connected {
            return Err(DbError::MissingConnection(
                "the recording driver is not connected".to_string(),
            ));
        }
        state.take_failure()?;
        state.record(sql, Vec::new());
        Ok(true)
    }
}

impl fmt::Debug for RecordingDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingDriver")
            .field("dialect", &self.dialect.name())
            .field("auto_quote", &self.auto_quote)
            .finish()
    }
}

impl Driver for RecordingDriver {
    fn name(&self) -> &str {
        "recording"
    }

    fn dialect(&self) -> Arc<dyn Dialect> {
        Arc::clone(&self.dialect)
    }

    fn connect(&mut self) -> DbResult<()> {
        let mut state = lock(&self.state);
        if !state.connected {
            state.connected = true;
            state.connects += 1;
        }
        Ok(())
    }

    fn disconnect(&mut self) {
        lock(&self.state).connected = false;
    }

    fn is_connected(&self) -> bool {
        lock(&self.state).connected
    }

    fn prepare(&mut self, sql: &str) -> DbResult<Box<dyn Statement>> {
        if !self.is_connected() {
            return Err(DbError::MissingConnection(
                "the recording driver is not connected".to_string(),
            ));
        }
        Ok(Box::new(RecordingStatement {
            sql: sql.to_string(),
            params: Vec::new(),
            state: Arc::clone(&self.state),
            columns: Vec::<String>::new().into(),
            rows: VecDeque::new(),
            row_count: 0,
        }))
    }

    fn begin_transaction(&mut self) -> DbResult<bool> {
        self.control("BEGIN")
    }

    fn commit_transaction(&mut self) -> DbResult<bool> {
        self.control("COMMIT")
    }

    fn rollback_transaction(&mut self) -> DbResult<bool> {
        self.control("ROLLBACK")
    }

    fn last_insert_id(&mut self, _table: Option<&str>, _column: Option<&str>) -> DbResult<Value> {
        Ok(lock(&self.state).last_insert_id.clone())
    }

    fn auto_quoting(&self) -> bool {
        self.auto_quote
    }

    fn set_auto_quoting(&mut self, enabled: bool) {
        self.auto_quote = enabled;
    }
}

#[derive(Debug)]
struct RecordingStatement {
    sql: String,
    params: Vec<(String, Value)>,
    state: Arc<Mutex<State>>,
    columns: Arc<[String]>,
    rows: VecDeque<Vec<Value>>,
    row_count: u64,
}

impl Statement for RecordingStatement {
    fn bind_value(&mut self, name: &str, value: Value, _kind: BindingKind) {
        match self.params.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = value,
            None => self.params.push((name.to_string(), value)),
        }
    }

    fn execute(&mut self) -> DbResult<bool> {
        let mut state = lock(&self.state);
        if !state.connected {
            return Err(DbError::ConnectionLost(GONE_AWAY.to_string()));
        }
        state.take_failure()?;
        state.record(&self.sql, self.params.clone());

        match state.results.pop_front() {
            Some(result) => {
                self.row_count = result.row_count.unwrap_or(result.rows.len() as u64);
                self.columns = result.columns;
                self.rows = result.rows.into();
            }
            None => {
                self.row_count = 0;
                self.rows.clear();
            }
        }
        Ok(true)
    }

    fn fetch(&mut self) -> DbResult<Option<Row>> {
        Ok(self
            .rows
            .pop_front()
            .map(|values| Row::with_columns(Arc::clone(&self.columns), values)))
    }

    fn row_count(&self) -> u64 {
        self.row_count
    }

    fn column_count(&self) -> usize {
        self.columns.len()
    }

    fn close_cursor(&mut self) {
        self.rows.clear();
    }

    fn sql(&self) -> &str {
        &self.sql
    }
}
