//! Connections: query factories, statement execution and transactions.
//!
//! A [`Connection`] owns a write driver and a read driver (the same
//! instance unless the configuration splits them), the shared
//! [`TypeRegistry`] and the transaction state. It is a cheap handle:
//! clones share everything, which is how queries keep a reference to the
//! connection that created them.
//!
//! Every driver call runs under a [`CommandRetry`] with a
//! [`ReconnectStrategy`], so a statement that fails because the server
//! dropped the connection is retried once on a fresh connection.
//!
//! # Example
//!
//! ```ignore
//! use dbkit::prelude::*;
//!
//! let registry = DriverRegistry::with_recording_drivers();
//! let conn = Connection::from_config(
//!     &ConnectionConfig::new("recording").dialect("postgres"),
//!     &registry,
//! )?;
//!
//! conn.transactional(|conn| {
//!     conn.update_query("articles")
//!         .set("published", true)
//!         .where_([("id", 1)])?
//!         .row_count()
//! })?;
//! # Ok::<(), dbkit::DbError>(())
//! ```

mod transaction;

#[cfg(test)]
mod tests;

pub use transaction::TransactionOutcome;

use crate::binder::ValueBinder;
use crate::compiler;
use crate::config::ConnectionConfig;
use crate::dialect::{Dialect, Feature};
use crate::driver::{Driver, DriverRegistry, Statement};
use crate::error::DbResult;
use crate::log::{LoggedQuery, QueryLogger, TracingLogger};
use crate::query::{Query, Role};
use crate::retry::{CommandRetry, ReconnectStrategy};
use crate::types::{TypeMap, TypeRegistry};
use crate::value::Value;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

type SharedDriver = Arc<Mutex<Box<dyn Driver>>>;

fn lock_driver(driver: &SharedDriver) -> MutexGuard<'_, Box<dyn Driver>> {
    driver.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Connect `driver` if needed and run the init statements on the new session.
fn open(driver: &mut dyn Driver, init: &[String]) -> DbResult<()> {
    if driver.is_connected() {
        return Ok(());
    }
    driver.connect()?;
    for sql in init {
        let mut statement = driver.prepare(sql)?;
        statement.execute()?;
        statement.close_cursor();
    }
    tracing::debug!(target: "dbkit.sql", driver = driver.name(), "connected");
    Ok(())
}

#[derive(Debug, Default)]
struct TransactionState {
    active: bool,
    level: u32,
    savepoints: bool,
    /// A nested rollback happened without savepoints; the outer commit
    /// must fail.
    poisoned: bool,
}

struct Inner {
    name: Option<String>,
    read: SharedDriver,
    write: SharedDriver,
    dialect: Arc<dyn Dialect>,
    types: Arc<TypeRegistry>,
    state: Mutex<TransactionState>,
    logger: Mutex<Arc<dyn QueryLogger>>,
    log_queries: AtomicBool,
    retries: u32,
    init: Vec<String>,
}

/// A handle to one configured database.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("Connection")
            .field("name", &self.inner.name)
            .field("dialect", &self.inner.dialect.name())
            .field("split", &self.is_split())
            .field("in_transaction", &state.active)
            .field("transaction_level", &state.level)
            .finish()
    }
}

/// Assembles a [`Connection`] from driver instances.
pub struct ConnectionBuilder {
    write: Box<dyn Driver>,
    read: Option<Box<dyn Driver>>,
    name: Option<String>,
    types: Arc<TypeRegistry>,
    logger: Arc<dyn QueryLogger>,
    log_queries: bool,
    savepoints: bool,
    retries: u32,
    init: Vec<String>,
}

impl ConnectionBuilder {
    fn new(driver: Box<dyn Driver>) -> Self {
        Self {
            write: driver,
            read: None,
            name: None,
            types: Arc::new(TypeRegistry::with_defaults()),
            logger: Arc::new(TracingLogger::default()),
            log_queries: false,
            savepoints: false,
            retries: 1,
            init: Vec::new(),
        }
    }

    /// Use a separate driver for reads.
    pub fn read_driver(mut self, driver: Box<dyn Driver>) -> Self {
        self.read = Some(driver);
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn type_registry(mut self, types: Arc<TypeRegistry>) -> Self {
        self.types = types;
        self
    }

    pub fn logger(mut self, logger: Arc<dyn QueryLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn log_queries(mut self, enabled: bool) -> Self {
        self.log_queries = enabled;
        self
    }

    pub fn savepoints(mut self, enabled: bool) -> Self {
        self.savepoints = enabled;
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// A statement run after every (re)connect.
    pub fn init(mut self, sql: &str) -> Self {
        self.init.push(sql.to_string());
        self
    }

    pub fn build(self) -> Connection {
        let dialect = self.write.dialect();
        let write: SharedDriver = Arc::new(Mutex::new(self.write));
        let read = match self.read {
            Some(driver) => Arc::new(Mutex::new(driver)),
            None => Arc::clone(&write),
        };
        let state = TransactionState {
            savepoints: self.savepoints && dialect.supports(Feature::Savepoint),
            ..TransactionState::default()
        };
        Connection {
            inner: Arc::new(Inner {
                name: self.name,
                read,
                write,
                dialect,
                types: self.types,
                state: Mutex::new(state),
                logger: Mutex::new(self.logger),
                log_queries: AtomicBool::new(self.log_queries),
                retries: self.retries,
                init: self.init,
            }),
        }
    }
}

impl Connection {
    /// A connection using one driver for both roles.
    pub fn new(driver: Box<dyn Driver>) -> Self {
        Self::builder(driver).build()
    }

    /// A connection with separate read and write drivers.
    pub fn with_drivers(read: Box<dyn Driver>, write: Box<dyn Driver>) -> Self {
        Self::builder(write).read_driver(read).build()
    }

    pub fn builder(driver: Box<dyn Driver>) -> ConnectionBuilder {
        ConnectionBuilder::new(driver)
    }

    /// Build the drivers named by `config` through `registry`.
    pub fn from_config(config: &ConnectionConfig, registry: &DriverRegistry) -> DbResult<Self> {
        config.validate()?;
        let write = registry.build(&config.write_config())?;
        let mut builder = Self::builder(write)
            .log_queries(config.log)
            .savepoints(config.savepoints)
            .retries(config.retries);
        if let Some(name) = &config.name {
            builder = builder.name(name);
        }
        for sql in &config.base.init {
            builder = builder.init(sql);
        }
        if config.is_split() {
            builder = builder.read_driver(registry.build(&config.read_config())?);
        }
        Ok(builder.build())
    }

    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    pub fn dialect(&self) -> Arc<dyn Dialect> {
        Arc::clone(&self.inner.dialect)
    }

    pub fn type_registry(&self) -> &TypeRegistry {
        &self.inner.types
    }

    pub fn supports(&self, feature: Feature) -> bool {
        self.inner.dialect.supports(feature)
    }

    pub fn quote_identifier(&self, identifier: &str) -> String {
        self.inner.dialect.quote_identifier(identifier)
    }

    /// True when reads and writes use different drivers.
    pub fn is_split(&self) -> bool {
        !Arc::ptr_eq(&self.inner.read, &self.inner.write)
    }

    fn driver(&self, role: Role) -> &SharedDriver {
        match role {
            Role::Read => &self.inner.read,
            Role::Write => &self.inner.write,
        }
    }

    fn drivers(&self) -> Vec<&SharedDriver> {
        if self.is_split() {
            vec![&self.inner.write, &self.inner.read]
        } else {
            vec![&self.inner.write]
        }
    }

    fn state(&self) -> MutexGuard<'_, TransactionState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn retry(&self) -> CommandRetry<ReconnectStrategy> {
        CommandRetry::new(ReconnectStrategy::new(self.clone()), self.inner.retries)
    }

    // ==================== Session ====================

    /// Connect every driver that is not connected yet.
    pub fn connect(&self) -> DbResult<()> {
        for driver in self.drivers() {
            open(&mut **lock_driver(driver), &self.inner.init)?;
        }
        Ok(())
    }

    pub fn disconnect(&self) {
        for driver in self.drivers() {
            lock_driver(driver).disconnect();
        }
    }

    pub fn is_connected(&self) -> bool {
        lock_driver(&self.inner.write).is_connected()
    }

    pub fn is_auto_quoting(&self) -> bool {
        lock_driver(&self.inner.write).auto_quoting()
    }

    /// Toggle identifier auto-quoting on every driver.
    pub fn set_auto_quoting(&self, enabled: bool) {
        for driver in self.drivers() {
            lock_driver(driver).set_auto_quoting(enabled);
        }
    }

    /// The key generated by the last insert on the write driver.
    pub fn last_insert_id(&self, table: Option<&str>, column: Option<&str>) -> DbResult<Value> {
        let mut driver = lock_driver(&self.inner.write);
        open(&mut **driver, &self.inner.init)?;
        driver.last_insert_id(table, column)
    }

    // ==================== Logging ====================

    pub fn enable_query_logging(&self, enabled: bool) {
        self.inner.log_queries.store(enabled, Ordering::Relaxed);
    }

    pub fn is_query_logging_enabled(&self) -> bool {
        self.inner.log_queries.load(Ordering::Relaxed)
    }

    pub fn set_logger(&self, logger: Arc<dyn QueryLogger>) {
        *self.inner.logger.lock().unwrap_or_else(PoisonError::into_inner) = logger;
    }

    pub fn logger(&self) -> Arc<dyn QueryLogger> {
        Arc::clone(&self.inner.logger.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn log(&self, query: &LoggedQuery) {
        if self.is_query_logging_enabled() {
            self.logger().log(query);
        }
    }

    // ==================== Queries ====================

    /// A new, empty SELECT query.
    pub fn select_query(&self) -> Query {
        Query::new(self.clone())
    }

    /// A new INSERT query targeting `table`.
    pub fn insert_query(&self, table: &str) -> Query {
        Query::new(self.clone()).into(table)
    }

    /// A new UPDATE query for `table`.
    pub fn update_query(&self, table: &str) -> Query {
        Query::new(self.clone()).update(table)
    }

    /// A new DELETE query for `table`.
    pub fn delete_query(&self, table: &str) -> Query {
        Query::new(self.clone()).delete(table)
    }

    /// A blank query; its type is decided by the first builder call.
    pub fn new_query(&self) -> Query {
        Query::new(self.clone())
    }

    /// Quote (when auto-quoting), translate and compile a copy of `query`.
    pub fn compile_query(
        &self,
        query: &Query,
        binder: &mut ValueBinder,
    ) -> DbResult<(Query, String)> {
        let auto_quote = lock_driver(self.driver(query.role())).auto_quoting();
        compiler::compile_query(self.inner.dialect.as_ref(), auto_quote, query, binder)
    }

    /// Compile and execute `query` on the driver for its role.
    pub fn run(&self, query: &Query) -> DbResult<Box<dyn Statement>> {
        self.retry().run(|| {
            let mut binder = ValueBinder::new();
            let (_, sql) = self.compile_query(query, &mut binder)?;
            self.run_sql(query.role(), &sql, &binder)
        })
    }

    /// Execute raw SQL on the write driver.
    ///
    /// Parameters are bound by name (with or without the leading `:`); a
    /// type from `types` is applied to the parameter of the same name.
    pub fn execute(
        &self,
        sql: &str,
        params: &[(&str, Value)],
        types: &TypeMap,
    ) -> DbResult<Box<dyn Statement>> {
        let mut binder = ValueBinder::new();
        for (name, value) in params {
            let type_name = types.type_of(name.trim_start_matches(':'));
            binder.bind(name, value.clone(), type_name);
        }
        self.retry().run(|| self.run_sql(Role::Write, sql, &binder))
    }

    fn run_sql(&self, role: Role, sql: &str, binder: &ValueBinder) -> DbResult<Box<dyn Statement>> {
        let started = Instant::now();
        let result = self.prepare_and_execute(role, sql, binder);
        if self.is_query_logging_enabled() {
            self.log(&LoggedQuery {
                sql: sql.to_string(),
                params: binder
                    .bindings()
                    .iter()
                    .map(|b| (b.name().to_string(), b.value.clone()))
                    .collect(),
                took: started.elapsed(),
                num_rows: result.as_ref().map(|s| s.row_count()).unwrap_or(0),
                role,
                error: result.as_ref().err().map(ToString::to_string),
            });
        }
        result.map_err(|e| e.with_sql(sql))
    }

    fn prepare_and_execute(
        &self,
        role: Role,
        sql: &str,
        binder: &ValueBinder,
    ) -> DbResult<Box<dyn Statement>> {
        let mut statement = {
            let mut driver = lock_driver(self.driver(role));
            open(&mut **driver, &self.inner.init)?;
            driver.prepare(sql)?
        };
        binder.attach_to(statement.as_mut(), &self.inner.types, self.inner.dialect.as_ref())?;
        statement.execute()?;
        Ok(statement)
    }

    /// Run a transaction control command on the write driver.
    fn control(&self, command: &str, action: fn(&mut dyn Driver) -> DbResult<bool>) -> DbResult<bool> {
        self.retry().run(|| self.control_once(command, action))
    }

    /// Run a transaction control command once. COMMIT and ROLLBACK go
    /// through here: the transaction dies with the session, so replaying
    /// them on a reconnected one would report work that never landed.
    fn control_once(
        &self,
        command: &str,
        action: fn(&mut dyn Driver) -> DbResult<bool>,
    ) -> DbResult<bool> {
        let started = Instant::now();
        let result = {
            let mut driver = lock_driver(&self.inner.write);
            open(&mut **driver, &self.inner.init).and_then(|()| action(&mut **driver))
        };
        tracing::debug!(target: "dbkit.transaction", command, ok = result.is_ok());
        self.log(&LoggedQuery {
            sql: command.to_string(),
            params: Vec::new(),
            took: started.elapsed(),
            num_rows: 0,
            role: Role::Write,
            error: result.as_ref().err().map(ToString::to_string),
        });
        result
    }

    /// Execute a statement that returns no rows, on the write driver, without
    /// retrying.
    fn run_command(&self, sql: &str) -> DbResult<()> {
        tracing::debug!(target: "dbkit.transaction", sql);
        self.run_sql(Role::Write, sql, &ValueBinder::new())?
            .close_cursor();
        Ok(())
    }
}
