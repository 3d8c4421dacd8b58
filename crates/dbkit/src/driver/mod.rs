//! The boundary between the query layer and a database client.
//!
//! A [`Driver`] owns one physical connection: it prepares SQL into
//! [`Statement`]s and controls transactions. Wire protocols live behind this
//! trait; the crate ships only the in-memory [`RecordingDriver`] used for
//! compiling, testing and dry runs.

mod recording;

pub use recording::{RecordedCall, RecordingDriver, RecordingHandle};

use crate::config::DriverConfig;
use crate::dialect::{Dialect, Feature};
use crate::error::{DbError, DbResult};
use crate::value::{BindingKind, FromValue, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// One physical database connection.
pub trait Driver: Send + fmt::Debug {
    /// Registry name, e.g. `"recording"`.
    fn name(&self) -> &str;

    fn dialect(&self) -> Arc<dyn Dialect>;

    /// Open the connection. Calling it while connected is a no-op.
    fn connect(&mut self) -> DbResult<()>;

    fn disconnect(&mut self);

    fn is_connected(&self) -> bool;

    /// Prepare a statement for execution.
    fn prepare(&mut self, sql: &str) -> DbResult<Box<dyn Statement>>;

    fn begin_transaction(&mut self) -> DbResult<bool>;

    fn commit_transaction(&mut self) -> DbResult<bool>;

    fn rollback_transaction(&mut self) -> DbResult<bool>;

    /// The key generated by the last insert.
    fn last_insert_id(&mut self, table: Option<&str>, column: Option<&str>) -> DbResult<Value>;

    /// Whether identifiers are quoted automatically before compiling.
    fn auto_quoting(&self) -> bool;

    fn set_auto_quoting(&mut self, enabled: bool);

    fn supports(&self, feature: Feature) -> bool {
        self.dialect().supports(feature)
    }
}

/// A prepared statement and, once executed, its result cursor.
pub trait Statement: Send + fmt::Debug {
    /// Bind a value to a named placeholder (without the leading `:`).
    fn bind_value(&mut self, name: &str, value: Value, kind: BindingKind);

    fn execute(&mut self) -> DbResult<bool>;

    /// Next row, or `None` once the cursor is exhausted.
    fn fetch(&mut self) -> DbResult<Option<Row>>;

    fn fetch_all(&mut self) -> DbResult<Vec<Row>> {
        let mut rows = Vec::new();
        while let Some(row) = self.fetch()? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Rows affected by the last execution.
    fn row_count(&self) -> u64;

    fn column_count(&self) -> usize;

    /// Release the cursor so the statement can be executed again.
    fn close_cursor(&mut self);

    /// The SQL this statement was prepared from.
    fn sql(&self) -> &str;
}

/// A fetched row: values addressable by column name or position.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        Self {
            columns: columns.into(),
            values,
        }
    }

    /// Build a row sharing an existing column list.
    pub fn with_columns(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    fn index_of(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.index_of(column).and_then(|i| self.values.get(i))
    }

    pub fn get_mut(&mut self, column: &str) -> Option<&mut Value> {
        let index = self.index_of(column)?;
        self.values.get_mut(index)
    }

    pub fn get_index(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Typed access by column name.
    pub fn try_get<T: FromValue>(&self, column: &str) -> DbResult<T> {
        let value = self
            .get(column)
            .ok_or_else(|| DbError::invalid_argument(format!("Column `{column}` not found")))?;
        T::from_value(value)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

type DriverFactory = Arc<dyn Fn(&DriverConfig) -> DbResult<Box<dyn Driver>> + Send + Sync>;

/// Resolves driver names from configuration into driver instances.
#[derive(Clone, Default)]
pub struct DriverRegistry {
    factories: HashMap<String, DriverFactory>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry knowing the built-in recording driver under
    /// `"recording"`; the config's `dialect` picks its SQL flavor.
    pub fn with_recording_drivers() -> Self {
        let mut registry = Self::new();
        registry.register("recording", |config: &DriverConfig| {
            let dialect = crate::dialect::by_name(config.dialect.as_deref().unwrap_or("sqlite"))?;
            let mut driver = RecordingDriver::new(dialect);
            driver.set_auto_quoting(config.quote_identifiers);
            Ok(Box::new(driver) as Box<dyn Driver>)
        });
        registry
    }

    pub fn register<F>(&mut self, name: &str, factory: F) -> &mut Self
    where
        F: Fn(&DriverConfig) -> DbResult<Box<dyn Driver>> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_string(), Arc::new(factory));
        self
    }

    pub fn has(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Build the driver named by `config.driver`.
    pub fn build(&self, config: &DriverConfig) -> DbResult<Box<dyn Driver>> {
        let factory = self
            .factories
            .get(&config.driver)
            .ok_or_else(|| DbError::MissingDriver(config.driver.clone()))?;
        factory(config)
    }
}

impl fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("DriverRegistry").field("drivers", &names).finish()
    }
}
