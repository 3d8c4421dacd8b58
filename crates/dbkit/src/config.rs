//! Connection configuration.
//!
//! A [`ConnectionConfig`] names the driver and its settings. An optional
//! `read` or `write` section overrides fields for that role, which splits
//! the connection into two drivers. Configs deserialize with serde, so they
//! can come from JSON (or any other serde format) as well as from code.

use crate::error::{DbError, DbResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Settings for one driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Registry name of the driver.
    pub driver: String,
    /// SQL dialect, for drivers that serve several.
    pub dialect: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Session time zone, applied by drivers that support it.
    pub timezone: Option<String>,
    /// Quote every identifier automatically before compiling.
    pub quote_identifiers: bool,
    /// Statements run right after each (re)connect.
    pub init: Vec<String>,
    /// Driver specific flags.
    pub flags: BTreeMap<String, String>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            driver: String::new(),
            dialect: None,
            host: None,
            port: None,
            database: None,
            username: None,
            password: None,
            timezone: None,
            quote_identifiers: false,
            init: Vec::new(),
            flags: BTreeMap::new(),
        }
    }
}

/// Per-role overrides. Unset fields fall back to the base config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleOverrides {
    pub driver: Option<String>,
    pub dialect: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Configuration for a [`Connection`](crate::Connection).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Name used in log output.
    pub name: Option<String>,
    #[serde(flatten)]
    pub base: DriverConfig,
    pub read: Option<RoleOverrides>,
    pub write: Option<RoleOverrides>,
    /// Log every query through the connection's logger.
    pub log: bool,
    /// Use savepoints for nested transactions when the database has them.
    pub savepoints: bool,
    /// How many times a statement is retried after a lost connection.
    pub retries: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            name: None,
            base: DriverConfig::default(),
            read: None,
            write: None,
            log: false,
            savepoints: false,
            retries: 1,
        }
    }
}

impl ConnectionConfig {
    pub fn new(driver: &str) -> Self {
        Self {
            base: DriverConfig {
                driver: driver.to_string(),
                ..DriverConfig::default()
            },
            ..Self::default()
        }
    }

    /// Parse a config from a JSON document.
    pub fn from_json(json: &str) -> DbResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| DbError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn dialect(mut self, dialect: &str) -> Self {
        self.base.dialect = Some(dialect.to_string());
        self
    }

    pub fn host(mut self, host: &str) -> Self {
        self.base.host = Some(host.to_string());
        self
    }

    pub fn database(mut self, database: &str) -> Self {
        self.base.database = Some(database.to_string());
        self
    }

    pub fn timezone(mut self, timezone: &str) -> Self {
        self.base.timezone = Some(timezone.to_string());
        self
    }

    pub fn quote_identifiers(mut self, enabled: bool) -> Self {
        self.base.quote_identifiers = enabled;
        self
    }

    pub fn init(mut self, statement: &str) -> Self {
        self.base.init.push(statement.to_string());
        self
    }

    pub fn log(mut self, enabled: bool) -> Self {
        self.log = enabled;
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

    pub fn read(mut self, overrides: RoleOverrides) -> Self {
        self.read = Some(overrides);
        self
    }

    pub fn write(mut self, overrides: RoleOverrides) -> Self {
        self.write = Some(overrides);
        self
    }

    /// True when reads and writes go to different drivers: at least one
    /// override section exists and the two resolved configs differ.
    pub fn is_split(&self) -> bool {
        (self.read.is_some() || self.write.is_some()) && self.read_config() != self.write_config()
    }

    pub fn validate(&self) -> DbResult<()> {
        if self.base.driver.is_empty() {
            return Err(DbError::Config("`driver` is required".to_string()));
        }
        Ok(())
    }

    /// The driver config for reads.
    pub fn read_config(&self) -> DriverConfig {
        apply(&self.base, self.read.as_ref())
    }

    /// The driver config for writes.
    pub fn write_config(&self) -> DriverConfig {
        apply(&self.base, self.write.as_ref())
    }
}

fn apply(base: &DriverConfig, overrides: Option<&RoleOverrides>) -> DriverConfig {
    let mut config = base.clone();
    let Some(o) = overrides else {
        return config;
    };
    if let Some(driver) = &o.driver {
        config.driver = driver.clone();
    }
    if o.dialect.is_some() {
        config.dialect = o.dialect.clone();
    }
    if o.host.is_some() {
        config.host = o.host.clone();
    }
    if o.port.is_some() {
        config.port = o.port;
    }
    if o.database.is_some() {
        config.database = o.database.clone();
    }
    if o.username.is_some() {
        config.username = o.username.clone();
    }
    if o.password.is_some() {
        config.password = o.password.clone();
    }
    config
}
