//! Bidirectional value conversion between host values and database values.
//!
//! A type identifier (`"integer"`, `"datetime"`, `"json"`, ...) names a
//! [`SqlType`] implementation. Identifiers are resolved through an explicit
//! [`TypeRegistry`] that is built once and shared by the connection, the
//! queries it creates and the result converters.
//!
//! An identifier ending in `[]` names a list of the base type; it resolves to
//! the base type and makes comparisons expand into `IN (...)` lists.

mod builtin;
mod converter;
mod map;

#[cfg(test)]
mod tests;

pub use builtin::{
    BinaryType, BinaryUuidType, BoolType, DateTimeType, DateType, DecimalType, FloatType,
    IntegerType, JsonType, StringType, TimeType, UuidType,
};
pub use converter::FieldTypeConverter;
pub use map::TypeMap;

use crate::dialect::Dialect;
use crate::error::{DbError, DbResult};
use crate::value::{BindingKind, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Suffix marking a list type identifier.
pub const LIST_SUFFIX: &str = "[]";

/// A bidirectional converter for one type identifier.
pub trait SqlType: Send + Sync + fmt::Debug {
    /// The identifier this type is registered under.
    fn name(&self) -> &str;

    /// Convert a host value into the representation sent to the database.
    fn to_database(&self, value: &Value, dialect: &dyn Dialect) -> DbResult<Value>;

    /// Convert a value read from the database into its host representation.
    fn to_host(&self, value: &Value, dialect: &dyn Dialect) -> DbResult<Value>;

    /// How the converted value is bound to a statement.
    fn binding_kind(&self, value: &Value, _dialect: &dyn Dialect) -> BindingKind {
        if value.is_null() {
            BindingKind::Null
        } else {
            BindingKind::Str
        }
    }

    /// Convert loosely typed user input (e.g. form data) into a host value.
    fn marshal(&self, value: &Value) -> Value;

    /// Generate a new primary key value, for types that can.
    fn new_id(&self) -> Option<Value> {
        None
    }
}

/// Strip the list suffix from a type identifier.
pub fn base_type_name(name: &str) -> (&str, bool) {
    match name.strip_suffix(LIST_SUFFIX) {
        Some(base) => (base, true),
        None => (name, false),
    }
}

/// Maps type identifiers to their implementations.
#[derive(Clone, Default)]
pub struct TypeRegistry {
    types: HashMap<String, Arc<dyn SqlType>>,
}

impl TypeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every built-in type.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for name in ["integer", "biginteger", "smallinteger", "tinyinteger"] {
            registry.register(Arc::new(IntegerType::new(name)));
        }
        registry.register(Arc::new(FloatType));
        registry.register(Arc::new(DecimalType));
        registry.register(Arc::new(BoolType));
        for name in ["string", "char", "text"] {
            registry.register(Arc::new(StringType::new(name)));
        }
        registry.register(Arc::new(BinaryType));
        registry.register(Arc::new(UuidType));
        registry.register(Arc::new(BinaryUuidType));
        registry.register(Arc::new(DateType));
        registry.register(Arc::new(TimeType));
        registry.register(Arc::new(DateTimeType::datetime()));
        registry.register(Arc::new(DateTimeType::datetime_fractional()));
        registry.register(Arc::new(DateTimeType::timestamp()));
        registry.register(Arc::new(DateTimeType::timestamp_fractional()));
        registry.register(Arc::new(DateTimeType::timestamp_timezone()));
        registry.register(Arc::new(JsonType));
        registry
    }

    /// Register (or replace) a type under its own name.
    pub fn register(&mut self, ty: Arc<dyn SqlType>) -> &mut Self {
        self.types.insert(ty.name().to_string(), ty);
        self
    }

    /// Register a type under an alias.
    pub fn register_as(&mut self, name: impl Into<String>, ty: Arc<dyn SqlType>) -> &mut Self {
        self.types.insert(name.into(), ty);
        self
    }

    /// Check whether an identifier (or its list base) is registered.
    pub fn has(&self, name: &str) -> bool {
        self.types.contains_key(base_type_name(name).0)
    }

    /// Resolve an identifier, failing on unknown names.
    pub fn build(&self, name: &str) -> DbResult<Arc<dyn SqlType>> {
        let (base, _) = base_type_name(name);
        self.types
            .get(base)
            .cloned()
            .ok_or_else(|| DbError::UnknownType(name.to_string()))
    }

    /// All registered identifiers, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.types.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Convert a value for the database, resolving the binding kind too.
    ///
    /// Without a type identifier the value passes through with its natural
    /// binding kind. List values are converted element-wise.
    pub fn cast_to_database(
        &self,
        value: &Value,
        type_name: Option<&str>,
        dialect: &dyn Dialect,
    ) -> DbResult<(Value, BindingKind)> {
        let Some(name) = type_name else {
            return Ok((value.clone(), value.default_binding_kind()));
        };
        let ty = self.build(name)?;
        if let Value::List(items) = value {
            let items = items
                .iter()
                .map(|item| ty.to_database(item, dialect))
                .collect::<DbResult<Vec<_>>>()?;
            return Ok((Value::List(items), BindingKind::Str));
        }
        let converted = ty.to_database(value, dialect)?;
        let kind = ty.binding_kind(&converted, dialect);
        Ok((converted, kind))
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("types", &self.names())
            .finish()
    }
}
