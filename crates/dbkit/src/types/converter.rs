use super::{SqlType, TypeMap, TypeRegistry};
use crate::dialect::Dialect;
use crate::driver::Row;
use crate::error::DbResult;
use std::fmt;
use std::sync::Arc;

/// Casts result rows column by column according to a select type map.
///
/// Type identifiers are resolved once, when the converter is built, so an
/// unknown identifier fails before any row is read.
pub struct FieldTypeConverter {
    casts: Vec<(String, Arc<dyn SqlType>)>,
    dialect: Arc<dyn Dialect>,
}

impl FieldTypeConverter {
    pub fn new(
        map: &TypeMap,
        registry: &TypeRegistry,
        dialect: Arc<dyn Dialect>,
    ) -> DbResult<Self> {
        let mut casts = map
            .to_map()
            .into_iter()
            .map(|(field, name)| registry.build(&name).map(|ty| (field, ty)))
            .collect::<DbResult<Vec<_>>>()?;
        casts.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(Self { casts, dialect })
    }

    /// True when no column needs casting.
    pub fn is_empty(&self) -> bool {
        self.casts.is_empty()
    }

    /// Cast every typed column present in the row. Columns without a type
    /// and typed fields missing from the row are left alone.
    pub fn convert(&self, mut row: Row) -> DbResult<Row> {
        for (field, ty) in &self.casts {
            if let Some(value) = row.get_mut(field) {
                *value = ty.to_host(value, self.dialect.as_ref())?;
            }
        }
        Ok(row)
    }
}

impl fmt::Debug for FieldTypeConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let casts: Vec<(&str, &str)> = self
            .casts
            .iter()
            .map(|(field, ty)| (field.as_str(), ty.name()))
            .collect();
        f.debug_struct("FieldTypeConverter")
            .field("casts", &casts)
            .field("dialect", &self.dialect.name())
            .finish()
    }
}
