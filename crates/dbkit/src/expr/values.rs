use super::{Expression, Operand};
use crate::binder::ValueBinder;
use crate::error::{DbError, DbResult};
use crate::query::Query;
use crate::types::TypeMap;
use crate::value::Value;

/// The `VALUES` part of an INSERT: either literal rows or a source query.
#[derive(Debug, Clone, Default)]
pub struct ValuesExpression {
    pub(crate) columns: Vec<String>,
    pub(crate) rows: Vec<Vec<Operand>>,
    pub(crate) query: Option<Box<Query>>,
    pub(crate) type_map: TypeMap,
}

impl ValuesExpression {
    pub fn new(columns: Vec<String>, type_map: TypeMap) -> Self {
        Self {
            columns,
            rows: Vec::new(),
            query: None,
            type_map,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn set_columns(&mut self, columns: Vec<String>) {
        self.columns = columns;
    }

    pub fn type_map(&self) -> &TypeMap {
        &self.type_map
    }

    pub fn set_type_map(&mut self, type_map: TypeMap) {
        self.type_map = type_map;
    }

    pub fn rows(&self) -> &[Vec<Operand>] {
        &self.rows
    }

    pub fn query(&self) -> Option<&Query> {
        self.query.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() && self.query.is_none()
    }

    /// Add one row given as `(column, value)` pairs. Columns left out are
    /// inserted as NULL.
    pub fn add_row<K, V, I>(&mut self, row: I) -> DbResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Operand>,
    {
        if self.query.is_some() {
            return Err(DbError::invalid_argument(
                "You cannot mix subqueries and array values in inserts.",
            ));
        }
        let mut values: Vec<Operand> = vec![Operand::Value(Value::Null); self.columns.len()];
        for (column, value) in row {
            let column = column.as_ref();
            let index = self
                .columns
                .iter()
                .position(|c| c == column)
                .ok_or_else(|| {
                    DbError::invalid_argument(format!(
                        "Column `{column}` is not part of the insert column list"
                    ))
                })?;
            values[index] = value.into();
        }
        self.rows.push(values);
        Ok(())
    }

    /// Use a query as the row source (`INSERT ... SELECT`).
    pub fn set_query(&mut self, query: Query) -> DbResult<()> {
        if !self.rows.is_empty() {
            return Err(DbError::invalid_argument(
                "You cannot mix subqueries and array values in inserts.",
            ));
        }
        self.query = Some(Box::new(query));
        Ok(())
    }

    pub fn sql(&self, binder: &mut ValueBinder) -> DbResult<String> {
        if let Some(query) = &self.query {
            return Ok(format!(" {}", query.sql(Some(binder))?));
        }
        if self.rows.is_empty() {
            return Ok(String::new());
        }
        let types: Vec<Option<String>> = self
            .columns
            .iter()
            .map(|c| self.type_map.type_of(c).map(str::to_string))
            .collect();

        let mut rendered = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            let mut parts = Vec::with_capacity(row.len());
            for (index, operand) in row.iter().enumerate() {
                let type_name = types.get(index).and_then(|t| t.as_deref());
                let sql = match operand {
                    Operand::Value(value) => binder.bind_new(value.clone(), type_name),
                    Operand::Expr(expr) => match expr.as_ref() {
                        Expression::Query(_) => expr.sql(binder)?,
                        other => format!("({})", other.sql(binder)?),
                    },
                };
                parts.push(sql);
            }
            rendered.push(format!("({})", parts.join(", ")));
        }
        Ok(format!(" VALUES {}", rendered.join(", ")))
    }
}
