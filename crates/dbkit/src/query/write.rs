//! INSERT, UPDATE and DELETE builder methods.

use super::{Query, QueryType, TableRef};
use crate::error::{DbError, DbResult};
use crate::expr::{
    ComparisonExpression, Field, IntoConditions, Operand, QueryExpression, ValuesExpression,
};

impl Query {
    // ==================== INSERT ====================

    /// Turn the query into an INSERT over `columns`.
    ///
    /// Values are converted with the types the query's type map gives each
    /// column.
    pub fn insert<I, S>(mut self, columns: I) -> DbResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        if columns.is_empty() {
            return Err(DbError::invalid_argument(
                "At least 1 column is required to perform an insert.",
            ));
        }
        if let Some(values) = &self.parts.values
            && !values.is_empty()
            && values.columns() != columns.as_slice()
        {
            return Err(DbError::invalid_argument(
                "Cannot change the insert columns once values have been added.",
            ));
        }
        self.set_kind(QueryType::Insert);
        self.parts.insert.columns = columns.clone();
        let type_map = self.type_map.clone();
        match &mut self.parts.values {
            Some(values) => {
                values.set_columns(columns);
                values.set_type_map(type_map);
            }
            None => self.parts.values = Some(ValuesExpression::new(columns, type_map)),
        }
        Ok(self)
    }

    /// Target table of an INSERT.
    pub fn into(mut self, table: &str) -> Self {
        self.parts.insert.table = Some(table.to_string());
        self.mark_dirty();
        self
    }

    /// Add one row of `(column, value)` pairs. Columns left out insert NULL.
    pub fn values<K, V, R>(mut self, row: R) -> DbResult<Self>
    where
        R: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Operand>,
    {
        let values = self.values_slot()?;
        values.add_row(row)?;
        self.mark_dirty();
        Ok(self)
    }

    /// Insert the rows a SELECT returns (`INSERT INTO t (..) SELECT ..`).
    pub fn values_query(mut self, query: Query) -> DbResult<Self> {
        let values = self.values_slot()?;
        values.set_query(query)?;
        self.mark_dirty();
        Ok(self)
    }

    fn values_slot(&mut self) -> DbResult<&mut ValuesExpression> {
        if self.kind != QueryType::Insert {
            return Err(DbError::incomplete(
                "You cannot add values before defining columns to use.",
            ));
        }
        match self.parts.values.as_mut() {
            Some(values) => Ok(values),
            None => Err(DbError::incomplete(
                "You cannot add values before defining columns to use.",
            )),
        }
    }

    // ==================== UPDATE ====================

    /// Turn the query into an UPDATE of `table`.
    pub fn update(mut self, table: impl Into<TableRef>) -> Self {
        self.set_kind(QueryType::Update);
        self.parts.update = Some(table.into());
        self
    }

    /// `SET field = value`, converted with the field's mapped type.
    pub fn set(mut self, field: impl Into<Field>, value: impl Into<Operand>) -> Self {
        let field: Field = field.into();
        let type_name = field
            .name()
            .and_then(|name| self.type_map.type_of(name))
            .map(str::to_string);
        let assignment = ComparisonExpression::new(field, value, type_name.as_deref(), "=");
        self.parts.set.push(assignment);
        self.mark_dirty();
        self
    }

    /// Add several assignments at once, e.g. `[("title", "x"), ("views", 0)]`.
    /// NULL is allowed here without an `IS` operator.
    pub fn set_many(mut self, assignments: impl IntoConditions) -> DbResult<Self> {
        let mut set = std::mem::replace(&mut self.parts.set, QueryExpression::with_conjunction(","));
        set.push_conditions(assignments.into_conditions(), &self.type_map)?;
        self.parts.set = set;
        self.mark_dirty();
        Ok(self)
    }

    /// Build assignments with a closure over a `,`-joined expression.
    pub fn set_fn<F>(mut self, build: F) -> Self
    where
        F: FnOnce(QueryExpression) -> QueryExpression,
    {
        let fresh = QueryExpression::with_conjunction(",").with_type_map(self.type_map.clone());
        let built = build(fresh);
        for condition in built.conditions {
            self.parts.set.push(condition);
        }
        self.mark_dirty();
        self
    }

    // ==================== DELETE ====================

    /// Turn the query into a DELETE from `table`.
    pub fn delete(mut self, table: impl Into<TableRef>) -> Self {
        self.set_kind(QueryType::Delete);
        self.parts.from.push(table.into());
        self
    }

    /// Turn the query into a DELETE, keeping the current FROM list.
    pub fn delete_from_current(mut self) -> Self {
        self.set_kind(QueryType::Delete);
        self
    }
}
