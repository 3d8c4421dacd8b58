use super::{Expression, IntoConditions, Operand, QueryExpression};
use crate::binder::ValueBinder;
use crate::error::{DbError, DbResult};
use crate::types::TypeMap;

/// `CASE [value] WHEN ... THEN ... [ELSE ...] END`
#[derive(Debug, Clone, Default)]
pub struct CaseExpression {
    pub(crate) value: Option<Box<Expression>>,
    pub(crate) whens: Vec<(Expression, Operand)>,
    pub(crate) else_value: Option<Operand>,
    pub(crate) return_type: Option<String>,
}

impl CaseExpression {
    /// A searched CASE: each branch carries its own conditions.
    pub fn new() -> Self {
        Self::default()
    }

    /// A simple CASE comparing `value` against each branch.
    pub fn of(value: impl Into<Expression>) -> Self {
        Self {
            value: Some(Box::new(value.into())),
            ..Self::default()
        }
    }

    /// Add a branch whose test is a set of conditions.
    pub fn when(mut self, conditions: impl IntoConditions, then: impl Into<Operand>) -> DbResult<Self> {
        let mut group = QueryExpression::new();
        group.push_conditions(conditions.into_conditions(), &TypeMap::new())?;
        if group.is_empty() {
            return Err(DbError::invalid_argument(
                "CASE branch requires at least one condition",
            ));
        }
        self.whens.push((Expression::Group(group), then.into()));
        Ok(self)
    }

    /// Add a branch for a simple CASE, matching a literal value.
    pub fn when_value(mut self, value: impl Into<Operand>, then: impl Into<Operand>) -> Self {
        let test = match value.into() {
            Operand::Value(v) => Expression::value(v),
            Operand::Expr(expr) => *expr,
        };
        self.whens.push((test, then.into()));
        self
    }

    pub fn otherwise(mut self, value: impl Into<Operand>) -> Self {
        self.else_value = Some(value.into());
        self
    }

    pub fn set_return_type(mut self, return_type: &str) -> Self {
        self.return_type = Some(return_type.to_string());
        self
    }

    pub fn return_type(&self) -> Option<&str> {
        self.return_type.as_deref()
    }

    pub fn sql(&self, binder: &mut ValueBinder) -> DbResult<String> {
        if self.whens.is_empty() {
            return Err(DbError::incomplete(
                "CASE expression must have at least one WHEN branch",
            ));
        }
        let mut sql = String::from("CASE");
        if let Some(value) = &self.value {
            sql.push(' ');
            sql.push_str(&value.sql(binder)?);
        }
        let then_type = self.return_type.as_deref();
        for (when, then) in &self.whens {
            sql.push_str(" WHEN ");
            sql.push_str(&when.sql(binder)?);
            sql.push_str(" THEN ");
            sql.push_str(&then.sql(binder, then_type)?);
        }
        if let Some(other) = &self.else_value {
            sql.push_str(" ELSE ");
            sql.push_str(&other.sql(binder, then_type)?);
        }
        sql.push_str(" END");
        Ok(sql)
    }
}
