use super::{Expression, Field, Operand};
use crate::binder::ValueBinder;
use crate::error::{DbError, DbResult};
use crate::types::base_type_name;
use crate::value::Value;

/// `field operator value`, e.g. `author_id = :p0` or `id IN (:p0, :p1)`.
#[derive(Debug, Clone)]
pub struct ComparisonExpression {
    pub(crate) field: Field,
    pub(crate) value: Operand,
    pub(crate) operator: String,
    pub(crate) type_name: Option<String>,
    pub(crate) is_multiple: bool,
}

impl ComparisonExpression {
    /// Build a comparison. A type identifier ending in `[]` makes the value
    /// render as a list of placeholders.
    pub fn new(
        field: impl Into<Field>,
        value: impl Into<Operand>,
        type_name: Option<&str>,
        operator: &str,
    ) -> Self {
        let is_multiple = type_name.is_some_and(|t| base_type_name(t).1);
        Self {
            field: field.into(),
            value: value.into(),
            operator: operator.to_string(),
            type_name: type_name.map(str::to_string),
            is_multiple,
        }
    }

    /// Render the value as a list of placeholders regardless of type.
    pub fn multiple(mut self) -> Self {
        self.is_multiple = true;
        self
    }

    pub fn field(&self) -> &Field {
        &self.field
    }

    pub fn set_field(&mut self, field: impl Into<Field>) {
        self.field = field.into();
    }

    pub fn value(&self) -> &Operand {
        &self.value
    }

    pub fn set_value(&mut self, value: impl Into<Operand>) {
        self.value = value.into();
    }

    pub fn operator(&self) -> &str {
        &self.operator
    }

    pub fn type_name(&self) -> Option<&str> {
        self.type_name.as_deref()
    }

    pub fn is_multiple(&self) -> bool {
        self.is_multiple
    }

    pub fn sql(&self, binder: &mut ValueBinder) -> DbResult<String> {
        let field = self.field.sql(binder)?;
        let op = &self.operator;

        let value = match &self.value {
            Operand::Expr(expr) => match expr.as_ref() {
                Expression::Identifier(id) => id.sql(),
                Expression::Query(_) => expr.sql(binder)?,
                other => format!("({})", other.sql(binder)?),
            },
            Operand::Value(value) if self.is_multiple => {
                let items = match value {
                    Value::List(items) => items.clone(),
                    single => vec![single.clone()],
                };
                if items.is_empty() {
                    return Err(DbError::invalid_argument(format!(
                        "Impossible to generate condition with empty list of values for field ({field})"
                    )));
                }
                let item_type = self.type_name.as_deref().map(|t| base_type_name(t).0);
                let placeholders = binder.generate_many_named(items, item_type);
                format!("({})", placeholders.join(", "))
            }
            Operand::Value(value) => binder.bind_new(value.clone(), self.type_name.as_deref()),
        };

        Ok(format!("{field} {op} {value}"))
    }
}

/// `field BETWEEN from AND to`
#[derive(Debug, Clone)]
pub struct BetweenExpression {
    pub(crate) field: Field,
    pub(crate) from: Operand,
    pub(crate) to: Operand,
    pub(crate) type_name: Option<String>,
}

impl BetweenExpression {
    pub fn new(
        field: impl Into<Field>,
        from: impl Into<Operand>,
        to: impl Into<Operand>,
        type_name: Option<&str>,
    ) -> Self {
        Self {
            field: field.into(),
            from: from.into(),
            to: to.into(),
            type_name: type_name.map(str::to_string),
        }
    }

    pub fn field(&self) -> &Field {
        &self.field
    }

    pub fn set_field(&mut self, field: impl Into<Field>) {
        self.field = field.into();
    }

    pub fn sql(&self, binder: &mut ValueBinder) -> DbResult<String> {
        let field = self.field.sql(binder)?;
        let from = self.from.sql(binder, self.type_name.as_deref())?;
        let to = self.to.sql(binder, self.type_name.as_deref())?;
        Ok(format!("{field} BETWEEN {from} AND {to}"))
    }
}

/// A unary operator applied to an expression: `NOT (...)`, `EXISTS (...)`,
/// or a postfix operator such as `IS NULL`.
#[derive(Debug, Clone)]
pub struct UnaryExpression {
    pub(crate) operator: String,
    pub(crate) operand: Box<Expression>,
    pub(crate) postfix: bool,
}

impl UnaryExpression {
    pub fn prefix(operator: impl Into<String>, operand: impl Into<Expression>) -> Self {
        Self {
            operator: operator.into(),
            operand: Box::new(operand.into()),
            postfix: false,
        }
    }

    pub fn postfix(operator: impl Into<String>, operand: impl Into<Expression>) -> Self {
        Self {
            operator: operator.into(),
            operand: Box::new(operand.into()),
            postfix: true,
        }
    }

    pub fn operator(&self) -> &str {
        &self.operator
    }

    pub fn operand(&self) -> &Expression {
        &self.operand
    }

    pub fn is_postfix(&self) -> bool {
        self.postfix
    }

    pub fn sql(&self, binder: &mut ValueBinder) -> DbResult<String> {
        let operand = self.operand.sql(binder)?;
        // Groups with several conditions and sub-queries already carry
        // their own parentheses.
        let wrapped = match self.operand.as_ref() {
            Expression::Query(_) => true,
            Expression::Group(g) => g.len() > 1,
            _ => false,
        };
        let bare = matches!(
            self.operand.as_ref(),
            Expression::Identifier(_) | Expression::Raw(_)
        );

        Ok(if self.postfix {
            if bare || wrapped {
                format!("{operand} {}", self.operator)
            } else {
                format!("({operand}) {}", self.operator)
            }
        } else if wrapped {
            format!("{} {operand}", self.operator)
        } else {
            format!("{} ({operand})", self.operator)
        })
    }
}
