use super::{Expression, Field};
use crate::binder::ValueBinder;
use crate::error::{DbError, DbResult};

fn direction(dir: &str) -> DbResult<String> {
    let upper = dir.trim().to_uppercase();
    match upper.as_str() {
        "ASC" | "DESC" => Ok(upper),
        _ => Err(DbError::invalid_argument(format!(
            "Invalid sort direction `{dir}`, expected ASC or DESC"
        ))),
    }
}

/// One entry of an ORDER BY list.
#[derive(Debug, Clone)]
pub enum OrderItem {
    /// `field DIRECTION`
    Field { field: String, direction: String },
    /// Trusted SQL such as `title DESC NULLS LAST`.
    Raw(String),
    Expr(Expression),
}

impl OrderItem {
    fn sql(&self, binder: &mut ValueBinder) -> DbResult<String> {
        Ok(match self {
            OrderItem::Field { field, direction } => format!("{field} {direction}"),
            OrderItem::Raw(sql) => sql.clone(),
            OrderItem::Expr(expr) => expr.sql(binder)?,
        })
    }
}

/// Anything that can be added to an ORDER BY list.
pub trait IntoOrderItems {
    fn into_order_items(self) -> DbResult<Vec<OrderItem>>;
}

impl IntoOrderItems for &str {
    fn into_order_items(self) -> DbResult<Vec<OrderItem>> {
        if self.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![OrderItem::Raw(self.to_string())])
    }
}

impl IntoOrderItems for String {
    fn into_order_items(self) -> DbResult<Vec<OrderItem>> {
        self.as_str().into_order_items()
    }
}

impl<const N: usize> IntoOrderItems for [(&str, &str); N] {
    fn into_order_items(self) -> DbResult<Vec<OrderItem>> {
        self.into_iter()
            .map(|(field, dir)| {
                Ok(OrderItem::Field {
                    field: field.to_string(),
                    direction: direction(dir)?,
                })
            })
            .collect()
    }
}

impl IntoOrderItems for Vec<(&str, &str)> {
    fn into_order_items(self) -> DbResult<Vec<OrderItem>> {
        self.into_iter()
            .map(|(field, dir)| {
                Ok(OrderItem::Field {
                    field: field.to_string(),
                    direction: direction(dir)?,
                })
            })
            .collect()
    }
}

impl IntoOrderItems for Expression {
    fn into_order_items(self) -> DbResult<Vec<OrderItem>> {
        Ok(vec![OrderItem::Expr(self)])
    }
}

impl IntoOrderItems for OrderClauseExpression {
    fn into_order_items(self) -> DbResult<Vec<OrderItem>> {
        Ok(vec![OrderItem::Expr(Expression::OrderClause(self))])
    }
}

/// The `ORDER BY` list.
#[derive(Debug, Clone, Default)]
pub struct OrderByExpression {
    pub(crate) items: Vec<OrderItem>,
}

impl OrderByExpression {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, items: impl IntoOrderItems) -> DbResult<Self> {
        self.items.extend(items.into_order_items()?);
        Ok(self)
    }

    pub fn push(&mut self, item: OrderItem) {
        self.items.push(item);
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn items_mut(&mut self) -> &mut Vec<OrderItem> {
        &mut self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn sql(&self, binder: &mut ValueBinder) -> DbResult<String> {
        if self.items.is_empty() {
            return Ok(String::new());
        }
        let mut parts = Vec::with_capacity(self.items.len());
        for item in &self.items {
            parts.push(item.sql(binder)?);
        }
        Ok(format!("ORDER BY {}", parts.join(", ")))
    }

    pub(crate) fn for_each_child(&self, f: &mut dyn FnMut(&Expression)) {
        for item in &self.items {
            if let OrderItem::Expr(expr) = item {
                f(expr);
            }
        }
    }

    pub(crate) fn for_each_child_mut(&mut self, f: &mut dyn FnMut(&mut Expression)) {
        for item in &mut self.items {
            if let OrderItem::Expr(expr) = item {
                f(expr);
            }
        }
    }
}

/// A single `field DIRECTION` pair where the field may be an expression.
#[derive(Debug, Clone)]
pub struct OrderClauseExpression {
    pub(crate) field: Field,
    pub(crate) direction: String,
}

impl OrderClauseExpression {
    pub fn new(field: impl Into<Field>, dir: &str) -> DbResult<Self> {
        Ok(Self {
            field: field.into(),
            direction: direction(dir)?,
        })
    }

    pub fn asc(field: impl Into<Field>) -> Self {
        Self {
            field: field.into(),
            direction: "ASC".to_string(),
        }
    }

    pub fn desc(field: impl Into<Field>) -> Self {
        Self {
            field: field.into(),
            direction: "DESC".to_string(),
        }
    }

    pub fn field(&self) -> &Field {
        &self.field
    }

    pub fn set_field(&mut self, field: impl Into<Field>) {
        self.field = field.into();
    }

    pub fn direction(&self) -> &str {
        &self.direction
    }

    pub fn sql(&self, binder: &mut ValueBinder) -> DbResult<String> {
        let field = match &self.field {
            Field::Expr(expr) if matches!(expr.as_ref(), Expression::Query(_)) => {
                expr.sql(binder)?
            }
            Field::Expr(expr) if matches!(expr.as_ref(), Expression::Group(_)) => {
                format!("({})", expr.sql(binder)?)
            }
            other => other.sql(binder)?,
        };
        Ok(format!("{field} {}", self.direction))
    }
}
