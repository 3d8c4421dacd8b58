//! The expression tree.
//!
//! Every fragment of SQL a query carries beyond plain clause strings is an
//! [`Expression`]. Nodes render themselves against a [`ValueBinder`] so that
//! literal values never end up inlined in the SQL text, and expose a
//! traversal hook ([`Expression::walk`] / [`Expression::walk_mut`]) used by
//! the identifier quoter, the dialect translators and any other pass that
//! needs to reach every node.
//!
//! A nested [`Query`] is an opaque node: traversal visits it but does not
//! descend into its clauses, and it renders by compiling itself.

mod case;
mod comparison;
mod conjunction;
mod cte;
mod function;
mod order;
mod values;
mod window;

#[cfg(test)]
mod tests;

pub use case::CaseExpression;
pub use comparison::{BetweenExpression, ComparisonExpression, UnaryExpression};
pub use conjunction::{Condition, IntoConditions, QueryExpression};
pub use cte::CommonTableExpression;
pub use function::{FunctionExpression, FunctionsBuilder};
pub use order::{IntoOrderItems, OrderByExpression, OrderClauseExpression, OrderItem};
pub use values::ValuesExpression;
pub use window::WindowExpression;

use crate::binder::ValueBinder;
use crate::error::DbResult;
use crate::query::Query;
use crate::value::Value;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

/// A column or table identifier, optionally with a collation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierExpression {
    pub(crate) name: String,
    pub(crate) collation: Option<String>,
}

impl IdentifierExpression {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            collation: None,
        }
    }

    pub fn collate(mut self, collation: impl Into<String>) -> Self {
        self.collation = Some(collation.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn sql(&self) -> String {
        match &self.collation {
            Some(collation) => format!("{} COLLATE {collation}", self.name),
            None => self.name.clone(),
        }
    }
}

/// A literal value rendered as a bound placeholder.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueExpression {
    pub(crate) value: Value,
    pub(crate) type_name: Option<String>,
}

impl ValueExpression {
    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn type_name(&self) -> Option<&str> {
        self.type_name.as_deref()
    }
}

/// One node of the expression tree.
#[derive(Debug, Clone)]
pub enum Expression {
    /// Trusted SQL, emitted verbatim.
    Raw(String),
    Identifier(IdentifierExpression),
    Value(ValueExpression),
    Comparison(ComparisonExpression),
    Between(BetweenExpression),
    Unary(UnaryExpression),
    Function(FunctionExpression),
    /// A boolean group of conditions joined by a conjunction.
    Group(QueryExpression),
    Values(ValuesExpression),
    OrderBy(OrderByExpression),
    OrderClause(OrderClauseExpression),
    Window(WindowExpression),
    Cte(CommonTableExpression),
    Case(CaseExpression),
    /// A sub-query, rendered in parentheses.
    Query(Box<Query>),
}

impl Expression {
    /// Trusted SQL fragment.
    pub fn raw(sql: impl Into<String>) -> Self {
        Expression::Raw(sql.into())
    }

    pub fn identifier(name: impl Into<String>) -> Self {
        Expression::Identifier(IdentifierExpression::new(name))
    }

    /// A bound literal value.
    pub fn value(value: impl Into<Value>) -> Self {
        Expression::Value(ValueExpression {
            value: value.into(),
            type_name: None,
        })
    }

    /// A bound literal value converted through a type.
    pub fn typed_value(value: impl Into<Value>, type_name: &str) -> Self {
        Expression::Value(ValueExpression {
            value: value.into(),
            type_name: Some(type_name.to_string()),
        })
    }

    /// Render this node, binding its values.
    pub fn sql(&self, binder: &mut ValueBinder) -> DbResult<String> {
        Ok(match self {
            Expression::Raw(sql) => sql.clone(),
            Expression::Identifier(id) => id.sql(),
            Expression::Value(v) => binder.bind_new(v.value.clone(), v.type_name.as_deref()),
            Expression::Comparison(c) => c.sql(binder)?,
            Expression::Between(b) => b.sql(binder)?,
            Expression::Unary(u) => u.sql(binder)?,
            Expression::Function(f) => f.sql(binder)?,
            Expression::Group(g) => g.sql(binder)?,
            Expression::Values(v) => v.sql(binder)?,
            Expression::OrderBy(o) => o.sql(binder)?,
            Expression::OrderClause(o) => o.sql(binder)?,
            Expression::Window(w) => w.sql(binder)?,
            Expression::Cte(c) => c.sql(binder)?,
            Expression::Case(c) => c.sql(binder)?,
            Expression::Query(q) => format!("({})", q.sql(Some(binder))?),
        })
    }

    /// Visit this node and every node below it, parents first.
    ///
    /// Nested queries are visited but not descended into.
    pub fn walk(&self, f: &mut dyn FnMut(&Expression)) {
        f(self);
        self.for_each_child(&mut |child| child.walk(f));
    }

    /// Mutable variant of [`walk`](Self::walk). The callback may replace the
    /// node it is given; traversal continues into the replacement.
    pub fn walk_mut(&mut self, f: &mut dyn FnMut(&mut Expression)) {
        f(self);
        self.for_each_child_mut(&mut |child| child.walk_mut(f));
    }

    fn for_each_child(&self, f: &mut dyn FnMut(&Expression)) {
        match self {
            Expression::Raw(_)
            | Expression::Identifier(_)
            | Expression::Value(_)
            | Expression::Query(_) => {}
            Expression::Comparison(c) => {
                c.field.for_each_expr(f);
                c.value.for_each_expr(f);
            }
            Expression::Between(b) => {
                b.field.for_each_expr(f);
                b.from.for_each_expr(f);
                b.to.for_each_expr(f);
            }
            Expression::Unary(u) => f(u.operand.as_ref()),
            Expression::Function(func) => {
                func.args.iter().for_each(&mut *f);
                if let Some(filter) = &func.filter {
                    filter.conditions.iter().for_each(&mut *f);
                }
                if let Some(window) = &func.over {
                    window.for_each_child(f);
                }
            }
            Expression::Group(g) => g.conditions.iter().for_each(f),
            Expression::Values(v) => {
                for operand in v.rows.iter().flatten() {
                    operand.for_each_expr(f);
                }
            }
            Expression::OrderBy(o) => o.for_each_child(f),
            Expression::OrderClause(o) => o.field.for_each_expr(f),
            Expression::Window(w) => w.for_each_child(f),
            Expression::Cte(c) => {
                if let Some(body) = &c.body {
                    f(body.as_ref());
                }
            }
            Expression::Case(c) => {
                if let Some(value) = &c.value {
                    f(value.as_ref());
                }
                for (when, then) in &c.whens {
                    f(when);
                    then.for_each_expr(f);
                }
                if let Some(other) = &c.else_value {
                    other.for_each_expr(f);
                }
            }
        }
    }

    fn for_each_child_mut(&mut self, f: &mut dyn FnMut(&mut Expression)) {
        match self {
            Expression::Raw(_)
            | Expression::Identifier(_)
            | Expression::Value(_)
            | Expression::Query(_) => {}
            Expression::Comparison(c) => {
                c.field.for_each_expr_mut(f);
                c.value.for_each_expr_mut(f);
            }
            Expression::Between(b) => {
                b.field.for_each_expr_mut(f);
                b.from.for_each_expr_mut(f);
                b.to.for_each_expr_mut(f);
            }
            Expression::Unary(u) => f(u.operand.as_mut()),
            Expression::Function(func) => {
                func.args.iter_mut().for_each(&mut *f);
                if let Some(filter) = &mut func.filter {
                    filter.conditions.iter_mut().for_each(&mut *f);
                }
                if let Some(window) = &mut func.over {
                    window.for_each_child_mut(f);
                }
            }
            Expression::Group(g) => g.conditions.iter_mut().for_each(f),
            Expression::Values(v) => {
                for operand in v.rows.iter_mut().flatten() {
                    operand.for_each_expr_mut(f);
                }
            }
            Expression::OrderBy(o) => o.for_each_child_mut(f),
            Expression::OrderClause(o) => o.field.for_each_expr_mut(f),
            Expression::Window(w) => w.for_each_child_mut(f),
            Expression::Cte(c) => {
                if let Some(body) = &mut c.body {
                    f(body.as_mut());
                }
            }
            Expression::Case(c) => {
                if let Some(value) = &mut c.value {
                    f(value.as_mut());
                }
                for (when, then) in &mut c.whens {
                    f(when);
                    then.for_each_expr_mut(f);
                }
                if let Some(other) = &mut c.else_value {
                    other.for_each_expr_mut(f);
                }
            }
        }
    }

    /// True for a group with no conditions.
    pub fn is_empty_group(&self) -> bool {
        matches!(self, Expression::Group(g) if g.is_empty())
    }
}

/// The left-hand side of a comparison: a field name or an expression.
#[derive(Debug, Clone)]
pub enum Field {
    Name(String),
    Expr(Box<Expression>),
}

impl Field {
    pub fn name(&self) -> Option<&str> {
        match self {
            Field::Name(name) => Some(name),
            Field::Expr(_) => None,
        }
    }

    pub fn sql(&self, binder: &mut ValueBinder) -> DbResult<String> {
        match self {
            Field::Name(name) => Ok(name.clone()),
            Field::Expr(expr) => expr.sql(binder),
        }
    }

    pub(crate) fn for_each_expr(&self, f: &mut dyn FnMut(&Expression)) {
        if let Field::Expr(expr) = self {
            f(expr.as_ref());
        }
    }

    pub(crate) fn for_each_expr_mut(&mut self, f: &mut dyn FnMut(&mut Expression)) {
        if let Field::Expr(expr) = self {
            f(expr.as_mut());
        }
    }
}

impl From<&str> for Field {
    fn from(name: &str) -> Self {
        Field::Name(name.to_string())
    }
}

impl From<String> for Field {
    fn from(name: String) -> Self {
        Field::Name(name)
    }
}

impl From<Expression> for Field {
    fn from(expr: Expression) -> Self {
        Field::Expr(Box::new(expr))
    }
}

impl From<FunctionExpression> for Field {
    fn from(func: FunctionExpression) -> Self {
        Field::Expr(Box::new(Expression::Function(func)))
    }
}

impl From<CaseExpression> for Field {
    fn from(case: CaseExpression) -> Self {
        Field::Expr(Box::new(Expression::Case(case)))
    }
}

impl From<Query> for Field {
    fn from(query: Query) -> Self {
        Field::Expr(Box::new(Expression::Query(Box::new(query))))
    }
}

/// Field names become identifiers.
impl From<Field> for Expression {
    fn from(field: Field) -> Self {
        match field {
            Field::Name(name) => Expression::Identifier(IdentifierExpression::new(name)),
            Field::Expr(expr) => *expr,
        }
    }
}

/// The right-hand side of a comparison: a literal value (bound) or an
/// expression (rendered).
#[derive(Debug, Clone)]
pub enum Operand {
    Value(Value),
    Expr(Box<Expression>),
}

impl Operand {
    pub fn is_null(&self) -> bool {
        matches!(self, Operand::Value(Value::Null))
    }

    /// Render the operand, binding a literal with the given type.
    pub(crate) fn sql(&self, binder: &mut ValueBinder, type_name: Option<&str>) -> DbResult<String> {
        match self {
            Operand::Value(value) => Ok(binder.bind_new(value.clone(), type_name)),
            Operand::Expr(expr) => expr.sql(binder),
        }
    }

    pub(crate) fn for_each_expr(&self, f: &mut dyn FnMut(&Expression)) {
        if let Operand::Expr(expr) = self {
            f(expr.as_ref());
        }
    }

    pub(crate) fn for_each_expr_mut(&mut self, f: &mut dyn FnMut(&mut Expression)) {
        if let Operand::Expr(expr) = self {
            f(expr.as_mut());
        }
    }
}

macro_rules! impl_operand_from_value {
    ($($t:ty),* $(,)?) => {
        $(impl From<$t> for Operand {
            fn from(v: $t) -> Self {
                Operand::Value(Value::from(v))
            }
        })*
    };
}

impl_operand_from_value!(
    bool,
    i8,
    i16,
    i32,
    i64,
    u8,
    u16,
    u32,
    f32,
    f64,
    Decimal,
    &str,
    String,
    &String,
    NaiveDate,
    NaiveTime,
    NaiveDateTime,
    DateTime<Utc>,
    Uuid,
    serde_json::Value,
);

impl From<Value> for Operand {
    fn from(v: Value) -> Self {
        Operand::Value(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Operand {
    fn from(v: Option<T>) -> Self {
        Operand::Value(Value::from(v))
    }
}

impl<T: Into<Value>> From<Vec<T>> for Operand {
    fn from(v: Vec<T>) -> Self {
        Operand::Value(Value::from(v))
    }
}

impl From<Expression> for Operand {
    fn from(expr: Expression) -> Self {
        Operand::Expr(Box::new(expr))
    }
}

impl From<IdentifierExpression> for Operand {
    fn from(id: IdentifierExpression) -> Self {
        Operand::Expr(Box::new(Expression::Identifier(id)))
    }
}

impl From<FunctionExpression> for Operand {
    fn from(func: FunctionExpression) -> Self {
        Operand::Expr(Box::new(Expression::Function(func)))
    }
}

impl From<QueryExpression> for Operand {
    fn from(group: QueryExpression) -> Self {
        Operand::Expr(Box::new(Expression::Group(group)))
    }
}

impl From<CaseExpression> for Operand {
    fn from(case: CaseExpression) -> Self {
        Operand::Expr(Box::new(Expression::Case(case)))
    }
}

impl From<Query> for Operand {
    fn from(query: Query) -> Self {
        Operand::Expr(Box::new(Expression::Query(Box::new(query))))
    }
}

impl From<&str> for Expression {
    fn from(sql: &str) -> Self {
        Expression::Raw(sql.to_string())
    }
}

impl From<String> for Expression {
    fn from(sql: String) -> Self {
        Expression::Raw(sql)
    }
}

impl From<IdentifierExpression> for Expression {
    fn from(id: IdentifierExpression) -> Self {
        Expression::Identifier(id)
    }
}

impl From<ComparisonExpression> for Expression {
    fn from(c: ComparisonExpression) -> Self {
        Expression::Comparison(c)
    }
}

impl From<BetweenExpression> for Expression {
    fn from(b: BetweenExpression) -> Self {
        Expression::Between(b)
    }
}

impl From<UnaryExpression> for Expression {
    fn from(u: UnaryExpression) -> Self {
        Expression::Unary(u)
    }
}

impl From<FunctionExpression> for Expression {
    fn from(f: FunctionExpression) -> Self {
        Expression::Function(f)
    }
}

impl From<QueryExpression> for Expression {
    fn from(g: QueryExpression) -> Self {
        Expression::Group(g)
    }
}

impl From<OrderClauseExpression> for Expression {
    fn from(o: OrderClauseExpression) -> Self {
        Expression::OrderClause(o)
    }
}

impl From<WindowExpression> for Expression {
    fn from(w: WindowExpression) -> Self {
        Expression::Window(w)
    }
}

impl From<CaseExpression> for Expression {
    fn from(c: CaseExpression) -> Self {
        Expression::Case(c)
    }
}

impl From<Query> for Expression {
    fn from(q: Query) -> Self {
        Expression::Query(Box::new(q))
    }
}
