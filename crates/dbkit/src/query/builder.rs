//! Fluent SELECT-side builder methods.
//!
//! Every method consumes the query and returns it so calls chain; methods
//! that parse conditions or validate input return `DbResult<Self>`. Methods
//! suffixed `_overwrite` replace the clause instead of appending to it.

use super::{
    Distinct, JoinSpec, JoinType, Query, SelectField, SetKind, SetOperation, TableRef,
};
use crate::dialect::Feature;
use crate::error::{DbError, DbResult};
use crate::expr::{
    CommonTableExpression, Condition, Expression, Field, FunctionExpression, IntoConditions,
    IntoOrderItems, OrderByExpression, QueryExpression, UnaryExpression, WindowExpression,
};
use crate::value::Value;

/// Default page size used by [`Query::page`] when no limit was given.
pub const DEFAULT_PAGE_SIZE: u64 = 25;

/// Anything that can be appended to a SELECT list.
pub trait IntoSelectFields {
    fn into_select_fields(self) -> Vec<SelectField>;
}

fn unaliased(expr: Expression) -> SelectField {
    SelectField { alias: None, expr }
}

fn aliased(alias: &str, field: impl Into<Field>) -> SelectField {
    SelectField {
        alias: Some(alias.to_string()),
        expr: Expression::from(field.into()),
    }
}

impl IntoSelectFields for &str {
    fn into_select_fields(self) -> Vec<SelectField> {
        vec![unaliased(Expression::identifier(self))]
    }
}

impl IntoSelectFields for String {
    fn into_select_fields(self) -> Vec<SelectField> {
        vec![unaliased(Expression::identifier(self))]
    }
}

impl<const N: usize> IntoSelectFields for [&str; N] {
    fn into_select_fields(self) -> Vec<SelectField> {
        self.into_iter()
            .map(|f| unaliased(Expression::identifier(f)))
            .collect()
    }
}

impl IntoSelectFields for Vec<&str> {
    fn into_select_fields(self) -> Vec<SelectField> {
        self.into_iter()
            .map(|f| unaliased(Expression::identifier(f)))
            .collect()
    }
}

impl IntoSelectFields for Vec<String> {
    fn into_select_fields(self) -> Vec<SelectField> {
        self.into_iter()
            .map(|f| unaliased(Expression::identifier(f)))
            .collect()
    }
}

impl IntoSelectFields for Expression {
    fn into_select_fields(self) -> Vec<SelectField> {
        vec![unaliased(self)]
    }
}

impl IntoSelectFields for FunctionExpression {
    fn into_select_fields(self) -> Vec<SelectField> {
        vec![unaliased(Expression::Function(self))]
    }
}

/// `(alias, field)`
impl<E: Into<Field>> IntoSelectFields for (&str, E) {
    fn into_select_fields(self) -> Vec<SelectField> {
        vec![aliased(self.0, self.1)]
    }
}

impl<E: Into<Field>, const N: usize> IntoSelectFields for [(&str, E); N] {
    fn into_select_fields(self) -> Vec<SelectField> {
        self.into_iter().map(|(a, e)| aliased(a, e)).collect()
    }
}

impl<E: Into<Field>> IntoSelectFields for Vec<(&str, E)> {
    fn into_select_fields(self) -> Vec<SelectField> {
        self.into_iter().map(|(a, e)| aliased(a, e)).collect()
    }
}

/// Anything usable as a list of expressions (GROUP BY, DISTINCT ON).
/// Strings are field names.
pub trait IntoExpressions {
    fn into_expressions(self) -> Vec<Expression>;
}

impl IntoExpressions for &str {
    fn into_expressions(self) -> Vec<Expression> {
        vec![Expression::identifier(self)]
    }
}

impl IntoExpressions for String {
    fn into_expressions(self) -> Vec<Expression> {
        vec![Expression::identifier(self)]
    }
}

impl<const N: usize> IntoExpressions for [&str; N] {
    fn into_expressions(self) -> Vec<Expression> {
        self.into_iter().map(Expression::identifier).collect()
    }
}

impl IntoExpressions for Vec<&str> {
    fn into_expressions(self) -> Vec<Expression> {
        self.into_iter().map(Expression::identifier).collect()
    }
}

impl IntoExpressions for Vec<String> {
    fn into_expressions(self) -> Vec<Expression> {
        self.into_iter().map(Expression::identifier).collect()
    }
}

impl IntoExpressions for Expression {
    fn into_expressions(self) -> Vec<Expression> {
        vec![self]
    }
}

impl IntoExpressions for Vec<Expression> {
    fn into_expressions(self) -> Vec<Expression> {
        self
    }
}

impl IntoExpressions for FunctionExpression {
    fn into_expressions(self) -> Vec<Expression> {
        vec![Expression::Function(self)]
    }
}

impl Query {
    // ==================== SELECT ====================

    /// Append fields to the SELECT list.
    pub fn select(mut self, fields: impl IntoSelectFields) -> Self {
        self.parts.select.extend(fields.into_select_fields());
        self.mark_dirty();
        self
    }

    /// Replace the SELECT list.
    pub fn select_overwrite(mut self, fields: impl IntoSelectFields) -> Self {
        self.parts.select = fields.into_select_fields();
        self.mark_dirty();
        self
    }

    /// `SELECT DISTINCT`
    pub fn distinct(mut self) -> Self {
        self.parts.distinct = Distinct::All;
        self.mark_dirty();
        self
    }

    /// `SELECT DISTINCT ON (fields)`; rewritten to GROUP BY on databases
    /// without native support.
    pub fn distinct_on(mut self, fields: impl IntoExpressions) -> Self {
        self.parts.distinct = Distinct::On(fields.into_expressions());
        self.mark_dirty();
        self
    }

    pub fn no_distinct(mut self) -> Self {
        self.parts.distinct = Distinct::None;
        self.mark_dirty();
        self
    }

    /// Add keywords emitted right after the statement verb, e.g.
    /// `SQL_NO_CACHE` or `IGNORE`. Strings are trusted SQL.
    pub fn modifier(mut self, modifier: impl Into<Expression>) -> Self {
        self.parts.modifier.push(modifier.into());
        self.mark_dirty();
        self
    }

    pub fn modifier_overwrite(mut self, modifier: impl Into<Expression>) -> Self {
        self.parts.modifier = vec![modifier.into()];
        self.mark_dirty();
        self
    }

    /// Prefix the statement with `/* comment */`. An empty comment clears it.
    pub fn comment(mut self, comment: &str) -> Self {
        self.parts.comment = (!comment.is_empty()).then(|| comment.to_string());
        self.mark_dirty();
        self
    }

    // ==================== FROM / JOIN ====================

    /// Add a table to FROM. Use `(alias, table)` to alias it.
    pub fn from(mut self, table: impl Into<TableRef>) -> Self {
        self.parts.from.push(table.into());
        self.mark_dirty();
        self
    }

    pub fn from_overwrite(mut self, table: impl Into<TableRef>) -> Self {
        self.parts.from = vec![table.into()];
        self.mark_dirty();
        self
    }

    /// Add a join. Declaring an aliased join again replaces the earlier one
    /// in place, so its position in the statement is kept.
    pub fn join(
        mut self,
        table: impl Into<TableRef>,
        kind: JoinType,
        conditions: impl IntoConditions,
    ) -> DbResult<Self> {
        let table = table.into();
        let mut parsed = self.new_expr();
        parsed.push_conditions(conditions.into_conditions(), &self.type_map)?;
        let spec = JoinSpec {
            table,
            kind,
            conditions: parsed,
        };

        let existing = spec.table.alias.as_deref().and_then(|alias| {
            self.parts
                .join
                .iter()
                .position(|j| j.table.alias.as_deref() == Some(alias))
        });
        match existing {
            Some(index) => self.parts.join[index] = spec,
            None => self.parts.join.push(spec),
        }
        self.mark_dirty();
        Ok(self)
    }

    pub fn inner_join(
        self,
        table: impl Into<TableRef>,
        conditions: impl IntoConditions,
    ) -> DbResult<Self> {
        self.join(table, JoinType::Inner, conditions)
    }

    pub fn left_join(
        self,
        table: impl Into<TableRef>,
        conditions: impl IntoConditions,
    ) -> DbResult<Self> {
        self.join(table, JoinType::Left, conditions)
    }

    pub fn right_join(
        self,
        table: impl Into<TableRef>,
        conditions: impl IntoConditions,
    ) -> DbResult<Self> {
        self.join(table, JoinType::Right, conditions)
    }

    /// Drop every join.
    pub fn join_overwrite(mut self) -> Self {
        self.parts.join.clear();
        self.mark_dirty();
        self
    }

    /// Remove the join declared under `alias`.
    pub fn remove_join(mut self, alias: &str) -> Self {
        self.parts
            .join
            .retain(|j| j.table.alias.as_deref() != Some(alias));
        self.mark_dirty();
        self
    }

    // ==================== WHERE / HAVING ====================

    /// Add conditions to WHERE, joined to the existing ones with `AND`.
    ///
    /// Keys are `"field"` or `"field operator"`; see
    /// [`QueryExpression::add`] for the accepted forms.
    pub fn where_(mut self, conditions: impl IntoConditions) -> DbResult<Self> {
        let where_ = std::mem::take(&mut self.parts.where_);
        self.parts.where_ = self.conjugate(where_, conditions.into_conditions())?;
        self.mark_dirty();
        Ok(self)
    }

    /// Alias of [`where_`](Self::where_).
    pub fn and_where(self, conditions: impl IntoConditions) -> DbResult<Self> {
        self.where_(conditions)
    }

    /// Replace WHERE.
    pub fn where_overwrite(mut self, conditions: impl IntoConditions) -> DbResult<Self> {
        self.parts.where_ = self.new_expr();
        self.where_(conditions)
    }

    /// Build WHERE conditions with a closure that receives a fresh
    /// expression and the query.
    pub fn where_fn<F>(self, build: F) -> DbResult<Self>
    where
        F: FnOnce(QueryExpression, &Query) -> QueryExpression,
    {
        let built = build(self.new_expr(), &self);
        self.where_(Expression::Group(built))
    }

    /// `field IS NULL` for each field.
    pub fn where_null(self, fields: impl IntoExpressions) -> DbResult<Self> {
        let conditions: Vec<Condition> = fields
            .into_expressions()
            .into_iter()
            .map(|f| Condition::expr(UnaryExpression::postfix("IS NULL", f)))
            .collect();
        self.where_(conditions)
    }

    /// `field IS NOT NULL` for each field.
    pub fn where_not_null(self, fields: impl IntoExpressions) -> DbResult<Self> {
        let conditions: Vec<Condition> = fields
            .into_expressions()
            .into_iter()
            .map(|f| Condition::expr(UnaryExpression::postfix("IS NOT NULL", f)))
            .collect();
        self.where_(conditions)
    }

    /// `field IN (...)`. An empty list matches nothing (`1=0`) unless
    /// `allow_empty` is false, in which case compilation fails.
    pub fn where_in_list(
        self,
        field: &str,
        values: Vec<Value>,
        allow_empty: bool,
    ) -> DbResult<Self> {
        if values.is_empty() && allow_empty {
            return self.where_("1=0");
        }
        let key = format!("{field} IN");
        self.where_([(key.as_str(), Value::List(values))])
    }

    /// `field NOT IN (...)`. An empty list matches everything (`1=1`) unless
    /// `allow_empty` is false.
    pub fn where_not_in_list(
        self,
        field: &str,
        values: Vec<Value>,
        allow_empty: bool,
    ) -> DbResult<Self> {
        if values.is_empty() && allow_empty {
            return self.where_("1=1");
        }
        let key = format!("{field} NOT IN");
        self.where_([(key.as_str(), Value::List(values))])
    }

    /// Add conditions to HAVING, joined with `AND`.
    pub fn having(mut self, conditions: impl IntoConditions) -> DbResult<Self> {
        let having = std::mem::take(&mut self.parts.having);
        self.parts.having = self.conjugate(having, conditions.into_conditions())?;
        self.mark_dirty();
        Ok(self)
    }

    pub fn and_having(self, conditions: impl IntoConditions) -> DbResult<Self> {
        self.having(conditions)
    }

    pub fn having_overwrite(mut self, conditions: impl IntoConditions) -> DbResult<Self> {
        self.parts.having = self.new_expr();
        self.having(conditions)
    }

    pub fn having_fn<F>(self, build: F) -> DbResult<Self>
    where
        F: FnOnce(QueryExpression, &Query) -> QueryExpression,
    {
        let built = build(self.new_expr(), &self);
        self.having(Expression::Group(built))
    }

    /// Join new conditions onto an existing root with `AND`.
    ///
    /// An `AND` root takes them as siblings; any other root is wrapped so
    /// its own conjunction keeps binding tighter.
    fn conjugate(
        &self,
        mut root: QueryExpression,
        conditions: Vec<Condition>,
    ) -> DbResult<QueryExpression> {
        if conditions.is_empty() {
            return Ok(root);
        }
        if root.conjunction() == "AND" {
            root.push_conditions(conditions, &self.type_map)?;
            return Ok(root);
        }
        let mut wrapped = self.new_expr();
        if !root.is_empty() {
            wrapped.push(Expression::Group(root));
        }
        wrapped.push_conditions(conditions, &self.type_map)?;
        Ok(wrapped)
    }

    // ==================== GROUP / WINDOW / ORDER ====================

    pub fn group(mut self, fields: impl IntoExpressions) -> Self {
        self.parts.group.extend(fields.into_expressions());
        self.mark_dirty();
        self
    }

    pub fn group_overwrite(mut self, fields: impl IntoExpressions) -> Self {
        self.parts.group = fields.into_expressions();
        self.mark_dirty();
        self
    }

    /// Declare a named window in the `WINDOW` clause.
    pub fn window(mut self, name: &str, window: WindowExpression) -> Self {
        match self.parts.window.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = window,
            None => self.parts.window.push((name.to_string(), window)),
        }
        self.mark_dirty();
        self
    }

    pub fn window_overwrite(mut self, name: &str, window: WindowExpression) -> Self {
        self.parts.window = vec![(name.to_string(), window)];
        self.mark_dirty();
        self
    }

    /// Append to ORDER BY. Directions must be `ASC` or `DESC`.
    pub fn order(mut self, items: impl IntoOrderItems) -> DbResult<Self> {
        for item in items.into_order_items()? {
            self.parts.order.push(item);
        }
        self.mark_dirty();
        Ok(self)
    }

    pub fn order_overwrite(mut self, items: impl IntoOrderItems) -> DbResult<Self> {
        self.parts.order = OrderByExpression::new();
        self.order(items)
    }

    pub fn order_asc(self, field: impl Into<Field>) -> Self {
        self.push_order(crate::expr::OrderClauseExpression::asc(field))
    }

    pub fn order_desc(self, field: impl Into<Field>) -> Self {
        self.push_order(crate::expr::OrderClauseExpression::desc(field))
    }

    fn push_order(mut self, clause: crate::expr::OrderClauseExpression) -> Self {
        self.parts
            .order
            .push(crate::expr::OrderItem::Expr(Expression::OrderClause(clause)));
        self.mark_dirty();
        self
    }

    // ==================== LIMIT / OFFSET ====================

    pub fn limit(mut self, limit: u64) -> Self {
        self.parts.limit = Some(limit);
        self.mark_dirty();
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.parts.offset = Some(offset);
        self.mark_dirty();
        self
    }

    /// Page through results. Pages start at 1; without a limit the page
    /// size is [`DEFAULT_PAGE_SIZE`].
    pub fn page(mut self, page: u64, limit: Option<u64>) -> DbResult<Self> {
        if page < 1 {
            return Err(DbError::invalid_argument("Pages must start at 1."));
        }
        if let Some(limit) = limit {
            self.parts.limit = Some(limit);
        }
        let limit = *self.parts.limit.get_or_insert(DEFAULT_PAGE_SIZE);
        let offset = (page - 1).saturating_mul(limit).min(i64::MAX as u64);
        self.parts.offset = Some(offset);
        self.mark_dirty();
        Ok(self)
    }

    // ==================== WITH / set operations / epilog ====================

    /// Add a common table expression.
    pub fn with(mut self, cte: CommonTableExpression) -> Self {
        self.parts.with.push(cte);
        self.mark_dirty();
        self
    }

    pub fn with_overwrite(mut self, cte: CommonTableExpression) -> Self {
        self.parts.with = vec![cte];
        self.mark_dirty();
        self
    }

    pub fn union(self, query: Query) -> Self {
        self.push_set(SetKind::Union, query)
    }

    pub fn union_all(self, query: Query) -> Self {
        self.push_set(SetKind::UnionAll, query)
    }

    /// Drop every UNION / INTERSECT branch.
    pub fn union_overwrite(mut self) -> Self {
        self.parts.union.clear();
        self.mark_dirty();
        self
    }

    pub fn intersect(self, query: Query) -> DbResult<Self> {
        self.require(Feature::Intersect, "INTERSECT")?;
        Ok(self.push_set(SetKind::Intersect, query))
    }

    pub fn intersect_all(self, query: Query) -> DbResult<Self> {
        self.require(Feature::IntersectAll, "INTERSECT ALL")?;
        Ok(self.push_set(SetKind::IntersectAll, query))
    }

    fn push_set(mut self, kind: SetKind, query: Query) -> Self {
        self.parts.union.push(SetOperation {
            kind,
            query: Box::new(query),
        });
        self.mark_dirty();
        self
    }

    fn require(&self, feature: Feature, label: &str) -> DbResult<()> {
        if self.connection().supports(feature) {
            Ok(())
        } else {
            Err(DbError::unsupported(self.connection().dialect().name(), label))
        }
    }

    /// Trailing SQL appended after every other clause, e.g. `FOR UPDATE`.
    pub fn epilog(mut self, epilog: impl Into<Expression>) -> Self {
        self.parts.epilog = Some(epilog.into());
        self.mark_dirty();
        self
    }
}
