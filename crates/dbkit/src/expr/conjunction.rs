use super::{
    BetweenExpression, ComparisonExpression, Expression, Field, IdentifierExpression, Operand,
    UnaryExpression,
};
use crate::binder::ValueBinder;
use crate::error::{DbError, DbResult};
use crate::query::Query;
use crate::types::{TypeMap, base_type_name};
use crate::value::Value;

/// Condition input accepted by `where`, `having`, join conditions and
/// [`QueryExpression::add`].
#[derive(Debug, Clone)]
pub enum Condition {
    /// `"field operator"` mapped to a value; the operator defaults to `=`.
    Field { key: String, value: Operand },
    /// A nested set combined with `AND`, `OR` or negated with `NOT`.
    Group {
        conjunction: String,
        conditions: Vec<Condition>,
    },
    /// Trusted SQL, emitted verbatim.
    Raw(String),
    /// A pre-built expression.
    Expr(Expression),
}

impl Condition {
    /// `"field"` or `"field operator"` compared against a value.
    pub fn field(key: impl Into<String>, value: impl Into<Operand>) -> Self {
        Condition::Field {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn and(conditions: impl IntoConditions) -> Self {
        Self::group("AND", conditions)
    }

    pub fn or(conditions: impl IntoConditions) -> Self {
        Self::group("OR", conditions)
    }

    pub fn not(conditions: impl IntoConditions) -> Self {
        Self::group("NOT", conditions)
    }

    pub fn raw(sql: impl Into<String>) -> Self {
        Condition::Raw(sql.into())
    }

    pub fn expr(expr: impl Into<Expression>) -> Self {
        Condition::Expr(expr.into())
    }

    fn group(conjunction: &str, conditions: impl IntoConditions) -> Self {
        Condition::Group {
            conjunction: conjunction.to_string(),
            conditions: conditions.into_conditions(),
        }
    }
}

/// Anything that can be turned into a list of conditions.
pub trait IntoConditions {
    fn into_conditions(self) -> Vec<Condition>;
}

impl IntoConditions for () {
    fn into_conditions(self) -> Vec<Condition> {
        Vec::new()
    }
}

impl IntoConditions for Condition {
    fn into_conditions(self) -> Vec<Condition> {
        vec![self]
    }
}

impl IntoConditions for Vec<Condition> {
    fn into_conditions(self) -> Vec<Condition> {
        self
    }
}

impl<const N: usize> IntoConditions for [Condition; N] {
    fn into_conditions(self) -> Vec<Condition> {
        self.into()
    }
}

impl IntoConditions for &str {
    fn into_conditions(self) -> Vec<Condition> {
        if self.is_empty() {
            Vec::new()
        } else {
            vec![Condition::Raw(self.to_string())]
        }
    }
}

impl IntoConditions for String {
    fn into_conditions(self) -> Vec<Condition> {
        self.as_str().into_conditions()
    }
}

impl IntoConditions for Vec<&str> {
    fn into_conditions(self) -> Vec<Condition> {
        self.into_iter().flat_map(IntoConditions::into_conditions).collect()
    }
}

impl IntoConditions for Expression {
    fn into_conditions(self) -> Vec<Condition> {
        vec![Condition::Expr(self)]
    }
}

impl IntoConditions for QueryExpression {
    fn into_conditions(self) -> Vec<Condition> {
        vec![Condition::Expr(Expression::Group(self))]
    }
}

impl<V: Into<Operand>> IntoConditions for (&str, V) {
    fn into_conditions(self) -> Vec<Condition> {
        vec![Condition::field(self.0, self.1)]
    }
}

impl<V: Into<Operand>, const N: usize> IntoConditions for [(&str, V); N] {
    fn into_conditions(self) -> Vec<Condition> {
        self.into_iter().map(|(k, v)| Condition::field(k, v)).collect()
    }
}

impl<V: Into<Operand>> IntoConditions for Vec<(&str, V)> {
    fn into_conditions(self) -> Vec<Condition> {
        self.into_iter().map(|(k, v)| Condition::field(k, v)).collect()
    }
}

/// A list of conditions joined by a conjunction (`AND`, `OR`, or `,` for
/// UPDATE's SET list).
#[derive(Debug, Clone)]
pub struct QueryExpression {
    pub(crate) conjunction: String,
    pub(crate) conditions: Vec<Expression>,
    pub(crate) type_map: TypeMap,
}

impl Default for QueryExpression {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryExpression {
    /// An empty `AND` group.
    pub fn new() -> Self {
        Self::with_conjunction("AND")
    }

    pub fn with_conjunction(conjunction: &str) -> Self {
        Self {
            conjunction: conjunction.to_string(),
            conditions: Vec::new(),
            type_map: TypeMap::new(),
        }
    }

    /// Use a type map to find type hints for fields compared in this group.
    pub fn with_type_map(mut self, type_map: TypeMap) -> Self {
        self.type_map = type_map;
        self
    }

    pub fn conjunction(&self) -> &str {
        &self.conjunction
    }

    pub fn set_conjunction(&mut self, conjunction: &str) {
        self.conjunction = conjunction.to_uppercase();
    }

    pub fn type_map(&self) -> &TypeMap {
        &self.type_map
    }

    pub fn conditions(&self) -> &[Expression] {
        &self.conditions
    }

    pub fn conditions_mut(&mut self) -> &mut Vec<Expression> {
        &mut self.conditions
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// True if any direct child is itself a group.
    pub fn has_nested_expression(&self) -> bool {
        self.conditions
            .iter()
            .any(|c| matches!(c, Expression::Group(_)))
    }

    /// Parse and add conditions.
    pub fn add(mut self, conditions: impl IntoConditions) -> DbResult<Self> {
        self.push_conditions(conditions.into_conditions(), &TypeMap::new())?;
        Ok(self)
    }

    /// Add an already built expression without parsing.
    pub fn push(&mut self, expr: impl Into<Expression>) {
        self.conditions.push(expr.into());
    }

    /// Parse and add conditions, using `types` ahead of the group's own
    /// type map for hints.
    pub(crate) fn push_conditions(
        &mut self,
        conditions: Vec<Condition>,
        types: &TypeMap,
    ) -> DbResult<()> {
        for condition in conditions {
            match condition {
                Condition::Raw(sql) => {
                    if !sql.is_empty() {
                        self.conditions.push(Expression::Raw(sql));
                    }
                }
                Condition::Expr(expr) => self.conditions.push(expr),
                Condition::Group {
                    conjunction,
                    conditions,
                } => {
                    if conditions.is_empty() {
                        continue;
                    }
                    if conjunction.eq_ignore_ascii_case("NOT") {
                        let mut inner =
                            QueryExpression::new().with_type_map(self.type_map.clone());
                        inner.push_conditions(conditions, types)?;
                        self.conditions
                            .push(UnaryExpression::prefix("NOT", inner).into());
                    } else {
                        let mut inner = QueryExpression::with_conjunction(
                            &conjunction.to_uppercase(),
                        )
                        .with_type_map(self.type_map.clone());
                        inner.push_conditions(conditions, types)?;
                        self.conditions.push(Expression::Group(inner));
                    }
                }
                Condition::Field { key, value } => {
                    let expr = self.parse_condition(&key, value, types)?;
                    self.conditions.push(expr);
                }
            }
        }
        Ok(())
    }

    fn type_for(&self, field: &str, types: &TypeMap) -> Option<String> {
        types
            .type_of(field)
            .or_else(|| self.type_map.type_of(field))
            .map(str::to_string)
    }

    /// Turn `"field operator" => value` into a comparison node.
    fn parse_condition(
        &self,
        key: &str,
        value: Operand,
        types: &TypeMap,
    ) -> DbResult<Expression> {
        let key = key.trim();
        let (field, operator) = split_operator(key);
        let mut operator = operator.to_uppercase();

        let mut type_name = self.type_for(&field, types);
        let mut multiple = type_name.as_deref().is_some_and(|t| base_type_name(t).1);

        if operator == "IN" || operator == "NOT IN" || multiple {
            if !multiple {
                type_name = type_name.map(|t| format!("{t}[]"));
            }
            operator = match operator.as_str() {
                "=" => "IN".to_string(),
                "!=" => "NOT IN".to_string(),
                _ => operator,
            };
            multiple = true;
        }

        let value = match value {
            Operand::Value(v) if multiple && !v.is_list() => Operand::Value(Value::List(vec![v])),
            other => other,
        };

        if value.is_null() {
            match operator.as_str() {
                "IS" => {
                    return Ok(UnaryExpression::postfix(
                        "IS NULL",
                        IdentifierExpression::new(field),
                    )
                    .into());
                }
                "IS NOT" => {
                    return Ok(UnaryExpression::postfix(
                        "IS NOT NULL",
                        IdentifierExpression::new(field),
                    )
                    .into());
                }
                _ if self.conjunction != "," => {
                    return Err(DbError::invalid_argument(format!(
                        "Expression `{field}` is missing operator (IS, IS NOT) with `null` value."
                    )));
                }
                _ => {}
            }
        }

        let operator = match operator.as_str() {
            "IS" => "=".to_string(),
            "IS NOT" => "!=".to_string(),
            _ => operator,
        };

        let mut comparison =
            ComparisonExpression::new(field, value, type_name.as_deref(), &operator);
        if multiple {
            comparison = comparison.multiple();
        }
        Ok(comparison.into())
    }

    /// Render the group. One condition renders bare, several are wrapped in
    /// parentheses; empty nested groups are skipped.
    pub fn sql(&self, binder: &mut ValueBinder) -> DbResult<String> {
        let mut parts = Vec::with_capacity(self.conditions.len());
        for condition in &self.conditions {
            if condition.is_empty_group() {
                continue;
            }
            let sql = condition.sql(binder)?;
            if !sql.is_empty() {
                parts.push(sql);
            }
        }
        let separator = if self.conjunction == "," {
            ", ".to_string()
        } else {
            format!(" {} ", self.conjunction)
        };
        Ok(match parts.len() {
            0 => String::new(),
            1 => parts.remove(0),
            _ => format!("({})", parts.join(&separator)),
        })
    }

    fn compare(mut self, field: impl Into<Field>, value: impl Into<Operand>, op: &str) -> Self {
        let field: Field = field.into();
        let type_name = field
            .name()
            .and_then(|name| self.type_map.type_of(name))
            .map(|t| base_type_name(t).0.to_string());
        self.conditions.push(
            ComparisonExpression::new(field, value, type_name.as_deref(), op).into(),
        );
        self
    }

    /// `field = value`
    pub fn eq(self, field: impl Into<Field>, value: impl Into<Operand>) -> Self {
        self.compare(field, value, "=")
    }

    /// `field != value`
    pub fn not_eq(self, field: impl Into<Field>, value: impl Into<Operand>) -> Self {
        self.compare(field, value, "!=")
    }

    pub fn gt(self, field: impl Into<Field>, value: impl Into<Operand>) -> Self {
        self.compare(field, value, ">")
    }

    pub fn gte(self, field: impl Into<Field>, value: impl Into<Operand>) -> Self {
        self.compare(field, value, ">=")
    }

    pub fn lt(self, field: impl Into<Field>, value: impl Into<Operand>) -> Self {
        self.compare(field, value, "<")
    }

    pub fn lte(self, field: impl Into<Field>, value: impl Into<Operand>) -> Self {
        self.compare(field, value, "<=")
    }

    pub fn like(self, field: impl Into<Field>, value: impl Into<Operand>) -> Self {
        self.compare(field, value, "LIKE")
    }

    pub fn not_like(self, field: impl Into<Field>, value: impl Into<Operand>) -> Self {
        self.compare(field, value, "NOT LIKE")
    }

    /// `field IS NULL`
    pub fn is_null(mut self, field: impl Into<Field>) -> Self {
        let operand = Expression::from(Into::<Field>::into(field));
        self.conditions
            .push(UnaryExpression::postfix("IS NULL", operand).into());
        self
    }

    /// `field IS NOT NULL`
    pub fn is_not_null(mut self, field: impl Into<Field>) -> Self {
        let operand = Expression::from(Into::<Field>::into(field));
        self.conditions
            .push(UnaryExpression::postfix("IS NOT NULL", operand).into());
        self
    }

    fn list(mut self, field: impl Into<Field>, values: impl Into<Operand>, op: &str) -> Self {
        let field: Field = field.into();
        let type_name = field
            .name()
            .and_then(|name| self.type_map.type_of(name))
            .map(|t| format!("{}[]", base_type_name(t).0));
        let values = match values.into() {
            Operand::Value(v) if !v.is_list() => Operand::Value(Value::List(vec![v])),
            other => other,
        };
        self.conditions.push(
            ComparisonExpression::new(field, values, type_name.as_deref(), op)
                .multiple()
                .into(),
        );
        self
    }

    /// `field IN (...)`; the values may also be a sub-query.
    pub fn in_list(self, field: impl Into<Field>, values: impl Into<Operand>) -> Self {
        self.list(field, values, "IN")
    }

    /// `field NOT IN (...)`
    pub fn not_in(self, field: impl Into<Field>, values: impl Into<Operand>) -> Self {
        self.list(field, values, "NOT IN")
    }

    /// `field BETWEEN from AND to`
    pub fn between(
        mut self,
        field: impl Into<Field>,
        from: impl Into<Operand>,
        to: impl Into<Operand>,
    ) -> Self {
        let field: Field = field.into();
        let type_name = field
            .name()
            .and_then(|name| self.type_map.type_of(name))
            .map(str::to_string);
        self.conditions.push(
            BetweenExpression::new(field, from, to, type_name.as_deref()).into(),
        );
        self
    }

    /// `EXISTS (sub-query)`
    pub fn exists(mut self, query: Query) -> Self {
        self.conditions
            .push(UnaryExpression::prefix("EXISTS", query).into());
        self
    }

    /// `NOT EXISTS (sub-query)`
    pub fn not_exists(mut self, query: Query) -> Self {
        self.conditions
            .push(UnaryExpression::prefix("NOT EXISTS", query).into());
        self
    }

    /// `left = right` where both sides are identifiers.
    pub fn equal_fields(mut self, left: &str, right: &str) -> Self {
        self.conditions.push(
            ComparisonExpression::new(left, IdentifierExpression::new(right), None, "=").into(),
        );
        self
    }

    /// Trusted SQL condition.
    pub fn raw(mut self, sql: impl Into<String>) -> Self {
        self.conditions.push(Expression::Raw(sql.into()));
        self
    }

    /// A nested `AND` group built by the closure.
    pub fn and_group(mut self, build: impl FnOnce(QueryExpression) -> QueryExpression) -> Self {
        let inner = build(QueryExpression::new().with_type_map(self.type_map.clone()));
        self.conditions.push(Expression::Group(inner));
        self
    }

    /// A nested `OR` group built by the closure.
    pub fn or_group(mut self, build: impl FnOnce(QueryExpression) -> QueryExpression) -> Self {
        let inner =
            build(QueryExpression::with_conjunction("OR").with_type_map(self.type_map.clone()));
        self.conditions.push(Expression::Group(inner));
        self
    }

    /// A negated `AND` group built by the closure.
    pub fn not_group(mut self, build: impl FnOnce(QueryExpression) -> QueryExpression) -> Self {
        let inner = build(QueryExpression::new().with_type_map(self.type_map.clone()));
        self.conditions
            .push(UnaryExpression::prefix("NOT", inner).into());
        self
    }
}

/// Split `"field operator"` into its parts; the operator defaults to `=`.
///
/// Multi-word operators (`IS NOT`, `NOT LIKE`, `NOT IN`, ...) are kept
/// together.
fn split_operator(key: &str) -> (String, String) {
    let words: Vec<&str> = key.split(' ').filter(|w| !w.is_empty()).collect();
    match words.len() {
        0 => (String::new(), "=".to_string()),
        1 => (words[0].to_string(), "=".to_string()),
        2 => (words[0].to_string(), words[1].to_string()),
        n => {
            let last = words[n - 1];
            let second = words[n - 2];
            let two_word = second.eq_ignore_ascii_case("not")
                || (second.eq_ignore_ascii_case("is") && last.eq_ignore_ascii_case("not"));
            if two_word {
                (words[..n - 2].join(" "), format!("{second} {last}"))
            } else {
                (words[..n - 1].join(" "), last.to_string())
            }
        }
    }
}
