use super::{Expression, Field, IntoConditions, QueryExpression, WindowExpression};
use crate::binder::ValueBinder;
use crate::error::{DbError, DbResult};
use crate::types::TypeMap;
use crate::value::Value;
use regex::Regex;
use std::sync::OnceLock;

fn function_name_pattern() -> &'static Regex {
    static NAME: OnceLock<Regex> = OnceLock::new();
    NAME.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_.]*$").expect("invalid built-in function name regex")
    })
}

/// A SQL function call such as `COUNT(*)`, `CAST(x AS text)` or
/// `ROW_NUMBER() OVER (ORDER BY id)`.
///
/// Arguments are expression nodes: raw fragments are emitted as-is,
/// identifiers are subject to quoting, and values are bound.
#[derive(Debug, Clone)]
pub struct FunctionExpression {
    pub(crate) name: String,
    pub(crate) args: Vec<Expression>,
    pub(crate) conjunction: String,
    pub(crate) return_type: String,
    pub(crate) filter: Option<QueryExpression>,
    pub(crate) over: Option<WindowExpression>,
}

impl FunctionExpression {
    pub fn new<I, E>(name: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<Expression>,
    {
        Self {
            name: name.into(),
            args: args.into_iter().map(Into::into).collect(),
            conjunction: ",".to_string(),
            return_type: "string".to_string(),
            filter: None,
            over: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn args(&self) -> &[Expression] {
        &self.args
    }

    pub fn args_mut(&mut self) -> &mut Vec<Expression> {
        &mut self.args
    }

    /// Append an argument.
    pub fn arg(mut self, arg: impl Into<Expression>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn conjunction(&self) -> &str {
        &self.conjunction
    }

    /// Separator placed between arguments, followed by a space.
    pub fn set_conjunction(&mut self, conjunction: impl Into<String>) {
        self.conjunction = conjunction.into();
    }

    pub fn with_conjunction(mut self, conjunction: impl Into<String>) -> Self {
        self.conjunction = conjunction.into();
        self
    }

    pub fn return_type(&self) -> &str {
        &self.return_type
    }

    pub fn set_return_type(mut self, return_type: impl Into<String>) -> Self {
        self.return_type = return_type.into();
        self
    }

    /// Add an aggregate `FILTER (WHERE ...)` clause.
    pub fn filter(mut self, conditions: impl IntoConditions) -> DbResult<Self> {
        let mut group = self.filter.take().unwrap_or_default();
        group.push_conditions(conditions.into_conditions(), &TypeMap::new())?;
        self.filter = Some(group);
        Ok(self)
    }

    /// Make this a window function over an inline window.
    pub fn over(mut self, window: WindowExpression) -> Self {
        self.over = Some(window);
        self
    }

    /// Make this a window function over a window declared with
    /// `Query::window`.
    pub fn over_named(mut self, name: &str) -> Self {
        self.over = Some(WindowExpression::named(name));
        self
    }

    pub fn window(&self) -> Option<&WindowExpression> {
        self.over.as_ref()
    }

    pub fn sql(&self, binder: &mut ValueBinder) -> DbResult<String> {
        let mut parts = Vec::with_capacity(self.args.len());
        for arg in &self.args {
            let sql = match arg {
                Expression::Group(g) if g.len() == 1 => format!("({})", arg.sql(binder)?),
                _ => arg.sql(binder)?,
            };
            parts.push(sql);
        }
        let mut sql = format!(
            "{}({})",
            self.name,
            parts.join(&format!("{} ", self.conjunction))
        );

        if let Some(filter) = &self.filter {
            let conditions = filter.sql(binder)?;
            if !conditions.is_empty() {
                sql.push_str(&format!(" FILTER (WHERE {conditions})"));
            }
        }
        if let Some(window) = &self.over {
            if window.is_named_only() {
                sql.push_str(&format!(" OVER {}", window.sql(binder)?));
            } else {
                sql.push_str(&format!(" OVER ({})", window.sql(binder)?));
            }
        }
        Ok(sql)
    }
}

/// Field arguments name columns; `*` stays literal.
fn field_arg(field: impl Into<Field>) -> Expression {
    match field.into() {
        Field::Name(name) if name == "*" => Expression::Raw(name),
        Field::Name(name) => Expression::identifier(name),
        Field::Expr(expr) => *expr,
    }
}

/// Factory for portable function calls. Dialects rewrite the generic names
/// (`CONCAT`, `NOW`, `DATE_ADD`, ...) into their own spelling when compiling.
#[derive(Debug, Clone, Copy, Default)]
pub struct FunctionsBuilder;

impl FunctionsBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn sum(&self, field: impl Into<Field>) -> FunctionExpression {
        FunctionExpression::new("SUM", [field_arg(field)]).set_return_type("float")
    }

    pub fn avg(&self, field: impl Into<Field>) -> FunctionExpression {
        FunctionExpression::new("AVG", [field_arg(field)]).set_return_type("float")
    }

    pub fn min(&self, field: impl Into<Field>) -> FunctionExpression {
        FunctionExpression::new("MIN", [field_arg(field)])
    }

    pub fn max(&self, field: impl Into<Field>) -> FunctionExpression {
        FunctionExpression::new("MAX", [field_arg(field)])
    }

    pub fn count(&self, field: impl Into<Field>) -> FunctionExpression {
        FunctionExpression::new("COUNT", [field_arg(field)]).set_return_type("integer")
    }

    /// `CONCAT(...)`; raw arguments are emitted verbatim, wrap literals
    /// in [`Expression::value`] to bind them.
    pub fn concat<I, E>(&self, args: I) -> FunctionExpression
    where
        I: IntoIterator<Item = E>,
        E: Into<Expression>,
    {
        FunctionExpression::new("CONCAT", args)
    }

    pub fn coalesce<I, E>(&self, args: I) -> FunctionExpression
    where
        I: IntoIterator<Item = E>,
        E: Into<Expression>,
    {
        FunctionExpression::new("COALESCE", args)
    }

    /// `CAST(field AS type)`
    pub fn cast(&self, field: impl Into<Field>, sql_type: &str) -> FunctionExpression {
        FunctionExpression::new("CAST", [field_arg(field), Expression::raw(sql_type)])
            .with_conjunction(" AS")
    }

    pub fn now(&self) -> FunctionExpression {
        FunctionExpression::new("NOW", Vec::<Expression>::new()).set_return_type("datetime")
    }

    pub fn current_date(&self) -> FunctionExpression {
        FunctionExpression::new("CURRENT_DATE", Vec::<Expression>::new()).set_return_type("date")
    }

    pub fn current_time(&self) -> FunctionExpression {
        FunctionExpression::new("CURRENT_TIME", Vec::<Expression>::new()).set_return_type("time")
    }

    /// `EXTRACT(part FROM field)`
    pub fn extract(&self, part: &str, field: impl Into<Field>) -> FunctionExpression {
        FunctionExpression::new("EXTRACT", [Expression::raw(part.to_uppercase()), field_arg(field)])
            .with_conjunction(" FROM")
            .set_return_type("integer")
    }

    /// `DATE_ADD(field, INTERVAL value unit)`
    pub fn date_add(&self, field: impl Into<Field>, value: i64, unit: &str) -> FunctionExpression {
        FunctionExpression::new(
            "DATE_ADD",
            [field_arg(field), Expression::raw(format!("{value} {unit}"))],
        )
        .with_conjunction(", INTERVAL")
        .set_return_type("datetime")
    }

    /// Day of the week, 1 (Sunday) to 7.
    pub fn day_of_week(&self, field: impl Into<Field>) -> FunctionExpression {
        FunctionExpression::new("DAYOFWEEK", [field_arg(field)]).set_return_type("integer")
    }

    pub fn rand(&self) -> FunctionExpression {
        FunctionExpression::new("RAND", Vec::<Expression>::new()).set_return_type("float")
    }

    pub fn row_number(&self) -> FunctionExpression {
        FunctionExpression::new("ROW_NUMBER", Vec::<Expression>::new())
            .set_return_type("integer")
            .over(WindowExpression::new())
    }

    /// `LAG(field, offset, default) OVER ()`
    pub fn lag(
        &self,
        field: impl Into<Field>,
        offset: u32,
        default: Option<Value>,
    ) -> FunctionExpression {
        offset_function("LAG", field, offset, default)
    }

    /// `LEAD(field, offset, default) OVER ()`
    pub fn lead(
        &self,
        field: impl Into<Field>,
        offset: u32,
        default: Option<Value>,
    ) -> FunctionExpression {
        offset_function("LEAD", field, offset, default)
    }

    /// An arbitrary aggregate, usable with `FILTER` and `OVER`.
    pub fn aggregate<I, E>(
        &self,
        name: &str,
        args: I,
        return_type: &str,
    ) -> DbResult<FunctionExpression>
    where
        I: IntoIterator<Item = E>,
        E: Into<Expression>,
    {
        Ok(self.named(name, args)?.set_return_type(return_type))
    }

    /// Any function by name.
    pub fn named<I, E>(&self, name: &str, args: I) -> DbResult<FunctionExpression>
    where
        I: IntoIterator<Item = E>,
        E: Into<Expression>,
    {
        if !function_name_pattern().is_match(name) {
            return Err(DbError::invalid_argument(format!(
                "Invalid function name `{name}`"
            )));
        }
        Ok(FunctionExpression::new(name, args))
    }
}

fn offset_function(
    name: &str,
    field: impl Into<Field>,
    offset: u32,
    default: Option<Value>,
) -> FunctionExpression {
    let mut args = vec![field_arg(field), Expression::typed_value(offset, "integer")];
    if let Some(default) = default {
        args.push(Expression::value(default));
    }
    FunctionExpression::new(name, args).over(WindowExpression::new())
}
