use super::{Expression, IdentifierExpression};
use crate::binder::ValueBinder;
use crate::error::{DbError, DbResult};

/// One entry of a `WITH` clause: `name (fields) AS [NOT] MATERIALIZED (body)`.
#[derive(Debug, Clone)]
pub struct CommonTableExpression {
    pub(crate) name: IdentifierExpression,
    pub(crate) fields: Vec<IdentifierExpression>,
    pub(crate) body: Option<Box<Expression>>,
    pub(crate) recursive: bool,
    pub(crate) materialized: Option<bool>,
}

impl CommonTableExpression {
    pub fn new(name: &str, body: impl Into<Expression>) -> Self {
        Self {
            name: IdentifierExpression::new(name),
            fields: Vec::new(),
            body: Some(Box::new(body.into())),
            recursive: false,
            materialized: None,
        }
    }

    /// A CTE whose body is supplied later with [`query`](Self::query).
    pub fn named(name: &str) -> Self {
        Self {
            name: IdentifierExpression::new(name),
            fields: Vec::new(),
            body: None,
            recursive: false,
            materialized: None,
        }
    }

    pub fn name(&self) -> &str {
        self.name.name()
    }

    pub fn query(mut self, body: impl Into<Expression>) -> Self {
        self.body = Some(Box::new(body.into()));
        self
    }

    pub fn field(mut self, field: &str) -> Self {
        self.fields.push(IdentifierExpression::new(field));
        self
    }

    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.fields
            .extend(fields.into_iter().map(|f| IdentifierExpression::new(f.as_ref())));
        self
    }

    pub fn recursive(mut self) -> Self {
        self.recursive = true;
        self
    }

    pub fn is_recursive(&self) -> bool {
        self.recursive
    }

    pub fn materialized(mut self) -> Self {
        self.materialized = Some(true);
        self
    }

    pub fn not_materialized(mut self) -> Self {
        self.materialized = Some(false);
        self
    }

    pub fn sql(&self, binder: &mut ValueBinder) -> DbResult<String> {
        let body = self.body.as_deref().ok_or_else(|| {
            DbError::incomplete(format!(
                "Common table expression `{}` has no query",
                self.name.name()
            ))
        })?;
        let body = match body {
            Expression::Query(_) => body.sql(binder)?,
            other => format!("({})", other.sql(binder)?),
        };

        let mut sql = self.name.sql();
        if !self.fields.is_empty() {
            let fields: Vec<String> = self.fields.iter().map(IdentifierExpression::sql).collect();
            sql.push_str(&format!(" ({})", fields.join(", ")));
        }
        sql.push_str(" AS ");
        match self.materialized {
            Some(true) => sql.push_str("MATERIALIZED "),
            Some(false) => sql.push_str("NOT MATERIALIZED "),
            None => {}
        }
        sql.push_str(&body);
        Ok(sql)
    }
}
