//! Typed clause storage.

use crate::error::DbError;
use crate::expr::{
    CommonTableExpression, Expression, Field, OrderByExpression, QueryExpression,
    ValuesExpression, WindowExpression,
};
use crate::query::Query;
use std::fmt;
use std::str::FromStr;

/// Statement kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryType {
    Select,
    Insert,
    Update,
    Delete,
}

impl QueryType {
    pub fn as_str(self) -> &'static str {
        match self {
            QueryType::Select => "select",
            QueryType::Insert => "insert",
            QueryType::Update => "update",
            QueryType::Delete => "delete",
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Names of every clause a query can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClauseName {
    Comment,
    With,
    Select,
    Distinct,
    Modifier,
    From,
    Join,
    Where,
    Group,
    Having,
    Window,
    Order,
    Limit,
    Offset,
    Union,
    Epilog,
    Insert,
    Values,
    Update,
    Set,
    Delete,
}

impl ClauseName {
    pub const ALL: [ClauseName; 21] = [
        ClauseName::Comment,
        ClauseName::With,
        ClauseName::Select,
        ClauseName::Distinct,
        ClauseName::Modifier,
        ClauseName::From,
        ClauseName::Join,
        ClauseName::Where,
        ClauseName::Group,
        ClauseName::Having,
        ClauseName::Window,
        ClauseName::Order,
        ClauseName::Limit,
        ClauseName::Offset,
        ClauseName::Union,
        ClauseName::Epilog,
        ClauseName::Insert,
        ClauseName::Values,
        ClauseName::Update,
        ClauseName::Set,
        ClauseName::Delete,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ClauseName::Comment => "comment",
            ClauseName::With => "with",
            ClauseName::Select => "select",
            ClauseName::Distinct => "distinct",
            ClauseName::Modifier => "modifier",
            ClauseName::From => "from",
            ClauseName::Join => "join",
            ClauseName::Where => "where",
            ClauseName::Group => "group",
            ClauseName::Having => "having",
            ClauseName::Window => "window",
            ClauseName::Order => "order",
            ClauseName::Limit => "limit",
            ClauseName::Offset => "offset",
            ClauseName::Union => "union",
            ClauseName::Epilog => "epilog",
            ClauseName::Insert => "insert",
            ClauseName::Values => "values",
            ClauseName::Update => "update",
            ClauseName::Set => "set",
            ClauseName::Delete => "delete",
        }
    }
}

impl fmt::Display for ClauseName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClauseName {
    type Err = DbError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        ClauseName::ALL
            .into_iter()
            .find(|clause| clause.as_str() == name)
            .ok_or_else(|| {
                let valid: Vec<&str> = ClauseName::ALL.iter().map(|c| c.as_str()).collect();
                DbError::invalid_clause(format!(
                    "The `{name}` clause is not defined. Valid clauses are: {}.",
                    valid.join(", ")
                ))
            })
    }
}

/// One entry of the SELECT list.
#[derive(Debug, Clone)]
pub struct SelectField {
    pub alias: Option<String>,
    pub expr: Expression,
}

/// DISTINCT state of a SELECT.
#[derive(Debug, Clone, Default)]
pub enum Distinct {
    #[default]
    None,
    All,
    /// `DISTINCT ON (...)`
    On(Vec<Expression>),
}

impl Distinct {
    pub fn is_none(&self) -> bool {
        matches!(self, Distinct::None)
    }
}

/// A table (or derived table) with an optional alias, as used by FROM,
/// JOIN and UPDATE.
#[derive(Debug, Clone)]
pub struct TableRef {
    pub alias: Option<String>,
    pub source: Expression,
}

impl TableRef {
    pub fn new(table: &str) -> Self {
        Self {
            alias: None,
            source: Expression::identifier(table),
        }
    }

    pub fn aliased(alias: &str, source: impl Into<Field>) -> Self {
        let source = match source.into() {
            Field::Name(name) => Expression::identifier(name),
            Field::Expr(expr) => *expr,
        };
        Self {
            alias: Some(alias.to_string()),
            source,
        }
    }

    /// The table name when the source is a plain identifier.
    pub fn table_name(&self) -> Option<&str> {
        match &self.source {
            Expression::Identifier(id) => Some(id.name()),
            _ => None,
        }
    }
}

impl From<&str> for TableRef {
    fn from(table: &str) -> Self {
        TableRef::new(table)
    }
}

impl From<String> for TableRef {
    fn from(table: String) -> Self {
        TableRef::new(&table)
    }
}

/// `(alias, table)`
impl From<(&str, &str)> for TableRef {
    fn from((alias, table): (&str, &str)) -> Self {
        TableRef::aliased(alias, table)
    }
}

/// `(alias, derived table)`
impl From<(&str, Query)> for TableRef {
    fn from((alias, query): (&str, Query)) -> Self {
        TableRef::aliased(alias, Expression::from(query))
    }
}

impl From<(&str, Expression)> for TableRef {
    fn from((alias, expr): (&str, Expression)) -> Self {
        TableRef::aliased(alias, expr)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinType {
    #[default]
    Inner,
    Left,
    Right,
}

impl JoinType {
    pub fn as_str(self) -> &'static str {
        match self {
            JoinType::Inner => "INNER",
            JoinType::Left => "LEFT",
            JoinType::Right => "RIGHT",
        }
    }
}

/// One JOIN. Joins are kept in declaration order; an aliased join that is
/// declared again replaces the earlier entry in place.
#[derive(Debug, Clone)]
pub struct JoinSpec {
    pub table: TableRef,
    pub kind: JoinType,
    pub conditions: QueryExpression,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetKind {
    Union,
    UnionAll,
    Intersect,
    IntersectAll,
}

impl SetKind {
    pub fn keyword(self) -> &'static str {
        match self {
            SetKind::Union => "UNION",
            SetKind::UnionAll => "UNION ALL",
            SetKind::Intersect => "INTERSECT",
            SetKind::IntersectAll => "INTERSECT ALL",
        }
    }
}

/// A query combined with the current one by UNION / INTERSECT.
#[derive(Debug, Clone)]
pub struct SetOperation {
    pub kind: SetKind,
    pub query: Box<Query>,
}

/// Target table and column list of an INSERT.
#[derive(Debug, Clone, Default)]
pub struct InsertTarget {
    pub table: Option<String>,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct Parts {
    pub(crate) comment: Option<String>,
    pub(crate) with: Vec<CommonTableExpression>,
    pub(crate) select: Vec<SelectField>,
    pub(crate) distinct: Distinct,
    pub(crate) modifier: Vec<Expression>,
    pub(crate) from: Vec<TableRef>,
    pub(crate) join: Vec<JoinSpec>,
    pub(crate) where_: QueryExpression,
    pub(crate) group: Vec<Expression>,
    pub(crate) having: QueryExpression,
    pub(crate) window: Vec<(String, WindowExpression)>,
    pub(crate) order: OrderByExpression,
    pub(crate) limit: Option<u64>,
    pub(crate) offset: Option<u64>,
    pub(crate) union: Vec<SetOperation>,
    pub(crate) epilog: Option<Expression>,
    pub(crate) insert: InsertTarget,
    pub(crate) values: Option<ValuesExpression>,
    pub(crate) update: Option<TableRef>,
    pub(crate) set: QueryExpression,
}

impl Default for Parts {
    fn default() -> Self {
        Self {
            comment: None,
            with: Vec::new(),
            select: Vec::new(),
            distinct: Distinct::None,
            modifier: Vec::new(),
            from: Vec::new(),
            join: Vec::new(),
            where_: QueryExpression::new(),
            group: Vec::new(),
            having: QueryExpression::new(),
            window: Vec::new(),
            order: OrderByExpression::new(),
            limit: None,
            offset: None,
            union: Vec::new(),
            epilog: None,
            insert: InsertTarget::default(),
            values: None,
            update: None,
            set: QueryExpression::with_conjunction(","),
        }
    }
}

impl Parts {
    /// True when the clause would contribute nothing to the statement.
    pub(crate) fn is_empty(&self, clause: ClauseName) -> bool {
        match clause {
            ClauseName::Comment => self.comment.as_deref().is_none_or(str::is_empty),
            ClauseName::With => self.with.is_empty(),
            ClauseName::Select => self.select.is_empty(),
            ClauseName::Distinct => self.distinct.is_none(),
            ClauseName::Modifier => self.modifier.is_empty(),
            ClauseName::From => self.from.is_empty(),
            ClauseName::Join => self.join.is_empty(),
            ClauseName::Where => self.where_.is_empty(),
            ClauseName::Group => self.group.is_empty(),
            ClauseName::Having => self.having.is_empty(),
            ClauseName::Window => self.window.is_empty(),
            ClauseName::Order => self.order.is_empty(),
            ClauseName::Limit => self.limit.is_none(),
            ClauseName::Offset => self.offset.is_none(),
            ClauseName::Union => self.union.is_empty(),
            ClauseName::Epilog => self.epilog.is_none(),
            ClauseName::Insert => self.insert.table.is_none() && self.insert.columns.is_empty(),
            ClauseName::Values => self.values.as_ref().is_none_or(ValuesExpression::is_empty),
            ClauseName::Update => self.update.is_none(),
            ClauseName::Set => self.set.is_empty(),
            // DELETE carries no payload of its own.
            ClauseName::Delete => false,
        }
    }
}

/// Read-only view of one clause, returned by [`Query::clause`].
#[derive(Debug, Clone, Copy)]
pub enum Clause<'a> {
    Comment(Option<&'a str>),
    With(&'a [CommonTableExpression]),
    Select(&'a [SelectField]),
    Distinct(&'a Distinct),
    Modifier(&'a [Expression]),
    From(&'a [TableRef]),
    Join(&'a [JoinSpec]),
    Where(&'a QueryExpression),
    Group(&'a [Expression]),
    Having(&'a QueryExpression),
    Window(&'a [(String, WindowExpression)]),
    Order(&'a OrderByExpression),
    Limit(Option<u64>),
    Offset(Option<u64>),
    Union(&'a [SetOperation]),
    Epilog(Option<&'a Expression>),
    Insert(&'a InsertTarget),
    Values(Option<&'a ValuesExpression>),
    Update(Option<&'a TableRef>),
    Set(&'a QueryExpression),
    Delete,
}
