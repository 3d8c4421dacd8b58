//! The query AST and its fluent builder.
//!
//! A [`Query`] stores each clause in a typed slot ([`parts`]) and never
//! holds SQL text. Rendering goes through the owning connection's dialect:
//! the query is cloned, optionally identifier-quoted, translated for the
//! dialect and compiled, so the same query can be compiled repeatedly (and
//! for different connections) without side effects.
//!
//! # Example
//!
//! ```ignore
//! use dbkit::prelude::*;
//!
//! let sql = conn
//!     .select_query()
//!     .select(["id", "title"])
//!     .from("articles")
//!     .where_([("author_id", 1)])?
//!     .order([("id", "DESC")])?
//!     .limit(5)
//!     .sql(None)?;
//! assert_eq!(
//!     sql,
//!     "SELECT id, title FROM articles WHERE author_id = :p0 ORDER BY id DESC LIMIT 5"
//! );
//! # Ok::<(), dbkit::DbError>(())
//! ```

mod builder;
mod parts;
mod result;
mod write;


pub use builder::{IntoExpressions, IntoSelectFields};
pub use parts::{
    Clause, ClauseName, Distinct, InsertTarget, JoinSpec, JoinType, QueryType, SelectField,
    SetKind, SetOperation, TableRef,
};
pub use result::ResultSet;

pub(crate) use parts::Parts;

use crate::binder::ValueBinder;
use crate::connection::Connection;
use crate::driver::Row;
use crate::error::DbResult;
use crate::expr::{Expression, FunctionsBuilder, QueryExpression};
use crate::types::{FieldTypeConverter, TypeMap};
use crate::value::Value;
use std::fmt;
use std::sync::Arc;

/// Transformation applied to each fetched row after type casting.
pub type ResultDecorator = Arc<dyn Fn(Row) -> DbResult<Row> + Send + Sync>;

/// Which driver of a read/write split executes a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Read,
    Write,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Read => "read",
            Role::Write => "write",
        }
    }
}

#[derive(Debug, Clone)]
enum Freshness {
    /// Mutated since the last execution (or never executed).
    Dirty,
    Executed(ResultSet),
}

/// A SQL statement under construction.
pub struct Query {
    connection: Connection,
    kind: QueryType,
    pub(crate) parts: Parts,
    freshness: Freshness,
    binder: ValueBinder,
    type_map: TypeMap,
    select_type_map: Option<TypeMap>,
    results_casting: bool,
    decorators: Vec<ResultDecorator>,
    role: Option<Role>,
}

impl Clone for Query {
    /// Clones start dirty: cached results are never shared.
    fn clone(&self) -> Self {
        Self {
            connection: self.connection.clone(),
            kind: self.kind,
            parts: self.parts.clone(),
            freshness: Freshness::Dirty,
            binder: self.binder.clone(),
            type_map: self.type_map.clone(),
            select_type_map: self.select_type_map.clone(),
            results_casting: self.results_casting,
            decorators: self.decorators.clone(),
            role: self.role,
        }
    }
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("kind", &self.kind)
            .field("parts", &self.parts)
            .field("dirty", &self.is_dirty())
            .field("bindings", &self.binder.bindings())
            .field("role", &self.role)
            .finish()
    }
}

impl Query {
    /// An empty SELECT bound to a connection.
    pub fn new(connection: Connection) -> Self {
        Self {
            connection,
            kind: QueryType::Select,
            parts: Parts::default(),
            freshness: Freshness::Dirty,
            binder: ValueBinder::new(),
            type_map: TypeMap::new(),
            select_type_map: None,
            results_casting: true,
            decorators: Vec::new(),
            role: None,
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn kind(&self) -> QueryType {
        self.kind
    }

    pub(crate) fn set_kind(&mut self, kind: QueryType) {
        self.kind = kind;
        self.mark_dirty();
    }

    /// True when the query changed since it was last executed.
    pub fn is_dirty(&self) -> bool {
        matches!(self.freshness, Freshness::Dirty)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.freshness = Freshness::Dirty;
    }

    /// Read one clause by name. Unknown names are an `InvalidClause` error.
    pub fn clause(&self, name: &str) -> DbResult<parts::Clause<'_>> {
        let parts = &self.parts;
        Ok(match name.parse::<ClauseName>()? {
            ClauseName::Comment => Clause::Comment(parts.comment.as_deref()),
            ClauseName::With => Clause::With(&parts.with),
            ClauseName::Select => Clause::Select(&parts.select),
            ClauseName::Distinct => Clause::Distinct(&parts.distinct),
            ClauseName::Modifier => Clause::Modifier(&parts.modifier),
            ClauseName::From => Clause::From(&parts.from),
            ClauseName::Join => Clause::Join(&parts.join),
            ClauseName::Where => Clause::Where(&parts.where_),
            ClauseName::Group => Clause::Group(&parts.group),
            ClauseName::Having => Clause::Having(&parts.having),
            ClauseName::Window => Clause::Window(&parts.window),
            ClauseName::Order => Clause::Order(&parts.order),
            ClauseName::Limit => Clause::Limit(parts.limit),
            ClauseName::Offset => Clause::Offset(parts.offset),
            ClauseName::Union => Clause::Union(&parts.union),
            ClauseName::Epilog => Clause::Epilog(parts.epilog.as_ref()),
            ClauseName::Insert => Clause::Insert(&parts.insert),
            ClauseName::Values => Clause::Values(parts.values.as_ref()),
            ClauseName::Update => Clause::Update(parts.update.as_ref()),
            ClauseName::Set => Clause::Set(&parts.set),
            ClauseName::Delete => Clause::Delete,
        })
    }

    /// True when the named clause holds nothing.
    pub fn clause_is_empty(&self, clause: ClauseName) -> bool {
        self.parts.is_empty(clause)
    }

    /// Factory for SQL function expressions.
    pub fn func(&self) -> FunctionsBuilder {
        FunctionsBuilder::new()
    }

    /// A fresh `AND` expression sharing this query's type map.
    pub fn new_expr(&self) -> QueryExpression {
        QueryExpression::new().with_type_map(self.type_map.clone())
    }

    pub fn type_map(&self) -> &TypeMap {
        &self.type_map
    }

    /// Replace the type map used for condition values and result casting.
    pub fn set_type_map(mut self, type_map: TypeMap) -> Self {
        self.type_map = type_map;
        self.mark_dirty();
        self
    }

    /// Add per-query field types on top of the current map.
    pub fn add_types<K, V>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.type_map.add_types(pairs);
        self.mark_dirty();
        self
    }

    /// Types used to cast result columns.
    ///
    /// Unless set explicitly, this is derived from the SELECT list: aliased
    /// functions and CASE expressions contribute their return type, plain
    /// fields the type the query's type map gives them.
    pub fn select_type_map(&self) -> TypeMap {
        if let Some(map) = &self.select_type_map {
            return map.clone();
        }
        let mut pairs: Vec<(String, String)> = Vec::new();
        for field in &self.parts.select {
            match &field.expr {
                Expression::Function(func) => {
                    if let Some(alias) = &field.alias {
                        pairs.push((alias.clone(), func.return_type().to_string()));
                    }
                }
                Expression::Case(case) => {
                    if let (Some(alias), Some(ty)) = (&field.alias, case.return_type()) {
                        pairs.push((alias.clone(), ty.to_string()));
                    }
                }
                Expression::Identifier(id) => {
                    let name = id.name();
                    let column = name.rsplit('.').next().unwrap_or(name);
                    let ty = self
                        .type_map
                        .type_of(name)
                        .or_else(|| self.type_map.type_of(column));
                    if let Some(ty) = ty {
                        let key = field.alias.clone().unwrap_or_else(|| column.to_string());
                        pairs.push((key, ty.to_string()));
                    }
                }
                _ => {}
            }
        }
        TypeMap::from_pairs(pairs)
    }

    pub fn set_select_type_map(mut self, map: TypeMap) -> Self {
        self.select_type_map = Some(map);
        self.mark_dirty();
        self
    }

    pub fn disable_results_casting(mut self) -> Self {
        self.results_casting = false;
        self.mark_dirty();
        self
    }

    pub fn enable_results_casting(mut self) -> Self {
        self.results_casting = true;
        self.mark_dirty();
        self
    }

    pub fn is_results_casting_enabled(&self) -> bool {
        self.results_casting
    }

    /// Register a row decorator, run after type casting. With `overwrite`
    /// the decorator replaces all previously registered ones.
    pub fn decorate_results<F>(mut self, decorator: F, overwrite: bool) -> Self
    where
        F: Fn(Row) -> DbResult<Row> + Send + Sync + 'static,
    {
        if overwrite {
            self.decorators.clear();
        }
        self.decorators.push(Arc::new(decorator));
        self.mark_dirty();
        self
    }

    /// Drop every result decorator.
    pub fn clear_decorators(mut self) -> Self {
        self.decorators.clear();
        self.mark_dirty();
        self
    }

    /// Execute on the read driver.
    pub fn use_read_role(mut self) -> Self {
        self.role = Some(Role::Read);
        self
    }

    /// Execute on the write driver.
    pub fn use_write_role(mut self) -> Self {
        self.role = Some(Role::Write);
        self
    }

    /// The driver role this query runs on: the one chosen explicitly, else
    /// read for SELECT and write for everything else.
    pub fn role(&self) -> Role {
        self.role.unwrap_or(match self.kind {
            QueryType::Select => Role::Read,
            _ => Role::Write,
        })
    }

    /// Bind a value to a placeholder written by hand in a raw fragment.
    /// Names of the form `:p0`, `:p1`, ... are reserved for generated
    /// placeholders; compiling a query that binds one fails.
    pub fn bind(mut self, placeholder: &str, value: impl Into<Value>, type_name: Option<&str>) -> Self {
        self.binder.bind(placeholder, value, type_name);
        self.mark_dirty();
        self
    }

    /// Values bound with [`bind`](Self::bind).
    pub fn value_binder(&self) -> &ValueBinder {
        &self.binder
    }

    /// Compile to SQL without executing.
    ///
    /// With no binder a fresh one is used, so repeated calls on an unchanged
    /// query return the same text and placeholders.
    pub fn sql(&self, binder: Option<&mut ValueBinder>) -> DbResult<String> {
        let mut fresh = ValueBinder::new();
        let binder = binder.unwrap_or(&mut fresh);
        let (_, sql) = self.connection.compile_query(self, binder)?;
        Ok(sql)
    }

    /// Run the query and cache its (cast and decorated) rows.
    pub fn execute(&mut self) -> DbResult<ResultSet> {
        let mut statement = self.connection.run(self)?;
        let rows = statement.fetch_all()?;
        let row_count = statement.row_count();
        statement.close_cursor();

        let rows = self.decorate(rows)?;
        let result = ResultSet::new(rows, row_count);
        self.freshness = Freshness::Executed(result.clone());
        Ok(result)
    }

    /// Rows of the query, executing it only when it changed since the last run.
    pub fn all(&mut self) -> DbResult<ResultSet> {
        match &self.freshness {
            Freshness::Executed(result) => Ok(result.clone()),
            Freshness::Dirty => self.execute(),
        }
    }

    /// The first row. A dirty query without a limit runs as a `LIMIT 1`
    /// copy, leaving this query untouched.
    pub fn first(&mut self) -> DbResult<Option<Row>> {
        if self.is_dirty() && self.parts.limit.is_none() {
            let mut limited = self.clone().limit(1);
            return Ok(limited.execute()?.into_rows().into_iter().next());
        }
        Ok(self.all()?.into_rows().into_iter().next())
    }

    /// Execute and return the number of affected rows.
    pub fn row_count(&mut self) -> DbResult<u64> {
        Ok(self.execute()?.row_count())
    }

    fn decorate(&self, rows: Vec<Row>) -> DbResult<Vec<Row>> {
        let converter = if self.results_casting {
            let map = self.select_type_map();
            if map.is_empty() {
                None
            } else {
                Some(FieldTypeConverter::new(
                    &map,
                    self.connection.type_registry(),
                    self.connection.dialect(),
                )?)
            }
        } else {
            None
        };

        rows.into_iter()
            .map(|row| {
                let mut row = match &converter {
                    Some(converter) => converter.convert(row)?,
                    None => row,
                };
                for decorator in &self.decorators {
                    row = decorator(row)?;
                }
                Ok(row)
            })
            .collect()
    }

    /// Visit every expression reachable from the clauses, parents first.
    ///
    /// Queries nested as operands, FROM sources or set-operation branches
    /// are visited as single nodes and not descended into.
    pub fn traverse_expressions(&self, f: &mut dyn FnMut(&Expression)) {
        let parts = &self.parts;
        for cte in &parts.with {
            if let Some(body) = &cte.body {
                body.walk(f);
            }
        }
        for field in &parts.select {
            field.expr.walk(f);
        }
        if let Distinct::On(fields) = &parts.distinct {
            fields.iter().for_each(|e| e.walk(f));
        }
        parts.modifier.iter().for_each(|e| e.walk(f));
        parts.from.iter().for_each(|t| t.source.walk(f));
        for join in &parts.join {
            join.table.source.walk(f);
            join.conditions.conditions().iter().for_each(|e| e.walk(f));
        }
        parts.where_.conditions().iter().for_each(|e| e.walk(f));
        parts.group.iter().for_each(|e| e.walk(f));
        parts.having.conditions().iter().for_each(|e| e.walk(f));
        for (_, window) in &parts.window {
            window.for_each_child(&mut |e| e.walk(f));
        }
        parts.order.for_each_child(&mut |e| e.walk(f));
        if let Some(epilog) = &parts.epilog {
            epilog.walk(f);
        }
        if let Some(values) = &parts.values {
            for operand in values.rows.iter().flatten() {
                operand.for_each_expr(&mut |e| e.walk(f));
            }
        }
        if let Some(table) = &parts.update {
            table.source.walk(f);
        }
        parts.set.conditions().iter().for_each(|e| e.walk(f));
    }

    /// Mutable variant of [`traverse_expressions`](Self::traverse_expressions).
    pub fn traverse_expressions_mut(&mut self, f: &mut dyn FnMut(&mut Expression)) {
        let parts = &mut self.parts;
        for cte in &mut parts.with {
            if let Some(body) = &mut cte.body {
                body.walk_mut(f);
            }
        }
        for field in &mut parts.select {
            field.expr.walk_mut(f);
        }
        if let Distinct::On(fields) = &mut parts.distinct {
            fields.iter_mut().for_each(|e| e.walk_mut(f));
        }
        parts.modifier.iter_mut().for_each(|e| e.walk_mut(f));
        parts.from.iter_mut().for_each(|t| t.source.walk_mut(f));
        for join in &mut parts.join {
            join.table.source.walk_mut(f);
            join.conditions
                .conditions_mut()
                .iter_mut()
                .for_each(|e| e.walk_mut(f));
        }
        parts
            .where_
            .conditions_mut()
            .iter_mut()
            .for_each(|e| e.walk_mut(f));
        parts.group.iter_mut().for_each(|e| e.walk_mut(f));
        parts
            .having
            .conditions_mut()
            .iter_mut()
            .for_each(|e| e.walk_mut(f));
        for (_, window) in &mut parts.window {
            window.for_each_child_mut(&mut |e| e.walk_mut(f));
        }
        parts.order.for_each_child_mut(&mut |e| e.walk_mut(f));
        if let Some(epilog) = &mut parts.epilog {
            epilog.walk_mut(f);
        }
        if let Some(values) = &mut parts.values {
            for operand in values.rows.iter_mut().flatten() {
                operand.for_each_expr_mut(&mut |e| e.walk_mut(f));
            }
        }
        if let Some(table) = &mut parts.update {
            table.source.walk_mut(f);
        }
        parts
            .set
            .conditions_mut()
            .iter_mut()
            .for_each(|e| e.walk_mut(f));
    }
}
