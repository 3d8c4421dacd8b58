//! Query compilation.
//!
//! [`compile_query`] is the single entry point: it clones the query, quotes
//! identifiers when auto-quoting is on, applies the dialect's translations
//! and renders the clauses in the fixed order of the statement type. Nothing
//! it does is visible on the caller's query, so compiling twice yields the
//! same SQL and the same placeholders.
//!
//! [`QueryCompiler`] carries the rendering rules. Every method has a
//! portable default; dialects override only the clauses they spell
//! differently.

#[cfg(test)]
mod tests;

use crate::binder::{ValueBinder, is_generated_placeholder};
use crate::dialect::{Dialect, Feature, translate};
use crate::error::{DbError, DbResult};
use crate::expr::{Expression, OrderByExpression};
use crate::query::{ClauseName, Distinct, Query, QueryType};
use regex::Regex;

const SELECT_ORDER: &[ClauseName] = &[
    ClauseName::Comment,
    ClauseName::With,
    ClauseName::Select,
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
];

const INSERT_ORDER: &[ClauseName] = &[
    ClauseName::Comment,
    ClauseName::With,
    ClauseName::Insert,
    ClauseName::Values,
    ClauseName::Epilog,
];

const UPDATE_ORDER: &[ClauseName] = &[
    ClauseName::Comment,
    ClauseName::With,
    ClauseName::Update,
    ClauseName::Set,
    ClauseName::Where,
    ClauseName::Epilog,
];

const DELETE_ORDER: &[ClauseName] = &[
    ClauseName::Comment,
    ClauseName::With,
    ClauseName::Delete,
    ClauseName::Modifier,
    ClauseName::From,
    ClauseName::Where,
    ClauseName::Epilog,
];

/// Clause order used by the portable compiler.
pub fn default_clause_order(kind: QueryType) -> &'static [ClauseName] {
    match kind {
        QueryType::Select => SELECT_ORDER,
        QueryType::Insert => INSERT_ORDER,
        QueryType::Update => UPDATE_ORDER,
        QueryType::Delete => DELETE_ORDER,
    }
}

/// `sprintf`-style templates for clauses that render a single fragment.
pub fn default_template(clause: ClauseName) -> Option<&'static str> {
    match clause {
        ClauseName::Where => Some(" WHERE %s"),
        ClauseName::Group => Some(" GROUP BY %s"),
        ClauseName::Having => Some(" HAVING %s"),
        ClauseName::Order => Some(" %s"),
        ClauseName::Limit => Some(" LIMIT %s"),
        ClauseName::Offset => Some(" OFFSET %s"),
        ClauseName::Epilog => Some(" %s"),
        ClauseName::Comment => Some("/* %s */ "),
        _ => None,
    }
}

fn fill(template: &str, value: &str) -> String {
    template.replacen("%s", value, 1)
}

fn join_expressions(exprs: &[Expression], binder: &mut ValueBinder, sep: &str) -> DbResult<String> {
    let mut parts = Vec::with_capacity(exprs.len());
    for expr in exprs {
        parts.push(expr.sql(binder)?);
    }
    Ok(parts.join(sep))
}

/// Compile `query` for `dialect`, returning the translated copy that was
/// rendered together with its SQL.
pub fn compile_query(
    dialect: &dyn Dialect,
    auto_quote: bool,
    query: &Query,
    binder: &mut ValueBinder,
) -> DbResult<(Query, String)> {
    let mut compiled = query.clone();
    if auto_quote {
        dialect.quoter().quote(&mut compiled);
    }
    translate::translate(dialect, &mut compiled)?;
    let sql = dialect.compiler().compile(&compiled, binder)?;
    Ok((compiled, sql))
}

/// Renders a (translated) query into SQL.
pub trait QueryCompiler: Dialect {
    /// Whether UNION branches are wrapped in parentheses so each may keep
    /// its own ORDER BY and LIMIT.
    fn ordered_union(&self) -> bool {
        self.supports(Feature::SetOperationsOrderBy)
    }

    /// Whether SELECT aliases are always quoted, even without auto-quoting.
    fn quoted_select_aliases(&self) -> bool {
        false
    }

    /// Keyword emitted after `WITH` when a CTE is recursive.
    fn recursive_keyword(&self) -> &'static str {
        "RECURSIVE "
    }

    fn clause_order(&self, kind: QueryType) -> &'static [ClauseName] {
        default_clause_order(kind)
    }

    fn template(&self, clause: ClauseName) -> Option<&'static str> {
        default_template(clause)
    }

    /// Render the whole statement.
    fn compile(&self, query: &Query, binder: &mut ValueBinder) -> DbResult<String> {
        let kind = query.kind();
        let wrap_union = kind == QueryType::Select
            && self.ordered_union()
            && !query.clause_is_empty(ClauseName::Union);

        let mut sql = String::new();
        for &clause in self.clause_order(kind) {
            // The statement verb renders (or fails) even when its slot is empty.
            let always = matches!(
                (kind, clause),
                (QueryType::Select, ClauseName::Select)
                    | (QueryType::Insert, ClauseName::Insert)
                    | (QueryType::Update, ClauseName::Update)
            );
            if !always && query.clause_is_empty(clause) {
                continue;
            }
            if let Some(part) = self.build_clause(clause, query, binder, wrap_union)? {
                sql.push_str(&part);
            }
        }
        let sql = self.finish(query, sql);
        propagate_bindings(query, &sql, binder)?;
        Ok(sql)
    }

    /// Render one non-empty clause. `None` skips it.
    fn build_clause(
        &self,
        clause: ClauseName,
        query: &Query,
        binder: &mut ValueBinder,
        wrap_union: bool,
    ) -> DbResult<Option<String>> {
        let parts = &query.parts;
        let sql = match clause {
            ClauseName::Comment => parts
                .comment
                .as_deref()
                .and_then(|c| self.template(clause).map(|t| fill(t, c))),
            ClauseName::With => Some(self.build_with(query, binder)?),
            ClauseName::Select => Some(self.build_select(query, binder, wrap_union)?),
            ClauseName::From => Some(self.build_from(query, binder)?),
            ClauseName::Join => Some(self.build_join(query, binder)?),
            ClauseName::Where => {
                let body = parts.where_.sql(binder)?;
                if body.is_empty() {
                    return Ok(None);
                }
                self.template(clause).map(|t| fill(t, &body))
            }
            ClauseName::Group => {
                let body = join_expressions(&parts.group, binder, ", ")?;
                self.template(clause).map(|t| fill(t, &body))
            }
            ClauseName::Having => Some(self.build_having(query, binder)?),
            ClauseName::Window => Some(self.build_window(query, binder)?),
            ClauseName::Order => {
                let body = parts.order.sql(binder)?;
                self.template(clause).map(|t| fill(t, &body))
            }
            ClauseName::Limit => self.build_limit(query),
            ClauseName::Offset => self.build_offset(query),
            ClauseName::Union => Some(self.build_union(query, binder, wrap_union)?),
            ClauseName::Epilog => match &parts.epilog {
                Some(epilog) => {
                    let body = epilog.sql(binder)?;
                    self.template(clause).map(|t| fill(t, &body))
                }
                None => None,
            },
            ClauseName::Insert => Some(self.build_insert(query, binder)?),
            ClauseName::Values => match &parts.values {
                Some(values) => Some(values.sql(binder)?),
                None => None,
            },
            ClauseName::Update => Some(self.build_update(query, binder)?),
            ClauseName::Set => Some(self.build_set(query, binder)?),
            ClauseName::Delete => Some("DELETE".to_string()),
            ClauseName::Modifier => Some(format!(
                " {}",
                join_expressions(&parts.modifier, binder, " ")?
            )),
            ClauseName::Distinct => None,
        };
        Ok(sql)
    }

    /// `WITH [RECURSIVE] a AS (...), b AS (...) `
    fn build_with(&self, query: &Query, binder: &mut ValueBinder) -> DbResult<String> {
        if !self.supports(Feature::Cte) {
            return Err(DbError::unsupported(self.name(), "common table expressions"));
        }
        let ctes = &query.parts.with;
        let recursive = if ctes.iter().any(|c| c.is_recursive()) {
            self.recursive_keyword()
        } else {
            ""
        };
        let mut rendered = Vec::with_capacity(ctes.len());
        for cte in ctes {
            rendered.push(cte.sql(binder)?);
        }
        Ok(format!("WITH {recursive}{} ", rendered.join(", ")))
    }

    /// `SELECT [modifiers] [DISTINCT ...] fields`
    fn build_select(
        &self,
        query: &Query,
        binder: &mut ValueBinder,
        wrap_union: bool,
    ) -> DbResult<String> {
        let parts = &query.parts;
        let mut sql = String::from(if wrap_union { "(SELECT" } else { "SELECT" });
        if !parts.modifier.is_empty() {
            sql.push(' ');
            sql.push_str(&join_expressions(&parts.modifier, binder, " ")?);
        }
        sql.push(' ');
        match &parts.distinct {
            Distinct::None => {}
            Distinct::All => sql.push_str("DISTINCT "),
            Distinct::On(fields) => {
                let fields = join_expressions(fields, binder, ", ")?;
                sql.push_str(&format!("DISTINCT ON ({fields}) "));
            }
        }

        if parts.select.is_empty() {
            sql.push('*');
            return Ok(sql);
        }
        let mut fields = Vec::with_capacity(parts.select.len());
        for field in &parts.select {
            let rendered = field.expr.sql(binder)?;
            match &field.alias {
                Some(alias) => {
                    let alias = if self.quoted_select_aliases() {
                        self.quote_identifier(alias)
                    } else {
                        alias.clone()
                    };
                    fields.push(format!("{rendered} AS {alias}"));
                }
                None => fields.push(rendered),
            }
        }
        sql.push_str(&fields.join(", "));
        Ok(sql)
    }

    /// ` FROM a, b alias`
    fn build_from(&self, query: &Query, binder: &mut ValueBinder) -> DbResult<String> {
        let mut tables = Vec::with_capacity(query.parts.from.len());
        for table in &query.parts.from {
            let source = table.source.sql(binder)?;
            tables.push(match &table.alias {
                Some(alias) => format!("{source} {alias}"),
                None => source,
            });
        }
        Ok(format!(" FROM {}", tables.join(", ")))
    }

    /// ` LEFT JOIN t alias ON ...` for each join, in declaration order.
    fn build_join(&self, query: &Query, binder: &mut ValueBinder) -> DbResult<String> {
        let mut sql = String::new();
        for join in &query.parts.join {
            let source = join.table.source.sql(binder)?;
            let alias = join
                .table
                .alias
                .as_deref()
                .map(|a| format!(" {a}"))
                .unwrap_or_default();
            let mut condition = join.conditions.sql(binder)?;
            if condition.is_empty() {
                condition = "1 = 1".to_string();
            }
            sql.push_str(&format!(
                " {} JOIN {source}{alias} ON {condition}",
                join.kind.as_str()
            ));
        }
        Ok(sql)
    }

    fn build_having(&self, query: &Query, binder: &mut ValueBinder) -> DbResult<String> {
        let body = query.parts.having.sql(binder)?;
        Ok(self
            .template(ClauseName::Having)
            .map(|t| fill(t, &body))
            .unwrap_or_default())
    }

    /// ` WINDOW a AS (...), b AS (...)`
    fn build_window(&self, query: &Query, binder: &mut ValueBinder) -> DbResult<String> {
        if !self.supports(Feature::Window) {
            return Err(DbError::unsupported(self.name(), "window functions"));
        }
        let mut windows = Vec::with_capacity(query.parts.window.len());
        for (name, window) in &query.parts.window {
            windows.push(format!("{name} AS ({})", window.sql(binder)?));
        }
        Ok(format!(" WINDOW {}", windows.join(", ")))
    }

    fn build_limit(&self, query: &Query) -> Option<String> {
        let limit = query.parts.limit?;
        self.template(ClauseName::Limit)
            .map(|t| fill(t, &limit.to_string()))
    }

    fn build_offset(&self, query: &Query) -> Option<String> {
        let offset = query.parts.offset?;
        self.template(ClauseName::Offset)
            .map(|t| fill(t, &offset.to_string()))
    }

    /// Set operations. With ordered unions every branch sits in its own
    /// parentheses and the first one was opened by [`build_select`];
    /// otherwise branches are bare and lose their ORDER BY.
    ///
    /// [`build_select`]: QueryCompiler::build_select
    fn build_union(
        &self,
        query: &Query,
        binder: &mut ValueBinder,
        wrap_union: bool,
    ) -> DbResult<String> {
        let mut branches = Vec::with_capacity(query.parts.union.len());
        for operation in &query.parts.union {
            let sql = if wrap_union {
                let sql = operation.query.sql(Some(binder))?;
                format!("({})", strip_outer_parens(&sql))
            } else {
                let mut branch = operation.query.as_ref().clone();
                branch.parts.order = OrderByExpression::new();
                strip_outer_parens(&branch.sql(Some(binder))?).to_string()
            };
            branches.push(format!("{} {sql}", operation.kind.keyword()));
        }
        let joined = branches.join(" ");
        Ok(if wrap_union {
            format!(") {joined}")
        } else {
            format!(" {joined}")
        })
    }

    /// `INSERT [modifiers] INTO table (columns)`
    fn build_insert(&self, query: &Query, binder: &mut ValueBinder) -> DbResult<String> {
        let (table, columns) = insert_target(query)?;
        let modifiers = modifiers(query, binder)?;
        Ok(format!("INSERT{modifiers} INTO {table} ({columns})"))
    }

    /// `UPDATE [modifiers] table [alias]`
    fn build_update(&self, query: &Query, binder: &mut ValueBinder) -> DbResult<String> {
        let Some(table) = &query.parts.update else {
            return Err(DbError::incomplete(
                "Could not compile update query. No table was specified.",
            ));
        };
        let modifiers = modifiers(query, binder)?;
        let source = table.source.sql(binder)?;
        let alias = table
            .alias
            .as_deref()
            .map(|a| format!(" {a}"))
            .unwrap_or_default();
        Ok(format!("UPDATE{modifiers} {source}{alias}"))
    }

    /// ` SET a = :p0, b = :p1`
    fn build_set(&self, query: &Query, binder: &mut ValueBinder) -> DbResult<String> {
        let set = &query.parts.set;
        let body = set.sql(binder)?;
        let body = if set.len() > 1 {
            strip_outer_parens(&body)
        } else {
            body.as_str()
        };
        Ok(format!(" SET {body}"))
    }

    /// Last chance to adjust the complete statement.
    fn finish(&self, _query: &Query, sql: String) -> String {
        sql
    }
}

/// Table and rendered column list of an INSERT, or an error when no table
/// was given.
pub(crate) fn insert_target(query: &Query) -> DbResult<(&str, String)> {
    let target = &query.parts.insert;
    let Some(table) = target.table.as_deref() else {
        return Err(DbError::incomplete(
            "Could not compile insert query. No table was specified. Use `into()` to define a table.",
        ));
    };
    Ok((table, target.columns.join(", ")))
}

/// Modifiers rendered for INSERT and UPDATE verbs, with a leading space.
pub(crate) fn modifiers(query: &Query, binder: &mut ValueBinder) -> DbResult<String> {
    if query.parts.modifier.is_empty() {
        return Ok(String::new());
    }
    Ok(format!(
        " {}",
        join_expressions(&query.parts.modifier, binder, " ")?
    ))
}

fn strip_outer_parens(sql: &str) -> &str {
    sql.strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .unwrap_or(sql)
}

/// Copy values bound on the query itself into `binder`, but only those
/// whose placeholder survived into the final SQL. `:pN` names belong to the
/// generated placeholders and are rejected.
fn propagate_bindings(query: &Query, sql: &str, binder: &mut ValueBinder) -> DbResult<()> {
    for binding in query.value_binder().bindings() {
        if is_generated_placeholder(&binding.placeholder) {
            return Err(DbError::invalid_argument(format!(
                "Placeholder `{}` is reserved for generated bindings",
                binding.placeholder
            )));
        }
        let pattern = format!(r"{}(?:\W|$)", regex::escape(&binding.placeholder));
        let used = Regex::new(&pattern)
            .map_err(|e| DbError::invalid_argument(e.to_string()))?
            .is_match(sql);
        if used {
            binder.bind(
                &binding.placeholder,
                binding.value.clone(),
                binding.type_name.as_deref(),
            );
        }
    }
    Ok(())
}

/// Replace references to aliased SELECT aggregates in a rendered HAVING
/// clause with the aggregate itself, for databases whose HAVING cannot see
/// SELECT aliases. Quote characters are dropped from the clause first so
/// quoted and bare references both match.
pub(crate) fn inline_having_aliases<C>(
    compiler: &C,
    query: &Query,
    mut having: String,
    binder: &mut ValueBinder,
) -> DbResult<String>
where
    C: QueryCompiler + ?Sized,
{
    let (start, end) = compiler.quote_chars();
    for field in &query.parts.select {
        let (Some(alias), Expression::Function(function)) = (&field.alias, &field.expr) else {
            continue;
        };
        let bare = alias.trim_start_matches(start).trim_end_matches(end);
        let pattern = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(bare)))
            .map_err(|e| DbError::invalid_argument(e.to_string()))?;
        if !pattern.is_match(&having) {
            continue;
        }
        let unquoted = having.replace(start, "").replace(end, "");
        let inlined = function.sql(binder)?;
        having = pattern
            .replace_all(&unquoted, regex::NoExpand(&inlined))
            .into_owned();
    }
    Ok(having)
}
