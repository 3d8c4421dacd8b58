//! Portable query rewrites applied before compilation.
//!
//! Translation runs on the compiler's private copy of a query. It rewrites
//! constructs a database lacks (`DISTINCT ON`, table aliases in
//! UPDATE/DELETE) and then hands the copy to the dialect's own hooks.

use super::Dialect;
use crate::error::{DbError, DbResult};
use crate::expr::{Expression, Field};
use crate::query::{Distinct, Query, QueryType};

/// Apply every translation for the query's statement type.
pub fn translate(dialect: &dyn Dialect, query: &mut Query) -> DbResult<()> {
    match query.kind() {
        QueryType::Select => {
            if !dialect.supports_distinct_on() {
                distinct_on_to_group(query);
            }
            dialect.translate_select(query)?;
        }
        QueryType::Delete => {
            let had_alias = query.parts.from.iter().any(|t| t.alias.is_some());
            if had_alias {
                for table in &mut query.parts.from {
                    table.alias = None;
                }
                remove_aliases_from_conditions(query)?;
            }
        }
        QueryType::Update => remove_aliases_from_conditions(query)?,
        QueryType::Insert => dialect.translate_insert(query)?,
    }

    query.traverse_expressions_mut(&mut |expr| {
        if let Expression::Function(function) = expr {
            dialect.rewrite_function(function);
        }
    });
    Ok(())
}

/// `DISTINCT ON (a, b)` becomes `GROUP BY a, b`.
fn distinct_on_to_group(query: &mut Query) {
    if let Distinct::On(fields) = std::mem::take(&mut query.parts.distinct) {
        query.parts.group = fields;
    }
}

fn unalias(name: &mut String) {
    if let Some((_, column)) = name.split_once('.') {
        *name = column.to_string();
    }
}

fn unalias_field(field: &mut Field) {
    if let Field::Name(name) = field {
        unalias(name);
    }
}

/// Strip `alias.` prefixes from WHERE, since UPDATE and DELETE cannot
/// reference table aliases on every database.
fn remove_aliases_from_conditions(query: &mut Query) -> DbResult<()> {
    if !query.parts.join.is_empty() {
        return Err(DbError::invalid_clause(
            "Aliases are being removed from conditions for UPDATE/DELETE queries, this can break references to joined tables.",
        ));
    }
    for condition in query.parts.where_.conditions_mut() {
        condition.walk_mut(&mut |expr| match expr {
            Expression::Comparison(c) => unalias_field(&mut c.field),
            Expression::Between(b) => unalias_field(&mut b.field),
            Expression::Identifier(id) => unalias(&mut id.name),
            _ => {}
        });
    }
    Ok(())
}
