use super::{Dialect, Feature};
use crate::binder::ValueBinder;
use crate::compiler::{QueryCompiler, inline_having_aliases};
use crate::error::DbResult;
use crate::expr::{Expression, FunctionExpression};
use crate::query::Query;

/// PostgreSQL.
#[derive(Debug, Clone, Copy, Default)]
pub struct Postgres;

impl Postgres {
    pub fn new() -> Self {
        Self
    }
}

impl Dialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn quote_chars(&self) -> (&'static str, &'static str) {
        ("\"", "\"")
    }

    fn supports(&self, feature: Feature) -> bool {
        !matches!(feature, Feature::DisableConstraintWithoutTransaction)
    }

    fn compiler(&self) -> &dyn QueryCompiler {
        self
    }

    fn supports_distinct_on(&self) -> bool {
        true
    }

    fn disable_foreign_keys_sql(&self) -> &'static str {
        "SET CONSTRAINTS ALL DEFERRED"
    }

    fn enable_foreign_keys_sql(&self) -> &'static str {
        "SET CONSTRAINTS ALL IMMEDIATE"
    }

    /// Inserts return the new row so generated keys can be read back.
    fn translate_insert(&self, query: &mut Query) -> DbResult<()> {
        if query.parts.epilog.is_none() {
            query.parts.epilog = Some(Expression::raw("RETURNING *"));
        }
        Ok(())
    }

    fn rewrite_function(&self, function: &mut FunctionExpression) {
        match function.name().to_ascii_uppercase().as_str() {
            "CONCAT" => {
                function.set_name("");
                function.set_conjunction(" ||");
            }
            "NOW" => {
                function.set_name("LOCALTIMESTAMP");
                *function.args_mut() = vec![Expression::raw("0")];
            }
            "CURRENT_DATE" => {
                function.set_name("CAST");
                function.set_conjunction(" AS");
                *function.args_mut() = vec![
                    Expression::raw("LOCALTIMESTAMP(0)"),
                    Expression::raw("date"),
                ];
            }
            "CURRENT_TIME" => {
                function.set_name("CAST");
                function.set_conjunction(" AS");
                *function.args_mut() = vec![
                    Expression::raw("LOCALTIMESTAMP(0)"),
                    Expression::raw("time"),
                ];
            }
            "RAND" => function.set_name("RANDOM"),
            "DATE_ADD" => {
                // DATE_ADD(x, INTERVAL 1 DAY) -> (x + INTERVAL '1 DAY')
                function.set_name("");
                function.set_conjunction(" + INTERVAL");
                if let Some(Expression::Raw(interval)) = function.args_mut().get_mut(1) {
                    *interval = format!("'{interval}'");
                }
            }
            "DAYOFWEEK" => {
                // EXTRACT(DOW ...) counts Sunday as 0; the portable function starts at 1.
                let arg = function.args().first().cloned();
                function.set_name("");
                function.set_conjunction(" +");
                let dow = FunctionExpression::new(
                    "EXTRACT",
                    [Expression::raw("DOW")].into_iter().chain(arg),
                )
                .with_conjunction(" FROM");
                *function.args_mut() = vec![Expression::Function(dow), Expression::raw("1")];
            }
            _ => {}
        }
    }
}

impl QueryCompiler for Postgres {
    fn quoted_select_aliases(&self) -> bool {
        true
    }

    /// HAVING cannot see SELECT aliases, so aliased aggregates are inlined.
    fn build_having(&self, query: &Query, binder: &mut ValueBinder) -> DbResult<String> {
        let body = query.parts.having.sql(binder)?;
        let body = inline_having_aliases(self, query, body, binder)?;
        Ok(format!(" HAVING {body}"))
    }
}
