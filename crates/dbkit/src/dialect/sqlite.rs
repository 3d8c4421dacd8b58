use super::{Dialect, Feature};
use crate::compiler::QueryCompiler;
use crate::expr::{Expression, FunctionExpression};
use crate::query::{ClauseName, Query};

/// SQLite 3.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sqlite;

impl Sqlite {
    pub fn new() -> Self {
        Self
    }
}

/// `EXTRACT` parts as `strftime` format codes.
fn strftime_code(part: &str) -> &'static str {
    match part.to_ascii_lowercase().as_str() {
        "day" => "%d",
        "hour" => "%H",
        "month" => "%m",
        "minute" => "%M",
        "second" => "%S",
        "week" => "%W",
        "year" => "%Y",
        _ => "%Y",
    }
}

impl Dialect for Sqlite {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn quote_chars(&self) -> (&'static str, &'static str) {
        ("\"", "\"")
    }

    fn supports(&self, feature: Feature) -> bool {
        matches!(
            feature,
            Feature::Cte
                | Feature::Savepoint
                | Feature::DisableConstraintWithoutTransaction
                | Feature::TruncateWithConstraints
                | Feature::Window
                | Feature::Intersect
        )
    }

    fn compiler(&self) -> &dyn QueryCompiler {
        self
    }

    fn disable_foreign_keys_sql(&self) -> &'static str {
        "PRAGMA foreign_keys = OFF"
    }

    fn enable_foreign_keys_sql(&self) -> &'static str {
        "PRAGMA foreign_keys = ON"
    }

    fn rewrite_function(&self, function: &mut FunctionExpression) {
        match function.name().to_ascii_uppercase().as_str() {
            "CONCAT" => {
                function.set_name("");
                function.set_conjunction(" ||");
            }
            "NOW" => {
                function.set_name("DATETIME");
                *function.args_mut() = vec![Expression::raw("'now'")];
            }
            "CURRENT_DATE" => {
                function.set_name("DATE");
                *function.args_mut() = vec![Expression::raw("'now'")];
            }
            "CURRENT_TIME" => {
                function.set_name("TIME");
                *function.args_mut() = vec![Expression::raw("'now'")];
            }
            "RAND" => function.set_name("RANDOM"),
            "EXTRACT" => {
                // EXTRACT(YEAR FROM x) -> STRFTIME('%Y', x)
                let part = match function.args().first() {
                    Some(Expression::Raw(part)) => strftime_code(part),
                    _ => "%Y",
                };
                function.set_name("STRFTIME");
                function.set_conjunction(",");
                if let Some(first) = function.args_mut().first_mut() {
                    *first = Expression::raw(format!("'{part}'"));
                }
            }
            "DATE_ADD" => {
                // DATE_ADD(x, INTERVAL 1 DAY) -> DATE(x, '+1 day')
                function.set_name("DATE");
                function.set_conjunction(",");
                if let Some(Expression::Raw(interval)) = function.args_mut().get_mut(1) {
                    let lowered = interval.to_lowercase();
                    let signed = if lowered.starts_with('-') {
                        lowered
                    } else {
                        format!("+{lowered}")
                    };
                    *interval = format!("'{signed}'");
                }
            }
            "DAYOFWEEK" => {
                // SQLite counts Sunday as 0; the portable function starts at 1.
                let arg = function.args().first().cloned();
                function.set_name("");
                function.set_conjunction(" +");
                let weekday = FunctionExpression::new(
                    "STRFTIME",
                    [Expression::raw("'%w'")].into_iter().chain(arg),
                )
                .with_conjunction(",");
                *function.args_mut() = vec![Expression::Function(weekday), Expression::raw("1")];
            }
            _ => {}
        }
    }
}

impl QueryCompiler for Sqlite {
    /// SQLite needs a LIMIT before OFFSET; `-1` means no limit.
    fn build_offset(&self, query: &Query) -> Option<String> {
        let offset = query.parts.offset?;
        if query.clause_is_empty(ClauseName::Limit) {
            Some(format!(" LIMIT -1 OFFSET {offset}"))
        } else {
            Some(format!(" OFFSET {offset}"))
        }
    }
}
