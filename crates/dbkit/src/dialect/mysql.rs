use super::{Dialect, Feature};
use crate::compiler::QueryCompiler;
use crate::query::{ClauseName, Query};

/// MySQL and MariaDB.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mysql;

impl Mysql {
    pub fn new() -> Self {
        Self
    }
}

impl Dialect for Mysql {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote_chars(&self) -> (&'static str, &'static str) {
        ("`", "`")
    }

    fn supports(&self, feature: Feature) -> bool {
        matches!(
            feature,
            Feature::Cte
                | Feature::Json
                | Feature::Savepoint
                | Feature::DisableConstraintWithoutTransaction
                | Feature::Window
                | Feature::SetOperationsOrderBy
        )
    }

    fn compiler(&self) -> &dyn QueryCompiler {
        self
    }

    fn disable_foreign_keys_sql(&self) -> &'static str {
        "SET foreign_key_checks = 0"
    }

    fn enable_foreign_keys_sql(&self) -> &'static str {
        "SET foreign_key_checks = 1"
    }
}

impl QueryCompiler for Mysql {
    /// MySQL has no OFFSET without LIMIT; use the largest row count.
    fn build_offset(&self, query: &Query) -> Option<String> {
        let offset = query.parts.offset?;
        if query.clause_is_empty(ClauseName::Limit) {
            Some(format!(" LIMIT 18446744073709551615 OFFSET {offset}"))
        } else {
            Some(format!(" OFFSET {offset}"))
        }
    }
}
