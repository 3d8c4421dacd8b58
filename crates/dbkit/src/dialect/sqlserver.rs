use super::{Dialect, Feature};
use crate::binder::ValueBinder;
use crate::compiler::{QueryCompiler, inline_having_aliases, insert_target, modifiers};
use crate::error::DbResult;
use crate::expr::{Expression, FunctionExpression, OrderItem};
use crate::query::{ClauseName, Query, QueryType};

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
    ClauseName::Offset,
    ClauseName::Limit,
    ClauseName::Union,
    ClauseName::Epilog,
];

/// Column type used for the `@inserted` table variable.
fn column_type(type_name: Option<&str>) -> &'static str {
    match type_name {
        Some("integer") | Some("smallinteger") | Some("tinyinteger") => "INT",
        Some("biginteger") => "BIGINT",
        Some("float") => "FLOAT",
        Some("decimal") => "DECIMAL",
        Some("boolean") => "BIT",
        Some("datetime") | Some("timestamp") => "DATETIME2",
        Some("date") => "DATE",
        Some("time") => "TIME",
        Some("uuid") => "UNIQUEIDENTIFIER",
        Some("binary") => "VARBINARY(MAX)",
        _ => "NVARCHAR(MAX)",
    }
}

/// Microsoft SQL Server.
///
/// Inserts return the new rows with `OUTPUT INSERTED.*`. Tables with
/// triggers reject a bare OUTPUT clause; for those, enable
/// [`with_insert_triggers`](Self::with_insert_triggers) to capture the rows
/// into a table variable instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlServer {
    insert_triggers: bool,
}

impl SqlServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_insert_triggers(mut self, enabled: bool) -> Self {
        self.insert_triggers = enabled;
        self
    }
}

impl Dialect for SqlServer {
    fn name(&self) -> &'static str {
        "sqlserver"
    }

    fn quote_chars(&self) -> (&'static str, &'static str) {
        ("[", "]")
    }

    fn supports(&self, feature: Feature) -> bool {
        matches!(
            feature,
            Feature::Cte
                | Feature::Savepoint
                | Feature::DisableConstraintWithoutTransaction
                | Feature::Window
                | Feature::Intersect
        )
    }

    fn compiler(&self) -> &dyn QueryCompiler {
        self
    }

    fn savepoint_sql(&self, name: &str) -> String {
        format!("SAVE TRANSACTION t{name}")
    }

    fn release_savepoint_sql(&self, _name: &str) -> Option<String> {
        None
    }

    fn rollback_savepoint_sql(&self, name: &str) -> String {
        format!("ROLLBACK TRANSACTION t{name}")
    }

    fn disable_foreign_keys_sql(&self) -> &'static str {
        r#"EXEC sp_MSforeachtable "ALTER TABLE ? NOCHECK CONSTRAINT all""#
    }

    fn enable_foreign_keys_sql(&self) -> &'static str {
        r#"EXEC sp_MSforeachtable "ALTER TABLE ? WITH CHECK CHECK CONSTRAINT all""#
    }

    /// A limit alone becomes `TOP n`; an offset needs an ORDER BY.
    fn translate_select(&self, query: &mut Query) -> DbResult<()> {
        let parts = &mut query.parts;
        if let (Some(limit), None) = (parts.limit, parts.offset) {
            parts.modifier.insert(0, Expression::raw(format!("TOP {limit}")));
        }
        if parts.offset.is_some() && parts.order.is_empty() {
            parts.order.push(OrderItem::Raw("(SELECT NULL)".to_string()));
        }
        Ok(())
    }

    fn rewrite_function(&self, function: &mut FunctionExpression) {
        match function.name().to_ascii_uppercase().as_str() {
            "CONCAT" => {
                function.set_name("");
                function.set_conjunction(" +");
            }
            "NOW" => function.set_name("GETDATE"),
            "CURRENT_DATE" => {
                function.set_name("CONVERT");
                *function.args_mut() = vec![Expression::raw("date"), Expression::raw("GETDATE()")];
            }
            "CURRENT_TIME" => {
                function.set_name("CONVERT");
                *function.args_mut() = vec![Expression::raw("time"), Expression::raw("GETDATE()")];
            }
            "EXTRACT" => {
                function.set_name("DATEPART");
                function.set_conjunction(",");
            }
            "DATE_ADD" => {
                // DATE_ADD(x, INTERVAL 1 DAY) -> DATEADD(DAY, 1, x)
                let field = function.args().first().cloned();
                let interval = match function.args().get(1) {
                    Some(Expression::Raw(interval)) => interval.clone(),
                    _ => String::new(),
                };
                let mut pieces = interval.split_whitespace();
                let amount = pieces.next().unwrap_or("0").to_string();
                let unit = pieces.next().unwrap_or("DAY").to_uppercase();
                function.set_name("DATEADD");
                function.set_conjunction(",");
                let mut args = vec![Expression::raw(unit), Expression::raw(amount)];
                args.extend(field);
                *function.args_mut() = args;
            }
            "DAYOFWEEK" => {
                function.set_name("DATEPART");
                function.set_conjunction(",");
                function.args_mut().insert(0, Expression::raw("weekday"));
            }
            _ => {}
        }
    }
}

impl QueryCompiler for SqlServer {
    fn quoted_select_aliases(&self) -> bool {
        true
    }

    fn recursive_keyword(&self) -> &'static str {
        ""
    }

    fn clause_order(&self, kind: QueryType) -> &'static [ClauseName] {
        match kind {
            QueryType::Select => SELECT_ORDER,
            other => crate::compiler::default_clause_order(other),
        }
    }

    /// `FETCH FIRST` is only valid after `OFFSET`; a bare limit was
    /// turned into `TOP` during translation.
    fn build_limit(&self, query: &Query) -> Option<String> {
        let limit = query.parts.limit?;
        query.parts.offset?;
        Some(format!(" FETCH FIRST {limit} ROWS ONLY"))
    }

    fn build_offset(&self, query: &Query) -> Option<String> {
        let offset = query.parts.offset?;
        Some(format!(" OFFSET {offset} ROWS"))
    }

    fn build_having(&self, query: &Query, binder: &mut ValueBinder) -> DbResult<String> {
        let body = query.parts.having.sql(binder)?;
        let body = inline_having_aliases(self, query, body, binder)?;
        Ok(format!(" HAVING {body}"))
    }

    fn build_insert(&self, query: &Query, binder: &mut ValueBinder) -> DbResult<String> {
        let (table, columns) = insert_target(query)?;
        let modifiers = modifiers(query, binder)?;
        if !self.insert_triggers {
            return Ok(format!(
                "INSERT{modifiers} INTO {table} ({columns}) OUTPUT INSERTED.*"
            ));
        }

        let names = &query.parts.insert.columns;
        let unquoted = query
            .parts
            .values
            .as_ref()
            .map(|v| v.columns())
            .unwrap_or(names.as_slice());
        let declarations: Vec<String> = names
            .iter()
            .zip(unquoted)
            .map(|(name, raw)| format!("{name} {}", column_type(query.type_map().type_of(raw))))
            .collect();
        let outputs: Vec<String> = names.iter().map(|n| format!("INSERTED.{n}")).collect();
        Ok(format!(
            "DECLARE @inserted TABLE ({}); INSERT{modifiers} INTO {table} ({columns}) OUTPUT {} INTO @inserted",
            declarations.join(", "),
            outputs.join(", ")
        ))
    }

    fn finish(&self, query: &Query, sql: String) -> String {
        if self.insert_triggers && query.kind() == QueryType::Insert {
            format!("{sql}; SELECT * FROM @inserted")
        } else {
            sql
        }
    }
}
