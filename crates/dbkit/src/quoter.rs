//! Identifier quoting.
//!
//! [`IdentifierQuoter`] rewrites bare identifiers into the dialect's quoted
//! form. It is applied to a clone of a query right before compilation when
//! auto-quoting is enabled, so the caller's query is never modified.

use crate::expr::{Expression, Field, OrderItem};
use crate::query::{Query, QueryType};
use regex::Regex;
use std::sync::OnceLock;

fn bare_identifier() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[\w-]+$").expect("invalid built-in identifier regex"))
}

fn dotted_identifier() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[\w-]+\.[^ *]*$").expect("invalid built-in dotted identifier regex")
    })
}

fn dotted_star() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[\w-]+\.\*$").expect("invalid built-in star regex"))
}

fn function_call() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([\w-]+)\((.*)\)$").expect("invalid built-in function regex"))
}

fn aliased() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^([\w-]+(?:\.[\w\s-]+|\(.*\))*)\s+AS\s*([\w-]+)$")
            .expect("invalid built-in alias regex")
    })
}

fn dotted_with_tail() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([\w-]+\.[\w-]+)(.+)$").expect("invalid built-in dotted tail regex")
    })
}

/// Quotes identifiers with a pair of quote characters.
#[derive(Debug, Clone)]
pub struct IdentifierQuoter {
    start: String,
    end: String,
}

impl IdentifierQuoter {
    pub fn new(start: &str, end: &str) -> Self {
        Self {
            start: start.to_string(),
            end: end.to_string(),
        }
    }

    fn wrap(&self, name: &str) -> String {
        format!("{}{name}{}", self.start, self.end)
    }

    /// Quote one identifier.
    ///
    /// | input                 | output (with `` ` ``)   |
    /// |-----------------------|-------------------------|
    /// | `*`                   | `*`                     |
    /// | `title`               | `` `title` ``           |
    /// | `a.title`             | `` `a`.`title` ``       |
    /// | `a.*`                 | `` `a`.* ``             |
    /// | `COUNT(id)`           | ``COUNT(`id`)``         |
    /// | `a.title AS t`        | `` `a`.`title` AS `t` `` |
    /// | `a.title DESC`        | `` `a`.`title` DESC ``  |
    ///
    /// Anything else is returned unchanged.
    pub fn quote_identifier(&self, identifier: &str) -> String {
        let identifier = identifier.trim();
        if identifier == "*" || identifier.is_empty() {
            return identifier.to_string();
        }
        if bare_identifier().is_match(identifier) {
            return self.wrap(identifier);
        }
        if dotted_identifier().is_match(identifier) {
            return identifier
                .split('.')
                .map(|part| self.wrap(part))
                .collect::<Vec<_>>()
                .join(".");
        }
        if dotted_star().is_match(identifier) {
            let (table, _) = identifier.split_at(identifier.len() - 2);
            return format!("{}.*", self.wrap(table));
        }
        if let Some(caps) = function_call().captures(identifier) {
            return format!("{}({})", &caps[1], self.quote_identifier(&caps[2]));
        }
        if let Some(caps) = aliased().captures(identifier) {
            return format!(
                "{} AS {}",
                self.quote_identifier(&caps[1]),
                self.quote_identifier(&caps[2])
            );
        }
        if let Some(caps) = dotted_with_tail().captures(identifier) {
            return format!("{}{}", self.quote_identifier(&caps[1]), &caps[2]);
        }
        identifier.to_string()
    }

    /// Quote every identifier of a query in place.
    pub fn quote(&self, query: &mut Query) {
        let kind = query.kind();
        let parts = &mut query.parts;

        if matches!(kind, QueryType::Select | QueryType::Delete) {
            for field in &mut parts.select {
                if let Some(alias) = &mut field.alias {
                    *alias = self.quote_identifier(alias);
                }
            }
            for table in &mut parts.from {
                if let Some(alias) = &mut table.alias {
                    *alias = self.quote_identifier(alias);
                }
            }
            for join in &mut parts.join {
                if let Some(alias) = &mut join.table.alias {
                    *alias = self.quote_identifier(alias);
                }
            }
        }
        if kind == QueryType::Insert {
            if let Some(table) = &mut parts.insert.table {
                *table = self.quote_identifier(table);
            }
            for column in &mut parts.insert.columns {
                *column = self.quote_identifier(column);
            }
        }
        for cte in &mut parts.with {
            cte.name.name = self.quote_identifier(&cte.name.name);
            for field in &mut cte.fields {
                field.name = self.quote_identifier(&field.name);
            }
        }
        for (name, window) in &mut parts.window {
            *name = self.quote_identifier(name);
            if let Some(order) = &mut window.order {
                self.quote_order_items(order.items_mut());
            }
        }
        self.quote_order_items(parts.order.items_mut());

        query.traverse_expressions_mut(&mut |expr| self.quote_expression(expr));
    }

    fn quote_order_items(&self, items: &mut [OrderItem]) {
        for item in items {
            match item {
                OrderItem::Field { field, .. } => *field = self.quote_identifier(field),
                // A raw fragment with spaces is hand-written SQL such as
                // `title DESC NULLS FIRST`.
                OrderItem::Raw(sql) if !sql.contains(' ') => *sql = self.quote_identifier(sql),
                OrderItem::Raw(_) | OrderItem::Expr(_) => {}
            }
        }
    }

    fn quote_field(&self, field: &mut Field) {
        if let Field::Name(name) = field {
            *name = self.quote_identifier(name);
        }
    }

    fn quote_expression(&self, expr: &mut Expression) {
        match expr {
            Expression::Identifier(id) => id.name = self.quote_identifier(&id.name),
            Expression::Comparison(c) => self.quote_field(&mut c.field),
            Expression::Between(b) => self.quote_field(&mut b.field),
            Expression::OrderClause(o) => self.quote_field(&mut o.field),
            Expression::OrderBy(o) => self.quote_order_items(o.items_mut()),
            Expression::Window(w) => {
                if let Some(order) = &mut w.order {
                    self.quote_order_items(order.items_mut());
                }
            }
            Expression::Function(f) => {
                if let Some(order) = f.over.as_mut().and_then(|w| w.order.as_mut()) {
                    self.quote_order_items(order.items_mut());
                }
            }
            _ => {}
        }
    }
}
