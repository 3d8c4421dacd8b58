//! Placeholder generation and value storage for compiled statements.
//!
//! A [`ValueBinder`] hands out unique named placeholders (`:p0`, `:p1`, ...)
//! while a statement is being rendered and remembers the value (and optional
//! type identifier) behind each one, so the driver can bind them later.

use crate::dialect::Dialect;
use crate::driver::Statement;
use crate::error::DbResult;
use crate::types::TypeRegistry;
use crate::value::Value;
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Prefix used for placeholders generated by expressions.
pub const PLACEHOLDER_PREFIX: &str = "p";

fn placeholder_token() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| {
        Regex::new(r":[A-Za-z_][A-Za-z0-9_]*").expect("invalid built-in placeholder regex")
    })
}

/// One bound value.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    /// Placeholder including the leading `:`.
    pub placeholder: String,
    pub value: Value,
    /// Type identifier used to convert the value, if any.
    pub type_name: Option<String>,
}

impl Binding {
    /// The placeholder without its leading `:`, as drivers expect it.
    pub fn name(&self) -> &str {
        self.placeholder.trim_start_matches(':')
    }
}

/// Stores placeholder values for one statement.
#[derive(Debug, Clone, Default)]
pub struct ValueBinder {
    bindings: Vec<Binding>,
    counter: usize,
}

/// Whether `placeholder` has the `:pN` shape the binder generates itself.
pub(crate) fn is_generated_placeholder(placeholder: &str) -> bool {
    placeholder
        .strip_prefix(":p")
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

fn normalize(placeholder: &str) -> String {
    if placeholder.starts_with(':') || placeholder == "?" {
        placeholder.to_string()
    } else {
        format!(":{placeholder}")
    }
}

impl ValueBinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate a value with a placeholder. Re-binding a placeholder
    /// replaces its value.
    pub fn bind(&mut self, placeholder: &str, value: impl Into<Value>, type_name: Option<&str>) {
        let binding = Binding {
            placeholder: normalize(placeholder),
            value: value.into(),
            type_name: type_name.map(str::to_string),
        };
        match self
            .bindings
            .iter_mut()
            .find(|b| b.placeholder == binding.placeholder)
        {
            Some(existing) => *existing = binding,
            None => self.bindings.push(binding),
        }
    }

    /// Generate a unique placeholder from a token.
    ///
    /// Tokens that already start with `:` and the positional `?` are returned
    /// unchanged; anything else gets the running counter appended.
    pub fn placeholder(&mut self, token: &str) -> String {
        if token.starts_with(':') || token == "?" {
            return token.to_string();
        }
        let placeholder = format!(":{token}{}", self.counter);
        self.counter += 1;
        placeholder
    }

    /// Bind a value under a freshly generated placeholder and return it.
    pub fn bind_new(&mut self, value: impl Into<Value>, type_name: Option<&str>) -> String {
        let placeholder = self.placeholder(PLACEHOLDER_PREFIX);
        self.bind(&placeholder, value, type_name);
        placeholder
    }

    /// Bind each value under its own generated placeholder.
    pub fn generate_many_named(
        &mut self,
        values: impl IntoIterator<Item = Value>,
        type_name: Option<&str>,
    ) -> Vec<String> {
        values
            .into_iter()
            .map(|value| self.bind_new(value, type_name))
            .collect()
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// Look up a binding by placeholder, with or without the leading `:`.
    pub fn get(&self, placeholder: &str) -> Option<&Binding> {
        let placeholder = normalize(placeholder);
        self.bindings.iter().find(|b| b.placeholder == placeholder)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Drop every binding and restart placeholder numbering.
    pub fn reset(&mut self) {
        self.bindings.clear();
        self.counter = 0;
    }

    /// Restart placeholder numbering, keeping bindings.
    pub fn reset_count(&mut self) {
        self.counter = 0;
    }

    /// Merge another binder's values into this one.
    ///
    /// Each of `other`'s generated placeholders is renumbered against this
    /// binder's counter so the two sets cannot collide, and `sql` (rendered
    /// against `other`) is rewritten to match. Named placeholders that were
    /// bound by hand are copied verbatim.
    pub fn absorb(&mut self, other: &ValueBinder, sql: &str) -> String {
        let mut renames: HashMap<&str, String> = HashMap::new();
        for binding in &other.bindings {
            let name = binding.name();
            let generated = name
                .strip_prefix(PLACEHOLDER_PREFIX)
                .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()));
            let target = if generated {
                self.placeholder(PLACEHOLDER_PREFIX)
            } else {
                binding.placeholder.clone()
            };
            self.bind(&target, binding.value.clone(), binding.type_name.as_deref());
            renames.insert(binding.placeholder.as_str(), target);
        }
        placeholder_token()
            .replace_all(sql, |caps: &regex::Captures<'_>| {
                let token = &caps[0];
                renames
                    .get(token)
                    .cloned()
                    .unwrap_or_else(|| token.to_string())
            })
            .into_owned()
    }

    /// Convert and bind every value onto a prepared statement.
    pub fn attach_to(
        &self,
        statement: &mut dyn Statement,
        registry: &TypeRegistry,
        dialect: &dyn Dialect,
    ) -> DbResult<()> {
        for binding in &self.bindings {
            let (value, kind) =
                registry.cast_to_database(&binding.value, binding.type_name.as_deref(), dialect)?;
            statement.bind_value(binding.name(), value, kind);
        }
        Ok(())
    }
}
