use super::{Expression, IntoOrderItems, OrderByExpression};
use crate::binder::ValueBinder;
use crate::error::DbResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameUnit {
    Rows,
    Range,
    Groups,
}

impl FrameUnit {
    fn as_str(self) -> &'static str {
        match self {
            FrameUnit::Rows => "ROWS",
            FrameUnit::Range => "RANGE",
            FrameUnit::Groups => "GROUPS",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Frame {
    unit: FrameUnit,
    start: Option<u64>,
    end: Option<u64>,
}

fn bound(offset: Option<u64>, direction: &str) -> String {
    match offset {
        None => format!("UNBOUNDED {direction}"),
        Some(0) => "CURRENT ROW".to_string(),
        Some(n) => format!("{n} {direction}"),
    }
}

/// A window specification: `name PARTITION BY ... ORDER BY ... frame`.
///
/// Frame offsets use `None` for `UNBOUNDED` and `Some(0)` for
/// `CURRENT ROW`; the start counts backwards (`PRECEDING`) and the end
/// forwards (`FOLLOWING`).
#[derive(Debug, Clone, Default)]
pub struct WindowExpression {
    pub(crate) name: Option<String>,
    pub(crate) partitions: Vec<Expression>,
    pub(crate) order: Option<OrderByExpression>,
    frame: Option<Frame>,
    exclusion: Option<&'static str>,
}

impl WindowExpression {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reference (or extend) a window declared elsewhere in the query.
    pub fn named(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Self::default()
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// True when only a name is set, so the window renders as a bare
    /// reference.
    pub fn is_named_only(&self) -> bool {
        self.name.is_some()
            && self.partitions.is_empty()
            && self.order.is_none()
            && self.frame.is_none()
    }

    pub fn partition(mut self, field: &str) -> Self {
        self.partitions.push(Expression::identifier(field));
        self
    }

    pub fn partition_expr(mut self, expr: impl Into<Expression>) -> Self {
        self.partitions.push(expr.into());
        self
    }

    pub fn order(mut self, items: impl IntoOrderItems) -> DbResult<Self> {
        let order = self.order.take().unwrap_or_default();
        self.order = Some(order.add(items)?);
        Ok(self)
    }

    pub fn rows(self, start: Option<u64>, end: Option<u64>) -> Self {
        self.frame(FrameUnit::Rows, start, end)
    }

    pub fn range(self, start: Option<u64>, end: Option<u64>) -> Self {
        self.frame(FrameUnit::Range, start, end)
    }

    pub fn groups(self, start: Option<u64>, end: Option<u64>) -> Self {
        self.frame(FrameUnit::Groups, start, end)
    }

    fn frame(mut self, unit: FrameUnit, start: Option<u64>, end: Option<u64>) -> Self {
        self.frame = Some(Frame { unit, start, end });
        self
    }

    pub fn exclude_current(mut self) -> Self {
        self.exclusion = Some("CURRENT ROW");
        self
    }

    pub fn exclude_group(mut self) -> Self {
        self.exclusion = Some("GROUP");
        self
    }

    pub fn exclude_ties(mut self) -> Self {
        self.exclusion = Some("TIES");
        self
    }

    pub fn sql(&self, binder: &mut ValueBinder) -> DbResult<String> {
        let mut clauses = Vec::new();
        if let Some(name) = &self.name {
            clauses.push(name.clone());
        }
        if !self.partitions.is_empty() {
            let mut parts = Vec::with_capacity(self.partitions.len());
            for partition in &self.partitions {
                parts.push(partition.sql(binder)?);
            }
            clauses.push(format!("PARTITION BY {}", parts.join(", ")));
        }
        if let Some(order) = &self.order {
            let sql = order.sql(binder)?;
            if !sql.is_empty() {
                clauses.push(sql);
            }
        }
        if let Some(frame) = &self.frame {
            let mut sql = format!(
                "{} BETWEEN {} AND {}",
                frame.unit.as_str(),
                bound(frame.start, "PRECEDING"),
                bound(frame.end, "FOLLOWING")
            );
            if let Some(exclusion) = self.exclusion {
                sql.push_str(&format!(" EXCLUDE {exclusion}"));
            }
            clauses.push(sql);
        }
        Ok(clauses.join(" "))
    }

    pub(crate) fn for_each_child(&self, f: &mut dyn FnMut(&Expression)) {
        self.partitions.iter().for_each(&mut *f);
        if let Some(order) = &self.order {
            order.for_each_child(f);
        }
    }

    pub(crate) fn for_each_child_mut(&mut self, f: &mut dyn FnMut(&mut Expression)) {
        self.partitions.iter_mut().for_each(&mut *f);
        if let Some(order) = &mut self.order {
            order.for_each_child_mut(f);
        }
    }
}
