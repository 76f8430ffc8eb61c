//! Condition tree and its compiler.
//!
//! WHERE and HAVING predicates are built as a recursive tree: leaves are
//! `column op value` comparisons, groups are ordered sequences of
//! `(connective, condition)` pairs. Nesting, not flags, is how mixed
//! boolean logic is expressed: `a AND (b OR c)` is a leaf followed by an
//! AND-connected sub-group.
//!
//! Compilation walks the tree depth-first, emitting a positional placeholder
//! per bound value. The parameter vector is filled in emission order, which
//! is the correctness contract of the whole engine: placeholder `N` always
//! refers to `params[N-1]`.

use crate::store::Dialect;
use crate::value::Value;

/// Boolean connective between sibling conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connective {
    And,
    Or,
}

impl Connective {
    fn keyword(self) -> &'static str {
        match self {
            Connective::And => "AND",
            Connective::Or => "OR",
        }
    }
}

/// Comparison operators available to condition leaves.
///
/// `Like`/`ILike` values pass through unescaped; wildcard construction is the
/// caller's responsibility. `In`/`NotIn` expect a [`Value::List`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    Like,
    ILike,
    In,
    NotIn,
    IsNull,
    IsNotNull,
}

impl Op {
    fn sql(self, dialect: Dialect) -> &'static str {
        match self {
            Op::Eq => "=",
            Op::Ne => "!=",
            Op::Lt => "<",
            Op::Lte => "<=",
            Op::Gt => ">",
            Op::Gte => ">=",
            Op::Like => "LIKE",
            // SQLite LIKE is already case-insensitive for ASCII.
            Op::ILike => match dialect {
                Dialect::Postgres => "ILIKE",
                Dialect::Sqlite => "LIKE",
            },
            Op::In => "IN",
            Op::NotIn => "NOT IN",
            Op::IsNull => "IS NULL",
            Op::IsNotNull => "IS NOT NULL",
        }
    }
}

/// One node of a condition tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `column op value`. `IsNull`/`IsNotNull` ignore the value and bind
    /// nothing; every other operator binds exactly one value (a list for
    /// `In`/`NotIn`, flattened to one placeholder per element).
    Leaf {
        column: String,
        op: Op,
        value: Value,
    },
    /// Ordered sub-conditions; order is preserved because SQL evaluation is
    /// order-sensitive once AND and OR mix at the same level.
    Group(Vec<(Connective, Condition)>),
}

impl Condition {
    /// True when the node contributes no SQL at all.
    pub fn is_empty(&self) -> bool {
        match self {
            Condition::Leaf { .. } => false,
            Condition::Group(items) => items.iter().all(|(_, c)| c.is_empty()),
        }
    }

    /// Emit this node into `out`, appending bound values to `params` in
    /// placeholder order. A group at the top level renders bare; nested
    /// groups render parenthesized.
    pub(crate) fn write_sql(&self, out: &mut String, params: &mut Vec<Value>, dialect: Dialect) {
        match self {
            Condition::Leaf { column, op, value } => {
                write_leaf(out, params, dialect, column, *op, value)
            }
            Condition::Group(items) => write_items(items, out, params, dialect),
        }
    }
}

fn write_leaf(
    out: &mut String,
    params: &mut Vec<Value>,
    dialect: Dialect,
    column: &str,
    op: Op,
    value: &Value,
) {
    match op {
        Op::IsNull | Op::IsNotNull => {
            out.push_str(column);
            out.push(' ');
            out.push_str(op.sql(dialect));
        }
        Op::In | Op::NotIn => {
            let items: Vec<Value> = match value {
                Value::List(items) => items.clone(),
                single => vec![single.clone()],
            };
            if items.is_empty() {
                // An empty list matches nothing (or everything, negated);
                // keep the statement valid with a literal predicate.
                out.push_str(match op {
                    Op::In => "1 = 0",
                    _ => "1 = 1",
                });
                return;
            }
            out.push_str(column);
            out.push(' ');
            out.push_str(op.sql(dialect));
            out.push_str(" (");
            for (i, item) in items.into_iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                params.push(item);
                dialect.write_placeholder(out, params.len());
            }
            out.push(')');
        }
        _ => {
            out.push_str(column);
            out.push(' ');
            out.push_str(op.sql(dialect));
            out.push(' ');
            params.push(value.clone());
            dialect.write_placeholder(out, params.len());
        }
    }
}

pub(crate) fn write_items(
    items: &[(Connective, Condition)],
    out: &mut String,
    params: &mut Vec<Value>,
    dialect: Dialect,
) {
    let mut first = true;
    for (connective, condition) in items {
        if condition.is_empty() {
            continue;
        }
        if !first {
            out.push(' ');
            out.push_str(connective.keyword());
            out.push(' ');
        }
        first = false;
        if matches!(condition, Condition::Group(_)) {
            out.push('(');
            condition.write_sql(out, params, dialect);
            out.push(')');
        } else {
            condition.write_sql(out, params, dialect);
        }
    }
}

/// Fluent builder for one condition group.
///
/// This is the surface shared by the query builder, the bulk-update builder
/// and every nesting level: `filter`/`or_filter` append leaves,
/// `filter_group`/`or_filter_group` open parenthesized sub-groups populated
/// through the same surface.
#[derive(Debug, Clone, Default)]
pub struct Group {
    items: Vec<(Connective, Condition)>,
}

impl Group {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a leaf with an AND connective.
    pub fn filter(mut self, column: impl Into<String>, op: Op, value: impl Into<Value>) -> Self {
        self.push(Connective::And, leaf(column, op, value));
        self
    }

    /// Append a leaf with an OR connective.
    pub fn or_filter(mut self, column: impl Into<String>, op: Op, value: impl Into<Value>) -> Self {
        self.push(Connective::Or, leaf(column, op, value));
        self
    }

    /// Append an AND-connected sub-group populated by `f`.
    pub fn filter_group(mut self, f: impl FnOnce(Group) -> Group) -> Self {
        self.push(Connective::And, f(Group::new()).into_condition());
        self
    }

    /// Append an OR-connected sub-group populated by `f`.
    pub fn or_filter_group(mut self, f: impl FnOnce(Group) -> Group) -> Self {
        self.push(Connective::Or, f(Group::new()).into_condition());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.items.iter().all(|(_, c)| c.is_empty())
    }

    pub fn into_condition(self) -> Condition {
        Condition::Group(self.items)
    }

    pub(crate) fn push(&mut self, connective: Connective, condition: Condition) {
        self.items.push((connective, condition));
    }

    pub(crate) fn write_sql(&self, out: &mut String, params: &mut Vec<Value>, dialect: Dialect) {
        write_items(&self.items, out, params, dialect);
    }
}

fn leaf(column: impl Into<String>, op: Op, value: impl Into<Value>) -> Condition {
    Condition::Leaf {
        column: column.into(),
        op,
        value: value.into(),
    }
}
