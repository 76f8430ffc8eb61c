//! Store collaborator contract and the row model.
//!
//! The engine compiles every operation into a [`Statement`] (SQL text plus a
//! positional parameter vector) and hands it to a [`Store`] for execution.
//! The store owns connections, transactions and quoting; the engine only
//! assumes positional placeholders and rows scannable in the requested
//! column order.

use std::fmt;

use crate::error::Error;
use crate::value::{FromValue, Value};

/// Placeholder and keyword style of the target store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// `$1, $2, ...` placeholders, `ILIKE` supported.
    Postgres,
    /// `?` placeholders; `LIKE` is already case-insensitive, so `ILike`
    /// compiles to `LIKE`.
    Sqlite,
}

impl Dialect {
    /// Append the placeholder for the 1-based parameter `index`.
    pub fn write_placeholder(self, out: &mut String, index: usize) {
        match self {
            Dialect::Postgres => {
                out.push('$');
                out.push_str(&index.to_string());
            }
            Dialect::Sqlite => out.push('?'),
        }
    }
}

/// A compiled statement: SQL text and its parameters in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{} params]", self.sql, self.params.len())
    }
}

/// One result row, column values in the order the statement requested them.
#[derive(Debug, Clone)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Convert the value at `index` into `T`.
    pub fn get<T: FromValue>(&self, index: usize) -> Result<T, Error> {
        let value = self
            .values
            .get(index)
            .ok_or_else(|| Error::Decode(format!("no column at index {index}")))?;
        T::from_value(value)
    }

    /// Sequential cursor over the row, for scanning columns in order.
    pub fn columns(&self) -> Columns<'_> {
        Columns { row: self, index: 0 }
    }
}

/// Sequential reader over a [`Row`]; each `take` consumes the next column.
pub struct Columns<'a> {
    row: &'a Row,
    index: usize,
}

impl Columns<'_> {
    /// Convert the next column into `T` and advance.
    pub fn take<T: FromValue>(&mut self) -> Result<T, Error> {
        let value = self.row.get(self.index);
        self.index += 1;
        value
    }
}

/// Execution interface the engine consumes.
///
/// A store may be used concurrently by independent query builders; the engine
/// imposes no serialization of its own.
pub trait Store {
    /// Placeholder style this store expects.
    fn dialect(&self) -> Dialect;

    /// Run a statement that returns no rows; yields the affected-row count.
    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, Error>;

    /// Run a statement and return every result row.
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, Error>;
}
