//! # tidemark
//!
//! A small relational mapper: typed entities in, parameterized SQL out, rows
//! back as entities, including declared relationships (has-one, has-many,
//! belongs-to) with lazy and eager loading, and timestamp-based soft delete.
//!
//! The engine owns the condition tree, its compiler, the fluent query
//! builder, the relation cache/batcher and the mutation statements. It does
//! not own connections, transactions or dialect quoting: execution goes
//! through the [`Store`] trait, which binds positional parameters and hands
//! rows back in column order.

pub mod condition;
pub mod config;
pub mod error;
pub mod model;
pub mod mutation;
pub mod query;
pub mod relation;
pub mod store;
pub mod value;

#[cfg(test)]
pub(crate) mod tests_cfg;

pub use condition::{Condition, Connective, Group, Op};
pub use config::use_soft_delete;
pub use error::Error;
pub use model::{Entity, Model};
pub use mutation::{delete, delete_hard, insert, save, set, update, SetQuery};
pub use query::{query, Query};
pub use relation::{JoinKind, JoinSpec, Relation, RelationKind, RelationSlot};
pub use store::{Columns, Dialect, Row, Statement, Store};
pub use value::{FromValue, Value};
