//! Entity contract and the embedded identity block.
//!
//! Every mapped type embeds a [`Model`] carrying its identity and lifecycle
//! timestamps, and implements [`Entity`] to expose table and column metadata.
//! The contract is a capability set, not a base class: the engine is generic
//! over any type that satisfies it, and nothing else about the type matters.
//!
//! Rust has no runtime reflection, so column mapping is explicit: an entity
//! lists its column names and produces its values in the same order, and
//! materializes itself from a sequential column cursor. The model block
//! always occupies the first four columns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;
use crate::store::Columns;
use crate::value::Value;

/// Identity block embedded in every entity.
///
/// The identifier is absent until assigned (client-generated on insert, or
/// caller-supplied beforehand) and immutable once set. `deleted_at` is the
/// soft-delete timestamp slot; a set value marks the row inactive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub id: Option<Uuid>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Model {
    /// Mapped columns of the identity block, in scan order.
    pub const COLUMNS: [&'static str; 4] = ["id", "created_at", "updated_at", "deleted_at"];

    /// Scan the identity block from the next four columns of a row.
    pub fn read(cols: &mut Columns<'_>) -> Result<Self, Error> {
        Ok(Model {
            id: cols.take()?,
            created_at: cols.take()?,
            updated_at: cols.take()?,
            deleted_at: cols.take()?,
        })
    }

    /// Bindable values matching [`Model::COLUMNS`].
    pub fn values(&self) -> Vec<Value> {
        vec![
            self.id.into(),
            self.created_at.into(),
            self.updated_at.into(),
            self.deleted_at.into(),
        ]
    }
}

/// Capability set every mapped type implements.
///
/// `Default` supplies the zero-value instance handed to join closures;
/// `Clone` lets result sets and relation caches hand out owned entities.
pub trait Entity: Clone + Default + 'static {
    /// Identity block access.
    fn model(&self) -> &Model;
    fn model_mut(&mut self) -> &mut Model;

    /// Table this entity maps to.
    fn table() -> &'static str;

    /// Entity-owned column names, excluding the model block.
    fn column_names() -> &'static [&'static str];

    /// Bindable values matching [`Entity::column_names`].
    fn column_values(&self) -> Vec<Value>;

    /// Materialize one entity from a row cursor: the model block first, then
    /// the entity columns in [`Entity::column_names`] order.
    fn from_row(cols: &mut Columns<'_>) -> Result<Self, Error>
    where
        Self: Sized;
}

/// All mapped columns of `E`: the model block followed by the entity columns.
pub(crate) fn mapped_columns<E: Entity>() -> impl Iterator<Item = &'static str> {
    Model::COLUMNS.into_iter().chain(E::column_names().iter().copied())
}
