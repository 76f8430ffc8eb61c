//! Declared relationships: descriptors, per-instance caches, lazy accessors,
//! the eager-load batcher, and join metadata.
//!
//! An entity declares a relationship by exposing an accessor method that
//! builds a fresh [`Relation`] on every call: a value describing *how* to
//! load, never the loaded data itself. The data lives in a [`RelationSlot`]
//! embedded in the owning instance; the descriptor holds a handle into that
//! slot, so anything the batcher or a lazy fetch stores there is visible to
//! the instance the descriptor came from.
//!
//! Reflection-based field mapping is out of scope, so accessors pass the
//! foreign-key column name and plain `fn` extractors for the key values:
//!
//! ```ignore
//! impl Disc {
//!     fn tracks(&self) -> Relation<'_, Disc, Track> {
//!         Relation::has_many(self, "disc_id", "tracks", |t| Some(t.disc_id), |d| &d.tracks)
//!     }
//! }
//! impl Track {
//!     fn disc(&self) -> Relation<'_, Track, Disc> {
//!         Relation::belongs_to(self, "disc_id", |t| Some(t.disc_id), "disc", |t| &t.disc)
//!     }
//! }
//! ```

use std::collections::{HashMap, HashSet};

use log::debug;
use once_cell::sync::OnceCell;
use uuid::Uuid;

use crate::condition::Op;
use crate::error::Error;
use crate::model::Entity;
use crate::query::Query;
use crate::store::Store;

/// Join kind of a declared relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    /// One related row owns a foreign key pointing at this entity.
    HasOne,
    /// Many related rows own foreign keys pointing at this entity.
    HasMany,
    /// This entity owns the foreign key pointing at the related row.
    BelongsTo,
}

/// SQL join strength for [`Relation::join`] / [`Query::join`](crate::Query::join).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
}

impl JoinKind {
    fn keyword(self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
        }
    }
}

/// A relation expressed as pure JOIN metadata: kind, joined table, and the
/// two sides of the ON equality. No rows are materialized through a join.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinSpec {
    kind: JoinKind,
    table: &'static str,
    on_left: String,
    on_right: String,
}

impl JoinSpec {
    pub(crate) fn write_sql(&self, out: &mut String, soft_delete: bool) {
        out.push(' ');
        out.push_str(self.kind.keyword());
        out.push(' ');
        out.push_str(self.table);
        out.push_str(" ON ");
        out.push_str(&self.on_left);
        out.push_str(" = ");
        out.push_str(&self.on_right);
        if soft_delete {
            out.push_str(" AND ");
            out.push_str(self.table);
            out.push_str(".deleted_at IS NULL");
        }
    }
}

/// Per-instance cache for one relation's resolved data.
///
/// The cell fills exactly once, by the eager-load batcher or a direct lazy
/// fetch, and is read-only afterwards; a second load keeps the first data.
/// Reads after loading are safe from any thread. Cloning an entity clones
/// its cached relation data along with it.
#[derive(Debug, Clone, Default)]
pub struct RelationSlot<T> {
    cell: OnceCell<Vec<T>>,
}

impl<T> RelationSlot<T> {
    pub fn new() -> Self {
        Self { cell: OnceCell::new() }
    }

    /// True iff the slot holds loaded data (possibly an empty set).
    pub fn loaded(&self) -> bool {
        self.cell.get().is_some()
    }

    fn get(&self) -> Option<&Vec<T>> {
        self.cell.get()
    }

    fn fill(&self, items: Vec<T>) {
        // First load wins; a slot never un-loads.
        let _ = self.cell.set(items);
    }
}

/// Descriptor for one declared relationship, bound to a specific owner
/// instance's key and cache slot. Constructed fresh on every accessor call;
/// immutable once constructed.
pub struct Relation<'a, O: Entity, T: Entity> {
    kind: RelationKind,
    name: &'static str,
    foreign_key: &'static str,
    /// Join-key value of the instance this descriptor was derived from.
    key: Option<Uuid>,
    /// Join-key of any parent: its id for HasOne/HasMany, its foreign-key
    /// value for BelongsTo.
    parent_key: fn(&O) -> Option<Uuid>,
    /// Join-key of a related row: its foreign-key value for HasOne/HasMany,
    /// its id for BelongsTo.
    related_key: fn(&T) -> Option<Uuid>,
    slot: &'a RelationSlot<T>,
    slot_of: fn(&O) -> &RelationSlot<T>,
}

fn id_of<E: Entity>(entity: &E) -> Option<Uuid> {
    entity.model().id
}

impl<'a, O: Entity, T: Entity> Relation<'a, O, T> {
    /// One-to-one: the related table's `foreign_key` column points at the
    /// owner's id.
    pub fn has_one(
        owner: &'a O,
        foreign_key: &'static str,
        name: &'static str,
        related_key: fn(&T) -> Option<Uuid>,
        slot_of: fn(&O) -> &RelationSlot<T>,
    ) -> Self {
        Self {
            kind: RelationKind::HasOne,
            name,
            foreign_key,
            key: id_of(owner),
            parent_key: id_of::<O>,
            related_key,
            slot: slot_of(owner),
            slot_of,
        }
    }

    /// One-to-many: like [`Relation::has_one`], with a row set.
    pub fn has_many(
        owner: &'a O,
        foreign_key: &'static str,
        name: &'static str,
        related_key: fn(&T) -> Option<Uuid>,
        slot_of: fn(&O) -> &RelationSlot<T>,
    ) -> Self {
        Self {
            kind: RelationKind::HasMany,
            name,
            foreign_key,
            key: id_of(owner),
            parent_key: id_of::<O>,
            related_key,
            slot: slot_of(owner),
            slot_of,
        }
    }

    /// Many-to-one: the owner's `foreign_key` column points at the related
    /// table's id; `owner_key` extracts that foreign-key value.
    pub fn belongs_to(
        owner: &'a O,
        foreign_key: &'static str,
        owner_key: fn(&O) -> Option<Uuid>,
        name: &'static str,
        slot_of: fn(&O) -> &RelationSlot<T>,
    ) -> Self {
        Self {
            kind: RelationKind::BelongsTo,
            name,
            foreign_key,
            key: owner_key(owner),
            parent_key: owner_key,
            related_key: id_of::<T>,
            slot: slot_of(owner),
            slot_of,
        }
    }

    pub fn kind(&self) -> RelationKind {
        self.kind
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// True iff this owner's cache slot has been loaded.
    pub fn loaded(&self) -> bool {
        self.slot.loaded()
    }

    /// Column on the related table the batch/lazy filter applies to.
    fn filter_column(&self) -> String {
        match self.kind {
            RelationKind::BelongsTo => format!("{}.id", T::table()),
            _ => format!("{}.{}", T::table(), self.foreign_key),
        }
    }

    fn query_for_keys(&self, keys: &[Uuid]) -> Query<'static, T> {
        let query = Query::new();
        if keys.len() == 1 {
            query.filter(self.filter_column(), Op::Eq, keys[0])
        } else {
            query.filter(self.filter_column(), Op::In, keys.to_vec())
        }
    }

    /// All related rows. Short-circuits on a loaded slot; otherwise fetches
    /// and caches (the direct lazy load). `None` for `store` is only valid
    /// when the slot is loaded.
    pub fn get(&self, store: Option<&dyn Store>) -> Result<Vec<T>, Error> {
        if let Some(items) = self.slot.get() {
            return Ok(items.clone());
        }
        let store = store.ok_or_else(|| self.not_loaded())?;
        let Some(key) = self.key else {
            // Unsaved owner: nothing can reference it yet.
            return Ok(Vec::new());
        };
        let items = self.query_for_keys(&[key]).get(store)?;
        self.slot.fill(items.clone());
        Ok(items)
    }

    /// First related row. Short-circuits on a loaded slot; a lazy fetch uses
    /// `LIMIT 1` and does not populate the cache.
    pub fn first(&self, store: Option<&dyn Store>) -> Result<T, Error> {
        if let Some(items) = self.slot.get() {
            return items.first().cloned().ok_or(Error::NotFound);
        }
        let store = store.ok_or_else(|| self.not_loaded())?;
        let Some(key) = self.key else {
            return Err(Error::NotFound);
        };
        self.query_for_keys(&[key]).first(store)
    }

    /// Exactly one related row; zero or several are both [`Error::NotFound`].
    pub fn find(&self, store: Option<&dyn Store>) -> Result<T, Error> {
        if let Some(items) = self.slot.get() {
            return match items.as_slice() {
                [single] => Ok(single.clone()),
                _ => Err(Error::NotFound),
            };
        }
        let store = store.ok_or_else(|| self.not_loaded())?;
        let Some(key) = self.key else {
            return Err(Error::NotFound);
        };
        self.query_for_keys(&[key]).find(store)
    }

    /// [`Relation::get`] that aborts on failure; for reading already
    /// eager-loaded data with no store at hand.
    pub fn must_get(&self, store: Option<&dyn Store>) -> Vec<T> {
        self.get(store)
            .unwrap_or_else(|e| panic!("relation {} failed: {e}", self.name))
    }

    /// [`Relation::first`] that aborts on failure.
    pub fn must_first(&self, store: Option<&dyn Store>) -> T {
        self.first(store)
            .unwrap_or_else(|e| panic!("relation {} failed: {e}", self.name))
    }

    /// [`Relation::find`] that aborts on failure.
    pub fn must_find(&self, store: Option<&dyn Store>) -> T {
        self.find(store)
            .unwrap_or_else(|e| panic!("relation {} failed: {e}", self.name))
    }

    /// Eager-load this relation for a whole parent result set in one query.
    ///
    /// Collects the distinct join-key values across `parents`, fetches every
    /// related row with a single IN-list filter, groups the rows by key and
    /// fills each parent's cache slot, including parents with zero matches,
    /// which end up loaded with an empty set. One extra round trip per
    /// relation, independent of the parent count.
    ///
    /// If the fetch fails the error surfaces and no slot is touched.
    pub fn execute(&self, store: &dyn Store, parents: &[O]) -> Result<(), Error> {
        if parents.is_empty() {
            return Ok(());
        }

        let mut seen = HashSet::new();
        let mut keys = Vec::new();
        for parent in parents {
            if let Some(key) = (self.parent_key)(parent) {
                if seen.insert(key) {
                    keys.push(key);
                }
            }
        }

        let mut by_key: HashMap<Uuid, Vec<T>> = HashMap::new();
        if !keys.is_empty() {
            let related = self.query_for_keys(&keys).get(store)?;
            debug!(
                "eager-loaded relation {} for {} parents: {} related rows",
                self.name,
                parents.len(),
                related.len()
            );
            for item in related {
                if let Some(key) = (self.related_key)(&item) {
                    by_key.entry(key).or_default().push(item);
                }
            }
        }

        for parent in parents {
            let subset = (self.parent_key)(parent)
                .and_then(|key| by_key.get(&key).cloned())
                .unwrap_or_default();
            (self.slot_of)(parent).fill(subset);
        }
        Ok(())
    }

    /// Express this relation as join metadata for the owner's query:
    /// `child.foreign_key = parent.id`, oriented by the relation kind.
    pub fn join(&self, kind: JoinKind) -> JoinSpec {
        match self.kind {
            RelationKind::BelongsTo => JoinSpec {
                kind,
                table: T::table(),
                on_left: format!("{}.id", T::table()),
                on_right: format!("{}.{}", O::table(), self.foreign_key),
            },
            RelationKind::HasOne | RelationKind::HasMany => JoinSpec {
                kind,
                table: T::table(),
                on_left: format!("{}.{}", T::table(), self.foreign_key),
                on_right: format!("{}.id", O::table()),
            },
        }
    }

    fn not_loaded(&self) -> Error {
        Error::Misuse(format!(
            "relation {} is not loaded and no store was provided",
            self.name
        ))
    }
}
