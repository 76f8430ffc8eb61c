//! Fluent query builder: filtering, joins, ordering, grouping, pagination,
//! projection, execution, and eager-load registration.
//!
//! A builder is created empty, mutated only through its own fluent
//! operations (each takes `self` and returns it back), and consumed exactly
//! once by a terminal call (`get`, `first`, `find`, ...). Builders are not
//! meant to be shared across threads; one call chain, one logical thread of
//! control.

use std::marker::PhantomData;

use log::debug;

use crate::condition::{Group, Op};
use crate::config;
use crate::error::Error;
use crate::model::{mapped_columns, Entity};
use crate::relation::JoinSpec;
use crate::store::{Dialect, Row, Statement, Store};
use crate::value::Value;
use uuid::Uuid;

/// Start a query for `E`, selecting all mapped columns by default.
pub fn query<'b, E: Entity>() -> Query<'b, E> {
    Query::new()
}

struct Projection<'b> {
    columns: Vec<String>,
    binder: Box<dyn FnMut(&Row) -> Result<(), Error> + 'b>,
}

type EagerFn<'b, E> = Box<dyn Fn(&E, &dyn Store, &[E]) -> Result<(), Error> + 'b>;

/// Query builder for one entity type.
pub struct Query<'b, E: Entity> {
    wher: Group,
    having: Group,
    order: Vec<(String, bool)>,
    group: Vec<String>,
    joins: Vec<JoinSpec>,
    limit: Option<u64>,
    offset: Option<u64>,
    projection: Option<Projection<'b>>,
    eager: Vec<EagerFn<'b, E>>,
    with_deleted: bool,
    _entity: PhantomData<E>,
}

impl<'b, E: Entity> Query<'b, E> {
    pub fn new() -> Self {
        Self {
            wher: Group::new(),
            having: Group::new(),
            order: Vec::new(),
            group: Vec::new(),
            joins: Vec::new(),
            limit: None,
            offset: None,
            projection: None,
            eager: Vec::new(),
            with_deleted: false,
            _entity: PhantomData,
        }
    }

    /// Append an AND-connected leaf to the WHERE group.
    pub fn filter(mut self, column: impl Into<String>, op: Op, value: impl Into<Value>) -> Self {
        self.wher = self.wher.filter(column, op, value);
        self
    }

    /// Append an OR-connected leaf to the WHERE group.
    pub fn or_filter(mut self, column: impl Into<String>, op: Op, value: impl Into<Value>) -> Self {
        self.wher = self.wher.or_filter(column, op, value);
        self
    }

    /// Append an AND-connected parenthesized sub-group: `... AND (f)`.
    pub fn filter_group(mut self, f: impl FnOnce(Group) -> Group) -> Self {
        self.wher = self.wher.filter_group(f);
        self
    }

    /// Append an OR-connected parenthesized sub-group: `... OR (f)`.
    pub fn or_filter_group(mut self, f: impl FnOnce(Group) -> Group) -> Self {
        self.wher = self.wher.or_filter_group(f);
        self
    }

    /// Append a sort key; `ascending` false sorts descending.
    pub fn order_by(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.order.push((column.into(), ascending));
        self
    }

    /// Append a GROUP BY column.
    pub fn group_by(mut self, column: impl Into<String>) -> Self {
        self.group.push(column.into());
        self
    }

    /// Append an AND-connected leaf to the HAVING group.
    pub fn having(mut self, column: impl Into<String>, op: Op, value: impl Into<Value>) -> Self {
        self.having = self.having.filter(column, op, value);
        self
    }

    /// LIMIT. Pagination without a deterministic `order_by` is the caller's
    /// problem.
    pub fn take(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    /// OFFSET.
    pub fn skip(mut self, n: u64) -> Self {
        self.offset = Some(n);
        self
    }

    /// Join a related table, for filtering or projecting across a relation
    /// without loading it. The closure receives a zero-value instance and
    /// typically derives the spec from a relation accessor:
    /// `q.join(|book| book.author().join(JoinKind::Inner))`.
    pub fn join(mut self, f: impl FnOnce(E) -> JoinSpec) -> Self {
        self.joins.push(f(E::default()));
        self
    }

    /// Replace the default all-mapped-columns projection. `binder` is called
    /// once per result row and reads the selected expressions in order; with
    /// a custom projection `get` returns an empty entity list and delivers
    /// rows solely through the binder.
    pub fn select<I, S>(
        mut self,
        columns: I,
        binder: impl FnMut(&Row) -> Result<(), Error> + 'b,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projection = Some(Projection {
            columns: columns.into_iter().map(Into::into).collect(),
            binder: Box::new(binder),
        });
        self
    }

    /// Register an eager-load step, run once after the base query produces a
    /// non-empty result: `f(&parents[0], store, &parents)`. The closure is
    /// expected to call `accessor.execute(store, parents)` on a relation of
    /// the prototype parent.
    pub fn with(mut self, f: impl Fn(&E, &dyn Store, &[E]) -> Result<(), Error> + 'b) -> Self {
        self.eager.push(Box::new(f));
        self
    }

    /// Disable the implicit soft-delete filter for this query only.
    pub fn with_deleted(mut self) -> Self {
        self.with_deleted = true;
        self
    }

    /// Compile to a statement for `dialect`, honoring the process-wide
    /// soft-delete mode unless `with_deleted` was requested.
    pub fn build(&self, dialect: Dialect) -> Statement {
        self.build_with(dialect, config::soft_delete_enabled() && !self.with_deleted)
    }

    pub(crate) fn build_with(&self, dialect: Dialect, soft_delete: bool) -> Statement {
        let table = E::table();
        let mut sql = String::with_capacity(128);
        let mut params = Vec::new();

        sql.push_str("SELECT ");
        match &self.projection {
            Some(projection) => sql.push_str(&projection.columns.join(", ")),
            None => {
                for (i, column) in mapped_columns::<E>().enumerate() {
                    if i > 0 {
                        sql.push_str(", ");
                    }
                    sql.push_str(table);
                    sql.push('.');
                    sql.push_str(column);
                }
            }
        }
        sql.push_str(" FROM ");
        sql.push_str(table);

        for join in &self.joins {
            join.write_sql(&mut sql, soft_delete);
        }

        // The soft-delete filter composes as an outer AND; the user tree is
        // parenthesized so its OR-groups stay intact.
        let user = !self.wher.is_empty();
        if soft_delete || user {
            sql.push_str(" WHERE ");
            if soft_delete {
                sql.push_str(table);
                sql.push_str(".deleted_at IS NULL");
                if user {
                    sql.push_str(" AND (");
                    self.wher.write_sql(&mut sql, &mut params, dialect);
                    sql.push(')');
                }
            } else {
                self.wher.write_sql(&mut sql, &mut params, dialect);
            }
        }

        if !self.group.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.group.join(", "));
        }
        if !self.having.is_empty() {
            sql.push_str(" HAVING ");
            self.having.write_sql(&mut sql, &mut params, dialect);
        }
        if !self.order.is_empty() {
            sql.push_str(" ORDER BY ");
            for (i, (column, ascending)) in self.order.iter().enumerate() {
                if i > 0 {
                    sql.push_str(", ");
                }
                sql.push_str(column);
                sql.push_str(if *ascending { " ASC" } else { " DESC" });
            }
        }
        // Limit and offset are emitted as literals: bound parameters come
        // from condition leaves alone.
        if let Some(limit) = self.limit {
            sql.push_str(" LIMIT ");
            sql.push_str(&limit.to_string());
        }
        if let Some(offset) = self.offset {
            sql.push_str(" OFFSET ");
            sql.push_str(&offset.to_string());
        }

        Statement { sql, params }
    }

    /// Execute and materialize every matching row. An empty result is a
    /// valid, error-free outcome. Registered eager loaders run afterwards.
    pub fn get(mut self, store: &dyn Store) -> Result<Vec<E>, Error> {
        let statement = self.build(store.dialect());
        debug!("query {}: {statement}", E::table());
        let rows = store.query(&statement.sql, &statement.params)?;

        if let Some(projection) = self.projection.as_mut() {
            for row in &rows {
                (projection.binder)(row)?;
            }
            return Ok(Vec::new());
        }

        let mut entities = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut cols = row.columns();
            entities.push(E::from_row(&mut cols)?);
        }

        if !entities.is_empty() {
            for load in &self.eager {
                load(&entities[0], store, &entities)?;
            }
        }
        Ok(entities)
    }

    /// Execute with an implicit `LIMIT 1`; [`Error::NotFound`] on zero rows.
    pub fn first(self, store: &dyn Store) -> Result<E, Error> {
        let mut list = self.take(1).get(store)?;
        list.pop().ok_or(Error::NotFound)
    }

    /// Execute with no implicit limit and require exactly one matching row.
    /// Zero rows and more than one row both surface as [`Error::NotFound`]:
    /// an ambiguous filter is a caller bug, not a lucky first match.
    pub fn find(self, store: &dyn Store) -> Result<E, Error> {
        let mut list = self.get(store)?;
        match list.pop() {
            Some(entity) if list.is_empty() => Ok(entity),
            _ => Err(Error::NotFound),
        }
    }

    /// Filter by primary key, then [`Query::find`] semantics.
    pub fn find_id(self, store: &dyn Store, id: Uuid) -> Result<E, Error> {
        let column = format!("{}.id", E::table());
        self.filter(column, Op::Eq, id).find(store)
    }

    /// [`Query::get`] that aborts on failure; for callers that already
    /// guaranteed success.
    pub fn must_get(self, store: &dyn Store) -> Vec<E> {
        self.get(store)
            .unwrap_or_else(|e| panic!("query on {} failed: {e}", E::table()))
    }

    /// [`Query::first`] that aborts on failure.
    pub fn must_first(self, store: &dyn Store) -> E {
        self.first(store)
            .unwrap_or_else(|e| panic!("query on {} failed: {e}", E::table()))
    }

    /// [`Query::find`] that aborts on failure.
    pub fn must_find(self, store: &dyn Store) -> E {
        self.find(store)
            .unwrap_or_else(|e| panic!("query on {} failed: {e}", E::table()))
    }
}

impl<E: Entity> Default for Query<'_, E> {
    fn default() -> Self {
        Self::new()
    }
}
