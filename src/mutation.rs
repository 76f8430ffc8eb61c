//! Mutations: insert, save, field-restricted update, soft/hard delete, and
//! bulk set-where updates.
//!
//! Each operation compiles its own statement from the entity's mapped
//! columns (or an explicit subset) and executes it immediately. The bulk
//! [`SetQuery`] shares the condition compiler with the query builder for its
//! WHERE clause.

use chrono::Utc;
use log::debug;
use std::marker::PhantomData;
use uuid::Uuid;

use crate::condition::{Group, Op};
use crate::config;
use crate::error::Error;
use crate::model::{mapped_columns, Entity};
use crate::store::{Dialect, Statement, Store};
use crate::value::Value;

/// Insert `entity` as a new row.
///
/// Assigns a fresh identifier when none is set (a caller-supplied one is
/// kept) and stamps the creation/update timestamps. Constraint violations
/// surface verbatim from the store as [`Error::Persistence`].
pub fn insert<E: Entity>(store: &dyn Store, entity: &mut E) -> Result<(), Error> {
    let now = Utc::now();
    let model = entity.model_mut();
    if model.id.is_none() {
        model.id = Some(Uuid::new_v4());
    }
    if model.created_at.is_none() {
        model.created_at = Some(now);
    }
    model.updated_at = Some(now);

    let dialect = store.dialect();
    let mut params = entity.model().values();
    params.extend(entity.column_values());

    let mut sql = String::with_capacity(128);
    sql.push_str("INSERT INTO ");
    sql.push_str(E::table());
    sql.push_str(" (");
    for (i, column) in mapped_columns::<E>().enumerate() {
        if i > 0 {
            sql.push_str(", ");
        }
        sql.push_str(column);
    }
    sql.push_str(") VALUES (");
    for i in 1..=params.len() {
        if i > 1 {
            sql.push_str(", ");
        }
        dialect.write_placeholder(&mut sql, i);
    }
    sql.push(')');

    debug!("insert into {}: {sql}", E::table());
    store.execute(&sql, &params)?;
    Ok(())
}

/// Insert when the entity has no identifier yet, otherwise update every
/// mapped column of the existing row.
pub fn save<E: Entity>(store: &dyn Store, entity: &mut E) -> Result<(), Error> {
    if entity.model().id.is_none() {
        insert(store, entity)
    } else {
        update(store, entity, E::column_names())
    }
}

/// Update the named entity columns of the row matching the entity's
/// identifier, stamping `updated_at`.
///
/// Naming a column the entity does not map is [`Error::Misuse`]. Zero
/// affected rows (the row is missing, or soft-deleted while soft-delete
/// filtering is active) is [`Error::NotFound`].
pub fn update<E: Entity>(store: &dyn Store, entity: &mut E, fields: &[&str]) -> Result<(), Error> {
    let id = entity
        .model()
        .id
        .ok_or_else(|| Error::Misuse("update requires an assigned identifier".into()))?;
    let now = Utc::now();
    entity.model_mut().updated_at = Some(now);

    let names = E::column_names();
    let values = entity.column_values();
    let dialect = store.dialect();

    let mut sql = String::with_capacity(128);
    let mut params = Vec::with_capacity(fields.len() + 2);
    sql.push_str("UPDATE ");
    sql.push_str(E::table());
    sql.push_str(" SET ");
    for field in fields {
        let index = names
            .iter()
            .position(|name| name == field)
            .ok_or_else(|| Error::Misuse(format!("unknown column {field} on {}", E::table())))?;
        if !params.is_empty() {
            sql.push_str(", ");
        }
        sql.push_str(field);
        sql.push_str(" = ");
        params.push(values[index].clone());
        dialect.write_placeholder(&mut sql, params.len());
    }
    if !params.is_empty() {
        sql.push_str(", ");
    }
    sql.push_str("updated_at = ");
    params.push(Value::DateTime(now));
    dialect.write_placeholder(&mut sql, params.len());

    sql.push_str(" WHERE id = ");
    params.push(Value::Uuid(id));
    dialect.write_placeholder(&mut sql, params.len());
    if config::soft_delete_enabled() {
        sql.push_str(" AND deleted_at IS NULL");
    }

    debug!("update {}: {sql}", E::table());
    let affected = store.execute(&sql, &params)?;
    if affected == 0 {
        return Err(Error::NotFound);
    }
    Ok(())
}

/// Soft-delete the row with identifier `id` by setting its delete timestamp.
///
/// Requires soft-delete mode to be enabled; calling this with the mode off
/// is a caller contract violation, not a silent no-op. Zero affected rows
/// (missing or already soft-deleted) is [`Error::NotFound`].
pub fn delete<E: Entity>(store: &dyn Store, id: Uuid) -> Result<(), Error> {
    if !config::soft_delete_enabled() {
        return Err(Error::Misuse(
            "soft delete requested while soft-delete mode is disabled".into(),
        ));
    }
    let now = Value::DateTime(Utc::now());
    let dialect = store.dialect();

    let mut sql = String::with_capacity(96);
    sql.push_str("UPDATE ");
    sql.push_str(E::table());
    sql.push_str(" SET deleted_at = ");
    dialect.write_placeholder(&mut sql, 1);
    sql.push_str(", updated_at = ");
    dialect.write_placeholder(&mut sql, 2);
    sql.push_str(" WHERE id = ");
    dialect.write_placeholder(&mut sql, 3);
    sql.push_str(" AND deleted_at IS NULL");

    debug!("soft delete from {}: {sql}", E::table());
    let affected = store.execute(&sql, &[now.clone(), now, Value::Uuid(id)])?;
    if affected == 0 {
        return Err(Error::NotFound);
    }
    Ok(())
}

/// Physically remove the row with identifier `id`, regardless of soft-delete
/// mode or the row's delete timestamp.
pub fn delete_hard<E: Entity>(store: &dyn Store, id: Uuid) -> Result<(), Error> {
    let dialect = store.dialect();
    let mut sql = String::with_capacity(64);
    sql.push_str("DELETE FROM ");
    sql.push_str(E::table());
    sql.push_str(" WHERE id = ");
    dialect.write_placeholder(&mut sql, 1);

    debug!("hard delete from {}: {sql}", E::table());
    let affected = store.execute(&sql, &[Value::Uuid(id)])?;
    if affected == 0 {
        return Err(Error::NotFound);
    }
    Ok(())
}

/// Start a bulk update for `E`: `set(...)` assignments plus an arbitrary
/// condition tree, applied to every matching row at once.
pub fn set<E: Entity>() -> SetQuery<E> {
    SetQuery {
        assignments: Vec::new(),
        wher: Group::new(),
        _entity: PhantomData,
    }
}

/// Bulk `UPDATE ... SET ... WHERE ...` builder; see [`set`].
pub struct SetQuery<E: Entity> {
    assignments: Vec<(String, Value)>,
    wher: Group,
    _entity: PhantomData<E>,
}

impl<E: Entity> SetQuery<E> {
    /// Assign `column = value` on every matching row.
    pub fn set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.assignments.push((column.into(), value.into()));
        self
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

    /// Append an AND-connected parenthesized sub-group.
    pub fn filter_group(mut self, f: impl FnOnce(Group) -> Group) -> Self {
        self.wher = self.wher.filter_group(f);
        self
    }

    /// Append an OR-connected parenthesized sub-group.
    pub fn or_filter_group(mut self, f: impl FnOnce(Group) -> Group) -> Self {
        self.wher = self.wher.or_filter_group(f);
        self
    }

    /// Compile to a statement; assignment parameters precede WHERE
    /// parameters. At least one assignment is required.
    pub fn build(&self, dialect: Dialect) -> Result<Statement, Error> {
        self.build_with(dialect, config::soft_delete_enabled())
    }

    pub(crate) fn build_with(&self, dialect: Dialect, soft_delete: bool) -> Result<Statement, Error> {
        if self.assignments.is_empty() {
            return Err(Error::Misuse("bulk set with no assignments".into()));
        }
        let mut sql = String::with_capacity(128);
        let mut params = Vec::new();
        sql.push_str("UPDATE ");
        sql.push_str(E::table());
        sql.push_str(" SET ");
        for (i, (column, value)) in self.assignments.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push_str(column);
            sql.push_str(" = ");
            params.push(value.clone());
            dialect.write_placeholder(&mut sql, params.len());
        }

        let user = !self.wher.is_empty();
        if soft_delete || user {
            sql.push_str(" WHERE ");
            if soft_delete {
                sql.push_str("deleted_at IS NULL");
                if user {
                    sql.push_str(" AND (");
                    self.wher.write_sql(&mut sql, &mut params, dialect);
                    sql.push(')');
                }
            } else {
                self.wher.write_sql(&mut sql, &mut params, dialect);
            }
        }
        Ok(Statement { sql, params })
    }

    /// Execute the bulk update; returns the affected-row count.
    pub fn execute(self, store: &dyn Store) -> Result<u64, Error> {
        let statement = self.build(store.dialect())?;
        debug!("bulk set on {}: {statement}", E::table());
        store.execute(&statement.sql, &statement.params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_cfg::Track;

    #[test]
    fn set_params_precede_where_params() {
        let statement = set::<Track>()
            .set("plays", 0i64)
            .set("title", "untitled")
            .filter("title", Op::Like, "%demo%")
            .or_filter("plays", Op::Lt, 5i64)
            .build_with(Dialect::Postgres, false)
            .unwrap();
        assert_eq!(
            statement.sql,
            "UPDATE tracks SET plays = $1, title = $2 \
             WHERE title LIKE $3 OR plays < $4"
        );
        assert_eq!(
            statement.params,
            vec![
                Value::Int(0),
                Value::Text("untitled".into()),
                Value::Text("%demo%".into()),
                Value::Int(5),
            ]
        );
    }

    #[test]
    fn bulk_set_honors_soft_delete_filter() {
        let statement = set::<Track>()
            .set("plays", 1i64)
            .filter("title", Op::Eq, "a")
            .build_with(Dialect::Sqlite, true)
            .unwrap();
        assert!(statement
            .sql
            .ends_with("WHERE deleted_at IS NULL AND (title = ?)"));
    }

    #[test]
    fn bulk_set_without_assignments_is_misuse() {
        let result = set::<Track>()
            .filter("title", Op::Eq, "a")
            .build_with(Dialect::Sqlite, false);
        assert!(matches!(result, Err(Error::Misuse(_))));
    }

    #[test]
    fn bulk_set_without_conditions_targets_every_row() {
        let statement = set::<Track>()
            .set("plays", 0i64)
            .build_with(Dialect::Sqlite, false)
            .unwrap();
        assert_eq!(statement.sql, "UPDATE tracks SET plays = ?");
    }
}
