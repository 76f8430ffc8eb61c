//! Shared support for the integration tests: an in-memory SQLite store
//! implementing the engine's `Store` contract, and a small entity family:
//! authors with many books and one profile.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};

use rusqlite::types::ValueRef;
use rusqlite::Connection;
use uuid::Uuid;

use tidemark::{
    insert, Columns, Dialect, Entity, Error, Model, Relation, RelationSlot, Row, Store, Value,
};

/// In-memory SQLite store. Counts `query` round trips so tests can assert
/// how many fetches an operation needed.
pub struct SqliteStore {
    conn: Connection,
    queries: AtomicUsize,
}

impl SqliteStore {
    pub fn new() -> Self {
        let conn = Connection::open_in_memory().expect("open in-memory sqlite");
        conn.execute_batch(
            "CREATE TABLE authors (
                id BLOB PRIMARY KEY,
                created_at TEXT,
                updated_at TEXT,
                deleted_at TEXT,
                name TEXT NOT NULL,
                alias TEXT
            );
            CREATE TABLE books (
                id BLOB PRIMARY KEY,
                created_at TEXT,
                updated_at TEXT,
                deleted_at TEXT,
                title TEXT NOT NULL,
                year INTEGER NOT NULL,
                author_id BLOB NOT NULL
            );
            CREATE TABLE profiles (
                id BLOB PRIMARY KEY,
                created_at TEXT,
                updated_at TEXT,
                deleted_at TEXT,
                email TEXT NOT NULL,
                phone INTEGER NOT NULL,
                author_id BLOB NOT NULL
            );",
        )
        .expect("create schema");
        Self {
            conn,
            queries: AtomicUsize::new(0),
        }
    }

    /// Number of `query` round trips so far.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::Relaxed)
    }
}

fn bind(value: &Value) -> rusqlite::types::Value {
    match value {
        Value::Null => rusqlite::types::Value::Null,
        Value::Bool(b) => rusqlite::types::Value::Integer(*b as i64),
        Value::Int(i) => rusqlite::types::Value::Integer(*i),
        Value::Float(f) => rusqlite::types::Value::Real(*f),
        Value::Text(t) => rusqlite::types::Value::Text(t.clone()),
        Value::Bytes(b) => rusqlite::types::Value::Blob(b.clone()),
        Value::Uuid(u) => rusqlite::types::Value::Blob(u.as_bytes().to_vec()),
        Value::DateTime(t) => rusqlite::types::Value::Text(t.to_rfc3339()),
        // lists are flattened by the compiler and never reach a store
        Value::List(_) => rusqlite::types::Value::Null,
    }
}

fn read(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Bytes(b.to_vec()),
    }
}

impl Store for SqliteStore {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, Error> {
        let bound: Vec<rusqlite::types::Value> = params.iter().map(bind).collect();
        self.conn
            .execute(sql, rusqlite::params_from_iter(bound))
            .map(|affected| affected as u64)
            .map_err(|e| Error::Persistence(e.to_string()))
    }

    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, Error> {
        self.queries.fetch_add(1, Ordering::Relaxed);
        let bound: Vec<rusqlite::types::Value> = params.iter().map(bind).collect();
        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(|e| Error::Persistence(e.to_string()))?;
        let columns = stmt.column_count();
        let mut rows = stmt
            .query(rusqlite::params_from_iter(bound))
            .map_err(|e| Error::Persistence(e.to_string()))?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(|e| Error::Persistence(e.to_string()))? {
            let mut values = Vec::with_capacity(columns);
            for i in 0..columns {
                let value = row
                    .get_ref(i)
                    .map_err(|e| Error::Persistence(e.to_string()))?;
                values.push(read(value));
            }
            out.push(Row::new(values));
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Author {
    pub model: Model,
    pub name: String,
    pub alias: Option<String>,
    pub profile: RelationSlot<Profile>,
    pub books: RelationSlot<Book>,
}

impl Entity for Author {
    fn model(&self) -> &Model {
        &self.model
    }

    fn model_mut(&mut self) -> &mut Model {
        &mut self.model
    }

    fn table() -> &'static str {
        "authors"
    }

    fn column_names() -> &'static [&'static str] {
        &["name", "alias"]
    }

    fn column_values(&self) -> Vec<Value> {
        vec![self.name.clone().into(), self.alias.clone().into()]
    }

    fn from_row(cols: &mut Columns<'_>) -> Result<Self, Error> {
        Ok(Author {
            model: Model::read(cols)?,
            name: cols.take()?,
            alias: cols.take()?,
            ..Default::default()
        })
    }
}

impl Author {
    pub fn profile(&self) -> Relation<'_, Author, Profile> {
        Relation::has_one(
            self,
            "author_id",
            "profile",
            |p| Some(p.author_id),
            |a| &a.profile,
        )
    }

    pub fn books(&self) -> Relation<'_, Author, Book> {
        Relation::has_many(
            self,
            "author_id",
            "books",
            |b| Some(b.author_id),
            |a| &a.books,
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct Book {
    pub model: Model,
    pub title: String,
    pub year: i64,
    pub author_id: Uuid,
    pub author: RelationSlot<Author>,
}

impl Entity for Book {
    fn model(&self) -> &Model {
        &self.model
    }

    fn model_mut(&mut self) -> &mut Model {
        &mut self.model
    }

    fn table() -> &'static str {
        "books"
    }

    fn column_names() -> &'static [&'static str] {
        &["title", "year", "author_id"]
    }

    fn column_values(&self) -> Vec<Value> {
        vec![
            self.title.clone().into(),
            self.year.into(),
            self.author_id.into(),
        ]
    }

    fn from_row(cols: &mut Columns<'_>) -> Result<Self, Error> {
        Ok(Book {
            model: Model::read(cols)?,
            title: cols.take()?,
            year: cols.take()?,
            author_id: cols.take()?,
            ..Default::default()
        })
    }
}

impl Book {
    pub fn author(&self) -> Relation<'_, Book, Author> {
        Relation::belongs_to(
            self,
            "author_id",
            |b| Some(b.author_id),
            "author",
            |b| &b.author,
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct Profile {
    pub model: Model,
    pub email: String,
    pub phone: i64,
    pub author_id: Uuid,
    pub author: RelationSlot<Author>,
}

impl Entity for Profile {
    fn model(&self) -> &Model {
        &self.model
    }

    fn model_mut(&mut self) -> &mut Model {
        &mut self.model
    }

    fn table() -> &'static str {
        "profiles"
    }

    fn column_names() -> &'static [&'static str] {
        &["email", "phone", "author_id"]
    }

    fn column_values(&self) -> Vec<Value> {
        vec![
            self.email.clone().into(),
            self.phone.into(),
            self.author_id.into(),
        ]
    }

    fn from_row(cols: &mut Columns<'_>) -> Result<Self, Error> {
        Ok(Profile {
            model: Model::read(cols)?,
            email: cols.take()?,
            phone: cols.take()?,
            author_id: cols.take()?,
            ..Default::default()
        })
    }
}

impl Profile {
    pub fn author(&self) -> Relation<'_, Profile, Author> {
        Relation::belongs_to(
            self,
            "author_id",
            |p| Some(p.author_id),
            "author",
            |p| &p.author,
        )
    }
}

pub fn seed_authors(store: &SqliteStore, names: &[&str]) -> Vec<Uuid> {
    names
        .iter()
        .map(|name| {
            let mut author = Author {
                name: (*name).to_string(),
                ..Default::default()
            };
            insert(store, &mut author).expect("seed author");
            author.model.id.expect("seeded author id")
        })
        .collect()
}

pub fn seed_book(store: &SqliteStore, title: &str, year: i64, author_id: Uuid) -> Uuid {
    let mut book = Book {
        title: title.to_string(),
        year,
        author_id,
        ..Default::default()
    };
    insert(store, &mut book).expect("seed book");
    book.model.id.expect("seeded book id")
}

pub fn seed_profile(store: &SqliteStore, email: &str, phone: i64, author_id: Uuid) -> Uuid {
    let mut profile = Profile {
        email: email.to_string(),
        phone,
        author_id,
        ..Default::default()
    };
    insert(store, &mut profile).expect("seed profile");
    profile.model.id.expect("seeded profile id")
}
