//! Error type shared by every engine operation.
//!
//! The engine never retries and never reinterprets store failures; it maps
//! outcomes into four categories and propagates them as-is.

use std::fmt;

/// Failure categories surfaced by queries, relation loading and mutations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A singular fetch did not match exactly one row, or a targeted
    /// mutation affected zero rows. An ambiguous fetch (more than one row)
    /// surfaces identically: the caller's remedy is to narrow the filter.
    NotFound,
    /// Store-level failure (constraint violation, connectivity), carried
    /// verbatim from the store collaborator.
    Persistence(String),
    /// A row value could not be converted into the requested Rust type.
    Decode(String),
    /// Caller contract violation, e.g. a soft delete while soft-delete mode
    /// is disabled, or an update naming an unmapped column.
    Misuse(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotFound => write!(f, "resource not found"),
            Error::Persistence(s) => write!(f, "persistence error: {s}"),
            Error::Decode(s) => write!(f, "decode error: {s}"),
            Error::Misuse(s) => write!(f, "misuse: {s}"),
        }
    }
}

impl std::error::Error for Error {}
