//! Search predicates over the catalog.
//!
//! A [`Predicate`] is a small tree built once (by the resolver or by the
//! [`compiler`]) and rendered separately by each store backend: the SQLite
//! store turns it into SQL through [`sql`], the in-memory store evaluates it
//! directly.
//!
//! Fields are named by the entity they belong to in the store's join graph,
//! not by the entity being searched. Searching releases with
//! `Field::ArtistName` compares the release's artist; searching tracks with
//! the same field compares the track's artist.

pub mod compiler;
pub mod sql;

pub use compiler::{Term, compile, parse_term};

use crate::error::{Error, Result};

/// A column reachable from every searchable entity's join graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    ArtistId,
    ArtistName,
    ReleaseId,
    ReleaseName,
    ReleaseCompilation,
    ReleaseDirPath,
    TrackId,
    TrackTitle,
    /// Year component of the track date
    TrackYear,
    /// Month component of the track date
    TrackMonth,
    /// Day component of the track date
    TrackDay,
    FileId,
    FilePath,
    TagName,
}

/// A literal compared against a [`Field`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Text(String),
    Int(i64),
    Bool(bool),
}

impl Value {
    /// Text value, or null when absent.
    pub fn text(value: Option<&str>) -> Self {
        value.map_or(Value::Null, |s| Value::Text(s.to_string()))
    }

    /// Integer value, or null when absent.
    pub fn id(value: Option<i64>) -> Self {
        value.map_or(Value::Null, Value::Int)
    }
}

/// A boolean filter over one search root and its joined entities.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Every child must hold. Empty means "match everything".
    And(Vec<Predicate>),
    /// At least one child must hold. Empty means "match nothing".
    Or(Vec<Predicate>),
    /// Exact, null-safe equality: `Eq(f, Null)` holds iff the field is null.
    Eq(Field, Value),
    /// Case-insensitive substring match. Never holds for a null field.
    Like(Field, String),
    /// The root entity must have at least this many distinct tags among
    /// its joined rows that satisfy the rest of the predicate.
    ///
    /// Only valid as a top-level conjunct.
    TagCountAtLeast(usize),
}

impl Predicate {
    /// The empty predicate, matching every entity.
    pub fn all() -> Self {
        Predicate::And(Vec::new())
    }

    pub fn equals(field: Field, value: impl Into<Value>) -> Self {
        Predicate::Eq(field, value.into())
    }

    pub fn like(field: Field, pattern: impl Into<String>) -> Self {
        Predicate::Like(field, pattern.into())
    }

    /// Conjunction that flattens singletons.
    pub fn and(mut parts: Vec<Predicate>) -> Self {
        if parts.len() == 1 {
            parts.remove(0)
        } else {
            Predicate::And(parts)
        }
    }

    /// Disjunction that flattens singletons.
    pub fn or(mut parts: Vec<Predicate>) -> Self {
        if parts.len() == 1 {
            parts.remove(0)
        } else {
            Predicate::Or(parts)
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Predicate::And(parts) if parts.is_empty())
    }

    /// Separate the row filter from the grouped tag-count threshold.
    ///
    /// Returns the predicate each joined row must satisfy and the largest
    /// threshold found among the top-level conjuncts. A threshold anywhere
    /// else is rejected.
    pub fn split_threshold(&self) -> Result<(Predicate, Option<usize>)> {
        match self {
            Predicate::TagCountAtLeast(n) => Ok((Predicate::all(), Some(*n))),
            Predicate::And(parts) => {
                let mut rows = Vec::with_capacity(parts.len());
                let mut threshold: Option<usize> = None;
                for part in parts {
                    if let Predicate::TagCountAtLeast(n) = part {
                        threshold = Some(threshold.map_or(*n, |t| t.max(*n)));
                    } else {
                        part.ensure_no_threshold()?;
                        rows.push(part.clone());
                    }
                }
                Ok((Predicate::and(rows), threshold))
            }
            other => {
                other.ensure_no_threshold()?;
                Ok((other.clone(), None))
            }
        }
    }

    fn ensure_no_threshold(&self) -> Result<()> {
        match self {
            Predicate::TagCountAtLeast(_) => Err(Error::query(
                "tag count threshold is only allowed as a top-level conjunct",
            )),
            Predicate::And(parts) | Predicate::Or(parts) => {
                parts.iter().try_for_each(Predicate::ensure_no_threshold)
            }
            Predicate::Eq(..) | Predicate::Like(..) => Ok(()),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}
