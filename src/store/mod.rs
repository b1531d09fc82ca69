//! Catalog persistence.
//!
//! [`CatalogStore`] is the handle the resolver, the importer and the CLI
//! are given explicitly. Two implementations exist:
//! - [`SqliteStore`] - SQLx over an embedded SQLite database
//! - [`MemoryStore`] - an in-memory double with the same search semantics
//!
//! Calls are awaited one at a time. A store is owned by a single import or
//! command and is not shared between tasks.
//!
//! # Example
//!
//! ```ignore
//! use music_catalog::store::{self, SqliteStore};
//!
//! let mut store = SqliteStore::open("sqlite:music_catalog.db").await?;
//! let artists: Vec<Artist> = store::find(&mut store, &compile(&["artist:Bob"])).await?;
//! ```

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::model::{Entity, EntityKind, Record};
use crate::query::Predicate;

/// Owner side of an attachment link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentOwner {
    Artist(i64),
    Release(i64),
    Track(i64),
    TrackFile(i64),
}

/// Entity side of a tag link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagTarget {
    Artist(i64),
    Release(i64),
    Track(i64),
}

/// A many-to-many association. Linking an existing pair again is a no-op.
#[derive(Debug, Clone, PartialEq)]
pub enum Link {
    Attachment {
        owner: AttachmentOwner,
        attachment_id: i64,
    },
    Tag {
        target: TagTarget,
        tag_id: i64,
        weight: f64,
        origin: String,
    },
}

/// Aggregate figures about the whole catalog.
#[derive(Debug, Clone, Default, PartialEq, sqlx::FromRow)]
pub struct CatalogStats {
    pub artists: i64,
    pub releases: i64,
    pub tracks: i64,
    pub files: i64,
    pub attachments: i64,
    pub tags: i64,
    /// Sum of all file sizes in bytes
    pub total_bytes: i64,
    /// Sum of all track lengths in seconds
    pub total_seconds: i64,
}

/// Collection-oriented catalog storage.
///
/// Implement this trait to substitute the storage backend in tests.
#[async_trait]
pub trait CatalogStore: Send {
    /// Fetch one entity by its surrogate key.
    async fn get(&mut self, kind: EntityKind, id: i64) -> Result<Option<Entity>>;

    /// All entities of `kind` satisfying `filter`, ordered by id.
    async fn find(&mut self, kind: EntityKind, filter: &Predicate) -> Result<Vec<Entity>>;

    /// Insert a new entity, ignoring any id it carries, and return the
    /// assigned id.
    async fn insert(&mut self, entity: &Entity) -> Result<i64>;

    /// Record a many-to-many association.
    async fn link(&mut self, link: &Link) -> Result<()>;

    /// Counts and totals over the catalog.
    async fn stats(&mut self) -> Result<CatalogStats>;

    /// Make everything written so far durable.
    async fn commit(&mut self) -> Result<()>;
}

fn expect<R: Record>(entity: Entity) -> Result<R> {
    R::from_entity(entity).map_err(|other| Error::KindMismatch {
        expected: R::KIND,
        found: other.kind(),
    })
}

/// Typed [`CatalogStore::get`].
pub async fn get<R, S>(store: &mut S, id: i64) -> Result<Option<R>>
where
    R: Record,
    S: CatalogStore + ?Sized,
{
    store.get(R::KIND, id).await?.map(expect).transpose()
}

/// Typed [`CatalogStore::find`].
pub async fn find<R, S>(store: &mut S, filter: &Predicate) -> Result<Vec<R>>
where
    R: Record,
    S: CatalogStore + ?Sized,
{
    store
        .find(R::KIND, filter)
        .await?
        .into_iter()
        .map(expect)
        .collect()
}

/// The first match in natural retrieval order.
///
/// Several candidates are not an error: the lowest id wins.
pub async fn first<R, S>(store: &mut S, filter: &Predicate) -> Result<Option<R>>
where
    R: Record,
    S: CatalogStore + ?Sized,
{
    let mut matches = find::<R, S>(store, filter).await?;
    if matches.len() > 1 {
        tracing::debug!(
            kind = ?R::KIND,
            candidates = matches.len(),
            "Ambiguous match, taking the first candidate"
        );
    }
    Ok(if matches.is_empty() {
        None
    } else {
        Some(matches.swap_remove(0))
    })
}

/// Insert a record and store the assigned id on it.
pub async fn insert<R, S>(store: &mut S, record: &mut R) -> Result<i64>
where
    R: Record,
    S: CatalogStore + ?Sized,
{
    let id = store.insert(&record.to_entity()).await?;
    record.set_id(id);
    Ok(id)
}
