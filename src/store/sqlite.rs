//! SQLite catalog store.
//!
//! Uses SQLx with SQLite for lightweight, embedded database storage. The
//! schema lives in `migrations/` and is applied on open.
//!
//! Every call runs on one lazily opened transaction, so entities inserted
//! earlier in a batch are visible to later lookups before anything is
//! durable. [`CatalogStore::commit`] ends the transaction; dropping the
//! store without committing rolls it back.
//!
//! # Example
//!
//! ```ignore
//! use music_catalog::store::{sqlite::db_url, SqliteStore};
//!
//! let mut store = SqliteStore::open(&db_url(None)).await?;
//! let stats = store.stats().await?;
//! ```

use std::path::Path;

use async_trait::async_trait;
use sqlx::migrate::MigrateDatabase;
use sqlx::query::QueryAs;
use sqlx::sqlite::{SqliteArguments, SqliteConnection, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{FromRow, Sqlite, Transaction};

use super::{AttachmentOwner, CatalogStats, CatalogStore, Link, TagTarget};
use crate::error::{Result, ResultExt};
use crate::model::{
    Artist, Attachment, Entity, EntityKind, File, Release, Tag, Track, TrackFile,
};
use crate::query::sql::{self, SqlQuery};
use crate::query::{Predicate, Value};

/// Default database filename.
pub const DEFAULT_DB_NAME: &str = "music_catalog.db";

/// Largest number of ids bound into one `IN (...)` list.
const LISTING_CHUNK: usize = 500;

/// Build a SQLite database URL from an optional path.
///
/// If no path is provided, uses [`DEFAULT_DB_NAME`] in the current directory.
pub fn db_url(path: Option<&Path>) -> String {
    match path {
        Some(p) => format!("sqlite:{}", p.display()),
        None => format!("sqlite:{}", DEFAULT_DB_NAME),
    }
}

/// Initialize the database connection pool and run migrations.
///
/// Creates the database file if it doesn't exist, establishes a connection
/// pool with up to 5 connections, and runs all pending migrations.
///
/// # Errors
///
/// Returns an error if:
/// - Database creation fails
/// - Connection cannot be established
/// - Migration fails
pub async fn init_db(db_url: &str) -> std::result::Result<SqlitePool, sqlx::Error> {
    if !Sqlite::database_exists(db_url).await.unwrap_or(false) {
        Sqlite::create_database(db_url).await?;
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

/// One row of the `track_listing` view.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct TrackListing {
    pub id: i64,
    pub title: Option<String>,
    pub track_number: Option<i64>,
    pub disc_number: Option<i64>,
    pub artist_name: Option<String>,
    pub release_name: Option<String>,
}

/// [`CatalogStore`] backed by an SQLite database.
pub struct SqliteStore {
    pool: SqlitePool,
    tx: Option<Transaction<'static, Sqlite>>,
}

impl SqliteStore {
    /// Open (creating and migrating if needed) the database at `db_url`.
    pub async fn open(db_url: &str) -> Result<Self> {
        let pool = init_db(db_url)
            .await
            .with_context(format!("Failed to open catalog {db_url}"))?;
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool, tx: None }
    }

    /// The connection of the current transaction, beginning one if needed.
    async fn conn(&mut self) -> Result<&mut SqliteConnection> {
        let tx = match self.tx.take() {
            Some(tx) => tx,
            None => self.pool.begin().await?,
        };
        Ok(&mut **self.tx.insert(tx))
    }

    /// Names for the given tracks, ordered by track id.
    pub async fn track_listing(&mut self, ids: &[i64]) -> Result<Vec<TrackListing>> {
        let mut listing = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(LISTING_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let query = SqlQuery {
                sql: format!("SELECT * FROM track_listing WHERE id IN ({placeholders}) ORDER BY id"),
                binds: chunk.iter().copied().map(Value::Int).collect(),
            };
            let conn = self.conn().await?;
            listing.extend(fetch::<TrackListing>(conn, query).await?);
        }
        Ok(listing)
    }
}

fn bind_values<'q, O>(
    mut query: QueryAs<'q, Sqlite, O, SqliteArguments<'q>>,
    values: Vec<Value>,
) -> QueryAs<'q, Sqlite, O, SqliteArguments<'q>> {
    for value in values {
        query = match value {
            Value::Null => query.bind(None::<i64>),
            Value::Text(s) => query.bind(s),
            Value::Int(n) => query.bind(n),
            Value::Bool(b) => query.bind(b),
        };
    }
    query
}

async fn fetch<R>(conn: &mut SqliteConnection, query: SqlQuery) -> Result<Vec<R>>
where
    R: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
{
    let rows = bind_values(sqlx::query_as::<_, R>(&query.sql), query.binds)
        .fetch_all(conn)
        .await?;
    Ok(rows)
}

async fn fetch_by_id<R>(conn: &mut SqliteConnection, kind: EntityKind, id: i64) -> Result<Option<R>>
where
    R: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
{
    let row = sqlx::query_as::<_, R>(&sql::select_by_id(kind))
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(row)
}

/// Join table and owner column for a link.
fn link_target(link: &Link) -> (&'static str, &'static str, i64) {
    match link {
        Link::Attachment { owner, .. } => match *owner {
            AttachmentOwner::Artist(id) => ("artist_attachments", "artist_id", id),
            AttachmentOwner::Release(id) => ("release_attachments", "release_id", id),
            AttachmentOwner::Track(id) => ("track_attachments", "track_id", id),
            AttachmentOwner::TrackFile(id) => ("track_file_attachments", "track_file_id", id),
        },
        Link::Tag { target, .. } => match *target {
            TagTarget::Artist(id) => ("artist_tags", "artist_id", id),
            TagTarget::Release(id) => ("release_tags", "release_id", id),
            TagTarget::Track(id) => ("track_tags", "track_id", id),
        },
    }
}

#[async_trait]
impl CatalogStore for SqliteStore {
    async fn get(&mut self, kind: EntityKind, id: i64) -> Result<Option<Entity>> {
        let conn = self.conn().await?;
        let entity = match kind {
            EntityKind::Artist => fetch_by_id::<Artist>(conn, kind, id).await?.map(Entity::Artist),
            EntityKind::Release => fetch_by_id::<Release>(conn, kind, id).await?.map(Entity::Release),
            EntityKind::Track => fetch_by_id::<Track>(conn, kind, id).await?.map(Entity::Track),
            EntityKind::File => fetch_by_id::<File>(conn, kind, id).await?.map(Entity::File),
            EntityKind::TrackFile => fetch_by_id::<TrackFile>(conn, kind, id)
                .await?
                .map(Entity::TrackFile),
            EntityKind::Attachment => fetch_by_id::<Attachment>(conn, kind, id)
                .await?
                .map(Entity::Attachment),
            EntityKind::Tag => fetch_by_id::<Tag>(conn, kind, id).await?.map(Entity::Tag),
        };
        Ok(entity)
    }

    async fn find(&mut self, kind: EntityKind, filter: &Predicate) -> Result<Vec<Entity>> {
        let query = sql::select(kind, filter)?;
        tracing::trace!(sql = %query.sql, binds = query.binds.len(), "find");

        let conn = self.conn().await?;
        let entities = match kind {
            EntityKind::Artist => wrap(fetch::<Artist>(conn, query).await?, Entity::Artist),
            EntityKind::Release => wrap(fetch::<Release>(conn, query).await?, Entity::Release),
            EntityKind::Track => wrap(fetch::<Track>(conn, query).await?, Entity::Track),
            EntityKind::File => wrap(fetch::<File>(conn, query).await?, Entity::File),
            EntityKind::TrackFile => wrap(fetch::<TrackFile>(conn, query).await?, Entity::TrackFile),
            EntityKind::Attachment => {
                wrap(fetch::<Attachment>(conn, query).await?, Entity::Attachment)
            }
            EntityKind::Tag => wrap(fetch::<Tag>(conn, query).await?, Entity::Tag),
        };
        Ok(entities)
    }

    async fn insert(&mut self, entity: &Entity) -> Result<i64> {
        let conn = self.conn().await?;
        let result = match entity {
            Entity::Artist(a) => {
                sqlx::query("INSERT INTO artists (name, description) VALUES (?, ?)")
                    .bind(&a.name)
                    .bind(&a.description)
                    .execute(conn)
                    .await?
            }
            Entity::Release(r) => {
                sqlx::query(
                    "INSERT INTO releases (name, release_type, artist_id, date, track_total, disc_total, compilation, dirpath)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(&r.name)
                .bind(&r.release_type)
                .bind(r.artist_id)
                .bind(&r.date)
                .bind(r.track_total)
                .bind(r.disc_total)
                .bind(r.compilation)
                .bind(&r.dirpath)
                .execute(conn)
                .await?
            }
            Entity::Track(t) => {
                sqlx::query(
                    "INSERT INTO tracks (title, artist_id, release_id, track_number, disc_number, genre, date, composer, length, bpm)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(&t.title)
                .bind(t.artist_id)
                .bind(t.release_id)
                .bind(t.track_number)
                .bind(t.disc_number)
                .bind(&t.genre)
                .bind(&t.date)
                .bind(&t.composer)
                .bind(t.length)
                .bind(t.bpm)
                .execute(conn)
                .await?
            }
            Entity::File(f) => {
                sqlx::query(
                    "INSERT INTO files (path, size, added, checksum, presum) VALUES (?, ?, ?, ?, ?)",
                )
                .bind(&f.path)
                .bind(f.size)
                .bind(&f.added)
                .bind(&f.checksum)
                .bind(&f.presum)
                .execute(conn)
                .await?
            }
            Entity::TrackFile(tf) => {
                sqlx::query(
                    "INSERT INTO track_files (file_id, track_id, bitrate, format, cover_id) VALUES (?, ?, ?, ?, ?)",
                )
                .bind(tf.file_id)
                .bind(tf.track_id)
                .bind(tf.bitrate)
                .bind(&tf.format)
                .bind(tf.cover_id)
                .execute(conn)
                .await?
            }
            Entity::Attachment(x) => {
                sqlx::query("INSERT INTO attachments (file_id, name, description) VALUES (?, ?, ?)")
                    .bind(x.file_id)
                    .bind(&x.name)
                    .bind(&x.description)
                    .execute(conn)
                    .await?
            }
            Entity::Tag(g) => {
                sqlx::query("INSERT INTO tags (name, description) VALUES (?, ?)")
                    .bind(&g.name)
                    .bind(&g.description)
                    .execute(conn)
                    .await?
            }
        };
        Ok(result.last_insert_rowid())
    }

    async fn link(&mut self, link: &Link) -> Result<()> {
        let (table, column, owner_id) = link_target(link);
        let conn = self.conn().await?;
        match link {
            Link::Attachment { attachment_id, .. } => {
                sqlx::query(&format!(
                    "INSERT OR IGNORE INTO {table} ({column}, attachment_id) VALUES (?, ?)"
                ))
                .bind(owner_id)
                .bind(attachment_id)
                .execute(conn)
                .await?;
            }
            Link::Tag {
                tag_id,
                weight,
                origin,
                ..
            } => {
                sqlx::query(&format!(
                    "INSERT OR IGNORE INTO {table} ({column}, tag_id, weight, origin) VALUES (?, ?, ?, ?)"
                ))
                .bind(owner_id)
                .bind(tag_id)
                .bind(weight)
                .bind(origin.as_str())
                .execute(conn)
                .await?;
            }
        }
        Ok(())
    }

    async fn stats(&mut self) -> Result<CatalogStats> {
        let conn = self.conn().await?;
        let stats = sqlx::query_as::<_, CatalogStats>(
            "SELECT
                (SELECT COUNT(*) FROM artists) AS artists,
                (SELECT COUNT(*) FROM releases) AS releases,
                (SELECT COUNT(*) FROM tracks) AS tracks,
                (SELECT COUNT(*) FROM files) AS files,
                (SELECT COUNT(*) FROM attachments) AS attachments,
                (SELECT COUNT(*) FROM tags) AS tags,
                (SELECT COALESCE(SUM(size), 0) FROM files) AS total_bytes,
                (SELECT COALESCE(SUM(length), 0) FROM tracks) AS total_seconds",
        )
        .fetch_one(conn)
        .await?;
        Ok(stats)
    }

    async fn commit(&mut self) -> Result<()> {
        if let Some(tx) = self.tx.take() {
            tx.commit().await.with_context("Failed to commit catalog")?;
            tracing::debug!("Committed transaction");
        }
        Ok(())
    }
}

fn wrap<R>(rows: Vec<R>, into: fn(R) -> Entity) -> Vec<Entity> {
    rows.into_iter().map(into).collect()
}
