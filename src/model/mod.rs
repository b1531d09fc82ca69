//! Core data models for the music catalog.
//!
//! Defines the catalog entities: [`Artist`], [`Release`], [`Track`],
//! [`File`], [`TrackFile`], [`Attachment`] and [`Tag`]. Each is a plain
//! struct with a fixed field set, derived from SQLx for database mapping.
//!
//! Identifiers are store-assigned surrogate keys. An entity with
//! `id == None` has not been inserted yet.
//!
//! # Database Schema
//!
//! The models map to the following tables:
//! - `artists` - Artists, matched heuristically by name
//! - `releases` - Releases with optional artist reference
//! - `tracks` - Tracks with optional artist and release references
//! - `files` - Files on disk, keyed naturally by path
//! - `track_files` - One file backing one track
//! - `attachments` - Non-audio files (covers, logs, cue sheets)
//! - `tags` - User tags, linked through weighted join tables

use sqlx::FromRow;

/// The kinds of entity a catalog store holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Artist,
    Release,
    Track,
    File,
    TrackFile,
    Attachment,
    Tag,
}

impl EntityKind {
    /// Table backing this kind.
    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::Artist => "artists",
            EntityKind::Release => "releases",
            EntityKind::Track => "tracks",
            EntityKind::File => "files",
            EntityKind::TrackFile => "track_files",
            EntityKind::Attachment => "attachments",
            EntityKind::Tag => "tags",
        }
    }
}

/// An artist in the catalog.
#[derive(Debug, Clone, Default, PartialEq, FromRow)]
pub struct Artist {
    /// Database ID (None until inserted)
    pub id: Option<i64>,
    /// Artist name; an unnamed artist can never be matched again
    pub name: Option<String>,
    pub description: Option<String>,
}

/// A release (album, EP, single, compilation).
#[derive(Debug, Clone, Default, PartialEq, FromRow)]
pub struct Release {
    pub id: Option<i64>,
    pub name: Option<String>,
    /// Free-form release type ("album", "ep", ...)
    pub release_type: Option<String>,
    /// Owning artist, if any
    pub artist_id: Option<i64>,
    /// ISO partial date
    pub date: Option<String>,
    pub track_total: Option<i64>,
    pub disc_total: Option<i64>,
    /// Compilation releases never match by artist
    pub compilation: Option<bool>,
    /// Directory the release was first imported from
    pub dirpath: Option<String>,
}

/// A track, independent of the files that back it.
#[derive(Debug, Clone, Default, PartialEq, FromRow)]
pub struct Track {
    pub id: Option<i64>,
    pub title: Option<String>,
    pub artist_id: Option<i64>,
    pub release_id: Option<i64>,
    pub track_number: Option<i64>,
    pub disc_number: Option<i64>,
    pub genre: Option<String>,
    /// ISO partial date (`YYYY`, `YYYY-MM` or `YYYY-MM-DD`)
    pub date: Option<String>,
    pub composer: Option<String>,
    /// Length in seconds
    pub length: Option<i64>,
    pub bpm: Option<i64>,
}

/// A file on disk.
#[derive(Debug, Clone, Default, PartialEq, FromRow)]
pub struct File {
    pub id: Option<i64>,
    /// Absolute path (natural key for duplicate-import skipping)
    pub path: String,
    /// Size in bytes
    pub size: Option<i64>,
    /// RFC 3339 timestamp of the import that registered the file
    pub added: Option<String>,
    /// SHA-256 of the whole file, computed on request
    pub checksum: Option<String>,
    /// SHA-256 of the first 2048 bytes, computed on request
    pub presum: Option<String>,
}

/// A file backing a track. A track may have several (re-rips).
#[derive(Debug, Clone, Default, PartialEq, FromRow)]
pub struct TrackFile {
    pub id: Option<i64>,
    pub file_id: i64,
    pub track_id: i64,
    /// Bitrate in kbps
    pub bitrate: Option<i64>,
    pub format: Option<String>,
    /// Cover attachment, if the directory had one
    pub cover_id: Option<i64>,
}

/// A non-audio file attached to artists, releases, tracks or track files.
#[derive(Debug, Clone, Default, PartialEq, FromRow)]
pub struct Attachment {
    pub id: Option<i64>,
    pub file_id: i64,
    pub name: Option<String>,
    pub description: Option<String>,
}

/// A user tag.
#[derive(Debug, Clone, Default, PartialEq, FromRow)]
pub struct Tag {
    pub id: Option<i64>,
    pub name: String,
    pub description: Option<String>,
}

/// Any catalog entity, as exchanged with a [`crate::store::CatalogStore`].
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Artist(Artist),
    Release(Release),
    Track(Track),
    File(File),
    TrackFile(TrackFile),
    Attachment(Attachment),
    Tag(Tag),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Artist(_) => EntityKind::Artist,
            Entity::Release(_) => EntityKind::Release,
            Entity::Track(_) => EntityKind::Track,
            Entity::File(_) => EntityKind::File,
            Entity::TrackFile(_) => EntityKind::TrackFile,
            Entity::Attachment(_) => EntityKind::Attachment,
            Entity::Tag(_) => EntityKind::Tag,
        }
    }

    pub fn id(&self) -> Option<i64> {
        match self {
            Entity::Artist(e) => e.id,
            Entity::Release(e) => e.id,
            Entity::Track(e) => e.id,
            Entity::File(e) => e.id,
            Entity::TrackFile(e) => e.id,
            Entity::Attachment(e) => e.id,
            Entity::Tag(e) => e.id,
        }
    }
}

/// A concrete entity struct that can be converted to and from [`Entity`].
pub trait Record: Clone + Sized + Send + Sync {
    const KIND: EntityKind;

    fn id(&self) -> Option<i64>;
    fn set_id(&mut self, id: i64);
    fn to_entity(&self) -> Entity;
    /// Unwrap an [`Entity`] of this kind, handing back anything else.
    fn from_entity(entity: Entity) -> std::result::Result<Self, Entity>;
}

macro_rules! impl_record {
    ($ty:ident) => {
        impl Record for $ty {
            const KIND: EntityKind = EntityKind::$ty;

            fn id(&self) -> Option<i64> {
                self.id
            }

            fn set_id(&mut self, id: i64) {
                self.id = Some(id);
            }

            fn to_entity(&self) -> Entity {
                Entity::$ty(self.clone())
            }

            fn from_entity(entity: Entity) -> std::result::Result<Self, Entity> {
                match entity {
                    Entity::$ty(inner) => Ok(inner),
                    other => Err(other),
                }
            }
        }

        impl From<$ty> for Entity {
            fn from(value: $ty) -> Self {
                Entity::$ty(value)
            }
        }
    };
}

impl_record!(Artist);
impl_record!(Release);
impl_record!(Track);
impl_record!(File);
impl_record!(TrackFile);
impl_record!(Attachment);
impl_record!(Tag);
