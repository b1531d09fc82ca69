//! In-memory catalog store.
//!
//! Evaluates [`Predicate`] trees directly over the same outer-join graph the
//! SQLite store renders, so resolver and query tests run deterministically
//! without a database. Ids are assigned sequentially from 1 per kind.

use async_trait::async_trait;

use super::{AttachmentOwner, CatalogStats, CatalogStore, Link, TagTarget};
use crate::error::{Error, Result};
use crate::model::{Artist, Attachment, Entity, EntityKind, File, Release, Tag, Track, TrackFile};
use crate::query::{Field, Predicate, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct TagLink {
    pub target: TagTarget,
    pub tag_id: i64,
    pub weight: f64,
    pub origin: String,
}

/// Catalog held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    artists: Vec<Artist>,
    releases: Vec<Release>,
    tracks: Vec<Track>,
    files: Vec<File>,
    track_files: Vec<TrackFile>,
    attachments: Vec<Attachment>,
    tags: Vec<Tag>,
    attachment_links: Vec<(AttachmentOwner, i64)>,
    tag_links: Vec<TagLink>,
    commits: usize,
}

/// One joined row of the search graph.
#[derive(Debug, Clone, Copy, Default)]
struct Row<'a> {
    artist: Option<&'a Artist>,
    release: Option<&'a Release>,
    track: Option<&'a Track>,
    file: Option<&'a File>,
    tag: Option<&'a Tag>,
}

#[derive(Debug, Clone, Copy)]
enum Scalar<'a> {
    Text(&'a str),
    Int(i64),
    Bool(bool),
}

fn by_id<T>(items: &[T], id: Option<i64>) -> Option<&T> {
    let index = usize::try_from(id?).ok()?.checked_sub(1)?;
    items.get(index)
}

fn next_id(len: usize) -> i64 {
    len as i64 + 1
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of completed [`CatalogStore::commit`] calls.
    pub fn commits(&self) -> usize {
        self.commits
    }

    pub fn attachment_links(&self) -> &[(AttachmentOwner, i64)] {
        &self.attachment_links
    }

    pub fn tag_links(&self) -> &[TagLink] {
        &self.tag_links
    }

    fn tags_of(&self, target: TagTarget) -> Vec<&Tag> {
        self.tag_links
            .iter()
            .filter(|link| link.target == target)
            .filter_map(|link| by_id(&self.tags, Some(link.tag_id)))
            .collect()
    }

    /// Fan a row out over the track's files.
    fn with_files<'a>(&'a self, base: Row<'a>) -> Vec<Row<'a>> {
        let Some(track_id) = base.track.and_then(|t| t.id) else {
            return vec![base];
        };
        let rows: Vec<Row<'a>> = self
            .track_files
            .iter()
            .filter(|tf| tf.track_id == track_id)
            .map(|tf| Row {
                file: by_id(&self.files, Some(tf.file_id)),
                ..base
            })
            .collect();
        if rows.is_empty() { vec![base] } else { rows }
    }

    /// Row for a track file and everything reachable through its track.
    fn track_file_row<'a>(&'a self, tf: &'a TrackFile) -> Row<'a> {
        let track = by_id(&self.tracks, Some(tf.track_id));
        Row {
            file: by_id(&self.files, Some(tf.file_id)),
            track,
            artist: by_id(&self.artists, track.and_then(|t| t.artist_id)),
            release: by_id(&self.releases, track.and_then(|t| t.release_id)),
            tag: None,
        }
    }

    /// Fan rows out over the track's tags.
    fn with_track_tags<'a>(&'a self, rows: Vec<Row<'a>>) -> Vec<Row<'a>> {
        rows.into_iter()
            .flat_map(|row| {
                let tags = row
                    .track
                    .and_then(|t| t.id)
                    .map(|id| self.tags_of(TagTarget::Track(id)))
                    .unwrap_or_default();
                with_tags(vec![row], &tags)
            })
            .collect()
    }

    /// Joined rows for every root entity of `kind`.
    fn graph(&self, kind: EntityKind) -> Vec<(Entity, Vec<Row<'_>>)> {
        match kind {
            EntityKind::Track => self
                .tracks
                .iter()
                .map(|t| {
                    let base = Row {
                        track: Some(t),
                        artist: by_id(&self.artists, t.artist_id),
                        release: by_id(&self.releases, t.release_id),
                        ..Row::default()
                    };
                    let rows = self.with_track_tags(self.with_files(base));
                    (Entity::Track(t.clone()), rows)
                })
                .collect(),
            EntityKind::Release => self
                .releases
                .iter()
                .map(|r| {
                    let base = Row {
                        release: Some(r),
                        artist: by_id(&self.artists, r.artist_id),
                        ..Row::default()
                    };
                    let mut rows: Vec<Row<'_>> = self
                        .tracks
                        .iter()
                        .filter(|t| r.id.is_some() && t.release_id == r.id)
                        .flat_map(|t| {
                            self.with_files(Row {
                                track: Some(t),
                                ..base
                            })
                        })
                        .collect();
                    if rows.is_empty() {
                        rows.push(base);
                    }
                    let tags = r
                        .id
                        .map(|id| self.tags_of(TagTarget::Release(id)))
                        .unwrap_or_default();
                    (Entity::Release(r.clone()), with_tags(rows, &tags))
                })
                .collect(),
            EntityKind::Artist => self
                .artists
                .iter()
                .map(|a| {
                    let base = Row {
                        artist: Some(a),
                        ..Row::default()
                    };
                    let mut rows: Vec<Row<'_>> = self
                        .tracks
                        .iter()
                        .filter(|t| a.id.is_some() && t.artist_id == a.id)
                        .flat_map(|t| {
                            self.with_files(Row {
                                track: Some(t),
                                release: by_id(&self.releases, t.release_id),
                                ..base
                            })
                        })
                        .collect();
                    if rows.is_empty() {
                        rows.push(base);
                    }
                    let tags = a
                        .id
                        .map(|id| self.tags_of(TagTarget::Artist(id)))
                        .unwrap_or_default();
                    (Entity::Artist(a.clone()), with_tags(rows, &tags))
                })
                .collect(),
            EntityKind::TrackFile => self
                .track_files
                .iter()
                .map(|tf| {
                    let rows = self.with_track_tags(vec![self.track_file_row(tf)]);
                    (Entity::TrackFile(tf.clone()), rows)
                })
                .collect(),
            EntityKind::File => self
                .files
                .iter()
                .map(|f| {
                    let mut rows: Vec<Row<'_>> = self
                        .track_files
                        .iter()
                        .filter(|tf| f.id == Some(tf.file_id))
                        .map(|tf| self.track_file_row(tf))
                        .collect();
                    if rows.is_empty() {
                        rows.push(Row {
                            file: Some(f),
                            ..Row::default()
                        });
                    }
                    (Entity::File(f.clone()), self.with_track_tags(rows))
                })
                .collect(),
            EntityKind::Attachment => self
                .attachments
                .iter()
                .map(|x| {
                    let row = Row {
                        file: by_id(&self.files, Some(x.file_id)),
                        ..Row::default()
                    };
                    (Entity::Attachment(x.clone()), vec![row])
                })
                .collect(),
            EntityKind::Tag => self
                .tags
                .iter()
                .map(|g| {
                    let row = Row {
                        tag: Some(g),
                        ..Row::default()
                    };
                    (Entity::Tag(g.clone()), vec![row])
                })
                .collect(),
        }
    }
}

fn with_tags<'a>(rows: Vec<Row<'a>>, tags: &[&'a Tag]) -> Vec<Row<'a>> {
    if tags.is_empty() {
        return rows;
    }
    rows.into_iter()
        .flat_map(|row| {
            tags.iter().map(move |tag| Row {
                tag: Some(*tag),
                ..row
            })
        })
        .collect()
}

/// Whether `field` exists in the join graph of `kind`.
fn reachable(kind: EntityKind, field: Field) -> bool {
    match kind {
        EntityKind::Attachment => matches!(field, Field::FileId | Field::FilePath),
        EntityKind::Tag => matches!(field, Field::TagName),
        _ => true,
    }
}

fn check_reachable(kind: EntityKind, predicate: &Predicate) -> Result<()> {
    match predicate {
        Predicate::And(parts) | Predicate::Or(parts) => parts
            .iter()
            .try_for_each(|part| check_reachable(kind, part)),
        Predicate::Eq(field, _) | Predicate::Like(field, _) => {
            if reachable(kind, *field) {
                Ok(())
            } else {
                Err(Error::query(format!(
                    "{field:?} is not reachable when searching {kind:?}"
                )))
            }
        }
        Predicate::TagCountAtLeast(_) => Ok(()),
    }
}

/// Year, month or day of an ISO partial date; zero or missing is null.
fn date_component(date: Option<&str>, range: std::ops::Range<usize>) -> Option<i64> {
    date?.get(range)?.parse::<i64>().ok().filter(|n| *n != 0)
}

fn field_value<'a>(row: &Row<'a>, field: Field) -> Option<Scalar<'a>> {
    match field {
        Field::ArtistId => row.artist.and_then(|a| a.id).map(Scalar::Int),
        Field::ArtistName => row.artist.and_then(|a| a.name.as_deref()).map(Scalar::Text),
        Field::ReleaseId => row.release.and_then(|r| r.id).map(Scalar::Int),
        Field::ReleaseName => row.release.and_then(|r| r.name.as_deref()).map(Scalar::Text),
        Field::ReleaseCompilation => row.release.and_then(|r| r.compilation).map(Scalar::Bool),
        Field::ReleaseDirPath => row.release.and_then(|r| r.dirpath.as_deref()).map(Scalar::Text),
        Field::TrackId => row.track.and_then(|t| t.id).map(Scalar::Int),
        Field::TrackTitle => row.track.and_then(|t| t.title.as_deref()).map(Scalar::Text),
        Field::TrackYear => date_component(row.track.and_then(|t| t.date.as_deref()), 0..4).map(Scalar::Int),
        Field::TrackMonth => date_component(row.track.and_then(|t| t.date.as_deref()), 5..7).map(Scalar::Int),
        Field::TrackDay => date_component(row.track.and_then(|t| t.date.as_deref()), 8..10).map(Scalar::Int),
        Field::FileId => row.file.and_then(|f| f.id).map(Scalar::Int),
        Field::FilePath => row.file.map(|f| Scalar::Text(f.path.as_str())),
        Field::TagName => row.tag.map(|g| Scalar::Text(g.name.as_str())),
    }
}

fn equals(scalar: Scalar<'_>, value: &Value) -> bool {
    match (scalar, value) {
        (Scalar::Text(a), Value::Text(b)) => a == b,
        (Scalar::Int(a), Value::Int(b)) => a == *b,
        (Scalar::Bool(a), Value::Bool(b)) => a == *b,
        (Scalar::Bool(a), Value::Int(b)) => i64::from(a) == *b,
        (Scalar::Int(a), Value::Bool(b)) => a == i64::from(*b),
        _ => false,
    }
}

/// SQLite `LIKE '%pattern%'`: ASCII case-insensitive substring.
fn like(scalar: Scalar<'_>, pattern: &str) -> bool {
    let haystack = match scalar {
        Scalar::Text(s) => s.to_ascii_lowercase(),
        Scalar::Int(n) => n.to_string(),
        Scalar::Bool(b) => i64::from(b).to_string(),
    };
    haystack.contains(&pattern.to_ascii_lowercase())
}

fn eval(predicate: &Predicate, row: &Row<'_>) -> bool {
    match predicate {
        Predicate::And(parts) => parts.iter().all(|p| eval(p, row)),
        Predicate::Or(parts) => parts.iter().any(|p| eval(p, row)),
        Predicate::Eq(field, Value::Null) => field_value(row, *field).is_none(),
        Predicate::Eq(field, value) => field_value(row, *field).is_some_and(|s| equals(s, value)),
        Predicate::Like(field, pattern) => field_value(row, *field).is_some_and(|s| like(s, pattern)),
        // Removed by split_threshold before evaluation
        Predicate::TagCountAtLeast(_) => false,
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn get(&mut self, kind: EntityKind, id: i64) -> Result<Option<Entity>> {
        let id = Some(id);
        Ok(match kind {
            EntityKind::Artist => by_id(&self.artists, id).cloned().map(Entity::Artist),
            EntityKind::Release => by_id(&self.releases, id).cloned().map(Entity::Release),
            EntityKind::Track => by_id(&self.tracks, id).cloned().map(Entity::Track),
            EntityKind::File => by_id(&self.files, id).cloned().map(Entity::File),
            EntityKind::TrackFile => by_id(&self.track_files, id).cloned().map(Entity::TrackFile),
            EntityKind::Attachment => by_id(&self.attachments, id).cloned().map(Entity::Attachment),
            EntityKind::Tag => by_id(&self.tags, id).cloned().map(Entity::Tag),
        })
    }

    async fn find(&mut self, kind: EntityKind, filter: &Predicate) -> Result<Vec<Entity>> {
        let (rows_filter, threshold) = filter.split_threshold()?;
        check_reachable(kind, &rows_filter)?;
        if threshold.is_some() && matches!(kind, EntityKind::Attachment) {
            return Err(Error::query(format!("{kind:?} cannot be tagged")));
        }

        let mut matches = Vec::new();
        for (entity, rows) in self.graph(kind) {
            let passing: Vec<&Row<'_>> = rows.iter().filter(|row| eval(&rows_filter, row)).collect();
            if passing.is_empty() {
                continue;
            }
            if let Some(n) = threshold {
                let mut tag_ids: Vec<i64> = passing
                    .iter()
                    .filter_map(|row| row.tag.and_then(|g| g.id))
                    .collect();
                tag_ids.sort_unstable();
                tag_ids.dedup();
                if tag_ids.len() < n {
                    continue;
                }
            }
            matches.push(entity);
        }
        Ok(matches)
    }

    async fn insert(&mut self, entity: &Entity) -> Result<i64> {
        let id = match entity.clone() {
            Entity::Artist(mut e) => {
                let id = next_id(self.artists.len());
                e.id = Some(id);
                self.artists.push(e);
                id
            }
            Entity::Release(mut e) => {
                let id = next_id(self.releases.len());
                e.id = Some(id);
                self.releases.push(e);
                id
            }
            Entity::Track(mut e) => {
                let id = next_id(self.tracks.len());
                e.id = Some(id);
                self.tracks.push(e);
                id
            }
            Entity::File(mut e) => {
                let id = next_id(self.files.len());
                e.id = Some(id);
                self.files.push(e);
                id
            }
            Entity::TrackFile(mut e) => {
                let id = next_id(self.track_files.len());
                e.id = Some(id);
                self.track_files.push(e);
                id
            }
            Entity::Attachment(mut e) => {
                let id = next_id(self.attachments.len());
                e.id = Some(id);
                self.attachments.push(e);
                id
            }
            Entity::Tag(mut e) => {
                let id = next_id(self.tags.len());
                e.id = Some(id);
                self.tags.push(e);
                id
            }
        };
        Ok(id)
    }

    async fn link(&mut self, link: &Link) -> Result<()> {
        match link {
            Link::Attachment {
                owner,
                attachment_id,
            } => {
                let pair = (*owner, *attachment_id);
                if !self.attachment_links.contains(&pair) {
                    self.attachment_links.push(pair);
                }
            }
            Link::Tag {
                target,
                tag_id,
                weight,
                origin,
            } => {
                let exists = self
                    .tag_links
                    .iter()
                    .any(|l| l.target == *target && l.tag_id == *tag_id);
                if !exists {
                    self.tag_links.push(TagLink {
                        target: *target,
                        tag_id: *tag_id,
                        weight: *weight,
                        origin: origin.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    async fn stats(&mut self) -> Result<CatalogStats> {
        Ok(CatalogStats {
            artists: self.artists.len() as i64,
            releases: self.releases.len() as i64,
            tracks: self.tracks.len() as i64,
            files: self.files.len() as i64,
            attachments: self.attachments.len() as i64,
            tags: self.tags.len() as i64,
            total_bytes: self.files.iter().filter_map(|f| f.size).sum(),
            total_seconds: self.tracks.iter().filter_map(|t| t.length).sum(),
        })
    }

    async fn commit(&mut self) -> Result<()> {
        self.commits += 1;
        Ok(())
    }
}
