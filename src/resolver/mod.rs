//! Entity resolution: one file's tags to shared Artist, Release and Track
//! records.
//!
//! Matching is heuristic and order-sensitive:
//!
//! 1. A file whose track already has both an artist and a release is left
//!    alone, so re-importing is idempotent.
//! 2. The artist comes from the `artist` tag, falling back to
//!    `album_artist`. An unnamed artist is never created.
//! 3. A release matches by name, by compilation flag when known, and by
//!    artist name unless the release is a compilation.
//! 4. A track matches by title, artist and release with null-safe
//!    equality: a track without an artist never matches one with an
//!    artist.
//! 5. The file is paired with the track unless that pairing exists.
//!
//! Several candidates are not an error; the lowest id wins.
//!
//! New entities are inserted right away so later files in the same batch
//! find them. Making them durable is the caller's job
//! ([`CatalogStore::commit`]).

use std::path::Path;

use crate::error::Result;
use crate::metadata::TrackMetadata;
use crate::model::{Artist, File, Release, Track, TrackFile};
use crate::query::{Field, Predicate, Value};
use crate::store::{self, AttachmentOwner, CatalogStore, Link};

/// Attachments found next to an audio file, already stored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DirectoryAttachments {
    /// Attachment ids linked to every new track file of the directory
    pub attachment_ids: Vec<i64>,
    /// Cover image of the directory
    pub cover_id: Option<i64>,
}

/// Number of entities a resolution created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Created {
    pub artists: usize,
    pub releases: usize,
    pub tracks: usize,
    pub track_files: usize,
}

impl std::ops::AddAssign for Created {
    fn add_assign(&mut self, other: Self) {
        self.artists += other.artists;
        self.releases += other.releases;
        self.tracks += other.tracks;
        self.track_files += other.track_files;
    }
}

/// Outcome of resolving one file.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTrack {
    pub track: Track,
    pub artist: Option<Artist>,
    pub release: Option<Release>,
    /// Pairing created or found for this file; `None` when skipped
    pub track_file: Option<TrackFile>,
    /// The file was already fully resolved and nothing was touched
    pub skipped: bool,
    pub created: Created,
}

/// Text field that is present and non-blank.
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// The track already imported from `path`, if it has both an artist and a
/// release.
pub async fn lookup_imported<S>(store: &mut S, path: &str) -> Result<Option<Track>>
where
    S: CatalogStore + ?Sized,
{
    let pairings: Vec<TrackFile> =
        store::find(store, &Predicate::equals(Field::FilePath, path)).await?;
    for pairing in pairings {
        let track: Option<Track> = store::get(store, pairing.track_id).await?;
        if let Some(track) = track
            && track.artist_id.is_some()
            && track.release_id.is_some()
        {
            return Ok(Some(track));
        }
    }
    Ok(None)
}

/// Resolve `meta` read from the file at `path` to catalog entities.
///
/// `file` is the catalog record of `path`. Its stored path may be a lossy
/// rendering of a non-UTF-8 name, so the disk is only ever checked through
/// `path`. Returns `Ok(None)` without touching the store when the file no
/// longer exists.
pub async fn resolve<S>(
    store: &mut S,
    path: &Path,
    file: &File,
    meta: &TrackMetadata,
    attachments: &DirectoryAttachments,
) -> Result<Option<ResolvedTrack>>
where
    S: CatalogStore + ?Sized,
{
    if !path.exists() {
        tracing::debug!(path = %path.display(), "File missing, not resolving");
        return Ok(None);
    }

    if let Some(track) = lookup_imported(store, &file.path).await? {
        tracing::trace!(path = %file.path, "Already imported");
        return Ok(Some(ResolvedTrack {
            track,
            artist: None,
            release: None,
            track_file: None,
            skipped: true,
            created: Created::default(),
        }));
    }

    let mut created = Created::default();

    let file_id = match file.id {
        Some(id) => id,
        None => store::insert(store, &mut file.clone()).await?,
    };

    let artist_name = present(&meta.artist).or_else(|| present(&meta.album_artist));
    let artist = match artist_name {
        Some(name) => Some(artist_by_name(store, name, &mut created).await?),
        None => None,
    };

    let release = match present(&meta.album) {
        Some(album) => {
            Some(resolve_release(store, album, meta, artist.as_ref(), path, attachments, &mut created).await?)
        }
        None => None,
    };

    let track = resolve_track(store, meta, artist.as_ref(), release.as_ref(), &mut created).await?;

    let track_file = pair_file(store, file_id, &track, meta, attachments, &mut created).await?;

    tracing::debug!(
        path = %file.path,
        track_id = ?track.id,
        artist_id = ?track.artist_id,
        release_id = ?track.release_id,
        "Resolved"
    );

    Ok(Some(ResolvedTrack {
        track,
        artist,
        release,
        track_file: Some(track_file),
        skipped: false,
        created,
    }))
}

/// First artist with exactly this name, or a new one.
async fn artist_by_name<S>(store: &mut S, name: &str, created: &mut Created) -> Result<Artist>
where
    S: CatalogStore + ?Sized,
{
    if let Some(artist) = store::first(store, &Predicate::equals(Field::ArtistName, name)).await? {
        return Ok(artist);
    }

    let mut artist = Artist {
        name: Some(name.to_string()),
        ..Default::default()
    };
    store::insert(store, &mut artist).await?;
    created.artists += 1;
    tracing::debug!(name, "Created artist");
    Ok(artist)
}

/// Candidate filter for an existing release.
fn release_filter(album: &str, meta: &TrackMetadata, artist: Option<&Artist>) -> Predicate {
    let mut parts = vec![Predicate::equals(Field::ReleaseName, album)];

    if let Some(compilation) = meta.compilation {
        parts.push(Predicate::equals(Field::ReleaseCompilation, compilation));
    }

    if meta.compilation != Some(true) {
        let owner = present(&meta.album_artist).or_else(|| artist.and_then(|a| a.name.as_deref()));
        if let Some(owner) = owner {
            parts.push(Predicate::equals(Field::ArtistName, owner));
            // Compilations never match by artist, even with an unknown flag
            if meta.compilation.is_none() {
                parts.push(Predicate::Or(vec![
                    Predicate::equals(Field::ReleaseCompilation, false),
                    Predicate::Eq(Field::ReleaseCompilation, Value::Null),
                ]));
            }
        }
    }

    Predicate::and(parts)
}

async fn resolve_release<S>(
    store: &mut S,
    album: &str,
    meta: &TrackMetadata,
    artist: Option<&Artist>,
    path: &Path,
    attachments: &DirectoryAttachments,
    created: &mut Created,
) -> Result<Release>
where
    S: CatalogStore + ?Sized,
{
    if let Some(release) = store::first(store, &release_filter(album, meta, artist)).await? {
        return Ok(release);
    }

    let owner = match present(&meta.album_artist) {
        Some(album_artist) => match artist {
            Some(a) if a.name.as_deref() == Some(album_artist) => Some(a.clone()),
            _ => Some(artist_by_name(store, album_artist, created).await?),
        },
        None => artist.cloned(),
    };

    let mut release = Release {
        name: Some(album.to_string()),
        artist_id: owner.and_then(|a| a.id),
        track_total: meta.track_total,
        disc_total: meta.disc_total,
        compilation: meta.compilation,
        dirpath: path
            .parent()
            .map(|dir| dir.to_string_lossy().into_owned()),
        ..Default::default()
    };
    let release_id = store::insert(store, &mut release).await?;
    created.releases += 1;

    if let Some(cover_id) = attachments.cover_id {
        store
            .link(&Link::Attachment {
                owner: AttachmentOwner::Release(release_id),
                attachment_id: cover_id,
            })
            .await?;
    }

    tracing::debug!(album, release_id, "Created release");
    Ok(release)
}

async fn resolve_track<S>(
    store: &mut S,
    meta: &TrackMetadata,
    artist: Option<&Artist>,
    release: Option<&Release>,
    created: &mut Created,
) -> Result<Track>
where
    S: CatalogStore + ?Sized,
{
    let artist_id = artist.and_then(|a| a.id);
    let release_id = release.and_then(|r| r.id);

    if let Some(title) = present(&meta.title) {
        let filter = Predicate::And(vec![
            Predicate::equals(Field::TrackTitle, title),
            Predicate::Eq(Field::ArtistId, Value::id(artist_id)),
            Predicate::Eq(Field::ReleaseId, Value::id(release_id)),
        ]);
        if let Some(track) = store::first(store, &filter).await? {
            return Ok(track);
        }
    }

    let mut track = Track {
        title: present(&meta.title).map(str::to_string),
        artist_id,
        release_id,
        track_number: meta.track_number,
        disc_number: meta.disc_number,
        genre: meta.genre.clone(),
        date: meta.date.clone(),
        composer: meta.composer.clone(),
        length: meta.length,
        bpm: meta.bpm,
        ..Default::default()
    };
    store::insert(store, &mut track).await?;
    created.tracks += 1;
    Ok(track)
}

async fn pair_file<S>(
    store: &mut S,
    file_id: i64,
    track: &Track,
    meta: &TrackMetadata,
    attachments: &DirectoryAttachments,
    created: &mut Created,
) -> Result<TrackFile>
where
    S: CatalogStore + ?Sized,
{
    let track_id = track.id.unwrap_or_default();
    let filter = Predicate::And(vec![
        Predicate::equals(Field::FileId, file_id),
        Predicate::equals(Field::TrackId, track_id),
    ]);
    if let Some(existing) = store::first(store, &filter).await? {
        return Ok(existing);
    }

    let mut track_file = TrackFile {
        file_id,
        track_id,
        bitrate: meta.bitrate,
        format: meta.format.clone(),
        cover_id: attachments.cover_id,
        ..Default::default()
    };
    let track_file_id = store::insert(store, &mut track_file).await?;
    created.track_files += 1;

    for &attachment_id in &attachments.attachment_ids {
        store
            .link(&Link::Attachment {
                owner: AttachmentOwner::TrackFile(track_file_id),
                attachment_id,
            })
            .await?;
    }

    Ok(track_file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Attachment;
    use crate::store::MemoryStore;
    use crate::test_utils::{mock_track_metadata, touch_file};

    fn meta(artist: Option<&str>, album: Option<&str>, title: Option<&str>) -> TrackMetadata {
        TrackMetadata {
            artist: artist.map(str::to_string),
            album: album.map(str::to_string),
            title: title.map(str::to_string),
            ..Default::default()
        }
    }

    async fn registered(store: &mut MemoryStore, dir: &tempfile::TempDir, name: &str) -> File {
        let mut file = File {
            path: touch_file(dir.path(), name),
            ..Default::default()
        };
        store::insert(store, &mut file).await.unwrap();
        file
    }

    async fn resolve_new(
        store: &mut MemoryStore,
        file: &File,
        meta: &TrackMetadata,
    ) -> ResolvedTrack {
        resolve(store, Path::new(&file.path), file, meta, &DirectoryAttachments::default())
            .await
            .unwrap()
            .expect("file exists")
    }

    async fn count(store: &mut MemoryStore) -> crate::store::CatalogStats {
        store.stats().await.unwrap()
    }

    #[tokio::test]
    async fn test_shared_artist_and_release() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = MemoryStore::new();
        let encore = registered(&mut store, &dir, "01.flac").await;
        let intro = registered(&mut store, &dir, "02.flac").await;

        let a = resolve_new(&mut store, &encore, &meta(Some("Bob"), Some("Live"), Some("Encore"))).await;
        let b = resolve_new(&mut store, &intro, &meta(Some("Bob"), Some("Live"), Some("Intro"))).await;

        let stats = count(&mut store).await;
        assert_eq!(stats.artists, 1);
        assert_eq!(stats.releases, 1);
        assert_eq!(stats.tracks, 2);
        assert_eq!(a.track.artist_id, b.track.artist_id);
        assert_eq!(a.track.release_id, b.track.release_id);

        let release: Release = store::get(&mut store, a.track.release_id.unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(release.name.as_deref(), Some("Live"));
        assert_eq!(release.artist_id, a.track.artist_id);
        assert_eq!(
            release.dirpath.as_deref(),
            Some(dir.path().to_string_lossy().as_ref())
        );
    }

    #[tokio::test]
    async fn test_resolution_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = MemoryStore::new();
        let file = registered(&mut store, &dir, "song.mp3").await;
        let meta = mock_track_metadata();

        let first = resolve_new(&mut store, &file, &meta).await;
        assert!(!first.skipped);
        assert_eq!(first.created.tracks, 1);
        let before = count(&mut store).await;

        let second = resolve_new(&mut store, &file, &meta).await;
        assert!(second.skipped);
        assert_eq!(second.track.id, first.track.id);
        assert_eq!(count(&mut store).await, before);
    }

    #[tokio::test]
    async fn test_same_metadata_other_file_reuses_track() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = MemoryStore::new();
        let rip = registered(&mut store, &dir, "a.flac").await;
        let rerip = registered(&mut store, &dir, "b.flac").await;
        let meta = mock_track_metadata();

        let a = resolve_new(&mut store, &rip, &meta).await;
        let b = resolve_new(&mut store, &rerip, &meta).await;
        assert_eq!(a.track.id, b.track.id);
        assert_eq!(b.created.tracks, 0);
        assert_eq!(b.created.track_files, 1);
        assert_ne!(a.track_file.unwrap().id, b.track_file.unwrap().id);
    }

    #[tokio::test]
    async fn test_null_safe_track_matching() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = MemoryStore::new();
        let loose = registered(&mut store, &dir, "a.mp3").await;
        let credited = registered(&mut store, &dir, "b.mp3").await;

        let a = resolve_new(&mut store, &loose, &meta(None, None, Some("X"))).await;
        let b = resolve_new(&mut store, &credited, &meta(Some("Bob"), None, Some("X"))).await;
        assert_ne!(a.track.id, b.track.id);
        assert_eq!(a.track.artist_id, None);
        assert!(b.track.artist_id.is_some());

        // And the other way round: the unresolved track is found again.
        let again = registered(&mut store, &dir, "c.mp3").await;
        let c = resolve_new(&mut store, &again, &meta(None, None, Some("X"))).await;
        assert_eq!(c.track.id, a.track.id);
    }

    #[tokio::test]
    async fn test_album_artist_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = MemoryStore::new();
        let file = registered(&mut store, &dir, "a.mp3").await;
        let meta = TrackMetadata {
            album_artist: Some("Various".to_string()),
            title: Some("Song".to_string()),
            ..Default::default()
        };
        let resolved = resolve_new(&mut store, &file, &meta).await;
        assert_eq!(
            resolved.artist.and_then(|a| a.name),
            Some("Various".to_string())
        );
    }

    #[tokio::test]
    async fn test_release_owned_by_album_artist() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = MemoryStore::new();
        let file = registered(&mut store, &dir, "a.mp3").await;
        let meta = TrackMetadata {
            artist: Some("Guest".to_string()),
            album_artist: Some("Host".to_string()),
            album: Some("Duets".to_string()),
            title: Some("One".to_string()),
            ..Default::default()
        };
        let resolved = resolve_new(&mut store, &file, &meta).await;
        assert_eq!(resolved.created.artists, 2);

        let release = resolved.release.unwrap();
        let owner: Artist = store::get(&mut store, release.artist_id.unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(owner.name.as_deref(), Some("Host"));
        assert_eq!(
            resolved.track.artist_id,
            resolved.artist.and_then(|a| a.id)
        );
    }

    #[tokio::test]
    async fn test_compilation_isolation() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = MemoryStore::new();
        let comp_file = registered(&mut store, &dir, "a.mp3").await;
        let solo_file = registered(&mut store, &dir, "b.mp3").await;
        let unknown_file = registered(&mut store, &dir, "c.mp3").await;

        let mut comp_meta = meta(Some("Bob"), Some("Hits"), Some("One"));
        comp_meta.compilation = Some(true);
        let comp = resolve_new(&mut store, &comp_file, &comp_meta).await;

        let mut solo_meta = meta(Some("Bob"), Some("Hits"), Some("Two"));
        solo_meta.compilation = Some(false);
        let solo = resolve_new(&mut store, &solo_file, &solo_meta).await;
        assert_ne!(comp.track.release_id, solo.track.release_id);

        // Unknown flag with an artist name still must not pick the compilation
        let unknown = resolve_new(&mut store, &unknown_file, &meta(Some("Bob"), Some("Hits"), Some("Three"))).await;
        assert_eq!(unknown.track.release_id, solo.track.release_id);
    }

    #[tokio::test]
    async fn test_compilation_matches_without_artist() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = MemoryStore::new();
        let a_file = registered(&mut store, &dir, "a.mp3").await;
        let b_file = registered(&mut store, &dir, "b.mp3").await;

        let mut a_meta = meta(Some("Alice"), Some("Hits"), Some("One"));
        a_meta.compilation = Some(true);
        let mut b_meta = meta(Some("Bob"), Some("Hits"), Some("Two"));
        b_meta.compilation = Some(true);

        let a = resolve_new(&mut store, &a_file, &a_meta).await;
        let b = resolve_new(&mut store, &b_file, &b_meta).await;
        assert_eq!(a.track.release_id, b.track.release_id);
        assert_eq!(count(&mut store).await.releases, 1);
    }

    #[tokio::test]
    async fn test_empty_title_always_creates_track() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = MemoryStore::new();
        let a = registered(&mut store, &dir, "a.mp3").await;
        let b = registered(&mut store, &dir, "b.mp3").await;
        let blank = meta(Some("Bob"), None, Some("  "));

        let first = resolve_new(&mut store, &a, &blank).await;
        let second = resolve_new(&mut store, &b, &blank).await;
        assert_ne!(first.track.id, second.track.id);
        assert_eq!(first.track.title, None);
        assert_eq!(count(&mut store).await.artists, 1);
    }

    #[tokio::test]
    async fn test_untitled_resolved_reimport_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = MemoryStore::new();
        let file = registered(&mut store, &dir, "a.mp3").await;
        let untitled = meta(Some("Bob"), Some("Live"), None);

        resolve_new(&mut store, &file, &untitled).await;
        let before = count(&mut store).await;
        let again = resolve_new(&mut store, &file, &untitled).await;

        assert!(again.skipped);
        assert_eq!(count(&mut store).await, before);
    }

    #[tokio::test]
    async fn test_missing_file_is_a_no_op() {
        let mut store = MemoryStore::new();
        let file = File {
            path: "/nonexistent/music/a.mp3".to_string(),
            ..Default::default()
        };
        let resolved = resolve(
            &mut store,
            Path::new(&file.path),
            &file,
            &mock_track_metadata(),
            &DirectoryAttachments::default(),
        )
            .await
            .unwrap();
        assert!(resolved.is_none());
        assert_eq!(count(&mut store).await, Default::default());
    }

    #[tokio::test]
    async fn test_attachments_and_cover() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = MemoryStore::new();
        let audio = registered(&mut store, &dir, "a.flac").await;
        let cover_file = registered(&mut store, &dir, "cover.jpg").await;
        let log_file = registered(&mut store, &dir, "rip.log").await;

        let mut cover = Attachment {
            file_id: cover_file.id.unwrap(),
            name: Some("cover.jpg".to_string()),
            ..Default::default()
        };
        let mut log = Attachment {
            file_id: log_file.id.unwrap(),
            name: Some("rip.log".to_string()),
            ..Default::default()
        };
        let cover_id = store::insert(&mut store, &mut cover).await.unwrap();
        let log_id = store::insert(&mut store, &mut log).await.unwrap();
        let attachments = DirectoryAttachments {
            attachment_ids: vec![log_id],
            cover_id: Some(cover_id),
        };

        let resolved = resolve(&mut store, Path::new(&audio.path), &audio, &mock_track_metadata(), &attachments)
            .await
            .unwrap()
            .unwrap();
        let track_file = resolved.track_file.unwrap();
        assert_eq!(track_file.cover_id, Some(cover_id));

        let release_id = resolved.track.release_id.unwrap();
        let links = store.attachment_links();
        assert!(links.contains(&(AttachmentOwner::Release(release_id), cover_id)));
        assert!(links.contains(&(AttachmentOwner::TrackFile(track_file.id.unwrap()), log_id)));
    }

    #[tokio::test]
    async fn test_lookup_imported_requires_artist_and_release() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = MemoryStore::new();
        let partial = registered(&mut store, &dir, "a.mp3").await;
        let full = registered(&mut store, &dir, "b.mp3").await;

        resolve_new(&mut store, &partial, &meta(Some("Bob"), None, Some("X"))).await;
        resolve_new(&mut store, &full, &meta(Some("Bob"), Some("Live"), Some("Y"))).await;

        assert!(lookup_imported(&mut store, &partial.path).await.unwrap().is_none());
        assert!(lookup_imported(&mut store, &full.path).await.unwrap().is_some());
    }
}
