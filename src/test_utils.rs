//! Test utilities and fixtures for music-catalog tests.
//!
//! This module provides common test helpers, mock factories, and
//! store utilities to reduce boilerplate in tests.
//!
//! # Example
//!
//! ```ignore
//! use music_catalog::test_utils::{temp_store, mock_track_metadata};
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let (mut store, _dir) = temp_store().await;
//!     let meta = mock_track_metadata();
//!     // ... test logic
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;

use tempfile::TempDir;

use crate::error::{Error, Result};
use crate::metadata::{TagReader, TrackMetadata};
use crate::scanner::ScanOptions;
use crate::store::sqlite::{SqliteStore, db_url};

/// Creates a temporary SQLite store for testing.
///
/// Keep the returned `TempDir` alive for the duration of your test; the
/// database is deleted when it goes out of scope.
pub async fn temp_store() -> (SqliteStore, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp directory");
    let db_path = dir.path().join("test.db");

    let store = SqliteStore::open(&db_url(Some(&db_path)))
        .await
        .expect("Failed to initialize test database");

    (store, dir)
}

/// Creates a mock TrackMetadata with sensible defaults.
///
/// Customize using struct update syntax:
///
/// ```ignore
/// let custom = TrackMetadata {
///     title: Some("Custom Title".to_string()),
///     ..mock_track_metadata()
/// };
/// ```
pub fn mock_track_metadata() -> TrackMetadata {
    TrackMetadata {
        artist: Some("Test Artist".to_string()),
        album: Some("Test Album".to_string()),
        title: Some("Test Track".to_string()),
        track_number: Some(1),
        length: Some(180),
        date: Some("2023".to_string()),
        format: Some("flac".to_string()),
        ..Default::default()
    }
}

/// Creates an empty file and returns its path as a string.
pub fn touch_file(dir: &Path, name: &str) -> String {
    let path = dir.join(name);
    std::fs::File::create(&path).expect("Failed to create test file");
    path.to_string_lossy().into_owned()
}

/// Scan options matching the default configuration.
pub fn scan_options() -> ScanOptions {
    crate::config::ImportConfig::default().scan_options()
}

/// [`TagReader`] serving canned metadata by file name.
///
/// Files without an entry read as empty metadata.
#[derive(Debug, Default)]
pub struct FakeReader {
    tracks: HashMap<String, TrackMetadata>,
    unreadable: Vec<String>,
}

impl FakeReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(
        mut self,
        file_name: &str,
        artist: Option<&str>,
        album: Option<&str>,
        title: Option<&str>,
    ) -> Self {
        let meta = TrackMetadata {
            artist: artist.map(str::to_string),
            album: album.map(str::to_string),
            title: title.map(str::to_string),
            ..Default::default()
        };
        self.tracks.insert(file_name.to_string(), meta);
        self
    }

    pub fn unreadable(mut self, file_name: &str) -> Self {
        self.unreadable.push(file_name.to_string());
        self
    }
}

impl TagReader for FakeReader {
    fn read(&self, path: &Path) -> Result<TrackMetadata> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if self.unreadable.contains(&name) {
            return Err(Error::unreadable(path, "corrupt test file"));
        }
        Ok(self.tracks.get(&name).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::CatalogStore;

    #[tokio::test]
    async fn test_temp_store_creates_working_database() {
        let (mut store, dir) = temp_store().await;
        assert!(dir.path().join("test.db").exists());
        assert_eq!(store.stats().await.unwrap().tracks, 0);
    }

    #[test]
    fn test_mock_track_metadata_defaults() {
        let meta = mock_track_metadata();
        assert_eq!(meta.title.as_deref(), Some("Test Track"));
        assert_eq!(meta.artist.as_deref(), Some("Test Artist"));
        assert_eq!(meta.album.as_deref(), Some("Test Album"));
        assert_eq!(meta.album_artist, None);
    }

    #[test]
    fn test_fake_reader() {
        let reader = FakeReader::new()
            .with("a.mp3", Some("Bob"), None, Some("X"))
            .unreadable("b.mp3");

        let meta = reader.read(Path::new("/music/a.mp3")).unwrap();
        assert_eq!(meta.artist.as_deref(), Some("Bob"));
        assert!(reader.read(Path::new("/music/b.mp3")).unwrap_err().is_unreadable());
        assert_eq!(reader.read(Path::new("/music/c.mp3")).unwrap(), TrackMetadata::default());
    }

    #[test]
    fn test_touch_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = touch_file(dir.path(), "song.mp3");
        assert!(Path::new(&path).exists());
    }
}
