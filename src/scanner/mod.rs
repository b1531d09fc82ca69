//! Directory traversal and file classification.
//!
//! Walks a root recursively and groups its files by containing directory,
//! since attachments and covers belong to the audio files next to them.
//! Hidden files and directories are skipped.

pub mod checksum;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

pub use checksum::{Checksums, compute_checksums};

/// Image extensions that may hold a cover.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp"];

/// What a file is to the importer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileClass {
    Audio,
    Cover,
    Attachment,
}

/// Classification rules.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanOptions {
    /// Lowercase audio extensions
    pub audio_extensions: Vec<String>,
    /// Lowercase file stems that mark an image as a cover
    pub cover_names: Vec<String>,
}

impl ScanOptions {
    pub fn new(audio_extensions: &[String], cover_names: &[String]) -> Self {
        Self {
            audio_extensions: audio_extensions.iter().map(|e| e.to_lowercase()).collect(),
            cover_names: cover_names.iter().map(|n| n.to_lowercase()).collect(),
        }
    }

    pub fn classify(&self, path: &Path) -> FileClass {
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        if self.audio_extensions.contains(&ext) {
            return FileClass::Audio;
        }

        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) && self.cover_names.contains(&stem) {
            FileClass::Cover
        } else {
            FileClass::Attachment
        }
    }
}

/// The files of one directory, each list sorted by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DirectoryScan {
    pub dir: PathBuf,
    pub audio: Vec<PathBuf>,
    pub covers: Vec<PathBuf>,
    pub attachments: Vec<PathBuf>,
}

impl DirectoryScan {
    pub fn file_count(&self) -> usize {
        self.audio.len() + self.covers.len() + self.attachments.len()
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| name.starts_with('.'))
}

/// Scan `root` recursively, returning one entry per directory that holds
/// files, ordered by directory path.
///
/// Unreadable entries are logged and skipped.
pub fn scan(root: &Path, options: &ScanOptions) -> Vec<DirectoryScan> {
    let mut dirs: BTreeMap<PathBuf, DirectoryScan> = BTreeMap::new();

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.into_path();
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let group = dirs.entry(dir.clone()).or_insert_with(|| DirectoryScan {
            dir,
            ..Default::default()
        });
        match options.classify(&path) {
            FileClass::Audio => group.audio.push(path),
            FileClass::Cover => group.covers.push(path),
            FileClass::Attachment => group.attachments.push(path),
        }
    }

    dirs.into_values().collect()
}
