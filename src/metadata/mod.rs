//! Audio file metadata reading.
//!
//! Uses the lofty crate for format-independent metadata access. The
//! catalog only ever reads tags; nothing is written back to files.
//!
//! Every field of [`TrackMetadata`] is optional. Empty tag strings are
//! treated the same as missing ones so the resolver never matches on `""`.

use std::path::Path;

use chrono::NaiveDate;
use lofty::file::{AudioFile, TaggedFileExt};
use lofty::probe::Probe;
use lofty::tag::{Accessor, ItemKey, Tag};

use crate::error::{Error, Result};

/// Flat tag record for one audio file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackMetadata {
    pub artist: Option<String>,
    pub album_artist: Option<String>,
    pub album: Option<String>,
    pub title: Option<String>,
    pub genre: Option<String>,
    pub track_number: Option<i64>,
    pub disc_number: Option<i64>,
    /// Length in seconds
    pub length: Option<i64>,
    pub bpm: Option<i64>,
    pub composer: Option<String>,
    /// ISO partial date (`YYYY`, `YYYY-MM` or `YYYY-MM-DD`)
    pub date: Option<String>,
    /// Bitrate in kbps
    pub bitrate: Option<i64>,
    pub format: Option<String>,
    pub track_total: Option<i64>,
    pub disc_total: Option<i64>,
    pub compilation: Option<bool>,
}

/// Source of [`TrackMetadata`] for a path.
///
/// Implement this trait to substitute tag extraction in tests.
pub trait TagReader: Send + Sync {
    /// Read tags, failing with [`Error::UnreadableFile`] for unsupported or
    /// corrupt files.
    fn read(&self, path: &Path) -> Result<TrackMetadata>;
}

/// [`TagReader`] backed by lofty.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoftyReader;

impl TagReader for LoftyReader {
    fn read(&self, path: &Path) -> Result<TrackMetadata> {
        read(path)
    }
}

pub fn read(path: &Path) -> Result<TrackMetadata> {
    // Probe the file to determine format and read tags
    let tagged_file = Probe::open(path)
        .map_err(|e| Error::unreadable(path, e.to_string()))?
        .read()
        .map_err(|e| Error::unreadable(path, e.to_string()))?;

    let properties = tagged_file.properties();
    let mut meta = TrackMetadata {
        length: Some(properties.duration().as_secs() as i64),
        bitrate: properties.audio_bitrate().map(i64::from),
        format: Some(format!("{:?}", tagged_file.file_type()).to_lowercase()),
        ..Default::default()
    };

    // Get the primary tag, or fall back to the first available tag
    if let Some(tag) = tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) {
        apply_tag(&mut meta, tag);
    }

    Ok(meta)
}

fn apply_tag(meta: &mut TrackMetadata, tag: &Tag) {
    meta.artist = tag.artist().and_then(|s| non_empty(&s));
    meta.album = tag.album().and_then(|s| non_empty(&s));
    meta.title = tag.title().and_then(|s| non_empty(&s));
    meta.genre = tag.genre().and_then(|s| non_empty(&s));
    meta.album_artist = tag.get_string(&ItemKey::AlbumArtist).and_then(non_empty);
    meta.composer = tag.get_string(&ItemKey::Composer).and_then(non_empty);

    meta.track_number = tag.track().map(i64::from);
    meta.track_total = tag.track_total().map(i64::from);
    meta.disc_number = tag.disk().map(i64::from);
    meta.disc_total = tag.disk_total().map(i64::from);

    meta.bpm = tag
        .get_string(&ItemKey::Bpm)
        .or_else(|| tag.get_string(&ItemKey::IntegerBpm))
        .and_then(parse_bpm);

    meta.compilation = tag
        .get_string(&ItemKey::FlagCompilation)
        .and_then(parse_flag);

    meta.date = tag
        .get_string(&ItemKey::RecordingDate)
        .and_then(normalize_date)
        .or_else(|| tag.year().map(|y| format!("{y:04}")));
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn parse_bpm(value: &str) -> Option<i64> {
    let bpm: f64 = value.trim().parse().ok()?;
    (bpm.is_finite() && bpm > 0.0).then(|| bpm.round() as i64)
}

/// Interpret a boolean tag value.
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

/// Normalize a tag date to ISO partial form.
///
/// Accepts `YYYY`, `YYYY-MM`, `YYYY-MM-DD` and timestamps starting with a
/// full date. Anything that is not a real calendar date yields `None`.
pub fn normalize_date(raw: &str) -> Option<String> {
    let date = raw.trim().split(['T', ' ']).next()?;
    let mut parts = date.splitn(3, '-');

    let year_text = parts.next()?;
    if year_text.len() != 4 {
        return None;
    }
    let year: i32 = year_text.parse().ok()?;

    match (parts.next(), parts.next()) {
        (None, _) => Some(format!("{year:04}")),
        (Some(month), None) => {
            let month: u32 = month.parse().ok()?;
            NaiveDate::from_ymd_opt(year, month, 1)?;
            Some(format!("{year:04}-{month:02}"))
        }
        (Some(month), Some(day)) => {
            let date = NaiveDate::from_ymd_opt(year, month.parse().ok()?, day.parse().ok()?)?;
            Some(date.format("%Y-%m-%d").to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_date() {
        assert_eq!(normalize_date("1999"), Some("1999".to_string()));
        assert_eq!(normalize_date("1999-3"), Some("1999-03".to_string()));
        assert_eq!(normalize_date("1999-03-14"), Some("1999-03-14".to_string()));
        assert_eq!(
            normalize_date("2004-11-02T10:00:00"),
            Some("2004-11-02".to_string())
        );
        assert_eq!(normalize_date(" 2010 "), Some("2010".to_string()));
    }

    #[test]
    fn test_normalize_date_rejects_garbage() {
        assert_eq!(normalize_date(""), None);
        assert_eq!(normalize_date("99"), None);
        assert_eq!(normalize_date("1999-13"), None);
        assert_eq!(normalize_date("1999-02-30"), None);
        assert_eq!(normalize_date("unknown"), None);
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("1"), Some(true));
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn test_parse_bpm() {
        assert_eq!(parse_bpm("120"), Some(120));
        assert_eq!(parse_bpm("127.6"), Some(128));
        assert_eq!(parse_bpm("fast"), None);
        assert_eq!(parse_bpm("0"), None);
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty("  "), None);
        assert_eq!(non_empty(" Bob "), Some("Bob".to_string()));
    }

    #[test]
    fn test_read_corrupt_file_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.flac");
        std::fs::write(&path, b"this is not audio").unwrap();

        let err = LoftyReader.read(&path).unwrap_err();
        assert!(err.is_unreadable());
        assert!(err.to_string().contains("broken.flac"));
    }

    #[test]
    fn test_read_missing_file_is_unreadable() {
        let err = read(Path::new("/nonexistent/track.mp3")).unwrap_err();
        assert!(err.is_unreadable());
    }
}
