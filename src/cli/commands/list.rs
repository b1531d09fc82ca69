//! Catalog search command.

use std::path::Path;
use tokio::runtime::Runtime;

use crate::model::{Artist, File, Release, Track, TrackFile};
use crate::query;
use crate::store::sqlite::{SqliteStore, db_url};
use crate::store::{self, CatalogStore};

const UNKNOWN_ARTIST: &str = "Unknown Artist";
const UNKNOWN_RELEASE: &str = "Unknown Release";
const UNKNOWN_TITLE: &str = "Unknown Title";

/// List tracks or releases matching `terms`
pub fn cmd_list(
    rt: &Runtime,
    db: &Path,
    releases: bool,
    paths: bool,
    terms: &[String],
) -> anyhow::Result<()> {
    rt.block_on(list(db, releases, paths, terms))
}

async fn list(db: &Path, releases: bool, paths: bool, terms: &[String]) -> anyhow::Result<()> {
    let mut store = SqliteStore::open(&db_url(Some(db))).await?;
    let filter = query::compile(terms);

    match (releases, paths) {
        (true, true) => {
            let found: Vec<Release> = store::find(&mut store, &filter).await?;
            for dir in found.iter().filter_map(|r| r.dirpath.as_deref()) {
                println!("{dir}");
            }
        }
        (true, false) => {
            let found: Vec<Release> = store::find(&mut store, &filter).await?;
            for release in found {
                let artist = artist_name(&mut store, release.artist_id).await?;
                println!("{}", release_line(artist.as_deref(), release.name.as_deref()));
            }
        }
        (false, true) => {
            let pairings: Vec<TrackFile> = store::find(&mut store, &filter).await?;
            for pairing in pairings {
                if let Some(file) = store::get::<File, _>(&mut store, pairing.file_id).await? {
                    println!("{}", file.path);
                }
            }
        }
        (false, false) => {
            let tracks: Vec<Track> = store::find(&mut store, &filter).await?;
            let ids: Vec<i64> = tracks.iter().filter_map(|t| t.id).collect();
            for row in store.track_listing(&ids).await? {
                println!(
                    "{}",
                    track_line(
                        row.artist_name.as_deref(),
                        row.release_name.as_deref(),
                        row.title.as_deref()
                    )
                );
            }
        }
    }
    Ok(())
}

async fn artist_name<S>(store: &mut S, id: Option<i64>) -> crate::error::Result<Option<String>>
where
    S: CatalogStore + ?Sized,
{
    let Some(id) = id else {
        return Ok(None);
    };
    Ok(store::get::<Artist, S>(store, id).await?.and_then(|a| a.name))
}

fn or_unknown<'a>(value: Option<&'a str>, fallback: &'a str) -> &'a str {
    value.filter(|s| !s.is_empty()).unwrap_or(fallback)
}

fn track_line(artist: Option<&str>, release: Option<&str>, title: Option<&str>) -> String {
    format!(
        "{} - {} - {}",
        or_unknown(artist, UNKNOWN_ARTIST),
        or_unknown(release, UNKNOWN_RELEASE),
        or_unknown(title, UNKNOWN_TITLE)
    )
}

fn release_line(artist: Option<&str>, release: Option<&str>) -> String {
    format!(
        "{} - {}",
        or_unknown(artist, UNKNOWN_ARTIST),
        or_unknown(release, UNKNOWN_RELEASE)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_line() {
        assert_eq!(
            track_line(Some("Bob"), Some("Live"), Some("Encore")),
            "Bob - Live - Encore"
        );
        assert_eq!(
            track_line(None, Some(""), Some("Intro")),
            "Unknown Artist - Unknown Release - Intro"
        );
    }

    #[test]
    fn test_release_line() {
        assert_eq!(release_line(Some("Bob"), Some("Live")), "Bob - Live");
        assert_eq!(release_line(None, None), "Unknown Artist - Unknown Release");
    }
}
