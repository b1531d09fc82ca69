//! Catalog statistics command.

use std::path::Path;
use tokio::runtime::Runtime;

use crate::store::CatalogStore;
use crate::store::sqlite::{SqliteStore, db_url};

/// Print counts and totals for the catalog
pub fn cmd_stats(rt: &Runtime, db: &Path) -> anyhow::Result<()> {
    rt.block_on(async {
        let mut store = SqliteStore::open(&db_url(Some(db))).await?;
        let stats = store.stats().await?;

        println!("Artists:     {}", stats.artists);
        println!("Releases:    {}", stats.releases);
        println!("Tracks:      {}", stats.tracks);
        println!("Files:       {}", stats.files);
        println!("Attachments: {}", stats.attachments);
        println!("Tags:        {}", stats.tags);
        println!("Total size:  {}", human_bytes(stats.total_bytes));
        println!("Total time:  {}", human_seconds(stats.total_seconds));
        Ok::<(), anyhow::Error>(())
    })
}

/// Format a byte count with binary units, e.g. `1.5 GiB`.
pub fn human_bytes(bytes: i64) -> String {
    const UNITS: [&str; 5] = ["KiB", "MiB", "GiB", "TiB", "PiB"];
    if bytes < 1024 {
        return format!("{} B", bytes.max(0));
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

/// Format a duration in seconds, e.g. `2d 3h 4m 5s`.
pub fn human_seconds(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let (days, rest) = (seconds / 86_400, seconds % 86_400);
    let (hours, rest) = (rest / 3_600, rest % 3_600);
    let (minutes, secs) = (rest / 60, rest % 60);

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{days}d"));
    }
    if hours > 0 || !parts.is_empty() {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 || !parts.is_empty() {
        parts.push(format!("{minutes}m"));
    }
    parts.push(format!("{secs}s"));
    parts.join(" ")
}
