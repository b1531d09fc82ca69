//! Directory import command.

use std::path::{Path, PathBuf};
use tokio::runtime::Runtime;

use crate::config::ImportConfig;
use crate::library::{ImportEvent, ImportOptions, Importer};
use crate::metadata::LoftyReader;
use crate::store::sqlite::{SqliteStore, db_url};

/// Command-line flags of `import`.
pub struct ImportArgs<'a> {
    pub dirs: &'a [PathBuf],
    pub verbose: bool,
    pub log: Option<&'a Path>,
    pub attachments: bool,
    pub checksums: bool,
}

/// Import directories into the catalog
pub fn cmd_import(
    rt: &Runtime,
    db: &Path,
    config: &ImportConfig,
    args: ImportArgs<'_>,
) -> anyhow::Result<()> {
    rt.block_on(async {
        let mut store = SqliteStore::open(&db_url(Some(db))).await?;
        let options = ImportOptions {
            scan: config.scan_options(),
            attachments: args.attachments || config.attachments,
            checksums: args.checksums || config.checksums,
            log_path: args.log.map(Path::to_path_buf).or_else(|| config.log_path.clone()),
        };
        let log_path = options.log_path.clone();

        let verbose = args.verbose;
        let mut on_event = |event: &ImportEvent| {
            if verbose {
                println!("{}", event_line(event));
            }
        };

        let report = Importer::new(&mut store, &LoftyReader, options)
            .run(args.dirs, &mut on_event)
            .await?;

        println!(
            "Import complete: {} audio files, {} imported, {} skipped, {} unreadable.",
            report.audio_files,
            report.imported,
            report.skipped,
            report.unreadable.len()
        );
        println!(
            "Created {} artists, {} releases, {} tracks; registered {} files and {} attachments.",
            report.created.artists,
            report.created.releases,
            report.created.tracks,
            report.files_added,
            report.attachments_added
        );
        if !report.unreadable.is_empty() {
            match log_path {
                Some(path) => println!("Unreadable files written to {}", path.display()),
                None => println!("Use -l LOGPATH to record unreadable files."),
            }
        }
        Ok::<(), anyhow::Error>(())
    })
}

fn event_line(event: &ImportEvent) -> String {
    match event {
        ImportEvent::Imported(path) => format!("+ {}", path.display()),
        ImportEvent::Skipped(path) => format!("= {}", path.display()),
        ImportEvent::Vanished(path) => format!("? {}", path.display()),
        ImportEvent::Unreadable(path, error) => format!("! {}: {}", path.display(), error),
    }
}
