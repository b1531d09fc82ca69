//! Import orchestration.
//!
//! Walks directories, registers files, reads tags and hands each audio file
//! to the [`resolver`](crate::resolver). Per-file tag failures are collected
//! and the run goes on; any other error ends it. The store is committed
//! once per top-level directory.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result, ResultExt};
use crate::metadata::TagReader;
use crate::model::{Attachment, File};
use crate::query::{Field, Predicate};
use crate::resolver::{self, Created, DirectoryAttachments};
use crate::scanner::{self, DirectoryScan, ScanOptions};
use crate::store::{self, CatalogStore};

/// Per-file outcome, reported as the run progresses.
#[derive(Debug, Clone, PartialEq)]
pub enum ImportEvent {
    Imported(PathBuf),
    /// Already fully resolved by an earlier import
    Skipped(PathBuf),
    /// Disappeared between the walk and resolution
    Vanished(PathBuf),
    Unreadable(PathBuf, String),
}

/// What to import besides audio.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub scan: ScanOptions,
    /// Register non-audio files as attachments
    pub attachments: bool,
    /// Compute whole-file and prefix checksums
    pub checksums: bool,
    /// Write unreadable paths here, one per line
    pub log_path: Option<PathBuf>,
}

/// Summary of an import run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportReport {
    pub directories: usize,
    pub audio_files: usize,
    pub imported: usize,
    pub skipped: usize,
    pub vanished: usize,
    pub unreadable: Vec<PathBuf>,
    /// Files newly registered in the catalog
    pub files_added: usize,
    pub attachments_added: usize,
    pub created: Created,
}

/// Runs one import over a store.
pub struct Importer<'a, S: CatalogStore + ?Sized> {
    store: &'a mut S,
    reader: &'a dyn TagReader,
    options: ImportOptions,
    report: ImportReport,
}

impl<'a, S: CatalogStore + ?Sized> Importer<'a, S> {
    pub fn new(store: &'a mut S, reader: &'a dyn TagReader, options: ImportOptions) -> Self {
        Self {
            store,
            reader,
            options,
            report: ImportReport::default(),
        }
    }

    /// Import every root in order, calling `on_event` for each audio file.
    pub async fn run(
        mut self,
        roots: &[PathBuf],
        on_event: &mut dyn FnMut(&ImportEvent),
    ) -> Result<ImportReport> {
        let mut outcome = Ok(());
        for root in roots {
            outcome = self.import_root(root, on_event).await;
            if outcome.is_err() {
                break;
            }
        }

        // Paths collected before a fatal error are still logged
        let logged = match &self.options.log_path {
            Some(log_path) => write_unreadable_log(log_path, &self.report.unreadable),
            None => Ok(()),
        };
        outcome?;
        logged?;

        tracing::info!(
            imported = self.report.imported,
            skipped = self.report.skipped,
            unreadable = self.report.unreadable.len(),
            "Import finished"
        );
        Ok(self.report)
    }

    async fn import_root(
        &mut self,
        root: &Path,
        on_event: &mut dyn FnMut(&ImportEvent),
    ) -> Result<()> {
        let root = std::fs::canonicalize(root).map_err(|_| Error::not_found(root))?;
        tracing::info!(root = %root.display(), "Importing");

        for scan in scanner::scan(&root, &self.options.scan) {
            self.import_directory(&scan, on_event).await?;
        }

        self.store.commit().await?;
        Ok(())
    }

    async fn import_directory(
        &mut self,
        scan: &DirectoryScan,
        on_event: &mut dyn FnMut(&ImportEvent),
    ) -> Result<()> {
        self.report.directories += 1;

        let attachments = if self.options.attachments {
            self.register_attachments(scan).await?
        } else {
            DirectoryAttachments::default()
        };

        for path in &scan.audio {
            self.report.audio_files += 1;
            let event = self.import_audio(path, &attachments).await?;
            match &event {
                ImportEvent::Imported(_) => self.report.imported += 1,
                ImportEvent::Skipped(_) => self.report.skipped += 1,
                ImportEvent::Vanished(_) => self.report.vanished += 1,
                ImportEvent::Unreadable(path, message) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %message,
                        "Unreadable file"
                    );
                    self.report.unreadable.push(path.clone());
                }
            }
            on_event(&event);
        }
        Ok(())
    }

    async fn import_audio(
        &mut self,
        path: &Path,
        attachments: &DirectoryAttachments,
    ) -> Result<ImportEvent> {
        let path_str = path.to_string_lossy();
        if resolver::lookup_imported(self.store, &path_str).await?.is_some() {
            return Ok(ImportEvent::Skipped(path.to_path_buf()));
        }

        let meta = match self.reader.read(path) {
            Ok(meta) => meta,
            Err(e) if e.is_unreadable() => {
                return Ok(ImportEvent::Unreadable(path.to_path_buf(), e.to_string()));
            }
            Err(e) => return Err(e),
        };

        if !path.exists() {
            return Ok(ImportEvent::Vanished(path.to_path_buf()));
        }
        let file = self.register_file(path).await?;
        match resolver::resolve(self.store, path, &file, &meta, attachments).await? {
            Some(resolved) if resolved.skipped => Ok(ImportEvent::Skipped(path.to_path_buf())),
            Some(resolved) => {
                self.report.created += resolved.created;
                Ok(ImportEvent::Imported(path.to_path_buf()))
            }
            None => Ok(ImportEvent::Vanished(path.to_path_buf())),
        }
    }

    /// The catalog file for `path`, registering it if absent.
    async fn register_file(&mut self, path: &Path) -> Result<File> {
        let path_str = path.to_string_lossy().into_owned();
        if let Some(file) =
            store::first::<File, S>(self.store, &Predicate::equals(Field::FilePath, path_str.as_str()))
                .await?
        {
            return Ok(file);
        }

        let size = std::fs::metadata(path)
            .with_context(format!("Failed to stat {}", path.display()))?
            .len();
        let mut file = File {
            path: path_str,
            size: i64::try_from(size).ok(),
            added: Some(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        };
        if self.options.checksums {
            let sums = scanner::compute_checksums(path)
                .with_context(format!("Failed to hash {}", path.display()))?;
            file.checksum = Some(sums.checksum);
            file.presum = Some(sums.presum);
        }

        store::insert(self.store, &mut file).await?;
        self.report.files_added += 1;
        Ok(file)
    }

    /// Register the non-audio files of a directory. The first cover image
    /// becomes the directory cover; everything else is a plain attachment.
    async fn register_attachments(&mut self, scan: &DirectoryScan) -> Result<DirectoryAttachments> {
        let mut found = DirectoryAttachments::default();

        for path in &scan.covers {
            let id = self.register_attachment(path).await?;
            if found.cover_id.is_none() {
                found.cover_id = Some(id);
            } else {
                found.attachment_ids.push(id);
            }
        }
        for path in &scan.attachments {
            let id = self.register_attachment(path).await?;
            found.attachment_ids.push(id);
        }
        Ok(found)
    }

    async fn register_attachment(&mut self, path: &Path) -> Result<i64> {
        let file = self.register_file(path).await?;
        let file_id = file.id.unwrap_or_default();

        if let Some(existing) =
            store::first::<Attachment, S>(self.store, &Predicate::equals(Field::FileId, file_id))
                .await?
            && let Some(id) = existing.id
        {
            return Ok(id);
        }

        let mut attachment = Attachment {
            file_id,
            name: path.file_name().map(|n| n.to_string_lossy().into_owned()),
            ..Default::default()
        };
        let id = store::insert(self.store, &mut attachment).await?;
        self.report.attachments_added += 1;
        Ok(id)
    }
}

fn write_unreadable_log(path: &Path, unreadable: &[PathBuf]) -> Result<()> {
    let mut log = std::fs::File::create(path)
        .with_context(format!("Failed to create log {}", path.display()))?;
    for entry in unreadable {
        writeln!(log, "{}", entry.display())?;
    }
    Ok(())
}
