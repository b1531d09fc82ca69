//! Application-wide error types.
//!
//! Library modules return [`Result`] with the [`Error`] enum below, while
//! CLI/main uses `anyhow` for convenient error propagation.
//!
//! # Design
//!
//! - [`Error::UnreadableFile`] is the only error the import run recovers
//!   from; it is logged and the run continues.
//! - Store errors ([`Error::Database`]) abort the current batch.
//! - [`Error::Query`] reports a predicate that cannot be evaluated against
//!   the requested entity kind.
//!
//! # Example
//!
//! ```ignore
//! use music_catalog::error::{Error, Result};
//!
//! fn import(path: &Path) -> Result<()> {
//!     let meta = reader.read(path)?;   // UnreadableFile on bad tags
//!     store.commit().await?;           // Database errors auto-convert
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;

use crate::model::EntityKind;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level application error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Tag extraction failed for a media file
    #[error("Unreadable file {path}: {message}")]
    UnreadableFile { path: PathBuf, message: String },

    /// File not found
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Predicate cannot be evaluated for the requested entity kind
    #[error("Invalid query: {0}")]
    Query(String),

    /// Store returned an entity of a different kind than requested
    #[error("Expected {expected:?} entity, found {found:?}")]
    KindMismatch {
        expected: EntityKind,
        found: EntityKind,
    },

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create an unreadable-file error.
    pub fn unreadable(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::UnreadableFile {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a not found error.
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create a query error.
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query(message.into())
    }

    /// Add context to an error.
    pub fn context(self, ctx: impl Into<String>) -> Self {
        Self::WithContext {
            context: ctx.into(),
            source: Box::new(self),
        }
    }

    /// Whether this error only concerns a single file and the run may continue.
    pub fn is_unreadable(&self) -> bool {
        match self {
            Self::UnreadableFile { .. } => true,
            Self::WithContext { source, .. } => source.is_unreadable(),
            _ => false,
        }
    }
}

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn with_context(self, ctx: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(ctx))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Io(e).context(ctx))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, sqlx::Error> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Database(e).context(ctx))
    }
}
