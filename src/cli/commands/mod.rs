//! CLI command definitions and dispatch.
//!
//! This module provides the command-line interface for Music Catalog.
//! Each subcommand lives in its own submodule:
//! - `list`: Search tracks or releases
//! - `import`: Directory import
//! - `stats`: Catalog summary
//! - `tag`: User tagging of search results

mod import;
mod list;
mod stats;
mod tag;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::runtime::Runtime;

use crate::config::Config;

pub use import::{ImportArgs, cmd_import};
pub use list::cmd_list;
pub use stats::cmd_stats;
pub use tag::{TagScope, cmd_tag};

/// Music Catalog CLI
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Catalog database file (defaults to the configured one)
    #[arg(long, global = true, env = "MUSIC_CATALOG_DB")]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// List tracks (or releases) matching the search terms
    #[command(visible_alias = "ls")]
    List {
        /// List releases instead of tracks
        #[arg(short, long)]
        release: bool,
        /// Print file paths (or release directories) instead of names
        #[arg(short, long)]
        path: bool,
        /// Search terms: field:value, field=value, +tag or plain text
        terms: Vec<String>,
    },
    /// Import audio files from directories
    #[command(visible_aliases = ["imp", "im"])]
    Import {
        /// Print the outcome of every file
        #[arg(short, long)]
        verbose: bool,
        /// Write unreadable file paths to this log
        #[arg(short = 'l', long = "log")]
        log: Option<PathBuf>,
        /// Import non-audio files as attachments
        #[arg(short, long)]
        attachments: bool,
        /// Compute file checksums
        #[arg(short, long)]
        checksums: bool,
        /// Directories to import
        #[arg(required = true)]
        dirs: Vec<PathBuf>,
    },
    /// Show catalog statistics
    Stats,
    /// Tag every track (or release, or artist) matching the search terms
    Tag {
        /// Tag name
        name: String,
        /// Tag matching releases
        #[arg(short, long, conflicts_with = "artist")]
        release: bool,
        /// Tag matching artists
        #[arg(short = 'A', long)]
        artist: bool,
        /// Weight stored on each tag link
        #[arg(long, default_value_t = 1.0)]
        weight: f64,
        /// Search terms selecting what to tag
        #[arg(required = true)]
        terms: Vec<String>,
    },
}

/// Run the specified CLI command.
pub fn run_command(cli: &Cli, config: &Config) -> anyhow::Result<()> {
    let rt = Runtime::new()?;
    let db = cli.db.clone().unwrap_or_else(|| config.library.database.clone());

    match &cli.command {
        Commands::List {
            release,
            path,
            terms,
        } => cmd_list(&rt, &db, *release, *path, terms),
        Commands::Import {
            verbose,
            log,
            attachments,
            checksums,
            dirs,
        } => cmd_import(
            &rt,
            &db,
            &config.import,
            ImportArgs {
                dirs,
                verbose: *verbose,
                log: log.as_deref(),
                attachments: *attachments,
                checksums: *checksums,
            },
        ),
        Commands::Stats => cmd_stats(&rt, &db),
        Commands::Tag {
            name,
            release,
            artist,
            weight,
            terms,
        } => {
            let scope = if *release {
                TagScope::Release
            } else if *artist {
                TagScope::Artist
            } else {
                TagScope::Track
            };
            cmd_tag(&rt, &db, name, scope, *weight, terms)
        }
    }
}
