//! Music Catalog - a music library cataloguer.
//!
//! Imports directories of audio files into a relational catalog, resolving
//! each file to an artist, a release and a track, and searches the catalog
//! with free-text filter terms.

pub mod cli;
pub mod config;
pub mod error;
pub mod library;
pub mod metadata;
pub mod model;
pub mod query;
pub mod resolver;
pub mod scanner;
pub mod store;
#[cfg(test)]
pub mod test_utils;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    // Logs go to stderr so listings stay pipeable
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("music_catalog=info".parse()?))
        .init();

    let config = config::load();
    cli::run_command(&args, &config)
}
