//! Command-line interface for music-catalog.
//!
//! This module provides CLI commands for importing music directories and
//! searching, tagging and summarizing the catalog.

mod commands;

pub use commands::{Cli, Commands, run_command};
