//! CLI argument parsing for memstore

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ms")]
#[command(author, version, about = "Session memory and findings store", long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Emit machine-readable JSON instead of human output
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show a session's memory entries
    Show {
        /// Session identifier
        #[arg(long = "session-id", required = true)]
        session_id: String,
    },

    /// Search a session's memory entries by pattern
    Search {
        /// Session identifier
        #[arg(long = "session-id", required = true)]
        session_id: String,

        /// Substring to search for
        #[arg(required = true)]
        pattern: String,
    },

    /// Show the shared cross-session memory
    Shared,
}
