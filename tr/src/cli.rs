//! CLI argument parsing for tracestore

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "tr")]
#[command(author, version, about = "Trace and file-change snapshot store", long_about = None)]
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
    /// Trace inspection
    Trace {
        #[command(subcommand)]
        command: TraceCommand,
    },

    /// File-change history and rollback
    Changes {
        #[command(subcommand)]
        command: ChangesCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum TraceCommand {
    /// Print all events of a task's trace
    Show {
        /// Task identifier
        #[arg(required = true)]
        task_id: String,
    },

    /// Print a task's trace index
    Index {
        /// Task identifier
        #[arg(required = true)]
        task_id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ChangesCommand {
    /// List captured changes of a session
    List {
        /// Session identifier
        #[arg(long = "session-id", required = true)]
        session_id: String,

        /// Only changes made by this agent
        #[arg(long = "agent-id")]
        agent_id: Option<String>,

        /// Only changes touching this file
        #[arg(long)]
        file: Option<String>,
    },

    /// Show one change snapshot
    Show {
        /// Session identifier
        #[arg(long = "session-id", required = true)]
        session_id: String,

        /// Change identifier
        #[arg(long = "change-id", required = true)]
        change_id: String,
    },

    /// Remove sessions past the retention limits
    Cleanup {
        /// Override the configured maximum session age
        #[arg(long)]
        days: Option<i64>,
    },
}
