//! CLI command definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// kbagent - coding-agent core execution engine
#[derive(Parser)]
#[command(name = "kb", about = "Coding-agent core execution engine", version)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Emit machine-readable JSON instead of human output
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a task through the execution loop
    Run {
        /// Task description
        task: String,

        /// Maximum iterations
        #[arg(short, long)]
        max_iterations: Option<u32>,

        /// Model tier (small, medium, large)
        #[arg(short, long)]
        tier: Option<String>,

        /// Session identifier (generated when absent)
        #[arg(long = "session-id")]
        session_id: Option<String>,
    },

    /// Inspect agent definitions
    Agents {
        #[command(subcommand)]
        command: AgentsCommand,
    },
}

/// Agent inspection subcommands
#[derive(Debug, Subcommand)]
pub enum AgentsCommand {
    /// List discovered agents with their validity
    List,

    /// Show one agent's record
    Show {
        /// Agent directory name
        #[arg(long = "agent-id", required = true)]
        agent_id: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run() {
        let cli = Cli::parse_from(["kb", "run", "Fix the bug", "-m", "5", "-t", "large"]);
        match cli.command {
            Command::Run {
                task,
                max_iterations,
                tier,
                session_id,
            } => {
                assert_eq!(task, "Fix the bug");
                assert_eq!(max_iterations, Some(5));
                assert_eq!(tier.as_deref(), Some("large"));
                assert!(session_id.is_none());
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_parse_agents_list() {
        let cli = Cli::parse_from(["kb", "agents", "list"]);
        assert!(matches!(
            cli.command,
            Command::Agents {
                command: AgentsCommand::List
            }
        ));
    }

    #[test]
    fn test_parse_agents_show() {
        let cli = Cli::parse_from(["kb", "agents", "show", "--agent-id", "reviewer"]);
        match cli.command {
            Command::Agents {
                command: AgentsCommand::Show { agent_id },
            } => assert_eq!(agent_id, "reviewer"),
            _ => panic!("expected agents show"),
        }
    }

    #[test]
    fn test_json_flag_global() {
        let cli = Cli::parse_from(["kb", "agents", "list", "--json"]);
        assert!(cli.json);
    }
}
