use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;

use memstore::cli::{Cli, Command};
use memstore::config::Config;
use memstore::{list_session_entries, load_shared_memory};

fn setup_logging() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();
    Ok(())
}

fn main() -> Result<()> {
    setup_logging().context("Failed to setup logging")?;

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    info!("memstore starting");

    match cli.command {
        Command::Show { session_id } => {
            let entries = list_session_entries(&config.memory_dir, &session_id);
            if entries.is_empty() {
                eprintln!("No memory entries for session: {}", session_id);
                std::process::exit(1);
            }
            for entry in entries {
                if cli.json {
                    println!("{}", serde_json::to_string(&entry)?);
                } else {
                    println!(
                        "{:>4} [{:?}] {} ({})",
                        entry.id,
                        entry.category,
                        entry.content,
                        entry.source.dimmed()
                    );
                }
            }
        }
        Command::Search { session_id, pattern } => {
            let entries = list_session_entries(&config.memory_dir, &session_id);
            let matches: Vec<_> = entries
                .into_iter()
                .filter(|e| e.content.contains(&pattern))
                .collect();
            if matches.is_empty() {
                eprintln!("No matches for '{}' in session: {}", pattern, session_id);
                std::process::exit(1);
            }
            for entry in matches {
                if cli.json {
                    println!("{}", serde_json::to_string(&entry)?);
                } else {
                    println!("{:>4} [{:?}] {}", entry.id, entry.category, entry.content);
                }
            }
        }
        Command::Shared => {
            let memory = load_shared_memory(config.shared_memory_path())?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&memory)?);
            } else {
                println!("{}", "Preferences:".cyan());
                for p in &memory.preferences {
                    println!("  - {}", p.content);
                }
                println!("{}", "Constraints:".cyan());
                for c in &memory.constraints {
                    println!("  - {}", c.content);
                }
                println!("{}", "Sessions:".cyan());
                for s in &memory.sessions {
                    println!("  - {} {}", s.session_id.yellow(), s.summary);
                }
            }
        }
    }

    Ok(())
}
