use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;

use tracestore::cli::{ChangesCommand, Cli, Command, TraceCommand};
use tracestore::config::Config;
use tracestore::{FileChangeTracker, SnapshotConfig, read_trace_events};

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

    info!("tracestore starting");

    match cli.command {
        Command::Trace { command } => run_trace(command, &config, cli.json),
        Command::Changes { command } => run_changes(command, &config, cli.json),
    }
}

fn run_trace(command: TraceCommand, config: &Config, json: bool) -> Result<()> {
    match command {
        TraceCommand::Show { task_id } => {
            let events = read_trace_events(&config.traces_dir, &task_id)?;
            if events.is_empty() {
                eprintln!("No trace found for task: {}", task_id);
                std::process::exit(1);
            }
            for event in events {
                if json {
                    println!("{}", serde_json::to_string(&event)?);
                } else {
                    let iteration = event.iteration.map(|i| format!(" it={}", i)).unwrap_or_default();
                    println!(
                        "{:>5} {} {}{}",
                        event.seq,
                        event.ts.dimmed(),
                        event.event_type.to_string().cyan(),
                        iteration
                    );
                }
            }
        }
        TraceCommand::Index { task_id } => {
            let path = config.traces_dir.join(format!("{}-index.json", task_id));
            let content = match std::fs::read_to_string(&path) {
                Ok(content) => content,
                Err(_) => {
                    eprintln!("No index found for task: {}", task_id);
                    std::process::exit(1);
                }
            };
            if json {
                println!("{}", content.trim());
            } else {
                let index: tracestore::TraceIndex = serde_json::from_str(&content)?;
                println!("Task: {}", index.task_id.cyan());
                println!("  Events: {}", index.total_events);
                println!("  Errors: {}", index.error_count);
                println!("  Cost: ${:.4}", index.total_cost_usd);
                println!("  Duration: {}ms", index.duration_ms);
                for (event_type, count) in &index.by_type {
                    println!("  {:<20} {}", event_type, count);
                }
            }
        }
    }
    Ok(())
}

fn run_changes(command: ChangesCommand, config: &Config, json: bool) -> Result<()> {
    match command {
        ChangesCommand::List {
            session_id,
            agent_id,
            file,
        } => {
            let tracker = tracker_for(config, &session_id, None);
            let changes: Vec<_> = tracker
                .list_persisted(&session_id)
                .into_iter()
                .filter(|c| agent_id.as_deref().is_none_or(|a| c.agent_id == a))
                .filter(|c| file.as_deref().is_none_or(|f| c.file_path == f))
                .collect();

            if changes.is_empty() {
                eprintln!("No changes found for session: {}", session_id);
                std::process::exit(1);
            }

            for change in changes {
                if json {
                    println!("{}", serde_json::to_string(&change)?);
                } else {
                    println!(
                        "{} {} {:?} {} by {}",
                        change.change_id.yellow(),
                        change.ts.dimmed(),
                        change.op,
                        change.file_path,
                        change.agent_id.cyan()
                    );
                }
            }
        }
        ChangesCommand::Show { session_id, change_id } => {
            let tracker = tracker_for(config, &session_id, None);
            match tracker.load_snapshot(&session_id, &change_id) {
                Some(change) => println!("{}", serde_json::to_string_pretty(&change)?),
                None => {
                    eprintln!("Change not found: {}", change_id);
                    std::process::exit(1);
                }
            }
        }
        ChangesCommand::Cleanup { days } => {
            let tracker = tracker_for(config, "cleanup", days);
            let removed = tracker.cleanup()?;
            println!("{} Removed {} session(s)", "✓".green(), removed);
        }
    }
    Ok(())
}

fn tracker_for(config: &Config, session_id: &str, days_override: Option<i64>) -> FileChangeTracker {
    let snapshot_config = SnapshotConfig {
        max_sessions: config.max_sessions,
        max_age_days: days_override.unwrap_or(config.max_age_days),
        ..SnapshotConfig::default()
    };
    FileChangeTracker::new(&config.sessions_dir, ".", session_id, snapshot_config)
}
