use std::sync::Arc;

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use tracing_subscriber::EnvFilter;

use kbagent::cli::{AgentsCommand, Cli, Command};
use kbagent::llm::client::NullLlmClient;
use kbagent::r#loop::{ExecutionLoop, LoopConfig, RunOutcome};
use kbagent::tools::builtin::core_pack;
use kbagent::{AnalyticsBuffer, Config, RunContext, ToolContext, ToolManager, load_agents};
use tracestore::{TraceWriter, TraceWriterConfig};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    let runtime = tokio::runtime::Runtime::new().context("Failed to start runtime")?;
    runtime.block_on(dispatch(cli, config))
}

async fn dispatch(cli: Cli, config: Config) -> Result<()> {
    match cli.command {
        Command::Run {
            task,
            max_iterations,
            tier,
            session_id,
        } => run_task(&config, task, max_iterations, tier, session_id, cli.json).await,
        Command::Agents { command } => run_agents(&config, command, cli.json),
    }
}

async fn run_task(
    config: &Config,
    task: String,
    max_iterations: Option<u32>,
    tier: Option<String>,
    session_id: Option<String>,
    json: bool,
) -> Result<()> {
    let mut run = RunContext::new(
        task,
        session_id.unwrap_or_else(|| kbagent::domain::generate_id("session", "cli")),
    );
    run.max_iterations = max_iterations.unwrap_or(config.run.max_iterations);
    run.hard_token_limit = config.run.hard_token_limit;
    if let Some(tier) = tier {
        run.tier = tier.parse().map_err(|e: String| eyre::eyre!(e))?;
    }

    let mut manager = ToolManager::new();
    manager
        .register(core_pack())
        .map_err(|e| eyre::eyre!("tool registration failed: {}", e))?;
    manager.initialize_all();
    let manager = Arc::new(manager);

    let tracer = TraceWriter::new(
        config.storage.traces_dir(),
        run.request_id.to_string(),
        TraceWriterConfig::default(),
    );
    let analytics = AnalyticsBuffer::new(config.storage.analytics_dir());

    let root = std::env::current_dir().context("Failed to resolve working directory")?;
    let tool_ctx = ToolContext::new(root, run.session_id.clone(), run.request_id.to_string())
        .with_task(run.task.clone())
        .with_tier(run.tier);

    let loop_config = LoopConfig {
        max_tokens: config.run.max_tokens,
        stuck_threshold: config.run.stuck_threshold,
        budget_hint: None,
    };

    // The LLM transport is an external collaborator; without one wired in
    // the loop runs against the null client and terminates immediately.
    let mut engine = ExecutionLoop::new(Arc::new(NullLlmClient), manager.clone(), loop_config)
        .with_tracer(tracer)
        .with_analytics(analytics);

    let outcome = engine.run(&mut run, &tool_ctx).await;
    manager.dispose_all();

    match outcome {
        RunOutcome::Complete { result } => {
            if json {
                println!(
                    "{}",
                    serde_json::json!({
                        "reasonCode": result.reason_code,
                        "success": result.success,
                        "answer": result.answer,
                        "iterationsUsed": result.iterations_used,
                        "tokensUsed": result.total_tokens,
                        "gate": {"status": result.gate.status, "score": result.gate.score},
                        "tracePath": result.trace_path,
                    })
                );
            } else {
                let marker = if result.success { "✓".green() } else { "✗".red() };
                println!("{} {} ({} iterations)", marker, result.reason_code, result.iterations_used);
                if let Some(answer) = &result.answer {
                    println!("  {}", answer);
                }
                if let Some(path) = &result.trace_path {
                    println!("  trace: {}", path.display().to_string().dimmed());
                }
            }
            if !result.success {
                std::process::exit(1);
            }
        }
        RunOutcome::Escalate { reason } => {
            println!("{} escalation requested: {}", "↑".yellow(), reason);
        }
    }

    Ok(())
}

fn run_agents(config: &Config, command: AgentsCommand, json: bool) -> Result<()> {
    let records = load_agents(config.storage.agents_dir());

    match command {
        AgentsCommand::List => {
            if records.is_empty() {
                eprintln!("No agents found under {}", config.storage.agents_dir().display());
                std::process::exit(1);
            }
            for record in records {
                if json {
                    println!("{}", serde_json::to_string(&record)?);
                } else {
                    let marker = if record.valid { "✓".green() } else { "✗".red() };
                    let summary = record
                        .definition
                        .as_ref()
                        .map(|d| d.description.clone())
                        .unwrap_or_else(|| record.errors.join("; "));
                    println!("{} {:<20} {}", marker, record.dir.cyan(), summary);
                }
            }
        }
        AgentsCommand::Show { agent_id } => {
            let Some(record) = records.into_iter().find(|r| r.dir == agent_id) else {
                eprintln!("Agent not found: {}", agent_id);
                std::process::exit(1);
            };
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
    }

    Ok(())
}
