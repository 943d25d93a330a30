//! Command-line entry point for the ascent evaluator.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use ascent::backends;
use ascent::config::AscentConfig;
use ascent::orchestrator::Orchestrator;
use ascent::scorer::HeuristicScorer;
use pipeline::facts::keys;
use pipeline::store::checkpoints::CheckpointStatus;
use pipeline::{ItemRecord, ItemSeed, Recommendation};

#[derive(Parser)]
#[command(
    name = "ascent",
    about = "Staged auction-property evaluator with checkpointed resume and tiered model routing",
    version
)]
struct Cli {
    /// Configuration file (TOML). Environment values fill anything missing.
    #[arg(long, global = true, env = "ASCENT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluate one item from a JSON facts document
    Run {
        /// Facts document as supplied by discovery
        facts: PathBuf,
    },
    /// Evaluate every *.json facts document under a directory
    Batch { dir: PathBuf },
    /// Print an item's record, checkpoint log, and route decisions
    Show {
        id: String,
        /// Emit the raw report as JSON
        #[arg(long, short = 'j')]
        json: bool,
    },
    /// Wipe an item's checkpoints and return it to pending
    Reset { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = AscentConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Run { facts } => run(config, &facts).await,
        Command::Batch { dir } => batch(config, &dir).await,
        Command::Show { id, json } => show(config, &id, json),
        Command::Reset { id } => reset(config, &id),
    }
}

async fn run(config: AscentConfig, facts: &Path) -> Result<()> {
    let seed = read_seed(facts)?;
    probe(&config).await;
    let orchestrator = build(config)?;
    install_interrupt(&orchestrator);

    let item = orchestrator.run_seed(seed).await?;
    print_outcome(&item)?;
    print_usage(&orchestrator);
    Ok(())
}

async fn batch(config: AscentConfig, dir: &Path) -> Result<()> {
    let seeds = read_seed_dir(dir)?;
    if seeds.is_empty() {
        bail!("no .json facts documents under {}", dir.display());
    }
    probe(&config).await;
    let orchestrator = build(config)?;
    install_interrupt(&orchestrator);

    let summary = orchestrator.run_batch(seeds).await;
    info!(
        done = summary.done,
        failed = summary.failed,
        escalated = summary.escalated,
        interrupted = summary.interrupted,
        errors = summary.errors,
        "batch complete"
    );
    println!("{}", serde_json::to_string_pretty(&summary)?);
    print_usage(&orchestrator);
    Ok(())
}

fn show(config: AscentConfig, id: &str, json: bool) -> Result<()> {
    let orchestrator = build(config)?;
    let report = orchestrator.report(id)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_outcome(&report.item)?;
    println!("checkpoints:");
    for checkpoint in &report.checkpoints {
        let status = match checkpoint.status {
            CheckpointStatus::Done => "done",
            CheckpointStatus::Failed => "failed",
            CheckpointStatus::Escalated => "escalated",
        };
        match &checkpoint.failure {
            Some(reason) => println!(
                "  {:<14} {:<9} attempts={} {}",
                checkpoint.stage, status, checkpoint.attempts, reason
            ),
            None => println!(
                "  {:<14} {:<9} attempts={}",
                checkpoint.stage, status, checkpoint.attempts
            ),
        }
    }
    println!("routes:");
    for route in &report.routes {
        println!(
            "  {:<14} -> {} ({}, {})",
            route.stage, route.backend, route.tier, route.reason
        );
    }
    Ok(())
}

fn reset(config: AscentConfig, id: &str) -> Result<()> {
    let orchestrator = build(config)?;
    let item = orchestrator.reset(id)?;
    println!("item {} reset to {}", item.id, item.status);
    Ok(())
}

fn build(config: AscentConfig) -> Result<Arc<Orchestrator>> {
    let map = backends::build_map(&config);
    let orchestrator = Orchestrator::new(config, map, Arc::new(HeuristicScorer::new()))?;
    Ok(Arc::new(orchestrator))
}

async fn probe(config: &AscentConfig) {
    for (name, healthy) in backends::probe_endpoints(config).await {
        if healthy {
            info!(backend = %name, "endpoint reachable");
        } else {
            warn!(
                backend = %name,
                "endpoint unreachable; stages routed to it will fail until it returns"
            );
        }
    }
}

/// First interrupt stops between stages; in-flight stages finish and every
/// item stays resumable from its last checkpoint.
fn install_interrupt(orchestrator: &Arc<Orchestrator>) {
    let cancel = orchestrator.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; finishing in-flight stages then stopping");
            cancel.cancel();
        }
    });
}

fn read_seed(path: &Path) -> Result<ItemSeed> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading facts document {}", path.display()))?;
    let seed = serde_json::from_str(&raw)
        .with_context(|| format!("parsing facts document {}", path.display()))?;
    Ok(seed)
}

fn read_seed_dir(dir: &Path) -> Result<Vec<ItemSeed>> {
    let mut paths = Vec::new();
    for entry in
        fs::read_dir(dir).with_context(|| format!("reading directory {}", dir.display()))?
    {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            paths.push(path);
        }
    }
    paths.sort();
    paths.iter().map(|path| read_seed(path)).collect()
}

fn print_outcome(item: &ItemRecord) -> Result<()> {
    println!("item {} [{}]", item.id, item.status);
    if let Some(failure) = &item.failure {
        println!("  {failure}");
    }
    let recommendation: Option<Recommendation> = item.snapshot.optional(keys::RECOMMENDATION)?;
    if let Some(rec) = recommendation {
        println!(
            "  recommendation: {} (confidence {:.2})",
            rec.category, rec.confidence
        );
        for citation in &rec.citations {
            println!("    [{}] {}", citation.rule, citation.detail);
        }
    }
    Ok(())
}

fn print_usage(orchestrator: &Arc<Orchestrator>) {
    let usage = orchestrator.usage();
    if usage.scout + usage.analyst + usage.counsel == 0 {
        return;
    }
    info!(
        scout = usage.scout,
        analyst = usage.analyst,
        counsel = usage.counsel,
        "reasoning dispatches by tier"
    );
}
