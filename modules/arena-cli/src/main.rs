use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use arena_common::{load_config, AppConfig, FileConfig, Problem};
use arena_engine::{Arena, CancelSignal, RunOutcome, RunSnapshot, TracingHook};
use arena_oracles::claude_oracles;

const DEFAULT_CONFIG: &str = "arena.toml";

#[derive(Parser)]
#[command(name = "arena", about = "Rank and evolve proposals for an open-ended problem")]
struct Cli {
    /// Problem statement
    #[arg(long, conflicts_with = "problem_file")]
    problem: Option<String>,

    /// Read the problem statement from a file
    #[arg(long)]
    problem_file: Option<PathBuf>,

    /// Background material handed to the proposal generator
    #[arg(long)]
    context_file: Option<PathBuf>,

    /// Path to config TOML file (defaults to ./arena.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the full run snapshot as JSON
    #[arg(long)]
    out: Option<PathBuf>,

    /// Fix the pairing seed for a reproducible schedule
    #[arg(long)]
    seed: Option<u64>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs)?;

    let mut file_config = read_config(cli.config.as_deref())?;
    if let Some(seed) = cli.seed {
        file_config.engine.rng_seed = Some(seed);
    }
    let problem = read_problem(&cli)?;

    let app = AppConfig::from_env()?;

    let (cancel_handle, cancel) = CancelSignal::new();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing the run without further oracle calls");
            cancel_handle.cancel();
        }
    });

    let arena = Arena::new(
        file_config.engine.clone(),
        claude_oracles(&app, &file_config.models),
    )?
    .with_hook(Arc::new(TracingHook))
    .with_cancel(cancel);

    info!(
        generations = file_config.engine.generations,
        rounds = file_config.engine.rounds_per_tournament,
        "Arena starting"
    );
    let outcome = arena.run(&problem).await?;

    print_outcome(&outcome);

    if let Some(path) = &cli.out {
        RunSnapshot::capture(&outcome, arena.config()).save(path)?;
        info!(path = %path.display(), "Snapshot written");
    }

    Ok(())
}

fn init_tracing(json: bool) -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive("arena=info".parse()?);
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

fn read_config(path: Option<&Path>) -> Result<FileConfig> {
    match path {
        Some(path) => load_config(path),
        None if Path::new(DEFAULT_CONFIG).exists() => load_config(Path::new(DEFAULT_CONFIG)),
        None => Ok(FileConfig::default()),
    }
}

fn read_problem(cli: &Cli) -> Result<Problem> {
    let statement = match (&cli.problem, &cli.problem_file) {
        (Some(text), _) => text.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read problem file: {}", path.display()))?,
        (None, None) => bail!("provide --problem or --problem-file"),
    };
    if statement.trim().is_empty() {
        bail!("problem statement is empty");
    }

    let mut problem = Problem::new(statement.trim());
    if let Some(path) = &cli.context_file {
        let context = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read context file: {}", path.display()))?;
        problem = problem.with_context(context);
    }
    Ok(problem)
}

fn print_outcome(outcome: &RunOutcome) {
    println!("{}\n", outcome.stats);

    println!("=== Finalists ===");
    for f in &outcome.finalists {
        println!(
            "{}. {} [{}] rating {:.1}, generation {}",
            f.rank, f.candidate.title, f.candidate.id, f.rating, f.candidate.generation
        );
        let lineage: Vec<&str> = outcome
            .pool
            .lineage(&f.candidate.id)
            .into_iter()
            .skip(1)
            .map(|c| c.id.as_str())
            .collect();
        if !lineage.is_empty() {
            println!("   evolved from: {}", lineage.join(" <- "));
        }
    }

    if !outcome.derived.impact_matrix.rows.is_empty() {
        println!("\n=== Impact Matrix ===");
        print!("{}", outcome.derived.impact_matrix.to_markdown());
    }

    match (&outcome.report, &outcome.report_error) {
        (Some(report), _) => println!("\n=== {} ===\n\n{}", report.title, report.body),
        (None, Some(error)) => println!("\nReport unavailable: {error}"),
        (None, None) => {}
    }
}
