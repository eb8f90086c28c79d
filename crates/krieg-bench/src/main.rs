use std::path::PathBuf;

use clap::Parser;

use krieg_bench::arena::ArenaRunner;
use krieg_bench::config::{BenchConfig, ResolvedOutputs};
use krieg_bench::logging::init_logging;

/// Arena harness for the belief-tracking Kriegspiel agent.
#[derive(Debug, Parser)]
#[command(
    name = "krieg-bench",
    author,
    version,
    about = "Deterministic Kriegspiel arena harness"
)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "bench/bench.yaml")]
    config: PathBuf,

    /// Override the run identifier (substitutes {run_id} templates).
    #[arg(long, value_name = "RUN_ID")]
    run_id: Option<String>,

    /// Override the number of games to play.
    #[arg(long, value_name = "GAMES")]
    games: Option<usize>,

    /// Override the master RNG seed.
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,

    /// Override the ply cap per game.
    #[arg(long, value_name = "PLIES")]
    max_plies: Option<usize>,

    /// Override the recommender search depth.
    #[arg(long, value_name = "DEPTH")]
    depth: Option<u32>,

    /// Exit after validating the configuration (no games are played).
    #[arg(long)]
    validate_only: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = BenchConfig::from_path(&cli.config)?;

    if let Some(run_id) = cli.run_id {
        config.run_id = run_id;
    }

    if let Some(games) = cli.games {
        config.games.count = games;
    }

    if let Some(seed) = cli.seed {
        config.games.seed = Some(seed);
    }

    if let Some(max_plies) = cli.max_plies {
        config.games.max_plies = max_plies;
    }

    if let Some(depth) = cli.depth {
        config.agent.depth = depth;
    }

    config.validate()?;

    let outputs: ResolvedOutputs = config.resolved_outputs();
    let run_id = config.run_id.clone();
    let games = config.games.count;
    let max_plies = config.games.max_plies;

    println!(
        "Loaded configuration '{run_id}' ({games} game{}, up to {max_plies} plies each)",
        if games == 1 { "" } else { "s" }
    );

    let logging_guard = init_logging(&config.logging, &outputs)?;
    let runner = ArenaRunner::new(config, outputs)?;

    if cli.validate_only {
        println!("Validation-only mode: arena execution skipped.");
        return Ok(());
    }

    let summary = runner.run()?;
    println!(
        "Arena complete for '{run_id}': {} games ({}W {}D {}L, score {:.3}) -> {} rows at {}",
        summary.games_played,
        summary.wins,
        summary.draws,
        summary.losses,
        summary.score_rate,
        summary.rows_written,
        summary.jsonl_path.display()
    );
    println!("Summary table: {}", summary.summary_path.display());
    if let Some(guard) = logging_guard.as_ref() {
        println!("Telemetry log: {}", guard.telemetry_path.display());
    }

    Ok(())
}
