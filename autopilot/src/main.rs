use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fleet_autopilot::benchmark::{run_benchmark, BenchmarkConfig};
use fleet_autopilot::config::{load_engine_config, AutopilotConfig};
use fleet_autopilot::runner::{run_loop, RunOptions};
use fleet_autopilot::sim::{play_match, ArenaConfig};
use fleet_autopilot::transport::ReplayTransport;
use fleet_autopilot::util::{
    parse_seed, read_json, resolve_seeds, seed_to_hex, unix_now, write_json_pretty,
};
use fleet_core::world::WorldModel;
use fleet_core::MapSnapshot;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "fleet-autopilot")]
#[command(about = "Fleet autopilot: replays recorded games and runs local arena matches")]
struct Cli {
    /// JSON file with engine tuning; missing fields use defaults
    #[arg(long, global = true)]
    engine_config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the engine over a recorded game directory
    Replay {
        #[arg(long)]
        dir: PathBuf,
        /// Command log path (defaults to <dir>/commands.jsonl)
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long)]
        max_ticks: Option<u64>,
    },
    /// Play one local arena match
    Simulate {
        #[arg(long, default_value = "1")]
        seed: String,
        #[arg(long)]
        max_ticks: Option<u64>,
        /// JSON file with arena settings
        #[arg(long)]
        arena_config: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Play many arena matches in parallel and write summary.json and runs.csv
    Benchmark {
        #[arg(long)]
        seeds: Option<String>,
        #[arg(long)]
        seed_file: Option<PathBuf>,
        #[arg(long)]
        seed_start: Option<String>,
        #[arg(long, default_value_t = 12)]
        seed_count: u32,
        #[arg(long)]
        arena_config: Option<PathBuf>,
        #[arg(long)]
        out_dir: Option<PathBuf>,
        #[arg(long)]
        jobs: Option<usize>,
    },
    /// Print map dimensions and obstacle coverage
    DescribeMap {
        #[arg(long)]
        map: PathBuf,
    },
}

fn load_arena_config(path: Option<PathBuf>) -> Result<ArenaConfig> {
    match path {
        Some(path) => read_json(&path).context("invalid arena config"),
        None => Ok(ArenaConfig::default()),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::filter::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let Cli {
        engine_config,
        command,
    } = Cli::parse();
    let engine = load_engine_config(engine_config.as_deref())?;
    let env = AutopilotConfig::from_env();

    match command {
        Commands::Replay {
            dir,
            output,
            max_ticks,
        } => {
            let output = output
                .or_else(|| env.output_dir.as_ref().map(|out| out.join("commands.jsonl")))
                .unwrap_or_else(|| dir.join("commands.jsonl"));
            let mut transport = ReplayTransport::with_output(&dir, &output)?;
            let options = RunOptions {
                max_ticks: max_ticks.unwrap_or(env.max_ticks),
                poll_interval: env.poll_interval(),
                engine,
            };
            let metrics = run_loop(&mut transport, &options)?;

            println!("dir={}", dir.display());
            println!("ticks={}", metrics.ticks);
            println!("skipped_ticks={}", metrics.skipped_ticks);
            println!("failed_fetches={}", metrics.failed_fetches);
            println!("commands={}", metrics.commands);
            println!("shots={}", metrics.shots);
            println!("turns={}", metrics.turns);
            for (decision, count) in &metrics.decisions {
                println!("decision.{decision}={count}");
            }
            println!("output={}", transport.output_path().display());
        }
        Commands::Simulate {
            seed,
            max_ticks,
            arena_config,
            output,
        } => {
            let seed = parse_seed(&seed)?;
            let mut arena = load_arena_config(arena_config)?;
            if let Some(max_ticks) = max_ticks {
                arena.max_ticks = max_ticks;
            }
            let outcome = play_match(seed, &arena, &engine)?;
            match output {
                Some(path) => {
                    write_json_pretty(&path, &outcome)?;
                    println!("seed={}", seed_to_hex(seed));
                    println!("ticks={}", outcome.arena.ticks);
                    println!(
                        "survivors={}/{}",
                        outcome.arena.own_alive, outcome.arena.own_total
                    );
                    println!("kills={}", outcome.arena.stats.kills);
                    println!("won={}", outcome.arena.won);
                    println!("output={}", path.display());
                }
                None => println!("{}", serde_json::to_string_pretty(&outcome)?),
            }
        }
        Commands::Benchmark {
            seeds,
            seed_file,
            seed_start,
            seed_count,
            arena_config,
            out_dir,
            jobs,
        } => {
            let seeds = resolve_seeds(
                seeds.as_deref(),
                seed_file.as_deref(),
                seed_start.as_deref(),
                seed_count,
            )?;
            let out_dir = out_dir
                .or_else(|| env.output_dir.clone())
                .unwrap_or_else(|| PathBuf::from(format!("benchmarks/{}", unix_now())));
            let report = run_benchmark(&BenchmarkConfig {
                seeds,
                arena: load_arena_config(arena_config)?,
                engine,
                out_dir: out_dir.clone(),
                jobs,
            })?;

            println!("runs={}", report.run_count);
            println!(
                "jobs={}",
                report
                    .jobs
                    .map(|value| value.to_string())
                    .unwrap_or_else(|| "auto".to_string())
            );
            println!("win_rate={:.1}%", report.win_rate * 100.0);
            println!("avg_survivors={:.2}", report.avg_survivors);
            println!("avg_kills={:.2}", report.avg_kills);
            println!("hit_rate={:.1}%", report.hit_rate * 100.0);
            println!("collisions={}", report.total_collisions);
            println!("storm_deaths={}", report.total_storm_deaths);
            println!("out_dir={}", out_dir.display());
        }
        Commands::DescribeMap { map } => {
            let snapshot: MapSnapshot = read_json(&map)?;
            let world = WorldModel::new(&snapshot)?;
            let cells = snapshot.width() as f64 * snapshot.height() as f64;
            println!("map={}", map.display());
            println!("width={}", snapshot.width());
            println!("height={}", snapshot.height());
            println!("obstacles={}", snapshot.obstacles.len());
            println!("blocked_cells={}", world.blocked_count());
            println!("blocked_ratio={:.4}", world.blocked_count() as f64 / cells);
        }
    }

    Ok(())
}
