use anyhow::{anyhow, Context, Result};
use fleet_core::EngineConfig;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::sim::{play_match, ArenaConfig, MatchOutcome};
use crate::util::{seed_to_hex, unix_now, write_json_pretty};

#[derive(Clone, Debug)]
pub struct BenchmarkConfig {
    pub seeds: Vec<u32>,
    pub arena: ArenaConfig,
    pub engine: EngineConfig,
    pub out_dir: PathBuf,
    pub jobs: Option<usize>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub seed: u32,
    pub seed_hex: String,
    pub ticks: u64,
    pub won: bool,
    pub survivors: usize,
    pub losses: u64,
    pub kills: u64,
    pub enemies_left: usize,
    pub shots_fired: u64,
    pub hits: u64,
    pub hit_rate: f64,
    pub collisions: u64,
    pub storm_deaths: u64,
    pub turns: u64,
    pub decisions: BTreeMap<String, u64>,
}

impl RunRecord {
    fn from_outcome(outcome: &MatchOutcome) -> Self {
        let arena = &outcome.arena;
        let stats = &arena.stats;
        Self {
            seed: arena.seed,
            seed_hex: seed_to_hex(arena.seed),
            ticks: arena.ticks,
            won: arena.won,
            survivors: arena.own_alive,
            losses: stats.losses,
            kills: stats.kills,
            enemies_left: arena.enemies_alive,
            shots_fired: stats.shots_fired,
            hits: stats.hits,
            hit_rate: if stats.shots_fired == 0 {
                0.0
            } else {
                stats.hits as f64 / stats.shots_fired as f64
            },
            collisions: stats.collisions,
            storm_deaths: stats.storm_deaths,
            turns: outcome.run.turns,
            decisions: outcome.run.decisions.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub generated_unix_s: u64,
    pub jobs: Option<usize>,
    pub seeds: Vec<u32>,
    pub run_count: usize,
    pub win_rate: f64,
    pub avg_survivors: f64,
    pub avg_kills: f64,
    pub avg_ticks: f64,
    pub hit_rate: f64,
    pub total_collisions: u64,
    pub total_storm_deaths: u64,
    pub decisions: BTreeMap<String, u64>,
    pub runs: Vec<RunRecord>,
}

/// Plays every seed (in parallel), then writes `summary.json` and `runs.csv`
/// into the output directory.
pub fn run_benchmark(config: &BenchmarkConfig) -> Result<BenchmarkReport> {
    if config.seeds.is_empty() {
        return Err(anyhow!("benchmark requires at least one seed"));
    }
    if config.jobs == Some(0) {
        return Err(anyhow!("benchmark --jobs must be >= 1 when provided"));
    }
    fs::create_dir_all(&config.out_dir)
        .with_context(|| format!("failed creating {}", config.out_dir.display()))?;

    let run_one = |seed: &u32| -> Result<RunRecord> {
        let outcome = play_match(*seed, &config.arena, &config.engine)
            .with_context(|| format!("benchmark match failed for seed={seed:#x}"))?;
        Ok(RunRecord::from_outcome(&outcome))
    };

    let results: Vec<Result<RunRecord>> = if let Some(jobs) = config.jobs {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build()
            .context("failed to build rayon threadpool")?;
        pool.install(|| config.seeds.par_iter().map(run_one).collect())
    } else {
        config.seeds.par_iter().map(run_one).collect()
    };
    let runs = results.into_iter().collect::<Result<Vec<_>>>()?;

    let report = summarize(config, runs);
    write_json_pretty(&config.out_dir.join("summary.json"), &report)?;
    write_runs_csv(&config.out_dir.join("runs.csv"), &report.runs)?;
    tracing::info!(
        runs = report.run_count,
        win_rate = report.win_rate,
        out_dir = %config.out_dir.display(),
        "benchmark complete"
    );
    Ok(report)
}

fn summarize(config: &BenchmarkConfig, runs: Vec<RunRecord>) -> BenchmarkReport {
    let count = runs.len().max(1) as f64;
    let wins = runs.iter().filter(|run| run.won).count();
    let shots: u64 = runs.iter().map(|run| run.shots_fired).sum();
    let hits: u64 = runs.iter().map(|run| run.hits).sum();
    let mut decisions = BTreeMap::new();
    for run in &runs {
        for (name, count) in &run.decisions {
            *decisions.entry(name.clone()).or_insert(0) += count;
        }
    }

    BenchmarkReport {
        generated_unix_s: unix_now(),
        jobs: config.jobs,
        seeds: config.seeds.clone(),
        run_count: runs.len(),
        win_rate: wins as f64 / count,
        avg_survivors: runs.iter().map(|run| run.survivors as f64).sum::<f64>() / count,
        avg_kills: runs.iter().map(|run| run.kills as f64).sum::<f64>() / count,
        avg_ticks: runs.iter().map(|run| run.ticks as f64).sum::<f64>() / count,
        hit_rate: if shots == 0 {
            0.0
        } else {
            hits as f64 / shots as f64
        },
        total_collisions: runs.iter().map(|run| run.collisions).sum(),
        total_storm_deaths: runs.iter().map(|run| run.storm_deaths).sum(),
        decisions,
        runs,
    }
}

fn write_runs_csv(path: &Path, rows: &[RunRecord]) -> Result<()> {
    let mut csv = String::from(
        "seed,seed_hex,ticks,won,survivors,losses,kills,enemies_left,shots_fired,hits,hit_rate,collisions,storm_deaths,turns\n",
    );
    for row in rows {
        csv.push_str(&format!(
            "{},{},{},{},{},{},{},{},{},{},{:.4},{},{},{}\n",
            row.seed,
            row.seed_hex,
            row.ticks,
            row.won,
            row.survivors,
            row.losses,
            row.kills,
            row.enemies_left,
            row.shots_fired,
            row.hits,
            row.hit_rate,
            row.collisions,
            row.storm_deaths,
            row.turns,
        ));
    }
    fs::write(path, csv).with_context(|| format!("failed writing {}", path.display()))
}
