use anyhow::Result;
use fleet_autopilot::benchmark::{run_benchmark, BenchmarkConfig};
use fleet_autopilot::sim::{play_match, ArenaConfig};
use fleet_core::EngineConfig;
use std::fs;

fn short_arena() -> ArenaConfig {
    ArenaConfig {
        max_ticks: 150,
        zone_start_tick: 20,
        zone_shrink_per_tick: 3.0,
        ..ArenaConfig::default()
    }
}

#[test]
fn matches_are_reproducible_per_seed() -> Result<()> {
    let arena = short_arena();
    let engine = EngineConfig::default();
    for seed in [1, 0xC0FF_EE11] {
        let first = play_match(seed, &arena, &engine)?;
        let second = play_match(seed, &arena, &engine)?;
        assert_eq!(first, second, "seed={seed:#x}");
    }
    Ok(())
}

#[test]
fn sequential_and_parallel_engines_play_the_same_match() -> Result<()> {
    let arena = short_arena();
    let parallel = play_match(7, &arena, &EngineConfig::default())?;
    let sequential = play_match(
        7,
        &arena,
        &EngineConfig {
            parallel: false,
            ..EngineConfig::default()
        },
    )?;
    assert_eq!(parallel, sequential);
    Ok(())
}

#[test]
fn matches_end_within_the_tick_limit() -> Result<()> {
    let arena = short_arena();
    let outcome = play_match(3, &arena, &EngineConfig::default())?;
    assert!(outcome.arena.ticks <= arena.max_ticks);
    assert!(outcome.run.ticks <= arena.max_ticks);
    assert!(outcome.arena.own_alive <= outcome.arena.own_total);
    assert_eq!(outcome.run.failed_fetches, 0);
    assert!(outcome.run.commands > 0);
    assert!(!outcome.arena.won || outcome.arena.enemies_alive == 0);
    Ok(())
}

#[test]
fn benchmark_writes_summary_and_csv() -> Result<()> {
    let out = tempfile::tempdir()?;
    let out_dir = out.path().join("bench");
    let report = run_benchmark(&BenchmarkConfig {
        seeds: vec![1, 2, 3],
        arena: ArenaConfig {
            max_ticks: 60,
            ..ArenaConfig::default()
        },
        engine: EngineConfig::default(),
        out_dir: out_dir.clone(),
        jobs: Some(2),
    })?;

    assert_eq!(report.run_count, 3);
    let seeds: Vec<u32> = report.runs.iter().map(|run| run.seed).collect();
    assert_eq!(seeds, vec![1, 2, 3]);
    assert!((0.0..=1.0).contains(&report.win_rate));

    let csv = fs::read_to_string(out_dir.join("runs.csv"))?;
    assert_eq!(csv.lines().count(), 4);
    assert!(csv.starts_with("seed,seed_hex,"));

    let summary: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(out_dir.join("summary.json"))?)?;
    assert_eq!(summary["run_count"], 3);
    Ok(())
}

#[test]
fn benchmark_rejects_zero_jobs_and_empty_seed_lists() {
    let out = tempfile::tempdir().unwrap();
    let base = BenchmarkConfig {
        seeds: vec![1],
        arena: ArenaConfig::default(),
        engine: EngineConfig::default(),
        out_dir: out.path().to_path_buf(),
        jobs: Some(0),
    };
    assert!(run_benchmark(&base).is_err());
    assert!(run_benchmark(&BenchmarkConfig {
        seeds: Vec::new(),
        jobs: None,
        ..base
    })
    .is_err());
}
