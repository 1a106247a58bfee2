use anyhow::{bail, Context, Result};
use fleet_core::{CommandBatch, Engine, EngineConfig, ShipDecision, Throttle};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::thread;
use std::time::Duration;

use crate::transport::Transport;

/// Consecutive failed fetches tolerated before the loop gives up.
pub const MAX_CONSECUTIVE_FETCH_FAILURES: u32 = 10;

#[derive(Clone, Debug)]
pub struct RunOptions {
    pub max_ticks: u64,
    pub poll_interval: Option<Duration>,
    pub engine: EngineConfig,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            max_ticks: crate::config::DEFAULT_MAX_TICKS,
            poll_interval: None,
            engine: EngineConfig::default(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub ticks: u64,
    pub first_tick: Option<u64>,
    pub last_tick: Option<u64>,
    pub skipped_ticks: u64,
    pub failed_fetches: u64,
    pub failed_submits: u64,
    pub commands: u64,
    pub idle_commands: u64,
    pub turns: u64,
    pub throttle_changes: u64,
    pub shots: u64,
    pub decisions: BTreeMap<String, u64>,
}

impl RunMetrics {
    fn record(&mut self, decisions: &[ShipDecision]) {
        for decision in decisions {
            let command = &decision.command;
            self.commands += 1;
            if command.is_idle() {
                self.idle_commands += 1;
            }
            if command.rotate.is_turn() {
                self.turns += 1;
            }
            if command.acceleration != Throttle::Hold {
                self.throttle_changes += 1;
            }
            if command.cannon_shoot.is_some() {
                self.shots += 1;
            }
            let name = decision.decision.map_or("invalid", |decision| decision.name());
            *self.decisions.entry(name.to_string()).or_default() += 1;
        }
    }
}

/// Builds an engine from the transport's map, then polls, decides and
/// submits until the tick limit or the end of the scan stream.
pub fn run_loop<T: Transport>(transport: &mut T, options: &RunOptions) -> Result<RunMetrics> {
    let map = transport.fetch_map().context("failed fetching map")?;
    let mut engine =
        Engine::new(&map, options.engine.clone()).context("failed initializing engine")?;
    let mut metrics = RunMetrics::default();
    let mut consecutive_failures = 0u32;

    while metrics.ticks < options.max_ticks {
        let scan = match transport.fetch_scan() {
            Ok(Some(scan)) => {
                consecutive_failures = 0;
                scan
            }
            Ok(None) => break,
            Err(err) => {
                metrics.failed_fetches += 1;
                consecutive_failures += 1;
                tracing::warn!("scan fetch failed ({consecutive_failures} in a row): {err:#}");
                if consecutive_failures >= MAX_CONSECUTIVE_FETCH_FAILURES {
                    bail!("giving up after {consecutive_failures} failed fetches: {err:#}");
                }
                pause(options);
                continue;
            }
        };

        if metrics.last_tick == Some(scan.tick) {
            metrics.skipped_ticks += 1;
            tracing::debug!(tick = scan.tick, "tick already handled, skipping");
            pause(options);
            continue;
        }

        let decisions = engine.tick_detailed(&scan);
        metrics.record(&decisions);
        let batch = CommandBatch {
            ships: decisions.into_iter().map(|decision| decision.command).collect(),
        };

        match transport.submit(&batch) {
            Ok(()) => tracing::info!(
                tick = scan.tick,
                ships = batch.ships.len(),
                enemies = scan.enemy_ships.len(),
                "commands submitted"
            ),
            Err(err) => {
                metrics.failed_submits += 1;
                tracing::warn!(tick = scan.tick, "submit failed, batch dropped: {err:#}");
            }
        }

        metrics.ticks += 1;
        metrics.first_tick.get_or_insert(scan.tick);
        metrics.last_tick = Some(scan.tick);
        pause(options);
    }

    Ok(metrics)
}

fn pause(options: &RunOptions) {
    if let Some(interval) = options.poll_interval {
        thread::sleep(interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use fleet_core::{MapSnapshot, ScanSnapshot, ShipId, ShipSnapshot};
    use std::collections::VecDeque;

    /// Scripted transport: each entry is a scan or a fetch error.
    struct Scripted {
        scans: VecDeque<Result<ScanSnapshot, String>>,
        fail_submit_for: Option<u64>,
        current: Option<u64>,
        submitted: Vec<(Option<u64>, CommandBatch)>,
    }

    impl Transport for Scripted {
        fn fetch_map(&mut self) -> Result<MapSnapshot> {
            Ok(MapSnapshot::new(600, 600, Vec::new()))
        }

        fn fetch_scan(&mut self) -> Result<Option<ScanSnapshot>> {
            match self.scans.pop_front() {
                Some(Ok(scan)) => {
                    self.current = Some(scan.tick);
                    Ok(Some(scan))
                }
                Some(Err(message)) => Err(anyhow!(message)),
                None => Ok(None),
            }
        }

        fn submit(&mut self, batch: &CommandBatch) -> Result<()> {
            if self.current.is_some() && self.current == self.fail_submit_for {
                return Err(anyhow!("connection reset"));
            }
            self.submitted.push((self.current, batch.clone()));
            Ok(())
        }
    }

    fn scan(tick: u64) -> ScanSnapshot {
        ScanSnapshot {
            tick,
            my_ships: vec![ShipSnapshot {
                id: ShipId::new("s1"),
                x: 300.0,
                y: 300.0,
                cannon_radius: 50.0,
                scan_radius: 100.0,
                ..ShipSnapshot::default()
            }],
            ..ScanSnapshot::default()
        }
    }

    #[test]
    fn duplicates_are_skipped_and_failures_tolerated() {
        let mut transport = Scripted {
            scans: VecDeque::from(vec![
                Ok(scan(1)),
                Ok(scan(1)),
                Err("timeout".to_string()),
                Ok(scan(2)),
                Ok(scan(3)),
            ]),
            fail_submit_for: Some(2),
            current: None,
            submitted: Vec::new(),
        };
        let metrics = run_loop(&mut transport, &RunOptions::default()).unwrap();

        assert_eq!(metrics.ticks, 3);
        assert_eq!(metrics.skipped_ticks, 1);
        assert_eq!(metrics.failed_fetches, 1);
        assert_eq!(metrics.failed_submits, 1);
        assert_eq!(metrics.commands, 3);
        assert_eq!(metrics.first_tick, Some(1));
        assert_eq!(metrics.last_tick, Some(3));
        let ticks: Vec<Option<u64>> = transport.submitted.iter().map(|(tick, _)| *tick).collect();
        assert_eq!(ticks, vec![Some(1), Some(3)]);
        assert_eq!(metrics.decisions.values().sum::<u64>(), 3);
    }

    #[test]
    fn stops_at_max_ticks() {
        let mut transport = Scripted {
            scans: (0..10).map(|tick| Ok(scan(tick))).collect(),
            fail_submit_for: None,
            current: None,
            submitted: Vec::new(),
        };
        let options = RunOptions {
            max_ticks: 4,
            ..RunOptions::default()
        };
        let metrics = run_loop(&mut transport, &options).unwrap();
        assert_eq!(metrics.ticks, 4);
        assert_eq!(transport.scans.len(), 6);
    }

    #[test]
    fn persistent_fetch_failure_is_fatal() {
        let mut transport = Scripted {
            scans: (0..MAX_CONSECUTIVE_FETCH_FAILURES)
                .map(|_| Err("down".to_string()))
                .collect(),
            fail_submit_for: None,
            current: None,
            submitted: Vec::new(),
        };
        assert!(run_loop(&mut transport, &RunOptions::default()).is_err());
    }
}
