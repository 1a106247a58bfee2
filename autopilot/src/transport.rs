use anyhow::{anyhow, bail, Context, Result};
use fleet_core::{CommandBatch, MapSnapshot, ScanSnapshot, ShipCommand};
use serde::Serialize;
use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::util::read_json;

/// Where the runner gets snapshots from and sends commands to.
pub trait Transport {
    fn fetch_map(&mut self) -> Result<MapSnapshot>;

    /// `Ok(None)` once the source is exhausted or the match is over.
    fn fetch_scan(&mut self) -> Result<Option<ScanSnapshot>>;

    fn submit(&mut self, batch: &CommandBatch) -> Result<()>;
}

pub const MAP_FILE: &str = "map.json";
pub const SCANS_FILE: &str = "scans.jsonl";
/// Single latest scan, overwritten in place by the game's data dump.
pub const SHIPS_FILE: &str = "ships.json";
pub const COMMANDS_FILE: &str = "commands.jsonl";

struct RecordedScan {
    source: String,
    raw: String,
}

#[derive(Serialize)]
struct SubmittedLine<'a> {
    tick: Option<u64>,
    ships: &'a [ShipCommand],
}

/// Replays a directory of recorded game dumps.
///
/// The directory holds `map.json` plus either `scans.jsonl` (one scan per
/// line), `scan-<n>.json` files replayed in order of `n`, or a lone
/// `ships.json` replayed as a one-scan recording. Submitted batches are
/// appended to `commands.jsonl`, one line per tick.
pub struct ReplayTransport {
    dir: PathBuf,
    scans: VecDeque<RecordedScan>,
    last_tick: Option<u64>,
    output_path: PathBuf,
    output: BufWriter<File>,
}

impl ReplayTransport {
    pub fn open(dir: &Path) -> Result<Self> {
        Self::with_output(dir, &dir.join(COMMANDS_FILE))
    }

    pub fn with_output(dir: &Path, output_path: &Path) -> Result<Self> {
        if !dir.join(MAP_FILE).is_file() {
            bail!("{} has no {MAP_FILE}", dir.display());
        }
        let scans = load_recorded_scans(dir)?;
        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed creating {}", parent.display()))?;
        }
        let file = File::create(output_path)
            .with_context(|| format!("failed creating {}", output_path.display()))?;
        tracing::info!(dir = %dir.display(), scans = scans.len(), "replay opened");

        Ok(Self {
            dir: dir.to_path_buf(),
            scans,
            last_tick: None,
            output_path: output_path.to_path_buf(),
            output: BufWriter::new(file),
        })
    }

    pub fn remaining(&self) -> usize {
        self.scans.len()
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }
}

impl Transport for ReplayTransport {
    fn fetch_map(&mut self) -> Result<MapSnapshot> {
        read_json(&self.dir.join(MAP_FILE))
    }

    fn fetch_scan(&mut self) -> Result<Option<ScanSnapshot>> {
        let Some(recorded) = self.scans.pop_front() else {
            self.output.flush().context("failed flushing command log")?;
            return Ok(None);
        };
        let scan: ScanSnapshot = serde_json::from_str(&recorded.raw)
            .with_context(|| format!("malformed scan in {}", recorded.source))?;
        self.last_tick = Some(scan.tick);
        Ok(Some(scan))
    }

    fn submit(&mut self, batch: &CommandBatch) -> Result<()> {
        let line = SubmittedLine {
            tick: self.last_tick,
            ships: &batch.ships,
        };
        serde_json::to_writer(&mut self.output, &line)?;
        self.output.write_all(b"\n")?;
        Ok(())
    }
}

impl Drop for ReplayTransport {
    fn drop(&mut self) {
        if let Err(err) = self.output.flush() {
            tracing::warn!("failed flushing {}: {err}", self.output_path.display());
        }
    }
}

fn load_recorded_scans(dir: &Path) -> Result<VecDeque<RecordedScan>> {
    let jsonl = dir.join(SCANS_FILE);
    if jsonl.is_file() {
        let data = fs::read_to_string(&jsonl)
            .with_context(|| format!("failed reading {}", jsonl.display()))?;
        return Ok(data
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(number, line)| RecordedScan {
                source: format!("{SCANS_FILE}:{}", number + 1),
                raw: line.to_string(),
            })
            .collect());
    }

    let mut numbered = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("failed listing {}", dir.display()))? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        if let Some(number) = scan_file_number(name) {
            numbered.push((number, path));
        }
    }
    if numbered.is_empty() {
        let ships = dir.join(SHIPS_FILE);
        if ships.is_file() {
            numbered.push((0, ships));
        } else {
            return Err(anyhow!(
                "{} has no {SCANS_FILE}, scan-<n>.json or {SHIPS_FILE}",
                dir.display()
            ));
        }
    }
    numbered.sort();

    numbered
        .into_iter()
        .map(|(_, path)| {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("failed reading {}", path.display()))?;
            Ok(RecordedScan {
                source: path.display().to_string(),
                raw,
            })
        })
        .collect()
}

fn scan_file_number(name: &str) -> Option<u64> {
    name.strip_prefix("scan-")?
        .strip_suffix(".json")?
        .parse()
        .ok()
}
