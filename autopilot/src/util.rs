use anyhow::{anyhow, bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Parses a decimal or `0x`-prefixed hex seed.
pub fn parse_seed(raw: &str) -> Result<u32> {
    let token = raw.trim();
    if token.is_empty() {
        bail!("empty seed");
    }
    match token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(hex, 16)
            .with_context(|| format!("invalid hex seed: {token}")),
        None => token
            .parse::<u32>()
            .with_context(|| format!("invalid decimal seed: {token}")),
    }
}

pub fn seed_to_hex(seed: u32) -> String {
    format!("0x{seed:08x}")
}

fn parse_seed_tokens<'a>(tokens: impl Iterator<Item = &'a str>) -> Result<Vec<u32>> {
    tokens
        .map(str::trim)
        .filter(|token| !token.is_empty() && !token.starts_with('#'))
        .map(parse_seed)
        .collect()
}

pub fn parse_seed_csv(input: &str) -> Result<Vec<u32>> {
    let seeds = parse_seed_tokens(input.split(','))?;
    if seeds.is_empty() {
        bail!("no seeds parsed from --seeds");
    }
    Ok(seeds)
}

/// One seed per line; blank lines and `#` comments are skipped.
pub fn parse_seed_file(path: &Path) -> Result<Vec<u32>> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed reading seed file {}", path.display()))?;
    let seeds = parse_seed_tokens(data.lines())?;
    if seeds.is_empty() {
        bail!("seed file {} had no seeds", path.display());
    }
    Ok(seeds)
}

/// Explicit seeds win, then a seed file, then `count` consecutive seeds from
/// `start`.
pub fn resolve_seeds(
    csv: Option<&str>,
    file: Option<&Path>,
    start: Option<&str>,
    count: u32,
) -> Result<Vec<u32>> {
    if let Some(csv) = csv {
        return parse_seed_csv(csv);
    }
    if let Some(file) = file {
        return parse_seed_file(file);
    }
    if count == 0 {
        return Err(anyhow!("--seed-count must be >= 1"));
    }
    let start = start.map(parse_seed).transpose()?.unwrap_or(1);
    Ok((0..count).map(|offset| start.wrapping_add(offset)).collect())
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let data = fs::read(path).with_context(|| format!("failed reading {}", path.display()))?;
    serde_json::from_slice(&data).with_context(|| format!("failed parsing {}", path.display()))
}

pub fn write_json_pretty<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed creating {}", parent.display()))?;
    }
    let encoded = serde_json::to_vec_pretty(value)?;
    fs::write(path, encoded).with_context(|| format!("failed writing {}", path.display()))
}

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeds_parse_in_both_radixes() {
        assert_eq!(parse_seed("42").unwrap(), 42);
        assert_eq!(parse_seed(" 0xFF ").unwrap(), 255);
        assert!(parse_seed("").is_err());
        assert!(parse_seed("0xZZ").is_err());
        assert_eq!(seed_to_hex(255), "0x000000ff");
    }

    #[test]
    fn seed_sources_resolve_in_order() {
        assert_eq!(
            resolve_seeds(Some("1, 0x10,,3"), None, Some("99"), 5).unwrap(),
            vec![1, 16, 3]
        );
        assert_eq!(
            resolve_seeds(None, None, Some("0x10"), 3).unwrap(),
            vec![16, 17, 18]
        );
        assert!(resolve_seeds(None, None, None, 0).is_err());
        assert!(parse_seed_csv(" , ").is_err());
    }

    #[test]
    fn seed_file_skips_comments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seeds.txt");
        fs::write(&path, "# warmup\n7\n\n0x08\n").unwrap();
        assert_eq!(parse_seed_file(&path).unwrap(), vec![7, 8]);
    }
}
