use anyhow::{Context, Result};
use serde::Deserialize;
use std::{fs, path::Path};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub gate: Gate,
    #[serde(default)]
    pub receipts: Receipts,
    #[serde(default)]
    pub cache: Cache,
    #[serde(default)]
    pub metrics: Metrics,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Gate {
    /// Minimum upload/download ratio an identity needs to be announced to.
    #[serde(default = "default_min_ratio")]
    pub min_ratio: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Receipts {
    /// Receipts stamped outside this window are rejected as stale; replay
    /// entries are pruned past it.
    #[serde(default = "default_freshness_window")]
    pub freshness_window_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Cache {
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Metrics {
    #[serde(default = "default_metrics_bind")]
    pub bind: String,
}

fn default_min_ratio() -> f64 { 0.5 }
fn default_freshness_window() -> u64 { 300 }
fn default_cache_ttl() -> u64 { 30 }
fn default_metrics_bind() -> String { "0.0.0.0:9100".into() }

impl Default for Gate {
    fn default() -> Self { Self { min_ratio: default_min_ratio() } }
}
impl Default for Receipts {
    fn default() -> Self { Self { freshness_window_secs: default_freshness_window() } }
}
impl Default for Cache {
    fn default() -> Self { Self { ttl_secs: default_cache_ttl() } }
}
impl Default for Metrics {
    fn default() -> Self { Self { bind: default_metrics_bind() } }
}

/// Read the TOML file at `p` and deserialize into `Config`.
/// *Adds context* so user errors print a friendlier message.
///
/// # Errors
/// * Returns an anyhow::Error if the file cannot be read or parsed.
pub fn load<P: AsRef<Path>>(p: P) -> Result<Config> {
    let text = fs::read_to_string(&p)
        .with_context(|| format!("couldn't read config file {}", p.as_ref().display()))?;
    load_from_str(&text)
}

pub fn load_from_str(text: &str) -> Result<Config> {
    toml::from_str(text).with_context(|| "invalid TOML in config file".to_string())
}
