//! Configuration loading (SPEC_FULL.md §A.3). A `once_cell::sync::OnceCell<Config>`
//! static, set once at startup from a path (default `config.toml`,
//! overridable via CLI) and parsed with `toml::from_str`, following the
//! `config/config.rs` pattern.
#![allow(dead_code)]

use std::{fs, path::Path};

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use serde::Deserialize;

static CONFIG_CELL: OnceCell<Config> = OnceCell::new();

/// Set once by `main` before anything else reads `config()`, so the CLI's
/// `--config` flag can override the default path.
pub fn init(path: &Path) -> Result<()> {
    let config = load_config(path)?;
    CONFIG_CELL.set(config).map_err(|_| anyhow::anyhow!("config already initialized"))?;
    Ok(())
}

pub fn config() -> &'static Config {
    CONFIG_CELL.get().expect("config::init must run before config() is called")
}

/// Non-panicking lookup, for code paths (library unit tests, fixtures) that
/// build domain objects without ever calling `init` — they fall back to the
/// `DEFAULT_*` constants in `crate::constants` instead.
pub fn try_config() -> Option<&'static Config> {
    CONFIG_CELL.get()
}

/// Effective `[locator]`/`[redis]` tunables (SPEC_FULL.md §A.3): reads the
/// loaded config when one has been initialized, otherwise the same defaults
/// `serde` would have filled in. Runtime code (`query.rs`, `station.rs`,
/// `ratelimit.rs`) calls these instead of hardcoding the constants directly,
/// so the TOML file actually governs behavior.
pub fn min_wifis_in_query() -> usize {
    try_config().map(|c| c.locator.min_wifis_in_query).unwrap_or(crate::constants::DEFAULT_MIN_WIFIS_IN_QUERY)
}

pub fn max_wifi_cluster_km() -> f64 {
    try_config().map(|c| c.locator.max_wifi_cluster_km).unwrap_or(crate::constants::DEFAULT_MAX_WIFI_CLUSTER_KM)
}

pub fn station_staleness_seconds() -> i64 {
    try_config().map(|c| c.locator.station_staleness_seconds).unwrap_or(crate::constants::DEFAULT_STATION_STALENESS_SECONDS)
}

pub fn rate_limit_ttl_seconds() -> i64 {
    try_config()
        .map(|c| c.redis.rate_limit_ttl_days as i64 * 60 * 60 * 24)
        .unwrap_or(crate::constants::DEFAULT_RATE_LIMIT_TTL_SECONDS)
}

pub fn apiuser_ttl_seconds() -> i64 {
    try_config().map(|c| c.redis.apiuser_ttl_days as i64 * 60 * 60 * 24).unwrap_or(crate::constants::DEFAULT_APIUSER_TTL_SECONDS)
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: Server,
    pub redis: Redis,
    pub fallback: Fallback,
    pub locator: Locator,
    pub geocoder: GeocoderConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Server {
    /// Port the HTTP API listens on.
    pub http_port: u16,
    /// Number of actix-web worker threads.
    pub num_http_workers: usize,
    /// Maximum request body size, in megabytes.
    pub max_payload_mb: usize,
    /// `env_logger` filter string, e.g. `"info"`.
    pub log_level: String,
    /// Known API keys, by name; see `ApiKeyRegistry`.
    pub api_keys: Vec<ApiKeyEntry>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiKeyEntry {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub allow_fallback: bool,
    #[serde(default = "default_true")]
    pub log_enabled: bool,
    /// Daily request cap enforced by `RedisRateLimiter` (spec §5/§6).
    pub daily_limit: u64,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct Redis {
    pub url: String,
    #[serde(default = "default_rate_limit_ttl_days")]
    pub rate_limit_ttl_days: u32,
    #[serde(default = "default_apiuser_ttl_days")]
    pub apiuser_ttl_days: u32,
    #[serde(default = "default_fallback_cache_ttl_seconds")]
    pub fallback_cache_ttl_seconds: i64,
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
}

fn default_rate_limit_ttl_days() -> u32 {
    (crate::constants::DEFAULT_RATE_LIMIT_TTL_SECONDS / (60 * 60 * 24)) as u32
}
fn default_apiuser_ttl_days() -> u32 {
    (crate::constants::DEFAULT_APIUSER_TTL_SECONDS / (60 * 60 * 24)) as u32
}
fn default_fallback_cache_ttl_seconds() -> i64 {
    60 * 60 * 24 * 7
}
fn default_call_timeout_ms() -> u64 {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct Fallback {
    pub enabled: bool,
    pub url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_fallback_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_fallback_retries")]
    pub retries: u32,
}

fn default_fallback_timeout_ms() -> u64 {
    5_000
}
fn default_fallback_retries() -> u32 {
    1
}

#[derive(Debug, Deserialize, Clone)]
pub struct Locator {
    #[serde(default = "default_min_wifis_in_query")]
    pub min_wifis_in_query: usize,
    #[serde(default = "default_max_wifi_cluster_km")]
    pub max_wifi_cluster_km: f64,
    #[serde(default = "default_station_staleness_seconds")]
    pub station_staleness_seconds: i64,
}

fn default_min_wifis_in_query() -> usize {
    crate::constants::DEFAULT_MIN_WIFIS_IN_QUERY
}
fn default_max_wifi_cluster_km() -> f64 {
    crate::constants::DEFAULT_MAX_WIFI_CLUSTER_KM
}
fn default_station_staleness_seconds() -> i64 {
    crate::constants::DEFAULT_STATION_STALENESS_SECONDS
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeocoderConfig {
    /// Path to `regions.geojson.gz` (spec §6). When unset, the embedded
    /// test dataset is used (small set of coarse polygons).
    #[serde(default)]
    pub region_dataset_path: Option<String>,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path).with_context(|| format!("reading config file {}", path.display()))?;
    let config = toml::from_str(&data).context("parsing config file")?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_config() {
        let toml = r#"
[server]
http_port = 8080
num_http_workers = 4
max_payload_mb = 1
log_level = "info"
api_keys = [{ key = "abc", name = "test", daily_limit = 1000 }]

[redis]
url = "redis://127.0.0.1/"

[fallback]
enabled = false
url = "https://example.invalid/geolocate"

[locator]

[geocoder]
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.http_port, 8080);
        assert_eq!(config.locator.min_wifis_in_query, 2);
        assert_eq!(config.redis.apiuser_ttl_days, 8);
    }
}
