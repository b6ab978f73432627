// Configuration loading and validation.
//
// All settings come from the environment; `from_lookup` takes the source
// as a function so tests never touch process-wide env state.

use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};

use crate::engine::EngineConfig;

pub const DEFAULT_PORT: u16 = 8080;
const DEFAULT_MAX_ITEM_BYTES: usize = 256 * 1024 * 1024;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5_000;
const MIN_REQUEST_TIMEOUT_MS: u64 = 100;
const DEFAULT_MAX_INFLIGHT: usize = 1024;
const DEFAULT_MAX_SHARD_MAILBOX: usize = 1024;
const DEFAULT_SWEEP_INTERVAL_MS: u64 = 1_000;
const DEFAULT_SWEEP_BATCH: usize = 256;

/// Runtime configuration, validated at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub api_token: String,
    pub read_requires_auth: bool,
    pub shards: usize,
    pub max_item_bytes: usize,
    pub memory_budget_bytes: Option<u64>,
    pub request_timeout: Duration,
    pub max_inflight: usize,
    pub max_shard_mailbox: usize,
    pub log_level: String,
    pub log_json: bool,
    pub sweep_interval: Duration,
    pub sweep_batch: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_token = match lookup("API_TOKEN") {
            Some(token) if !token.is_empty() => token,
            Some(_) => bail!("API_TOKEN must not be empty"),
            None => bail!("API_TOKEN is required"),
        };

        let port = parse_or("PORT", DEFAULT_PORT, &lookup)?;
        let read_requires_auth = parse_bool_or("READ_REQUIRES_AUTH", false, &lookup)?;

        let shards = parse_or("SHARDS", num_cpus::get().max(1), &lookup)?;
        if shards == 0 {
            bail!("SHARDS must be at least 1");
        }

        let max_item_bytes = parse_or("MAX_ITEM_BYTES", DEFAULT_MAX_ITEM_BYTES, &lookup)?;
        if max_item_bytes == 0 {
            bail!("MAX_ITEM_BYTES must be at least 1");
        }
        let memory_budget_bytes = parse_opt::<u64>("MEMORY_BUDGET_BYTES", &lookup)?;

        let request_timeout_ms = parse_or("REQUEST_TIMEOUT_MS", DEFAULT_REQUEST_TIMEOUT_MS, &lookup)?;
        if request_timeout_ms < MIN_REQUEST_TIMEOUT_MS {
            bail!(
                "REQUEST_TIMEOUT_MS must be at least {}",
                MIN_REQUEST_TIMEOUT_MS
            );
        }

        let max_inflight = parse_or("MAX_INFLIGHT", DEFAULT_MAX_INFLIGHT, &lookup)?;
        if max_inflight == 0 {
            bail!("MAX_INFLIGHT must be at least 1");
        }
        let max_shard_mailbox = parse_or("MAX_SHARD_MAILBOX", DEFAULT_MAX_SHARD_MAILBOX, &lookup)?;
        if max_shard_mailbox == 0 {
            bail!("MAX_SHARD_MAILBOX must be at least 1");
        }

        let log_level = lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string());
        let log_json = match lookup("LOG_FORMAT").as_deref() {
            None | Some("pretty") => false,
            Some("json") => true,
            Some(other) => bail!("LOG_FORMAT must be json or pretty, got {other:?}"),
        };

        let sweep_interval_ms = parse_or("SWEEP_INTERVAL_MS", DEFAULT_SWEEP_INTERVAL_MS, &lookup)?;
        if sweep_interval_ms == 0 {
            bail!("SWEEP_INTERVAL_MS must be at least 1");
        }
        let sweep_batch = parse_or("SWEEP_BATCH", DEFAULT_SWEEP_BATCH, &lookup)?;
        if sweep_batch == 0 {
            bail!("SWEEP_BATCH must be at least 1");
        }

        Ok(Self {
            port,
            api_token,
            read_requires_auth,
            shards,
            max_item_bytes,
            memory_budget_bytes,
            request_timeout: Duration::from_millis(request_timeout_ms),
            max_inflight,
            max_shard_mailbox,
            log_level,
            log_json,
            sweep_interval: Duration::from_millis(sweep_interval_ms),
            sweep_batch,
        })
    }

    /// The engine's view of this configuration.
    pub fn engine(&self) -> EngineConfig {
        EngineConfig {
            shards: self.shards,
            max_inflight: self.max_inflight,
            max_shard_mailbox: self.max_shard_mailbox,
            max_item_bytes: self.max_item_bytes,
            memory_budget_bytes: self.memory_budget_bytes,
            sweep_interval: self.sweep_interval,
            sweep_batch: self.sweep_batch,
        }
    }
}

fn parse_or<T>(name: &str, default: T, lookup: &impl Fn(&str) -> Option<String>) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("invalid {name} value {raw:?}: {e}")),
    }
}

fn parse_opt<T>(name: &str, lookup: &impl Fn(&str) -> Option<String>) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| anyhow!("invalid {name} value {raw:?}: {e}")),
    }
}

fn parse_bool_or(
    name: &str,
    default: bool,
    lookup: &impl Fn(&str) -> Option<String>,
) -> Result<bool> {
    match lookup(name).as_deref().map(str::trim) {
        None => Ok(default),
        Some("true") | Some("1") | Some("yes") => Ok(true),
        Some("false") | Some("0") | Some("no") => Ok(false),
        Some(other) => bail!("invalid {name} value {other:?}: expected a boolean"),
    }
}
