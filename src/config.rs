use anyhow::Result;
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::services::broadcaster::DEFAULT_TENANT;

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: Option<String>,
    pub cors_origin: String,
    pub metrics_cache_ttl_secs: u64,
    pub trends_cache_ttl_secs: u64,
    pub query_timeout_ms: u64,
    pub cache_sweep_interval_secs: u64,
    pub subscriber_buffer: usize,
    pub trend_zero_fill: bool,
    pub simulation_enabled: bool,
    pub simulation_tenant: String,
    pub simulation_interval_ms: u64,
    pub simulation_seed: Option<u64>,
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server_port: 3001,
            database_url: None,
            cors_origin: "http://localhost:3000".to_string(),
            metrics_cache_ttl_secs: 30,
            trends_cache_ttl_secs: 60,
            query_timeout_ms: 5_000,
            cache_sweep_interval_secs: 60,
            subscriber_buffer: 64,
            trend_zero_fill: false,
            simulation_enabled: true,
            simulation_tenant: DEFAULT_TENANT.to_string(),
            simulation_interval_ms: 3_000,
            simulation_seed: None,
            log_format: LogFormat::Text,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        let defaults = Config::default();
        Ok(Config {
            server_port: parse_var("SERVER_PORT", defaults.server_port)?,
            database_url: env::var("DATABASE_URL").ok().filter(|v| !v.trim().is_empty()),
            cors_origin: env::var("CORS_ORIGIN").unwrap_or(defaults.cors_origin),
            metrics_cache_ttl_secs: parse_var(
                "METRICS_CACHE_TTL_SECS",
                defaults.metrics_cache_ttl_secs,
            )?,
            trends_cache_ttl_secs: parse_var("TRENDS_CACHE_TTL_SECS", defaults.trends_cache_ttl_secs)?,
            query_timeout_ms: parse_var("QUERY_TIMEOUT_MS", defaults.query_timeout_ms)?,
            cache_sweep_interval_secs: parse_var(
                "CACHE_SWEEP_INTERVAL_SECS",
                defaults.cache_sweep_interval_secs,
            )?,
            subscriber_buffer: parse_var("SUBSCRIBER_BUFFER", defaults.subscriber_buffer)?,
            trend_zero_fill: parse_bool("TREND_ZERO_FILL", defaults.trend_zero_fill)?,
            simulation_enabled: parse_bool("SIMULATION_ENABLED", defaults.simulation_enabled)?,
            simulation_tenant: env::var("SIMULATION_TENANT").unwrap_or(defaults.simulation_tenant),
            simulation_interval_ms: parse_var(
                "SIMULATION_INTERVAL_MS",
                defaults.simulation_interval_ms,
            )?,
            simulation_seed: env::var("SIMULATION_SEED")
                .ok()
                .map(|raw| raw.parse::<u64>())
                .transpose()?,
            log_format: match env::var("LOG_FORMAT").ok().as_deref() {
                Some("json") => LogFormat::Json,
                _ => LogFormat::Text,
            },
        })
    }

    pub fn metrics_ttl(&self) -> Duration {
        Duration::from_secs(self.metrics_cache_ttl_secs)
    }

    pub fn trends_ttl(&self) -> Duration {
        Duration::from_secs(self.trends_cache_ttl_secs)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub fn cache_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.cache_sweep_interval_secs)
    }

    pub fn simulation_interval(&self) -> Duration {
        Duration::from_millis(self.simulation_interval_ms)
    }
}

fn parse_var<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{} is invalid: {}", name, e)),
        Err(_) => Ok(default),
    }
}

fn parse_bool(name: &str, default: bool) -> Result<bool> {
    match env::var(name) {
        Ok(raw) => parse_flag(&raw).ok_or_else(|| anyhow::anyhow!("{} must be a boolean", name)),
        Err(_) => Ok(default),
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
