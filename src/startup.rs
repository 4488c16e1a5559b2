use crate::config::Config;
use crate::ports::PaymentStore;
use anyhow::{Context, Result};
use axum::http::HeaderValue;

pub struct ValidationReport {
    pub environment: bool,
    pub store: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.environment && self.store
    }

    pub fn print(&self) {
        println!("\n=== Startup Validation Report ===");
        println!("Environment Variables: {}", status(self.environment));
        println!("Payment Store:         {}", status(self.store));

        if !self.errors.is_empty() {
            println!("\nErrors:");
            for error in &self.errors {
                println!("  ❌ {}", error);
            }
        }

        println!("\nOverall Status: {}", if self.is_valid() { "✅ PASS" } else { "❌ FAIL" });
        println!("=================================\n");
    }
}

fn status(ok: bool) -> &'static str {
    if ok { "✅ OK" } else { "❌ FAIL" }
}

/// Checks the configuration and, when given, that the store answers a ping.
pub async fn validate_environment(
    config: &Config,
    store: Option<&dyn PaymentStore>,
) -> Result<ValidationReport> {
    let mut report = ValidationReport {
        environment: true,
        store: true,
        errors: Vec::new(),
    };

    if let Err(e) = validate_env_vars(config) {
        report.environment = false;
        report.errors.push(format!("Environment: {}", e));
    }

    if let Some(store) = store {
        if let Err(e) = store.ping().await.context("Payment store did not answer ping") {
            report.store = false;
            report.errors.push(format!("Store: {:#}", e));
        }
    }

    Ok(report)
}

fn validate_env_vars(config: &Config) -> Result<()> {
    if config.server_port == 0 {
        anyhow::bail!("SERVER_PORT must be greater than 0");
    }
    if config.metrics_cache_ttl_secs == 0 || config.trends_cache_ttl_secs == 0 {
        anyhow::bail!("cache TTLs must be greater than 0");
    }
    if config.query_timeout_ms == 0 {
        anyhow::bail!("QUERY_TIMEOUT_MS must be greater than 0");
    }
    if config.cache_sweep_interval_secs == 0 {
        anyhow::bail!("CACHE_SWEEP_INTERVAL_SECS must be greater than 0");
    }
    if config.subscriber_buffer == 0 {
        anyhow::bail!("SUBSCRIBER_BUFFER must be greater than 0");
    }
    if config.simulation_enabled && config.simulation_interval_ms == 0 {
        anyhow::bail!("SIMULATION_INTERVAL_MS must be greater than 0");
    }
    if config.simulation_tenant.trim().is_empty() {
        anyhow::bail!("SIMULATION_TENANT is empty");
    }
    if let Some(url) = &config.database_url {
        if !(url.starts_with("postgres://") || url.starts_with("postgresql://")) {
            anyhow::bail!("DATABASE_URL must be a postgres:// URL");
        }
    }

    config
        .cors_origin
        .parse::<HeaderValue>()
        .context("CORS_ORIGIN is not a valid header value")?;

    Ok(())
}
