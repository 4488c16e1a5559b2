use clap::{Parser, Subcommand};
use crate::config::Config;
use crate::ports::PaymentStore;

#[derive(Parser)]
#[command(name = "payment-pulse")]
#[command(about = "Payment Pulse - multi-tenant payment metrics and live event feed", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Database management commands
    #[command(subcommand)]
    Db(DbCommands),

    /// Configuration validation
    Config,
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Run database migrations
    Migrate,

    /// Delete every stored payment
    Clear {
        /// Required; the deletion cannot be undone
        #[arg(long)]
        force: bool,
    },
}

pub async fn handle_db_migrate(config: &Config) -> anyhow::Result<()> {
    let Some(database_url) = &config.database_url else {
        anyhow::bail!("DATABASE_URL is not set; nothing to migrate");
    };

    let pool = crate::db::create_pool(database_url).await?;
    tracing::info!("Running database migrations...");
    crate::db::run_migrations(&pool).await?;

    println!("✓ Database migrations completed");

    Ok(())
}

pub async fn handle_db_clear(config: &Config, force: bool) -> anyhow::Result<()> {
    if !force {
        anyhow::bail!("refusing to clear payments without --force");
    }
    let Some(database_url) = &config.database_url else {
        anyhow::bail!("DATABASE_URL is not set; nothing to clear");
    };

    let pool = crate::db::create_pool(database_url).await?;
    let store = crate::adapters::PostgresPaymentStore::new(pool);
    let removed = store.clear().await?;
    tracing::warn!(removed, "cleared all stored payments");

    println!("✓ Removed {} payments", removed);

    Ok(())
}

pub async fn handle_config_validate(config: &Config) -> anyhow::Result<()> {
    tracing::info!("Validating configuration...");

    println!("Configuration:");
    println!("  Server Port: {}", config.server_port);
    match &config.database_url {
        Some(url) => println!("  Database URL: {}", mask_password(url)),
        None => println!("  Database URL: (unset, in-memory store)"),
    }
    println!("  CORS Origin: {}", config.cors_origin);
    println!(
        "  Cache TTLs: metrics {}s, trends {}s",
        config.metrics_cache_ttl_secs, config.trends_cache_ttl_secs
    );
    println!("  Query Timeout: {}ms", config.query_timeout_ms);
    println!("  Trend Zero Fill: {}", config.trend_zero_fill);
    println!(
        "  Simulation: {} (tenant {}, every {}ms)",
        config.simulation_enabled, config.simulation_tenant, config.simulation_interval_ms
    );

    let store = match &config.database_url {
        Some(url) => {
            let pool = crate::db::create_pool(url).await?;
            Some(crate::adapters::PostgresPaymentStore::new(pool))
        }
        None => None,
    };
    let report = crate::startup::validate_environment(
        config,
        store.as_ref().map(|s| s as &dyn PaymentStore),
    )
    .await?;
    report.print();

    if !report.is_valid() {
        anyhow::bail!("Configuration is invalid");
    }

    tracing::info!("Configuration is valid");
    println!("✓ Configuration is valid");

    Ok(())
}

fn mask_password(url: &str) -> String {
    if let Some(at_pos) = url.rfind('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            if let Some(slash_pos) = url[..colon_pos].rfind("//") {
                let prefix = &url[..slash_pos + 2];
                let user = &url[slash_pos + 2..colon_pos];
                let suffix = &url[at_pos..];
                return format!("{}{}:****{}", prefix, user, suffix);
            }
        }
    }
    url.to_string()
}
