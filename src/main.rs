use clap::Parser;
use payment_pulse::adapters::{InMemoryPaymentStore, PostgresPaymentStore};
use payment_pulse::cli::{self, Cli, Commands, DbCommands};
use payment_pulse::config::{Config, LogFormat};
use payment_pulse::ports::PaymentStore;
use payment_pulse::services::{run_simulation, SyntheticPaymentGenerator};
use payment_pulse::{create_app, db, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing(&config.log_format);

    let args = Cli::parse();
    match args.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Config => cli::handle_config_validate(&config).await,
        Commands::Db(DbCommands::Migrate) => cli::handle_db_migrate(&config).await,
        Commands::Db(DbCommands::Clear { force }) => cli::handle_db_clear(&config, force).await,
    }
}

fn init_tracing(format: &LogFormat) {
    let json = *format == LogFormat::Json;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer()))
        .init();
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let store: Arc<dyn PaymentStore> = match &config.database_url {
        Some(url) => {
            let pool = db::create_pool(url).await?;
            db::run_migrations(&pool).await?;
            tracing::info!("Using Postgres payment store");
            Arc::new(PostgresPaymentStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory payment store");
            Arc::new(InMemoryPaymentStore::new())
        }
    };

    let state = AppState::new(store, &config);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let sweeper = state
        .metrics
        .clone()
        .spawn_sweeper(config.cache_sweep_interval(), shutdown_rx.clone());

    let simulator = if config.simulation_enabled {
        let generator = match config.simulation_seed {
            Some(seed) => SyntheticPaymentGenerator::seeded(seed),
            None => SyntheticPaymentGenerator::from_entropy(),
        };
        Some(tokio::spawn(run_simulation(
            state.ingestor.clone(),
            generator,
            config.simulation_tenant.clone(),
            config.simulation_interval(),
            shutdown_rx,
        )))
    } else {
        None
    };

    let app = create_app(state.clone(), &config.cors_origin);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    let broadcaster = state.broadcaster.clone();
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            tracing::info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
            // Ends every live WebSocket feed.
            broadcaster.shutdown();
        })
        .await?;

    if let Err(e) = sweeper.await {
        tracing::error!("cache sweeper task failed: {}", e);
    }
    if let Some(simulator) = simulator {
        if let Err(e) = simulator.await {
            tracing::error!("simulator task failed: {}", e);
        }
    }

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
}
