use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use exchange_dashboard::{
    init_database, run_onboarding_checks, run_tui, serve, ApiState, BalanceManager, Config,
    MarketService, MarketSimulator, SimulationIntervals, SqliteBalanceStore, TradingEngine,
};
use std::fs::File;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "exchange-dashboard")]
#[command(about = "Crypto exchange dashboard with a simulated spot market", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Terminal dashboard (default)
    Tui,

    /// Serve /api/markets and /api/exchange-rates over HTTP
    Serve {
        /// Bind host (overrides API_HOST)
        #[arg(long)]
        host: Option<String>,

        /// Bind port (overrides API_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

/// Log to `dashboard.log` under the TUI so the terminal isn't corrupted, stdout otherwise
fn init_logging(to_file: bool) {
    let writer = if to_file {
        match File::create("dashboard.log") {
            Ok(file) => BoxMakeWriter::new(Mutex::new(file)),
            Err(_) => BoxMakeWriter::new(std::io::sink),
        }
    } else {
        BoxMakeWriter::new(std::io::stdout)
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(!to_file),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Tui);

    init_logging(matches!(command, Commands::Tui));

    // Load environment variables
    dotenvy::dotenv().ok();

    let mut config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            std::process::exit(1);
        }
    };

    if let Commands::Serve { ref host, port } = command {
        if let Some(host) = host {
            config.api_host = host.clone();
        }
        if let Some(port) = port {
            config.api_port = port;
        }
    }

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation failed: {}", e);
        std::process::exit(1);
    }

    let market_service = Arc::new(MarketService::new(config.coingecko_api_base.clone()));

    match command {
        Commands::Serve { .. } => {
            serve(&config.api_addr(), ApiState { markets: market_service }).await?;
        }
        Commands::Tui => {
            if let Err(e) = run_onboarding_checks(&config) {
                eprintln!("{}", e);
                std::process::exit(1);
            }

            let db = init_database(&config.database_path)
                .await
                .with_context(|| format!("Failed to open {}", config.database_path))?;
            tracing::info!("✓ Database initialized at {}", config.database_path);

            let store = Arc::new(SqliteBalanceStore::new(db));
            let balances = BalanceManager::load(
                store,
                config.initial_trading_balance,
                config.initial_funding_balance,
            )
            .await
            .context("Failed to load account balances")?;
            tracing::info!("✓ Balances loaded");

            let simulator = match config.simulator_seed {
                Some(seed) => {
                    tracing::info!(seed, "Using seeded market simulator");
                    MarketSimulator::seeded(seed)
                }
                None => MarketSimulator::from_entropy(),
            };
            let engine = Arc::new(TradingEngine::new(simulator));
            let simulation = engine.spawn_simulation(SimulationIntervals::default()).await;

            let result = run_tui(
                Arc::new(balances),
                engine,
                market_service,
                config.market_stale_after,
            )
            .await;

            simulation.shutdown().await;
            result?;
        }
    }

    Ok(())
}
