pub mod api;
pub mod balance;
pub mod config;
pub mod database;
pub mod error;
pub mod markets;
pub mod onboarding;
pub mod repository;
pub mod simulator;
pub mod trading;
pub mod tui;
pub mod types;

pub use api::{create_router, serve, ApiState};
pub use balance::{derive_overview, BalanceManager};
pub use config::Config;
pub use database::{init_database, DbPool};
pub use error::{BalanceError, StorageError};
pub use markets::MarketService;
pub use onboarding::run_onboarding_checks;
pub use repository::{BalanceStore, SqliteBalanceStore};
pub use simulator::MarketSimulator;
pub use trading::{SimulationIntervals, TradingEngine};
pub use tui::run_tui;
