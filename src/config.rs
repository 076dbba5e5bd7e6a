use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::env;
use std::time::Duration;

use crate::markets::COINGECKO_API_BASE;

#[derive(Debug, Clone)]
pub struct Config {
    // Storage
    pub database_path: String,

    // Market data
    pub coingecko_api_base: String,
    pub market_stale_after: Duration,

    // HTTP API
    pub api_host: String,
    pub api_port: u16,

    // Simulation
    pub simulator_seed: Option<u64>,
    pub initial_trading_balance: Decimal,
    pub initial_funding_balance: Decimal,
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let simulator_seed = match env::var("SIMULATOR_SEED") {
            Ok(raw) if !raw.trim().is_empty() => Some(
                raw.trim()
                    .parse()
                    .with_context(|| format!("SIMULATOR_SEED must be an unsigned integer, got '{}'", raw))?,
            ),
            _ => None,
        };

        Ok(Config {
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "./dashboard.db".to_string()),

            coingecko_api_base: env::var("COINGECKO_API_BASE")
                .unwrap_or_else(|_| COINGECKO_API_BASE.to_string()),
            market_stale_after: Duration::from_secs(parse_or("MARKET_STALE_SECS", 90)),

            api_host: env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            api_port: parse_or("API_PORT", 3000),

            simulator_seed,
            initial_trading_balance: parse_or("INITIAL_TRADING_BALANCE", dec!(5000)),
            initial_funding_balance: parse_or("INITIAL_FUNDING_BALANCE", dec!(4000)),
        })
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.database_path.trim().is_empty() {
            anyhow::bail!("DATABASE_PATH must not be empty");
        }

        if !self.coingecko_api_base.starts_with("http://")
            && !self.coingecko_api_base.starts_with("https://")
        {
            anyhow::bail!("COINGECKO_API_BASE must be an http(s) URL");
        }

        if self.market_stale_after.is_zero() {
            anyhow::bail!("MARKET_STALE_SECS must be greater than 0");
        }

        if self.initial_trading_balance < Decimal::ZERO || self.initial_funding_balance < Decimal::ZERO {
            anyhow::bail!("Initial balances must not be negative");
        }

        Ok(())
    }

    pub fn api_addr(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: "./dashboard.db".to_string(),
            coingecko_api_base: COINGECKO_API_BASE.to_string(),
            market_stale_after: Duration::from_secs(90),
            api_host: "127.0.0.1".to_string(),
            api_port: 3000,
            simulator_seed: None,
            initial_trading_balance: dec!(5000),
            initial_funding_balance: dec!(4000),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.api_addr(), "127.0.0.1:3000");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad_url = Config {
            coingecko_api_base: "ftp://example.com".to_string(),
            ..Config::default()
        };
        assert!(bad_url.validate().is_err());

        let zero_window = Config {
            market_stale_after: Duration::ZERO,
            ..Config::default()
        };
        assert!(zero_window.validate().is_err());

        let negative = Config {
            initial_funding_balance: dec!(-1),
            ..Config::default()
        };
        assert!(negative.validate().is_err());
    }
}
