use anyhow::Result;
use rand::Rng;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::types::OrderSide;

pub const COINGECKO_API_BASE: &str = "https://api.coingecko.com/api/v3";

/// Market data older than this is flagged stale by the dashboard
pub const STALE_AFTER: Duration = Duration::from_secs(90);

/// CoinGecko ids tracked on the overview, with the pair they are shown as
const TRACKED_COINS: [(&str, &str, &str); 7] = [
    ("bitcoin", "BTC/USDT", "Bitcoin"),
    ("ethereum", "ETH/USDT", "Ethereum"),
    ("binancecoin", "BNB/USDT", "BNB"),
    ("solana", "SOL/USDT", "Solana"),
    ("ripple", "XRP/USDT", "XRP"),
    ("cardano", "ADA/USDT", "Cardano"),
    ("dogecoin", "DOGE/USDT", "Dogecoin"),
];

/// Row of `/coins/markets`; CoinGecko sends nulls for thin markets
#[derive(Debug, Clone, Deserialize)]
pub struct CoinGeckoMarket {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub current_price: Option<f64>,
    #[serde(default)]
    pub price_change_percentage_24h: Option<f64>,
    #[serde(default)]
    pub high_24h: Option<f64>,
    #[serde(default)]
    pub low_24h: Option<f64>,
    #[serde(default)]
    pub total_volume: Option<f64>,
}

/// Price-table row served by `/api/markets`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketData {
    pub pair: String,
    pub name: String,
    pub price: Decimal,
    #[serde(rename = "change24h")]
    pub change_24h: Decimal,
    #[serde(rename = "high24h")]
    pub high_24h: Decimal,
    #[serde(rename = "low24h")]
    pub low_24h: Decimal,
    #[serde(rename = "volume24h")]
    pub volume_24h: Decimal,
}

/// Recent trade shown under the price table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionData {
    pub pair: String,
    pub side: OrderSide,
    pub price: Decimal,
    pub amount: Decimal,
    /// Unix epoch milliseconds
    pub time: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketsResponse {
    pub markets: Vec<MarketData>,
    pub executions: Vec<ExecutionData>,
    /// Unix epoch milliseconds when the payload was produced
    pub timestamp: i64,
}

impl MarketsResponse {
    pub fn age(&self, now_ms: i64) -> Duration {
        Duration::from_millis(now_ms.saturating_sub(self.timestamp).max(0) as u64)
    }

    pub fn is_stale(&self, now_ms: i64, max_age: Duration) -> bool {
        self.age(now_ms) > max_age
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurrencyRates {
    #[serde(rename = "USD")]
    pub usd: Decimal,
    #[serde(rename = "AED")]
    pub aed: Decimal,
    #[serde(rename = "GBP")]
    pub gbp: Decimal,
    #[serde(rename = "EUR")]
    pub eur: Decimal,
    #[serde(rename = "CAD")]
    pub cad: Decimal,
}

impl CurrencyRates {
    pub fn get(&self, currency: &str) -> Option<Decimal> {
        match currency.to_uppercase().as_str() {
            "USD" => Some(self.usd),
            "AED" => Some(self.aed),
            "GBP" => Some(self.gbp),
            "EUR" => Some(self.eur),
            "CAD" => Some(self.cad),
            _ => None,
        }
    }

    fn from_quotes(quotes: &HashMap<String, f64>) -> Option<Self> {
        let rate = |code: &str| quotes.get(code).copied().and_then(Decimal::from_f64);
        Some(Self {
            usd: rate("usd")?,
            aed: rate("aed")?,
            gbp: rate("gbp")?,
            eur: rate("eur")?,
            cad: rate("cad")?,
        })
    }
}

/// Fiat quotes for the balance cards, served by `/api/exchange-rates`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRates {
    #[serde(rename = "USDT")]
    pub usdt: CurrencyRates,
    #[serde(rename = "BTC")]
    pub btc: CurrencyRates,
}

impl ExchangeRates {
    /// Value a USDT-denominated amount in `currency`
    pub fn usdt_to(&self, amount: Decimal, currency: &str) -> Option<Decimal> {
        self.usdt.get(currency).map(|rate| (amount * rate).round_dp(2))
    }

    /// Express a USDT amount in BTC, using the BTC/USD quote
    pub fn usdt_in_btc(&self, amount: Decimal) -> Option<Decimal> {
        if self.btc.usd.is_zero() {
            return None;
        }
        Some((amount * self.usdt.usd / self.btc.usd).round_dp(8))
    }
}

/// Static price table served when CoinGecko is down or rate-limiting
pub fn fallback_markets(now_ms: i64) -> MarketsResponse {
    let market = |pair: &str, name: &str, price, change, high, low, volume| MarketData {
        pair: pair.to_string(),
        name: name.to_string(),
        price,
        change_24h: change,
        high_24h: high,
        low_24h: low,
        volume_24h: volume,
    };
    let execution = |pair: &str, side, price, amount, secs_ago: i64| ExecutionData {
        pair: pair.to_string(),
        side,
        price,
        amount,
        time: now_ms - secs_ago * 1000,
    };

    MarketsResponse {
        markets: vec![
            market("BTC/USDT", "Bitcoin", dec!(37268.00), dec!(1.24), dec!(37850.00), dec!(36620.00), dec!(18923456789.00)),
            market("ETH/USDT", "Ethereum", dec!(2031.45), dec!(0.87), dec!(2065.10), dec!(1998.30), dec!(9342187650.00)),
            market("BNB/USDT", "BNB", dec!(228.30), dec!(-0.42), dec!(232.80), dec!(226.10), dec!(612034500.00)),
            market("SOL/USDT", "Solana", dec!(56.21), dec!(4.18), dec!(57.94), dec!(53.40), dec!(1874320000.00)),
            market("XRP/USDT", "XRP", dec!(0.6123), dec!(-1.05), dec!(0.6250), dec!(0.6041), dec!(1203450000.00)),
            market("ADA/USDT", "Cardano", dec!(0.3791), dec!(2.36), dec!(0.3850), dec!(0.3690), dec!(402310000.00)),
            market("DOGE/USDT", "Dogecoin", dec!(0.0763), dec!(0.52), dec!(0.0781), dec!(0.0752), dec!(512890000.00)),
        ],
        executions: vec![
            execution("BTC/USDT", OrderSide::Buy, dec!(37268.00), dec!(0.0421), 3),
            execution("ETH/USDT", OrderSide::Sell, dec!(2031.20), dec!(1.2500), 8),
            execution("BTC/USDT", OrderSide::Sell, dec!(37265.50), dec!(0.1150), 14),
            execution("SOL/USDT", OrderSide::Buy, dec!(56.22), dec!(31.0000), 21),
            execution("XRP/USDT", OrderSide::Buy, dec!(0.6124), dec!(2400.0000), 30),
        ],
        timestamp: now_ms,
    }
}

/// Constant quotes used when the rates lookup fails
pub fn fallback_exchange_rates() -> ExchangeRates {
    ExchangeRates {
        usdt: CurrencyRates {
            usd: dec!(1.00),
            aed: dec!(3.67),
            gbp: dec!(0.79),
            eur: dec!(0.92),
            cad: dec!(1.36),
        },
        btc: CurrencyRates {
            usd: dec!(37268.00),
            aed: dec!(136874.00),
            gbp: dec!(29441.72),
            eur: dec!(34286.56),
            cad: dec!(50684.48),
        },
    }
}

fn to_decimal(value: Option<f64>) -> Decimal {
    value.and_then(Decimal::from_f64).unwrap_or_default()
}

/// Map CoinGecko rows onto the tracked pairs, keeping the tracked order
pub fn markets_from_coingecko(rows: Vec<CoinGeckoMarket>) -> Vec<MarketData> {
    let by_id: HashMap<String, CoinGeckoMarket> =
        rows.into_iter().map(|row| (row.id.clone(), row)).collect();

    TRACKED_COINS
        .iter()
        .filter_map(|(id, pair, name)| {
            let row = by_id.get(*id)?;
            let price = row.current_price.and_then(Decimal::from_f64)?;
            Some(MarketData {
                pair: pair.to_string(),
                name: if row.name.is_empty() { name.to_string() } else { row.name.clone() },
                price,
                change_24h: to_decimal(row.price_change_percentage_24h).round_dp(2),
                high_24h: to_decimal(row.high_24h),
                low_24h: to_decimal(row.low_24h),
                volume_24h: to_decimal(row.total_volume),
            })
        })
        .collect()
}

/// Recent-trades strip around live prices. CoinGecko has no public trade
/// feed, so each pair gets a couple of prints jittered around its price.
pub fn synthesize_executions<R: Rng + ?Sized>(
    markets: &[MarketData],
    now_ms: i64,
    rng: &mut R,
) -> Vec<ExecutionData> {
    let mut executions: Vec<ExecutionData> = markets
        .iter()
        .flat_map(|m| std::iter::repeat(m).take(2))
        .map(|m| {
            let jitter = Decimal::from_f64(rng.gen_range(-0.0005..0.0005)).unwrap_or_default();
            let notional = Decimal::from_f64(rng.gen_range(50.0..5000.0)).unwrap_or_default();
            let price = (m.price * (Decimal::ONE + jitter)).round_dp(m.price.scale() + 4);
            let amount = if price.is_zero() {
                Decimal::ZERO
            } else {
                (notional / price).round_dp(4)
            };
            ExecutionData {
                pair: m.pair.clone(),
                side: if rng.gen_bool(0.5) { OrderSide::Buy } else { OrderSide::Sell },
                price,
                amount,
                time: now_ms - rng.gen_range(0..60_000),
            }
        })
        .collect();

    executions.sort_by(|a, b| b.time.cmp(&a.time));
    executions
}

/// Market data service backed by the public CoinGecko API
pub struct MarketService {
    client: reqwest::Client,
    base_url: String,
}

impl MarketService {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Price table and recent executions. Never fails: any upstream error
    /// (including rate limiting) yields the static fallback payload.
    pub async fn fetch_markets(&self) -> MarketsResponse {
        let now = chrono::Utc::now().timestamp_millis();
        match self.fetch_live_markets().await {
            Ok(markets) if !markets.is_empty() => {
                let executions = synthesize_executions(&markets, now, &mut rand::thread_rng());
                MarketsResponse {
                    markets,
                    executions,
                    timestamp: now,
                }
            }
            Ok(_) => {
                tracing::warn!("CoinGecko returned no tracked markets, serving fallback");
                fallback_markets(now)
            }
            Err(e) => {
                tracing::warn!("Failed to fetch markets, serving fallback: {}", e);
                fallback_markets(now)
            }
        }
    }

    async fn fetch_live_markets(&self) -> Result<Vec<MarketData>> {
        let ids: Vec<&str> = TRACKED_COINS.iter().map(|(id, _, _)| *id).collect();
        let url = format!(
            "{}/coins/markets?vs_currency=usd&ids={}&order=market_cap_desc&sparkline=false",
            self.base_url,
            ids.join(",")
        );

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            anyhow::bail!("Failed to fetch markets: {}", response.status());
        }

        let rows: Vec<CoinGeckoMarket> = response.json().await?;
        Ok(markets_from_coingecko(rows))
    }

    /// USDT and BTC quotes in the supported fiat currencies, falling back
    /// to constants on any failure.
    pub async fn fetch_exchange_rates(&self) -> ExchangeRates {
        match self.fetch_live_rates().await {
            Ok(rates) => rates,
            Err(e) => {
                tracing::warn!("Failed to fetch exchange rates, using constants: {}", e);
                fallback_exchange_rates()
            }
        }
    }

    async fn fetch_live_rates(&self) -> Result<ExchangeRates> {
        let url = format!(
            "{}/simple/price?ids=tether,bitcoin&vs_currencies=usd,aed,gbp,eur,cad",
            self.base_url
        );

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            anyhow::bail!("Failed to fetch exchange rates: {}", response.status());
        }

        let quotes: HashMap<String, HashMap<String, f64>> = response.json().await?;
        parse_exchange_rates(&quotes)
    }
}

/// Read a `/simple/price` body into [`ExchangeRates`]
pub fn parse_exchange_rates(quotes: &HashMap<String, HashMap<String, f64>>) -> Result<ExchangeRates> {
    let rates_for = |id: &str| {
        quotes
            .get(id)
            .and_then(CurrencyRates::from_quotes)
            .ok_or_else(|| anyhow::anyhow!("incomplete quotes for {}", id))
    };

    Ok(ExchangeRates {
        usdt: rates_for("tether")?,
        btc: rates_for("bitcoin")?,
    })
}

impl Default for MarketService {
    fn default() -> Self {
        Self::new(COINGECKO_API_BASE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    // Nothing listens on the discard port, so requests fail fast
    const UNREACHABLE: &str = "http://127.0.0.1:9";

    #[test]
    fn test_fallback_payload() {
        let payload = fallback_markets(1_000);
        assert_eq!(payload.markets.len(), 7);
        assert_eq!(payload.markets[0].pair, "BTC/USDT");
        assert_eq!(payload.markets[0].price, dec!(37268.00));
        assert_eq!(payload.timestamp, 1_000);
    }

    #[tokio::test]
    async fn test_unreachable_upstream_serves_fallback() {
        let service = MarketService::new(UNREACHABLE);

        let payload = service.fetch_markets().await;
        assert_eq!(payload.markets.len(), 7);
        assert_eq!(payload.markets[0].price, dec!(37268.00));

        let rates = service.fetch_exchange_rates().await;
        assert_eq!(rates, fallback_exchange_rates());
    }

    #[test]
    fn test_staleness_threshold() {
        let payload = fallback_markets(0);
        assert!(!payload.is_stale(90_000, STALE_AFTER));
        assert!(payload.is_stale(90_001, STALE_AFTER));
        // clock skew never reads as stale
        assert!(!payload.is_stale(-5_000, STALE_AFTER));
    }

    #[test]
    fn test_coingecko_rows_mapped_in_tracked_order() {
        let body = r#"[
            {"id": "ethereum", "name": "Ethereum", "current_price": 2100.5,
             "price_change_percentage_24h": 1.23456, "high_24h": 2150, "low_24h": 2050, "total_volume": 1000},
            {"id": "bitcoin", "name": "Bitcoin", "current_price": 40000,
             "price_change_percentage_24h": null, "high_24h": null, "low_24h": 39000, "total_volume": 5000},
            {"id": "pepe", "name": "Pepe", "current_price": 0.000001},
            {"id": "solana", "name": "Solana", "current_price": null}
        ]"#;
        let rows: Vec<CoinGeckoMarket> = serde_json::from_str(body).unwrap();
        let markets = markets_from_coingecko(rows);

        let pairs: Vec<&str> = markets.iter().map(|m| m.pair.as_str()).collect();
        assert_eq!(pairs, ["BTC/USDT", "ETH/USDT"]);
        assert_eq!(markets[0].price, dec!(40000));
        assert_eq!(markets[0].change_24h, Decimal::ZERO);
        assert_eq!(markets[1].change_24h, dec!(1.23));
    }

    #[test]
    fn test_parse_exchange_rates() {
        let body = r#"{
            "tether": {"usd": 1.0, "aed": 3.67, "gbp": 0.78, "eur": 0.91, "cad": 1.37},
            "bitcoin": {"usd": 40000, "aed": 146900, "gbp": 31200, "eur": 36400, "cad": 54800}
        }"#;
        let quotes: HashMap<String, HashMap<String, f64>> = serde_json::from_str(body).unwrap();
        let rates = parse_exchange_rates(&quotes).unwrap();

        assert_eq!(rates.usdt.gbp, dec!(0.78));
        assert_eq!(rates.btc.usd, dec!(40000));
        assert_eq!(rates.usdt_to(dec!(100), "aed"), Some(dec!(367)));
        assert_eq!(rates.usdt_in_btc(dec!(20000)), Some(dec!(0.5)));

        let partial: HashMap<String, HashMap<String, f64>> =
            serde_json::from_str(r#"{"tether": {"usd": 1.0}}"#).unwrap();
        assert!(parse_exchange_rates(&partial).is_err());
    }

    #[test]
    fn test_exchange_rates_json_shape() {
        let value = serde_json::to_value(fallback_exchange_rates()).unwrap();
        assert_eq!(value["USDT"]["USD"].as_f64(), Some(1.0));
        assert!(value["BTC"]["CAD"].is_number());
    }

    #[test]
    fn test_synthesized_executions_track_prices() {
        let markets = fallback_markets(0).markets;
        let mut rng = StdRng::seed_from_u64(3);
        let executions = synthesize_executions(&markets, 100_000, &mut rng);

        assert_eq!(executions.len(), markets.len() * 2);
        assert!(executions.windows(2).all(|w| w[0].time >= w[1].time));
        for exec in &executions {
            let market = markets.iter().find(|m| m.pair == exec.pair).unwrap();
            let drift = ((exec.price - market.price) / market.price).abs();
            assert!(drift < dec!(0.001), "{} drifted {}", exec.pair, drift);
        }
    }
}
