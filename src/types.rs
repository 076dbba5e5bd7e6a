use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Current schema version of the persisted balances document
pub const SNAPSHOT_VERSION: u32 = 1;

/// Mutable sub-accounts. The overview ledger is derived from these two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Trading,
    Funding,
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountType::Trading => write!(f, "trading"),
            AccountType::Funding => write!(f, "funding"),
        }
    }
}

impl FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trading" | "t" => Ok(AccountType::Trading),
            "funding" | "f" => Ok(AccountType::Funding),
            other => Err(format!("unknown account '{}', expected trading|funding", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxAction {
    Deposit,
    Withdraw,
    Trade,
    #[serde(rename = "Transfer In")]
    TransferIn,
    #[serde(rename = "Transfer Out")]
    TransferOut,
    Buy,
}

impl TxAction {
    pub fn label(&self) -> &'static str {
        match self {
            TxAction::Deposit => "Deposit",
            TxAction::Withdraw => "Withdraw",
            TxAction::Trade => "Trade",
            TxAction::TransferIn => "Transfer In",
            TxAction::TransferOut => "Transfer Out",
            TxAction::Buy => "Buy",
        }
    }
}

/// Ledger entry shown in the account's recent activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tx {
    /// Display date, `%Y-%m-%d %H:%M:%S` (sorts lexicographically)
    pub date: String,
    pub action: TxAction,
    /// Two-decimal amount, e.g. "1500.00"
    pub amount: String,
    pub symbol: String,
    #[serde(rename = "txId")]
    pub tx_id: String,
}

/// Transaction request before an id and date are assigned
#[derive(Debug, Clone)]
pub struct NewTx {
    pub action: TxAction,
    pub amount: Decimal,
    pub symbol: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    /// Unix epoch milliseconds
    pub time: i64,
    pub value: f64,
}

/// Stored ledger amounts are written as decimal strings so a reload keeps
/// every digit. Documents holding plain JSON numbers still decode.
mod exact_decimal {
    use rust_decimal::Decimal;
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;
    use std::str::FromStr;

    pub fn serialize<S: Serializer>(value: &Decimal, serializer: S) -> Result<S::Ok, S::Error> {
        rust_decimal::serde::str::serialize(value, serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Decimal, D::Error> {
        deserializer.deserialize_any(ExactDecimalVisitor)
    }

    struct ExactDecimalVisitor;

    impl<'de> Visitor<'de> for ExactDecimalVisitor {
        type Value = Decimal;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a decimal string or number")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Decimal, E> {
            let v = v.trim();
            Decimal::from_str(v)
                .or_else(|_| Decimal::from_scientific(v))
                .map_err(E::custom)
        }

        // Shortest round-trip text of the float, so 0.1 decodes as 0.1
        fn visit_f64<E: de::Error>(self, v: f64) -> Result<Decimal, E> {
            self.visit_str(&v.to_string())
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Decimal, E> {
            Ok(Decimal::from(v))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Decimal, E> {
            Ok(Decimal::from(v))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceData {
    #[serde(rename = "totalBalanceUSDT", with = "exact_decimal")]
    pub total_balance_usdt: Decimal,
    #[serde(rename = "balanceHistory", default)]
    pub balance_history: Vec<HistoryPoint>,
    #[serde(default, with = "exact_decimal")]
    pub profit: Decimal,
    #[serde(default, with = "exact_decimal")]
    pub loss: Decimal,
    #[serde(default)]
    pub txs: Vec<Tx>,
}

impl BalanceData {
    pub fn empty() -> Self {
        Self {
            total_balance_usdt: Decimal::ZERO,
            balance_history: Vec::new(),
            profit: Decimal::ZERO,
            loss: Decimal::ZERO,
            txs: Vec::new(),
        }
    }
}

/// Partial update merged field-by-field into a [`BalanceData`]
#[derive(Debug, Clone, Default)]
pub struct BalancePatch {
    pub total_balance_usdt: Option<Decimal>,
    pub balance_history: Option<Vec<HistoryPoint>>,
    pub profit: Option<Decimal>,
    pub loss: Option<Decimal>,
    pub txs: Option<Vec<Tx>>,
}

impl BalancePatch {
    pub fn balance(total: Decimal) -> Self {
        Self {
            total_balance_usdt: Some(total),
            ..Default::default()
        }
    }
}

/// The persisted document: all three ledgers plus a schema version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountBalances {
    /// Missing in legacy documents, which deserialize as version 0
    #[serde(default)]
    pub version: u32,
    pub trading: BalanceData,
    pub funding: BalanceData,
    pub overview: BalanceData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Limit,
    Market,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Filled,
    Cancelled,
}

/// Chart granularity selected on the spot screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "1d")]
    D1,
}

impl Timeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::D1 => "1d",
        }
    }

    pub fn all() -> [Timeframe; 5] {
        [
            Timeframe::M5,
            Timeframe::M15,
            Timeframe::H1,
            Timeframe::H4,
            Timeframe::D1,
        ]
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Timeframe::all()
            .into_iter()
            .find(|tf| tf.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown timeframe '{}', expected 5m|15m|1h|4h|1d", s))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub symbol: String,
    pub side: OrderSide,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub amount: Decimal,
    pub price: Decimal,
    pub status: OrderStatus,
    pub timestamp: i64,
}

/// Order as submitted by the order form, before id/status/timestamp
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub amount: Decimal,
    /// Required for limit orders; market orders take the last price when absent
    pub price: Option<Decimal>,
}

/// Fill printed on the transaction tape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub symbol: String,
    pub side: OrderSide,
    pub amount: Decimal,
    pub price: Decimal,
    pub fee: Decimal,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceTicker {
    pub symbol: String,
    pub price: Decimal,
    #[serde(rename = "change24h")]
    pub change_24h: Decimal,
    #[serde(rename = "high24h")]
    pub high_24h: Decimal,
    #[serde(rename = "low24h")]
    pub low_24h: Decimal,
    #[serde(rename = "volume24h")]
    pub volume_24h: Decimal,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderBookLevel {
    pub price: Decimal,
    pub amount: Decimal,
    pub total: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderBook {
    /// Best (highest) bid first
    pub bids: Vec<OrderBookLevel>,
    /// Best (lowest) ask first
    pub asks: Vec<OrderBookLevel>,
}

impl OrderBook {
    pub fn spread(&self) -> Option<Decimal> {
        match (self.bids.first(), self.asks.first()) {
            (Some(bid), Some(ask)) => Some(ask.price - bid.price),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_tx_action_serializes_display_names() {
        let json = serde_json::to_string(&TxAction::TransferOut).unwrap();
        assert_eq!(json, "\"Transfer Out\"");
        let back: TxAction = serde_json::from_str("\"Transfer In\"").unwrap();
        assert_eq!(back, TxAction::TransferIn);
    }

    #[test]
    fn test_balance_data_uses_storage_field_names() {
        let data = BalanceData {
            total_balance_usdt: dec!(5000),
            ..BalanceData::empty()
        };
        let value = serde_json::to_value(&data).unwrap();
        assert_eq!(value["totalBalanceUSDT"], "5000");
        assert!(value["balanceHistory"].is_array());
    }

    #[test]
    fn test_balance_data_keeps_full_precision() {
        let data = BalanceData {
            total_balance_usdt: dec!(123456789012.345678),
            profit: dec!(0.000000000000000001),
            ..BalanceData::empty()
        };
        let json = serde_json::to_string(&data).unwrap();
        let back: BalanceData = serde_json::from_str(&json).unwrap();
        assert_eq!(back.total_balance_usdt, dec!(123456789012.345678));
        assert_eq!(back.profit, dec!(0.000000000000000001));
    }

    #[test]
    fn test_balance_data_accepts_numeric_amounts() {
        let back: BalanceData = serde_json::from_str(
            r#"{"totalBalanceUSDT": 12.5, "balanceHistory": [], "profit": 0.1, "loss": 3, "txs": []}"#,
        )
        .unwrap();
        assert_eq!(back.total_balance_usdt, dec!(12.5));
        assert_eq!(back.profit, dec!(0.1));
        assert_eq!(back.loss, dec!(3));
    }

    #[test]
    fn test_timeframe_parse() {
        assert_eq!("4H".parse::<Timeframe>().unwrap(), Timeframe::H4);
        assert!("2h".parse::<Timeframe>().is_err());
    }

    #[test]
    fn test_account_type_parse() {
        assert_eq!("Funding".parse::<AccountType>().unwrap(), AccountType::Funding);
        assert!("overview".parse::<AccountType>().is_err());
    }
}
