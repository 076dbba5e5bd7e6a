use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::types::{OrderBook, OrderBookLevel, PriceTicker};

/// Knobs of the mock market
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Largest absolute price move per tick
    pub max_step: f64,
    /// Price never walks below this
    pub price_floor: Decimal,
    /// Levels per book side
    pub depth: usize,
    /// Gap between consecutive book levels
    pub level_spacing: f64,
    /// Chance that a fill tick fills one open order
    pub fill_probability: f64,
    /// Flat fee charged on filled notional
    pub fee_rate: Decimal,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            max_step: 50.0,
            price_floor: dec!(1000),
            depth: 15,
            level_spacing: 5.0,
            fill_probability: 0.10,
            fee_rate: dec!(0.001),
        }
    }
}

fn to_decimal(value: f64, dp: u32) -> Decimal {
    Decimal::from_f64(value).unwrap_or_default().round_dp(dp)
}

/// Random source behind the mock trading engine.
///
/// Generic over the RNG so tests can seed it and replay exact sequences.
pub struct MarketSimulator<R = StdRng> {
    rng: R,
    config: SimulatorConfig,
}

impl MarketSimulator<StdRng> {
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed), SimulatorConfig::default())
    }

    pub fn from_entropy() -> Self {
        Self::with_rng(StdRng::from_entropy(), SimulatorConfig::default())
    }
}

impl<R: Rng> MarketSimulator<R> {
    pub fn with_rng(rng: R, config: SimulatorConfig) -> Self {
        Self { rng, config }
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Random-walk the last price by up to `max_step` either way, floored.
    /// High/low widen to include the new price; change is against `open_price`.
    pub fn next_ticker(&mut self, ticker: &PriceTicker, open_price: Decimal, now_ms: i64) -> PriceTicker {
        let step = self.rng.gen_range(-self.config.max_step..=self.config.max_step);
        let price = (ticker.price + to_decimal(step, 2)).max(self.config.price_floor);

        let change_24h = if open_price.is_zero() {
            Decimal::ZERO
        } else {
            ((price - open_price) / open_price * dec!(100)).round_dp(2)
        };
        let traded = to_decimal(self.rng.gen_range(0.0..2.5), 4) * price;

        PriceTicker {
            symbol: ticker.symbol.clone(),
            price,
            change_24h,
            high_24h: ticker.high_24h.max(price),
            low_24h: ticker.low_24h.min(price),
            volume_24h: (ticker.volume_24h + traded).round_dp(2),
            timestamp: now_ms,
        }
    }

    /// Build a fresh book around `mid`. Nothing carries over from the
    /// previous book; bids step down and asks step up one spacing per level.
    pub fn order_book(&mut self, mid: Decimal) -> OrderBook {
        let depth = self.config.depth;
        let mut bids = Vec::with_capacity(depth);
        let mut asks = Vec::with_capacity(depth);

        for i in 0..depth {
            bids.push(self.level(mid, i, -1));
            asks.push(self.level(mid, i, 1));
        }

        OrderBook { bids, asks }
    }

    fn level(&mut self, mid: Decimal, index: usize, direction: i8) -> OrderBookLevel {
        let offset = (index as f64 + self.rng.gen::<f64>()) * self.config.level_spacing + 0.5;
        let offset = to_decimal(offset, 2);
        let price = if direction < 0 { mid - offset } else { mid + offset };
        let amount = to_decimal(self.rng.gen_range(0.001..2.5), 4);

        OrderBookLevel {
            price,
            amount,
            total: (price * amount).round_dp(2),
        }
    }

    /// Decide whether this fill tick fills anything, and which of the
    /// `open_orders` it picks. Uniform pick, no price or time priority.
    pub fn pick_fill(&mut self, open_orders: usize) -> Option<usize> {
        if open_orders == 0 {
            return None;
        }
        if self.rng.gen_bool(self.config.fill_probability) {
            Some(self.rng.gen_range(0..open_orders))
        } else {
            None
        }
    }

    /// Fill fee, `None` when the order value does not fit in a Decimal
    pub fn fee(&self, amount: Decimal, price: Decimal) -> Option<Decimal> {
        amount.checked_mul(price)?.checked_mul(self.config.fee_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticker(price: Decimal) -> PriceTicker {
        PriceTicker {
            symbol: "BTC/USDT".to_string(),
            price,
            change_24h: Decimal::ZERO,
            high_24h: price,
            low_24h: price,
            volume_24h: Decimal::ZERO,
            timestamp: 0,
        }
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = MarketSimulator::seeded(42);
        let mut b = MarketSimulator::seeded(42);

        let start = ticker(dec!(37268));
        assert_eq!(a.next_ticker(&start, start.price, 1), b.next_ticker(&start, start.price, 1));
        assert_eq!(a.order_book(dec!(37268)), b.order_book(dec!(37268)));
        assert_eq!(
            (0..50).map(|_| a.pick_fill(3)).collect::<Vec<_>>(),
            (0..50).map(|_| b.pick_fill(3)).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_price_walk_bounded_and_floored() {
        let mut sim = MarketSimulator::seeded(3);
        let mut current = ticker(dec!(37268));

        for _ in 0..200 {
            let next = sim.next_ticker(&current, dec!(37268), 0);
            assert!((next.price - current.price).abs() <= dec!(50));
            assert!(next.high_24h >= next.price && next.low_24h <= next.price);
            current = next;
        }

        let near_floor = ticker(dec!(1000));
        for _ in 0..100 {
            assert!(sim.next_ticker(&near_floor, dec!(1000), 0).price >= dec!(1000));
        }
    }

    #[test]
    fn test_order_book_shape() {
        let mut sim = MarketSimulator::seeded(9);
        let mid = dec!(37268);
        let book = sim.order_book(mid);

        assert_eq!(book.bids.len(), 15);
        assert_eq!(book.asks.len(), 15);
        assert!(book.bids.iter().all(|l| l.price < mid));
        assert!(book.asks.iter().all(|l| l.price > mid));
        assert!(book.bids.windows(2).all(|w| w[0].price >= w[1].price));
        assert!(book.asks.windows(2).all(|w| w[0].price <= w[1].price));
        assert!(book.spread().unwrap() > Decimal::ZERO);
        for level in book.bids.iter().chain(book.asks.iter()) {
            assert_eq!(level.total, (level.price * level.amount).round_dp(2));
            assert!(level.amount > Decimal::ZERO);
        }
    }

    #[test]
    fn test_pick_fill_rate_and_range() {
        let mut sim = MarketSimulator::seeded(11);
        assert_eq!(sim.pick_fill(0), None);

        let picks: Vec<usize> = (0..10_000).filter_map(|_| sim.pick_fill(4)).collect();
        // ~10% of ticks fill
        assert!(picks.len() > 800 && picks.len() < 1200, "fills: {}", picks.len());
        assert!(picks.iter().all(|&i| i < 4));
    }

    #[test]
    fn test_fee_is_tenth_of_percent() {
        let sim = MarketSimulator::seeded(0);
        assert_eq!(sim.fee(dec!(0.5), dec!(40000)), Some(dec!(20)));
        assert_eq!(sim.fee(Decimal::MAX, dec!(40000)), None);
    }
}
