//! Mock spot-trading engine for a single BTC/USDT market.
//!
//! All state changes go through [`TradingState::apply`]; the engine wraps the
//! state in a lock and drives three timers (price, book, fills) from a
//! [`MarketSimulator`]. There is no matching: fills are random and never look
//! at the book or at limit prices.

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::simulator::MarketSimulator;
use crate::types::{
    NewOrder, Order, OrderBook, OrderStatus, OrderType, PriceTicker, Timeframe, Transaction,
};

pub const DEFAULT_SYMBOL: &str = "BTC/USDT";

#[derive(Debug, Clone, PartialEq)]
pub struct TradingState {
    pub current_price: PriceTicker,
    /// Price the 24h change is measured against
    pub open_price: Decimal,
    pub order_book: OrderBook,
    pub open_orders: Vec<Order>,
    pub order_history: Vec<Order>,
    /// Newest first
    pub transactions: Vec<Transaction>,
    pub is_connected: bool,
    pub timeframe: Timeframe,
}

impl Default for TradingState {
    fn default() -> Self {
        Self {
            current_price: PriceTicker {
                symbol: DEFAULT_SYMBOL.to_string(),
                price: dec!(37268.00),
                change_24h: Decimal::ZERO,
                high_24h: dec!(37850.00),
                low_24h: dec!(36620.00),
                volume_24h: dec!(1254300.00),
                timestamp: Utc::now().timestamp_millis(),
            },
            open_price: dec!(37268.00),
            order_book: OrderBook::default(),
            open_orders: Vec::new(),
            order_history: Vec::new(),
            transactions: Vec::new(),
            is_connected: false,
            timeframe: Timeframe::H1,
        }
    }
}

#[derive(Debug, Clone)]
pub enum TradingAction {
    UpdatePrice(PriceTicker),
    UpdateOrderBook(OrderBook),
    PlaceOrder(Order),
    CancelOrder(Uuid),
    FillOrder { id: Uuid, fee: Decimal, timestamp: i64 },
    SetTimeframe(Timeframe),
    SetConnected(bool),
}

impl TradingState {
    /// Reduce one action into the state. Returns whether anything changed.
    pub fn apply(&mut self, action: TradingAction) -> bool {
        match action {
            TradingAction::UpdatePrice(ticker) => {
                self.current_price = ticker;
                true
            }
            TradingAction::UpdateOrderBook(book) => {
                self.order_book = book;
                true
            }
            TradingAction::PlaceOrder(mut order) => {
                order.status = OrderStatus::Pending;
                self.open_orders.push(order);
                true
            }
            TradingAction::CancelOrder(id) => match self.take_open(id) {
                Some(mut order) => {
                    order.status = OrderStatus::Cancelled;
                    self.order_history.push(order);
                    true
                }
                None => false,
            },
            TradingAction::FillOrder { id, fee, timestamp } => match self.take_open(id) {
                Some(mut order) => {
                    order.status = OrderStatus::Filled;
                    self.transactions.insert(
                        0,
                        Transaction {
                            id: Uuid::new_v4(),
                            symbol: order.symbol.clone(),
                            side: order.side,
                            amount: order.amount,
                            price: order.price,
                            fee,
                            timestamp,
                        },
                    );
                    self.order_history.push(order);
                    true
                }
                None => false,
            },
            TradingAction::SetTimeframe(timeframe) => {
                self.timeframe = timeframe;
                true
            }
            TradingAction::SetConnected(connected) => {
                self.is_connected = connected;
                true
            }
        }
    }

    fn take_open(&mut self, id: Uuid) -> Option<Order> {
        let pos = self.open_orders.iter().position(|o| o.id == id)?;
        Some(self.open_orders.remove(pos))
    }
}

/// Order entry as typed into the buy/sell form
#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub order: NewOrder,
}

impl OrderRequest {
    /// Form-level checks shared by the buy and sell entry paths
    pub fn validate(&self) -> Result<(), String> {
        let order = &self.order;
        if order.amount <= Decimal::ZERO {
            return Err("Amount must be greater than 0".to_string());
        }
        match (order.order_type, order.price) {
            (OrderType::Limit, None) => Err("Limit orders need a price".to_string()),
            (_, Some(price)) if price <= Decimal::ZERO => {
                Err("Price must be greater than 0".to_string())
            }
            (_, Some(price)) if order.amount.checked_mul(price).is_none() => {
                Err("Order value is too large".to_string())
            }
            _ => Ok(()),
        }
    }
}

/// Timer periods of the background simulation
#[derive(Debug, Clone, Copy)]
pub struct SimulationIntervals {
    pub price: Duration,
    pub order_book: Duration,
    pub fills: Duration,
}

impl Default for SimulationIntervals {
    fn default() -> Self {
        Self {
            price: Duration::from_secs(2),
            order_book: Duration::from_secs(1),
            fills: Duration::from_secs(5),
        }
    }
}

/// Mock trading engine shared by the dashboard screens
pub struct TradingEngine {
    state: Arc<RwLock<TradingState>>,
    simulator: Mutex<MarketSimulator>,
}

impl TradingEngine {
    pub fn new(simulator: MarketSimulator) -> Self {
        Self {
            state: Arc::new(RwLock::new(TradingState::default())),
            simulator: Mutex::new(simulator),
        }
    }

    pub async fn dispatch(&self, action: TradingAction) -> bool {
        self.state.write().await.apply(action)
    }

    pub async fn snapshot(&self) -> TradingState {
        self.state.read().await.clone()
    }

    /// Accept an order as-is and queue it as pending. Market orders without
    /// a price take the current last price.
    pub async fn place_order(&self, new_order: NewOrder) -> Order {
        let mut state = self.state.write().await;
        let order = Order {
            id: Uuid::new_v4(),
            symbol: new_order.symbol,
            side: new_order.side,
            order_type: new_order.order_type,
            amount: new_order.amount,
            price: new_order.price.unwrap_or(state.current_price.price),
            status: OrderStatus::Pending,
            timestamp: Utc::now().timestamp_millis(),
        };
        state.apply(TradingAction::PlaceOrder(order.clone()));

        tracing::info!(
            "📝 Placed {} {:?} order {} - {} @ {}",
            order.side,
            order.order_type,
            order.id,
            order.amount,
            order.price
        );
        order
    }

    /// Cancel an open order. Returns false when no open order has `id`.
    pub async fn cancel_order(&self, id: Uuid) -> bool {
        let cancelled = self.dispatch(TradingAction::CancelOrder(id)).await;
        if cancelled {
            tracing::info!(%id, "order cancelled");
        } else {
            tracing::debug!(%id, "cancel ignored, order not open");
        }
        cancelled
    }

    pub async fn set_timeframe(&self, timeframe: Timeframe) {
        self.dispatch(TradingAction::SetTimeframe(timeframe)).await;
    }

    pub async fn tick_price(&self) {
        let mut sim = self.simulator.lock().await;
        let mut state = self.state.write().await;
        let ticker = sim.next_ticker(
            &state.current_price,
            state.open_price,
            Utc::now().timestamp_millis(),
        );
        state.apply(TradingAction::UpdatePrice(ticker));
    }

    pub async fn tick_order_book(&self) {
        let mut sim = self.simulator.lock().await;
        let mut state = self.state.write().await;
        let book = sim.order_book(state.current_price.price);
        state.apply(TradingAction::UpdateOrderBook(book));
    }

    /// One fill tick: maybe fill a random open order. Returns the fill.
    pub async fn tick_fills(&self) -> Option<Transaction> {
        let mut sim = self.simulator.lock().await;
        let mut state = self.state.write().await;

        let index = sim.pick_fill(state.open_orders.len())?;
        let order = &state.open_orders[index];
        let id = order.id;
        let Some(fee) = sim.fee(order.amount, order.price) else {
            tracing::warn!(%id, amount = %order.amount, price = %order.price, "order value out of range, cancelling");
            state.apply(TradingAction::CancelOrder(id));
            return None;
        };

        state.apply(TradingAction::FillOrder {
            id,
            fee,
            timestamp: Utc::now().timestamp_millis(),
        });
        let fill = state.transactions.first().cloned();
        if let Some(ref tx) = fill {
            tracing::info!("✅ Filled {} {} @ {} (fee {})", tx.side, tx.amount, tx.price, tx.fee);
        }
        fill
    }

    /// Start the price, book and fill timers. They run until the returned
    /// handle is shut down or dropped.
    pub async fn spawn_simulation(self: &Arc<Self>, intervals: SimulationIntervals) -> SimulationHandle {
        let price = {
            let engine = Arc::clone(self);
            tokio::spawn(async move {
                let mut timer = tokio::time::interval(intervals.price);
                timer.tick().await;
                loop {
                    timer.tick().await;
                    engine.tick_price().await;
                }
            })
        };
        let book = {
            let engine = Arc::clone(self);
            tokio::spawn(async move {
                let mut timer = tokio::time::interval(intervals.order_book);
                loop {
                    timer.tick().await;
                    engine.tick_order_book().await;
                }
            })
        };
        let fills = {
            let engine = Arc::clone(self);
            tokio::spawn(async move {
                let mut timer = tokio::time::interval(intervals.fills);
                timer.tick().await;
                loop {
                    timer.tick().await;
                    engine.tick_fills().await;
                }
            })
        };

        let state = Arc::clone(&self.state);
        state.write().await.apply(TradingAction::SetConnected(true));
        tracing::info!("✓ Market simulation started");

        SimulationHandle {
            tasks: vec![price, book, fills],
            state,
        }
    }
}

/// Owns the simulation timers; aborting them marks the feed disconnected
pub struct SimulationHandle {
    tasks: Vec<JoinHandle<()>>,
    state: Arc<RwLock<TradingState>>,
}

impl SimulationHandle {
    pub async fn shutdown(mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.state
            .write()
            .await
            .apply(TradingAction::SetConnected(false));
        tracing::info!("Market simulation stopped");
    }
}

impl Drop for SimulationHandle {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
        if let Ok(mut state) = self.state.try_write() {
            state.is_connected = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulator::SimulatorConfig;
    use crate::types::OrderSide;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn limit(side: OrderSide, amount: Decimal, price: Decimal) -> NewOrder {
        NewOrder {
            symbol: DEFAULT_SYMBOL.to_string(),
            side,
            order_type: OrderType::Limit,
            amount,
            price: Some(price),
        }
    }

    fn always_fill(seed: u64) -> MarketSimulator {
        MarketSimulator::with_rng(
            StdRng::seed_from_u64(seed),
            SimulatorConfig {
                fill_probability: 1.0,
                ..SimulatorConfig::default()
            },
        )
    }

    #[tokio::test]
    async fn test_place_then_cancel() {
        let engine = TradingEngine::new(MarketSimulator::seeded(1));
        let order = engine
            .place_order(limit(OrderSide::Buy, dec!(0.5), dec!(36000)))
            .await;
        assert_eq!(order.status, OrderStatus::Pending);

        assert!(engine.cancel_order(order.id).await);

        let state = engine.snapshot().await;
        assert!(state.open_orders.iter().all(|o| o.id != order.id));
        let history: Vec<&Order> = state.order_history.iter().filter(|o| o.id == order.id).collect();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, OrderStatus::Cancelled);
        assert!(state.transactions.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_unknown_is_noop() {
        let engine = TradingEngine::new(MarketSimulator::seeded(1));
        engine
            .place_order(limit(OrderSide::Sell, dec!(1), dec!(38000)))
            .await;
        let before = engine.snapshot().await;

        assert!(!engine.cancel_order(Uuid::new_v4()).await);
        assert_eq!(engine.snapshot().await, before);
    }

    #[tokio::test]
    async fn test_cancelled_order_cannot_fill() {
        let engine = TradingEngine::new(always_fill(5));
        let order = engine
            .place_order(limit(OrderSide::Buy, dec!(1), dec!(30000)))
            .await;
        engine.cancel_order(order.id).await;

        assert!(engine.tick_fills().await.is_none());
        assert!(!engine.cancel_order(order.id).await);
        assert_eq!(engine.snapshot().await.order_history.len(), 1);
    }

    #[tokio::test]
    async fn test_fill_moves_order_and_prints_fee() {
        let engine = TradingEngine::new(always_fill(5));
        let order = engine
            .place_order(limit(OrderSide::Buy, dec!(0.5), dec!(40000)))
            .await;

        let fill = engine.tick_fills().await.expect("fill");
        assert_eq!(fill.amount, dec!(0.5));
        assert_eq!(fill.price, dec!(40000));
        assert_eq!(fill.fee, dec!(20));

        let state = engine.snapshot().await;
        assert!(state.open_orders.is_empty());
        assert_eq!(state.order_history[0].id, order.id);
        assert_eq!(state.order_history[0].status, OrderStatus::Filled);
        assert_eq!(state.transactions.len(), 1);
    }

    #[tokio::test]
    async fn test_no_fill_without_open_orders() {
        let engine = TradingEngine::new(always_fill(5));
        assert!(engine.tick_fills().await.is_none());
    }

    #[tokio::test]
    async fn test_market_order_takes_last_price() {
        let engine = TradingEngine::new(MarketSimulator::seeded(1));
        let order = engine
            .place_order(NewOrder {
                symbol: DEFAULT_SYMBOL.to_string(),
                side: OrderSide::Sell,
                order_type: OrderType::Market,
                amount: dec!(0.1),
                price: None,
            })
            .await;
        assert_eq!(order.price, dec!(37268.00));
    }

    #[tokio::test]
    async fn test_ticks_update_price_and_book() {
        let engine = TradingEngine::new(MarketSimulator::seeded(2));
        engine.tick_price().await;
        engine.tick_order_book().await;

        let state = engine.snapshot().await;
        assert_eq!(state.order_book.bids.len(), 15);
        assert_eq!(state.order_book.asks.len(), 15);
        assert!((state.current_price.price - dec!(37268)).abs() <= dec!(50));
    }

    #[test]
    fn test_reducer_forces_pending_on_place() {
        let mut state = TradingState::default();
        let order = Order {
            id: Uuid::new_v4(),
            symbol: DEFAULT_SYMBOL.to_string(),
            side: OrderSide::Buy,
            order_type: OrderType::Limit,
            amount: dec!(1),
            price: dec!(1),
            status: OrderStatus::Filled,
            timestamp: 0,
        };
        state.apply(TradingAction::PlaceOrder(order));
        assert_eq!(state.open_orders[0].status, OrderStatus::Pending);
    }

    #[test]
    fn test_order_request_validation() {
        let ok = OrderRequest {
            order: limit(OrderSide::Buy, dec!(1), dec!(100)),
        };
        assert!(ok.validate().is_ok());

        let zero = OrderRequest {
            order: limit(OrderSide::Buy, Decimal::ZERO, dec!(100)),
        };
        assert!(zero.validate().is_err());

        let mut missing = limit(OrderSide::Sell, dec!(1), dec!(1));
        missing.price = None;
        assert!(OrderRequest { order: missing }.validate().is_err());
    }

    #[test]
    fn test_order_value_overflow_is_rejected() {
        let huge = OrderRequest {
            order: limit(OrderSide::Buy, Decimal::MAX, dec!(40000)),
        };
        assert_eq!(huge.validate(), Err("Order value is too large".to_string()));
    }

    #[tokio::test]
    async fn test_fill_tick_cancels_order_it_cannot_price() {
        let engine = TradingEngine::new(always_fill(9));
        let order = engine
            .place_order(limit(OrderSide::Buy, Decimal::MAX, dec!(40000)))
            .await;

        assert!(engine.tick_fills().await.is_none());
        let state = engine.snapshot().await;
        assert!(state.open_orders.is_empty());
        assert_eq!(state.order_history[0].id, order.id);
        assert_eq!(state.order_history[0].status, OrderStatus::Cancelled);

        engine
            .place_order(limit(OrderSide::Sell, dec!(0.5), dec!(40000)))
            .await;
        let fill = engine.tick_fills().await.unwrap();
        assert_eq!(fill.fee, dec!(20));
    }

    #[tokio::test]
    async fn test_timeframe_is_plain_state() {
        let engine = TradingEngine::new(MarketSimulator::seeded(1));
        engine.set_timeframe(Timeframe::D1).await;
        assert_eq!(engine.snapshot().await.timeframe, Timeframe::D1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulation_connects_and_shuts_down() {
        let engine = Arc::new(TradingEngine::new(MarketSimulator::seeded(4)));
        let handle = engine.spawn_simulation(SimulationIntervals::default()).await;
        assert!(engine.snapshot().await.is_connected);

        tokio::time::sleep(Duration::from_millis(2500)).await;
        let state = engine.snapshot().await;
        assert!(state.is_connected);
        assert_eq!(state.order_book.bids.len(), 15);

        handle.shutdown().await;
        assert!(!engine.snapshot().await.is_connected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_right_after_spawn_stays_disconnected() {
        let engine = Arc::new(TradingEngine::new(MarketSimulator::seeded(5)));
        let handle = engine.spawn_simulation(SimulationIntervals::default()).await;
        handle.shutdown().await;

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(!engine.snapshot().await.is_connected);
    }
}
