use crate::balance::BalanceManager;
use crate::markets::{ExchangeRates, MarketService, MarketsResponse};
use crate::trading::{OrderRequest, TradingEngine, TradingState, DEFAULT_SYMBOL};
use crate::types::{AccountBalances, AccountType, NewOrder, OrderSide, OrderType, Timeframe};
use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Interval between background price-table refreshes
const MARKET_REFRESH: Duration = Duration::from_secs(60);

const MAX_LOGS: usize = 100;

/// An instant old enough that the next `refresh_data` call reloads snapshots
fn past_refresh() -> Instant {
    let now = Instant::now();
    now.checked_sub(Duration::from_secs(1)).unwrap_or(now)
}

/// Available tabs in the TUI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Assets,
    Markets,
    Spot,
    Logs,
}

impl Tab {
    pub fn next(&self) -> Self {
        match self {
            Tab::Assets => Tab::Markets,
            Tab::Markets => Tab::Spot,
            Tab::Spot => Tab::Logs,
            Tab::Logs => Tab::Assets,
        }
    }

    pub fn prev(&self) -> Self {
        match self {
            Tab::Assets => Tab::Logs,
            Tab::Markets => Tab::Assets,
            Tab::Spot => Tab::Markets,
            Tab::Logs => Tab::Spot,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Tab::Assets => "Assets",
            Tab::Markets => "Markets",
            Tab::Spot => "Spot",
            Tab::Logs => "Logs",
        }
    }

    pub fn all() -> [Tab; 4] {
        [Tab::Assets, Tab::Markets, Tab::Spot, Tab::Logs]
    }
}

/// Input mode for command entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Command,
    QuitConfirmation,
}

/// Quit confirmation selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuitSelection {
    No, // Default
    Yes,
}

/// Log entry for the logs tab
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: String,
    pub level: LogLevel,
    pub message: String,
}

#[derive(Debug, Clone, Copy)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
    Success,
}

/// A parsed command-mode line
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Deposit {
        account: AccountType,
        amount: Decimal,
        symbol: String,
    },
    Withdraw {
        account: AccountType,
        amount: Decimal,
        symbol: String,
    },
    Transfer {
        from: AccountType,
        to: AccountType,
        amount: Decimal,
    },
    Order {
        side: OrderSide,
        amount: Decimal,
        price: Option<Decimal>,
    },
    /// 1-based index into the open orders list
    Cancel(usize),
    Timeframe(Timeframe),
    Refresh,
    Help,
}

fn parse_amount(raw: Option<&&str>, what: &str) -> Result<Decimal, String> {
    let raw = raw.ok_or_else(|| format!("missing {}", what))?;
    raw.parse::<Decimal>()
        .map_err(|_| format!("'{}' is not a valid {}", raw, what))
}

fn parse_account(raw: Option<&&str>) -> Result<AccountType, String> {
    raw.ok_or_else(|| "missing account (trading|funding)".to_string())?
        .parse()
}

/// Parse a command-mode line such as `/transfer funding trading 250`
pub fn parse_command(line: &str) -> Result<Command, String> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let Some(first) = parts.first() else {
        return Err("empty command".to_string());
    };
    let cmd = first.trim_start_matches('/').to_lowercase();
    let args = &parts[1..];

    match cmd.as_str() {
        "deposit" | "d" | "withdraw" | "w" => {
            let account = parse_account(args.first())?;
            let amount = parse_amount(args.get(1), "amount")?;
            let symbol = args.get(2).map(|s| s.to_uppercase()).unwrap_or_else(|| "USDT".to_string());
            if cmd.starts_with('d') {
                Ok(Command::Deposit { account, amount, symbol })
            } else {
                Ok(Command::Withdraw { account, amount, symbol })
            }
        }
        "transfer" | "tr" => {
            let from = parse_account(args.first())?;
            let to = parse_account(args.get(1))?;
            let amount = parse_amount(args.get(2), "amount")?;
            Ok(Command::Transfer { from, to, amount })
        }
        "buy" | "b" | "sell" | "s" => {
            let side = if cmd.starts_with('b') { OrderSide::Buy } else { OrderSide::Sell };
            let amount = parse_amount(args.first(), "amount")?;
            let price = match args.get(1) {
                Some(_) => Some(parse_amount(args.get(1), "price")?),
                None => None,
            };
            Ok(Command::Order { side, amount, price })
        }
        "cancel" | "c" => {
            let raw = args.first().ok_or("missing order number")?;
            match raw.parse::<usize>() {
                Ok(n) if n > 0 => Ok(Command::Cancel(n)),
                _ => Err(format!("'{}' is not a valid order number", raw)),
            }
        }
        "timeframe" | "tf" => {
            let raw = args.first().ok_or("missing timeframe (5m|15m|1h|4h|1d)")?;
            Ok(Command::Timeframe(raw.parse()?))
        }
        "refresh" | "r" => Ok(Command::Refresh),
        "help" | "h" | "?" => Ok(Command::Help),
        other => Err(format!("Unknown command: /{}", other)),
    }
}

/// Results of background market-data fetches
#[derive(Debug)]
pub enum MarketUpdate {
    Markets(MarketsResponse),
    Rates(ExchangeRates),
}

/// Main application state
pub struct App {
    pub balance_manager: Arc<BalanceManager>,
    pub trading_engine: Arc<TradingEngine>,
    pub market_service: Arc<MarketService>,
    pub stale_after: Duration,

    pub current_tab: Tab,
    pub should_quit: bool,
    pub logs: Vec<LogEntry>,
    pub last_refresh: Instant,

    // Command input
    pub input_mode: InputMode,
    pub command_input: String,
    pub quit_selection: QuitSelection,

    // Assets
    pub balances: Option<AccountBalances>,
    pub selected_account: Option<AccountType>,
    pub rates: Option<ExchangeRates>,

    // Markets
    pub markets: Option<MarketsResponse>,
    pub is_loading_markets: bool,
    last_market_request: Option<Instant>,
    market_tx: mpsc::UnboundedSender<MarketUpdate>,
    market_rx: mpsc::UnboundedReceiver<MarketUpdate>,

    // Spot
    pub trading: Option<TradingState>,
    pub selected_order_index: usize,
    last_fill_id: Option<Uuid>,
}

impl App {
    pub fn new(
        balance_manager: Arc<BalanceManager>,
        trading_engine: Arc<TradingEngine>,
        market_service: Arc<MarketService>,
        stale_after: Duration,
    ) -> Self {
        let (market_tx, market_rx) = mpsc::unbounded_channel();
        let mut app = Self {
            balance_manager,
            trading_engine,
            market_service,
            stale_after,
            current_tab: Tab::Assets,
            should_quit: false,
            logs: Vec::new(),
            last_refresh: past_refresh(),
            input_mode: InputMode::Normal,
            command_input: String::new(),
            quit_selection: QuitSelection::No,
            balances: None,
            selected_account: None,
            rates: None,
            markets: None,
            is_loading_markets: false,
            last_market_request: None,
            market_tx,
            market_rx,
            trading: None,
            selected_order_index: 0,
            last_fill_id: None,
        };

        app.add_log(LogLevel::Info, "Dashboard initialized successfully");
        app.add_log(LogLevel::Info, "Press ':' to enter command mode, 'H' for help");
        app
    }

    pub fn add_log(&mut self, level: LogLevel, message: &str) {
        let timestamp = chrono::Local::now().format("%H:%M:%S").to_string();
        self.logs.push(LogEntry {
            timestamp,
            level,
            message: message.to_string(),
        });

        if self.logs.len() > MAX_LOGS {
            self.logs.remove(0);
        }
    }

    /// Ledger shown on the Assets tab: the selected sub-account, or the overview
    pub fn displayed_ledger(&self) -> Option<&crate::types::BalanceData> {
        let balances = self.balances.as_ref()?;
        Some(match self.selected_account {
            None => &balances.overview,
            Some(AccountType::Trading) => &balances.trading,
            Some(AccountType::Funding) => &balances.funding,
        })
    }

    pub fn markets_stale(&self) -> bool {
        self.markets.as_ref().map_or(false, |m| {
            m.is_stale(chrono::Utc::now().timestamp_millis(), self.stale_after)
        })
    }

    pub async fn refresh_data(&mut self) {
        while let Ok(update) = self.market_rx.try_recv() {
            self.apply_market_update(update);
        }

        let due = self
            .last_market_request
            .map_or(true, |at| at.elapsed() >= MARKET_REFRESH);
        if due && !self.is_loading_markets {
            self.request_market_refresh();
        }

        // Refresh every 500ms
        if self.last_refresh.elapsed().as_millis() < 500 {
            return;
        }
        self.last_refresh = Instant::now();

        self.balances = Some(self.balance_manager.snapshot().await);

        let state = self.trading_engine.snapshot().await;
        self.log_new_fills(&state);
        if self.selected_order_index >= state.open_orders.len() {
            self.selected_order_index = state.open_orders.len().saturating_sub(1);
        }
        self.trading = Some(state);
    }

    fn log_new_fills(&mut self, state: &TradingState) {
        let fresh: Vec<String> = state
            .transactions
            .iter()
            .take_while(|tx| Some(tx.id) != self.last_fill_id)
            .map(|tx| format!("Filled {} {} @ {} (fee {})", tx.side, tx.amount, tx.price, tx.fee))
            .collect();

        // The first snapshot only sets the watermark
        if self.trading.is_some() {
            for message in fresh.iter().rev() {
                self.add_log(LogLevel::Success, message);
            }
        }
        self.last_fill_id = state.transactions.first().map(|tx| tx.id);
    }

    /// Fetch markets and rates on a background task so the UI keeps drawing
    fn request_market_refresh(&mut self) {
        self.is_loading_markets = true;
        self.last_market_request = Some(Instant::now());

        let service = Arc::clone(&self.market_service);
        let tx = self.market_tx.clone();
        tokio::spawn(async move {
            let markets = service.fetch_markets().await;
            let _ = tx.send(MarketUpdate::Markets(markets));
            let rates = service.fetch_exchange_rates().await;
            let _ = tx.send(MarketUpdate::Rates(rates));
        });
    }

    fn apply_market_update(&mut self, update: MarketUpdate) {
        match update {
            MarketUpdate::Markets(markets) => {
                self.is_loading_markets = false;
                self.add_log(
                    LogLevel::Info,
                    &format!("Loaded {} markets", markets.markets.len()),
                );
                self.markets = Some(markets);
            }
            MarketUpdate::Rates(rates) => {
                self.rates = Some(rates);
            }
        }
    }

    pub async fn handle_event(&mut self, event: KeyEvent) -> Result<()> {
        match self.input_mode {
            InputMode::Command => self.handle_command_input(event).await,
            InputMode::QuitConfirmation => self.handle_quit_confirmation(event),
            InputMode::Normal => self.handle_normal_input(event).await,
        }
    }

    async fn handle_command_input(&mut self, event: KeyEvent) -> Result<()> {
        match event.code {
            KeyCode::Enter => {
                let command = self.command_input.clone();
                self.command_input.clear();
                self.input_mode = InputMode::Normal;
                self.execute_command(&command).await;
            }
            KeyCode::Esc => {
                self.command_input.clear();
                self.input_mode = InputMode::Normal;
            }
            KeyCode::Backspace => {
                self.command_input.pop();
            }
            KeyCode::Char(c) => {
                self.command_input.push(c);
            }
            _ => {}
        }
        Ok(())
    }

    pub async fn execute_command(&mut self, line: &str) {
        if line.trim().trim_start_matches('/').is_empty() {
            return;
        }

        let command = match parse_command(line) {
            Ok(command) => command,
            Err(e) => {
                self.add_log(LogLevel::Warning, &e);
                self.add_log(LogLevel::Info, "Type /help for available commands");
                return;
            }
        };

        match command {
            Command::Deposit { account, amount, symbol } => {
                match self.balance_manager.deposit(account, &symbol, amount).await {
                    Ok(tx) => self.add_log(
                        LogLevel::Success,
                        &format!("Deposited {} {} to {} ({})", tx.amount, symbol, account, tx.tx_id),
                    ),
                    Err(e) => self.add_log(LogLevel::Error, &format!("Deposit failed: {}", e)),
                }
            }
            Command::Withdraw { account, amount, symbol } => {
                match self.balance_manager.withdraw(account, &symbol, amount).await {
                    Ok(tx) => self.add_log(
                        LogLevel::Success,
                        &format!("Withdrew {} {} from {} ({})", tx.amount, symbol, account, tx.tx_id),
                    ),
                    Err(e) => self.add_log(LogLevel::Error, &format!("Withdraw failed: {}", e)),
                }
            }
            Command::Transfer { from, to, amount } => {
                if from == to {
                    self.add_log(LogLevel::Warning, "Source and destination are the same account");
                    return;
                }
                match self.balance_manager.transfer_between_accounts(from, to, amount).await {
                    Ok(()) => self.add_log(
                        LogLevel::Success,
                        &format!("Transferred {} USDT from {} to {}", amount, from, to),
                    ),
                    Err(e) => self.add_log(LogLevel::Error, &format!("Transfer failed: {}", e)),
                }
            }
            Command::Order { side, amount, price } => {
                let request = OrderRequest {
                    order: NewOrder {
                        symbol: DEFAULT_SYMBOL.to_string(),
                        side,
                        order_type: if price.is_some() { OrderType::Limit } else { OrderType::Market },
                        amount,
                        price,
                    },
                };
                if let Err(e) = request.validate() {
                    self.add_log(LogLevel::Warning, &e);
                    return;
                }
                let order = self.trading_engine.place_order(request.order).await;
                self.add_log(
                    LogLevel::Success,
                    &format!("Order placed: {} {} @ {}", order.side, order.amount, order.price),
                );
                self.current_tab = Tab::Spot;
                self.last_refresh = past_refresh();
            }
            Command::Cancel(n) => {
                let state = self.trading_engine.snapshot().await;
                match state.open_orders.get(n - 1) {
                    Some(order) => {
                        if self.trading_engine.cancel_order(order.id).await {
                            self.add_log(LogLevel::Info, &format!("Cancelled order #{}", n));
                        } else {
                            self.add_log(LogLevel::Warning, &format!("Order #{} is no longer open", n));
                        }
                    }
                    None => self.add_log(
                        LogLevel::Error,
                        &format!("Invalid order number: {}. Use 1-{}", n, state.open_orders.len()),
                    ),
                }
            }
            Command::Timeframe(tf) => {
                self.trading_engine.set_timeframe(tf).await;
                self.add_log(LogLevel::Info, &format!("Timeframe set to {}", tf.as_str()));
            }
            Command::Refresh if self.is_loading_markets => {
                self.add_log(LogLevel::Warning, "Market refresh already in progress");
            }
            Command::Refresh => {
                self.add_log(LogLevel::Info, "Refreshing market data...");
                self.request_market_refresh();
            }
            Command::Help => self.show_command_help(),
        }
    }

    fn show_command_help(&mut self) {
        self.add_log(LogLevel::Info, "─── Available Commands ───");
        self.add_log(LogLevel::Info, "/deposit <account> <amount> [symbol]");
        self.add_log(LogLevel::Info, "/withdraw <account> <amount> [symbol]");
        self.add_log(LogLevel::Info, "/transfer <from> <to> <amount>");
        self.add_log(LogLevel::Info, "/buy <amount> [price]   - market, or limit with price");
        self.add_log(LogLevel::Info, "/sell <amount> [price]");
        self.add_log(LogLevel::Info, "/cancel <#>             - Cancel open order by number");
        self.add_log(LogLevel::Info, "/timeframe <5m|15m|1h|4h|1d>");
        self.add_log(LogLevel::Info, "/refresh                - Reload market data");
        self.add_log(LogLevel::Info, "/help                   - Show this help");
    }

    async fn handle_normal_input(&mut self, event: KeyEvent) -> Result<()> {
        match event.code {
            // Enter command mode
            KeyCode::Char(':') | KeyCode::Char('/') => {
                self.input_mode = InputMode::Command;
                self.command_input = "/".to_string();
            }

            // Quick order entry
            KeyCode::Char('b') | KeyCode::Char('B') => {
                self.input_mode = InputMode::Command;
                self.command_input = "/buy ".to_string();
            }
            KeyCode::Char('s') | KeyCode::Char('S') => {
                self.input_mode = InputMode::Command;
                self.command_input = "/sell ".to_string();
            }

            // Assets: cycle overview -> trading -> funding
            KeyCode::Char('a') | KeyCode::Char('A') if self.current_tab == Tab::Assets => {
                self.selected_account = match self.selected_account {
                    None => Some(AccountType::Trading),
                    Some(AccountType::Trading) => Some(AccountType::Funding),
                    Some(AccountType::Funding) => None,
                };
            }

            // Spot: navigate and cancel open orders
            KeyCode::Up | KeyCode::Char('k') => {
                if self.current_tab == Tab::Spot && self.selected_order_index > 0 {
                    self.selected_order_index -= 1;
                }
            }
            KeyCode::Down | KeyCode::Char('j') => {
                let open = self.trading.as_ref().map_or(0, |t| t.open_orders.len());
                if self.current_tab == Tab::Spot && self.selected_order_index < open.saturating_sub(1) {
                    self.selected_order_index += 1;
                }
            }
            KeyCode::Delete | KeyCode::Char('x') | KeyCode::Char('X') => {
                let open = self.trading.as_ref().map_or(0, |t| t.open_orders.len());
                if self.current_tab == Tab::Spot && open > 0 {
                    let n = self.selected_order_index + 1;
                    self.execute_command(&format!("/cancel {}", n)).await;
                }
            }

            // Cycle timeframe
            KeyCode::Char('f') | KeyCode::Char('F') => {
                if let Some(ref state) = self.trading {
                    let all = Timeframe::all();
                    let pos = all.iter().position(|tf| *tf == state.timeframe).unwrap_or(0);
                    let next = all[(pos + 1) % all.len()];
                    self.execute_command(&format!("/timeframe {}", next.as_str())).await;
                }
            }

            KeyCode::Char('r') | KeyCode::Char('R') => {
                self.execute_command("/refresh").await;
            }

            // Quit - show confirmation modal
            KeyCode::Char('q') | KeyCode::Char('Q') => {
                self.input_mode = InputMode::QuitConfirmation;
                self.quit_selection = QuitSelection::No; // Default to No
            }

            // Tab navigation
            KeyCode::Tab | KeyCode::Right => {
                self.current_tab = self.current_tab.next();
            }
            KeyCode::BackTab | KeyCode::Left => {
                self.current_tab = self.current_tab.prev();
            }

            // Numeric tab selection
            KeyCode::Char('1') => self.current_tab = Tab::Assets,
            KeyCode::Char('2') => self.current_tab = Tab::Markets,
            KeyCode::Char('3') => self.current_tab = Tab::Spot,
            KeyCode::Char('4') => self.current_tab = Tab::Logs,

            // Help
            KeyCode::Char('h') | KeyCode::Char('H') => {
                self.add_log(LogLevel::Info, "─── Keyboard Shortcuts ───");
                self.add_log(LogLevel::Info, ":        : Enter command mode");
                self.add_log(LogLevel::Info, "B / S    : Quick buy / sell");
                self.add_log(LogLevel::Info, "A        : Cycle account (Assets)");
                self.add_log(LogLevel::Info, "↑/↓, X   : Select / cancel order (Spot)");
                self.add_log(LogLevel::Info, "F        : Cycle timeframe");
                self.add_log(LogLevel::Info, "R        : Refresh market data");
                self.add_log(LogLevel::Info, "Tab/←/→  : Navigate tabs");
                self.add_log(LogLevel::Info, "Q        : Quit");
                self.current_tab = Tab::Logs;
            }

            // Ctrl+C
            KeyCode::Char('c') if event.modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true;
            }

            _ => {}
        }

        Ok(())
    }

    fn handle_quit_confirmation(&mut self, event: KeyEvent) -> Result<()> {
        match event.code {
            // Toggle selection with Left/Right or Tab
            KeyCode::Left | KeyCode::Right | KeyCode::Tab | KeyCode::BackTab => {
                self.quit_selection = match self.quit_selection {
                    QuitSelection::No => QuitSelection::Yes,
                    QuitSelection::Yes => QuitSelection::No,
                };
            }
            KeyCode::Char('y') | KeyCode::Char('Y') => {
                self.should_quit = true;
                self.input_mode = InputMode::Normal;
            }
            // Confirm selection with Enter
            KeyCode::Enter => {
                if self.quit_selection == QuitSelection::Yes {
                    self.should_quit = true;
                }
                self.input_mode = InputMode::Normal;
            }
            KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('N') => {
                self.input_mode = InputMode::Normal;
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryBalanceStore;
    use crate::simulator::MarketSimulator;
    use rust_decimal_macros::dec;

    async fn test_app() -> App {
        let store = Arc::new(MemoryBalanceStore::new());
        let balances = BalanceManager::load(store, dec!(5000), dec!(4000)).await.unwrap();
        App::new(
            Arc::new(balances),
            Arc::new(TradingEngine::new(MarketSimulator::seeded(7))),
            Arc::new(MarketService::new("http://127.0.0.1:9")),
            Duration::from_secs(90),
        )
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_parse_balance_commands() {
        assert_eq!(
            parse_command("/deposit trading 250.5 btc"),
            Ok(Command::Deposit {
                account: AccountType::Trading,
                amount: dec!(250.5),
                symbol: "BTC".to_string(),
            })
        );
        assert_eq!(
            parse_command("/withdraw f 10"),
            Ok(Command::Withdraw {
                account: AccountType::Funding,
                amount: dec!(10),
                symbol: "USDT".to_string(),
            })
        );
        assert_eq!(
            parse_command("/transfer trading funding 1500"),
            Ok(Command::Transfer {
                from: AccountType::Trading,
                to: AccountType::Funding,
                amount: dec!(1500),
            })
        );
    }

    #[test]
    fn test_parse_order_commands() {
        assert_eq!(
            parse_command("/buy 0.5 40000"),
            Ok(Command::Order {
                side: OrderSide::Buy,
                amount: dec!(0.5),
                price: Some(dec!(40000)),
            })
        );
        assert_eq!(
            parse_command("sell 1"),
            Ok(Command::Order {
                side: OrderSide::Sell,
                amount: dec!(1),
                price: None,
            })
        );
        assert_eq!(parse_command("/cancel 2"), Ok(Command::Cancel(2)));
        assert_eq!(parse_command("/tf 4h"), Ok(Command::Timeframe(Timeframe::H4)));
        assert_eq!(parse_command("/refresh"), Ok(Command::Refresh));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(parse_command("/deposit savings 10").is_err());
        assert!(parse_command("/deposit trading ten").is_err());
        assert!(parse_command("/transfer trading").is_err());
        assert!(parse_command("/cancel 0").is_err());
        assert!(parse_command("/timeframe 2h").is_err());
        assert!(parse_command("/launch").is_err());
    }

    #[tokio::test]
    async fn test_transfer_command_moves_funds() {
        let mut app = test_app().await;
        app.execute_command("/transfer trading funding 1500").await;

        assert_eq!(app.balance_manager.balance_of(AccountType::Trading).await, dec!(3500));
        assert_eq!(app.balance_manager.balance_of(AccountType::Funding).await, dec!(5500));
        assert!(matches!(app.logs.last().unwrap().level, LogLevel::Success));
    }

    #[tokio::test]
    async fn test_overdraft_is_logged_not_applied() {
        let mut app = test_app().await;
        app.execute_command("/withdraw funding 4000.01").await;

        assert_eq!(app.balance_manager.balance_of(AccountType::Funding).await, dec!(4000));
        assert!(matches!(app.logs.last().unwrap().level, LogLevel::Error));
    }

    #[tokio::test]
    async fn test_out_of_range_deposit_is_logged_not_applied() {
        let mut app = test_app().await;
        app.execute_command("/deposit trading 79228162514264337593543950335").await;

        assert_eq!(app.balance_manager.balance_of(AccountType::Trading).await, dec!(5000));
        assert!(matches!(app.logs.last().unwrap().level, LogLevel::Error));
    }

    #[tokio::test]
    async fn test_refresh_while_loading_is_skipped() {
        let mut app = test_app().await;
        app.execute_command("/refresh").await;
        assert!(app.is_loading_markets);
        let requested_at = app.last_market_request;

        app.execute_command("/refresh").await;
        assert_eq!(app.last_market_request, requested_at);
        let last = app.logs.last().unwrap();
        assert!(matches!(last.level, LogLevel::Warning));
        assert_eq!(last.message, "Market refresh already in progress");
    }

    #[tokio::test]
    async fn test_invalid_order_is_not_placed() {
        let mut app = test_app().await;
        app.execute_command("/buy 0 37000").await;

        assert!(app.trading_engine.snapshot().await.open_orders.is_empty());
        assert!(matches!(app.logs.last().unwrap().level, LogLevel::Warning));
    }

    #[tokio::test]
    async fn test_place_and_cancel_by_number() {
        let mut app = test_app().await;
        app.execute_command("/buy 0.5 36000").await;
        app.execute_command("/sell 0.25 38000").await;
        assert_eq!(app.current_tab, Tab::Spot);
        assert_eq!(app.trading_engine.snapshot().await.open_orders.len(), 2);

        app.execute_command("/cancel 1").await;
        let state = app.trading_engine.snapshot().await;
        assert_eq!(state.open_orders.len(), 1);
        assert_eq!(state.order_history.len(), 1);

        app.execute_command("/cancel 5").await;
        assert_eq!(app.trading_engine.snapshot().await.open_orders.len(), 1);
    }

    #[tokio::test]
    async fn test_quit_requires_confirmation() {
        let mut app = test_app().await;

        app.handle_event(key(KeyCode::Char('q'))).await.unwrap();
        assert_eq!(app.input_mode, InputMode::QuitConfirmation);
        app.handle_event(key(KeyCode::Enter)).await.unwrap();
        assert!(!app.should_quit);

        app.handle_event(key(KeyCode::Char('q'))).await.unwrap();
        app.handle_event(key(KeyCode::Right)).await.unwrap();
        app.handle_event(key(KeyCode::Enter)).await.unwrap();
        assert!(app.should_quit);
    }

    #[tokio::test]
    async fn test_logs_are_capped() {
        let mut app = test_app().await;
        for i in 0..150 {
            app.add_log(LogLevel::Info, &format!("line {}", i));
        }
        assert_eq!(app.logs.len(), MAX_LOGS);
        assert_eq!(app.logs.last().unwrap().message, "line 149");
    }

    #[tokio::test]
    async fn test_refresh_loads_snapshots() {
        let mut app = test_app().await;
        app.refresh_data().await;

        let balances = app.balances.as_ref().unwrap();
        assert_eq!(balances.overview.total_balance_usdt, dec!(9000));
        assert!(app.trading.is_some());
        assert_eq!(app.displayed_ledger().unwrap().total_balance_usdt, dec!(9000));

        app.selected_account = Some(AccountType::Funding);
        assert_eq!(app.displayed_ledger().unwrap().total_balance_usdt, dec!(4000));
    }
}
