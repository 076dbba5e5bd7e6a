use crate::markets::MarketsResponse;
use crate::tui::app::{App, InputMode, LogLevel, QuitSelection, Tab};
use crate::types::{AccountType, BalanceData, OrderBookLevel, OrderSide};
use ratatui::{
    prelude::*,
    symbols,
    widgets::{Axis, Block, Borders, Chart, Clear, Dataset, GraphType, List, ListItem, Paragraph, Row, Table, Tabs},
};
use rust_decimal::Decimal;

/// Draw the complete TUI
pub fn draw(frame: &mut Frame, app: &App) {
    let area = frame.area();

    // Main layout: Header, Tabs, Content, Command Input (if active), Footer
    let constraints = if app.input_mode == InputMode::Command {
        vec![
            Constraint::Length(3), // Header
            Constraint::Length(3), // Tabs
            Constraint::Min(8),    // Content
            Constraint::Length(3), // Command input
            Constraint::Length(3), // Footer
        ]
    } else {
        vec![
            Constraint::Length(3), // Header
            Constraint::Length(3), // Tabs
            Constraint::Min(10),   // Content
            Constraint::Length(3), // Footer
        ]
    };

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    draw_header(frame, layout[0], app);
    draw_tabs(frame, layout[1], app);
    draw_content(frame, layout[2], app);

    if app.input_mode == InputMode::Command {
        draw_command_input(frame, layout[3], app);
        draw_footer(frame, layout[4], app);
    } else {
        draw_footer(frame, layout[3], app);
    }

    if app.input_mode == InputMode::QuitConfirmation {
        draw_quit_confirmation(frame, app);
    }
}

fn draw_header(frame: &mut Frame, area: Rect, app: &App) {
    let connected = app.trading.as_ref().map_or(false, |t| t.is_connected);
    let status = if connected {
        Span::styled(" LIVE ", Style::default().bg(Color::Green).fg(Color::Black).bold())
    } else {
        Span::styled(" OFFLINE ", Style::default().bg(Color::Red).fg(Color::White).bold())
    };

    let ticker = match app.trading {
        Some(ref t) => {
            let change_style = if t.current_price.change_24h >= Decimal::ZERO {
                Style::default().fg(Color::Green)
            } else {
                Style::default().fg(Color::Red)
            };
            vec![
                Span::raw("  "),
                Span::styled(&t.current_price.symbol, Style::default().fg(Color::Yellow)),
                Span::raw(format!(" {:.2} ", t.current_price.price)),
                Span::styled(format!("{:+.2}%", t.current_price.change_24h), change_style),
            ]
        }
        None => vec![],
    };

    let mut spans = vec![
        Span::styled("◆ ", Style::default().fg(Color::Yellow)),
        Span::styled("Exchange Dashboard", Style::default().fg(Color::Cyan).bold()),
        Span::raw(" - "),
        status,
    ];
    spans.extend(ticker);

    let header = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(" Status "),
    );

    frame.render_widget(header, area);
}

fn draw_tabs(frame: &mut Frame, area: Rect, app: &App) {
    let titles: Vec<Line> = Tab::all()
        .iter()
        .enumerate()
        .map(|(i, t)| {
            let style = if *t == app.current_tab {
                Style::default().fg(Color::Yellow).bold()
            } else {
                Style::default().fg(Color::Gray)
            };
            Line::from(format!(" [{}] {} ", i + 1, t.title())).style(style)
        })
        .collect();

    let tabs = Tabs::new(titles)
        .block(Block::default().borders(Borders::ALL).title(" Navigation "))
        .highlight_style(Style::default().fg(Color::Yellow).bold())
        .select(app.current_tab as usize);

    frame.render_widget(tabs, area);
}

fn draw_content(frame: &mut Frame, area: Rect, app: &App) {
    match app.current_tab {
        Tab::Assets => draw_assets(frame, area, app),
        Tab::Markets => draw_markets(frame, area, app),
        Tab::Spot => draw_spot(frame, area, app),
        Tab::Logs => draw_logs(frame, area, app),
    }
}

fn draw_command_input(frame: &mut Frame, area: Rect, app: &App) {
    let input = Paragraph::new(Line::from(vec![
        Span::styled("Command: ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(&app.command_input, Style::default().fg(Color::White)),
        Span::styled("▌", Style::default().fg(Color::Yellow)),
    ]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow))
            .title(" 📝 Command Mode (ESC to cancel) "),
    );

    frame.render_widget(input, area);
}

fn pnl_style(value: Decimal) -> Style {
    if value >= Decimal::ZERO {
        Style::default().fg(Color::Green)
    } else {
        Style::default().fg(Color::Red)
    }
}

fn balance_card(title: &str, data: &BalanceData, app: &App, selected: bool) -> Paragraph<'static> {
    let mut lines = vec![Line::from(vec![
        Span::raw("  Balance: "),
        Span::styled(
            format!("{:.2} USDT", data.total_balance_usdt),
            Style::default().fg(Color::Green).bold(),
        ),
    ])];

    if let Some(ref rates) = app.rates {
        let usd = rates.usdt_to(data.total_balance_usdt, "USD");
        let btc = rates.usdt_in_btc(data.total_balance_usdt);
        if let (Some(usd), Some(btc)) = (usd, btc) {
            lines.push(Line::styled(
                format!("  ≈ ${:.2}  ≈ {:.6} BTC", usd, btc),
                Style::default().fg(Color::Gray),
            ));
        }
    }

    lines.push(Line::from(vec![
        Span::raw("  P&L: "),
        Span::styled(format!("+{:.2}", data.profit), pnl_style(data.profit)),
        Span::raw(" / "),
        Span::styled(format!("-{:.2}", data.loss), Style::default().fg(Color::Red)),
    ]));

    let border = if selected { Color::Yellow } else { Color::Green };
    Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!(" {} ", title))
            .border_style(Style::default().fg(border)),
    )
}

fn draw_assets(frame: &mut Frame, area: Rect, app: &App) {
    let Some(ref balances) = app.balances else {
        let loading = Paragraph::new(Line::styled("  Loading...", Style::default().fg(Color::Yellow)))
            .block(Block::default().borders(Borders::ALL).title(" 💰 Assets "));
        frame.render_widget(loading, area);
        return;
    };

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(area);

    // Left column: overview, trading and funding cards
    let cards = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Ratio(1, 3),
            Constraint::Ratio(1, 3),
            Constraint::Ratio(1, 3),
        ])
        .split(columns[0]);

    frame.render_widget(
        balance_card("💰 Overview", &balances.overview, app, app.selected_account.is_none()),
        cards[0],
    );
    frame.render_widget(
        balance_card(
            "📈 Trading",
            &balances.trading,
            app,
            app.selected_account == Some(AccountType::Trading),
        ),
        cards[1],
    );
    frame.render_widget(
        balance_card(
            "🏦 Funding",
            &balances.funding,
            app,
            app.selected_account == Some(AccountType::Funding),
        ),
        cards[2],
    );

    // Right column: history chart + transactions of the selected ledger
    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(columns[1]);

    let label = match app.selected_account {
        None => "Overview",
        Some(AccountType::Trading) => "Trading",
        Some(AccountType::Funding) => "Funding",
    };

    if let Some(ledger) = app.displayed_ledger() {
        draw_balance_history(frame, right[0], ledger, label);
        draw_transactions(frame, right[1], ledger, label);
    }
}

fn draw_balance_history(frame: &mut Frame, area: Rect, ledger: &BalanceData, label: &str) {
    let points: Vec<(f64, f64)> = ledger
        .balance_history
        .iter()
        .enumerate()
        .map(|(i, p)| (i as f64, p.value))
        .collect();

    let (min, max) = points.iter().fold((f64::MAX, f64::MIN), |(lo, hi), (_, v)| {
        (lo.min(*v), hi.max(*v))
    });
    let (min, max) = if points.is_empty() {
        (0.0, 1.0)
    } else if (max - min).abs() < f64::EPSILON {
        (min - 1.0, max + 1.0)
    } else {
        (min, max)
    };

    let dataset = Dataset::default()
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(Color::Cyan))
        .data(&points);

    let chart = Chart::new(vec![dataset])
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" 📊 {} balance (24h) ", label))
                .border_style(Style::default().fg(Color::Blue)),
        )
        .x_axis(Axis::default().bounds([0.0, points.len().saturating_sub(1).max(1) as f64]))
        .y_axis(
            Axis::default()
                .bounds([min, max])
                .labels(vec![
                    Span::raw(format!("{:.0}", min)),
                    Span::raw(format!("{:.0}", max)),
                ]),
        );

    frame.render_widget(chart, area);
}

fn draw_transactions(frame: &mut Frame, area: Rect, ledger: &BalanceData, label: &str) {
    let items: Vec<ListItem> = if ledger.txs.is_empty() {
        vec![ListItem::new(Line::styled(
            "  No transactions yet",
            Style::default().fg(Color::Yellow),
        ))]
    } else {
        ledger
            .txs
            .iter()
            .map(|tx| {
                ListItem::new(Line::from(vec![
                    Span::styled(format!("  {} ", tx.date), Style::default().fg(Color::Gray)),
                    Span::styled(format!("{:<12}", tx.action.label()), Style::default().fg(Color::Cyan)),
                    Span::raw(format!("{:>12} {:<5}", tx.amount, tx.symbol)),
                    Span::styled(format!(" {}", tx.tx_id), Style::default().fg(Color::DarkGray)),
                ]))
            })
            .collect()
    };

    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!(" 🧾 {} transactions ({}) ", label, ledger.txs.len()))
            .border_style(Style::default().fg(Color::Magenta)),
    );

    frame.render_widget(list, area);
}

fn draw_markets(frame: &mut Frame, area: Rect, app: &App) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(6), Constraint::Length(8)])
        .split(area);

    let Some(ref data) = app.markets else {
        let text = if app.is_loading_markets {
            "  Loading markets..."
        } else {
            "  No market data. Press R to refresh"
        };
        let widget = Paragraph::new(Line::styled(text, Style::default().fg(Color::Yellow)))
            .block(Block::default().borders(Borders::ALL).title(" 📈 Markets "));
        frame.render_widget(widget, area);
        return;
    };

    draw_price_table(frame, layout[0], app, data);
    draw_executions(frame, layout[1], data);
}

fn draw_price_table(frame: &mut Frame, area: Rect, app: &App, data: &MarketsResponse) {
    let header = Row::new(vec!["Pair", "Name", "Price", "24h %", "High", "Low", "Volume"])
        .style(Style::default().fg(Color::Yellow).bold());

    let rows: Vec<Row> = data
        .markets
        .iter()
        .map(|m| {
            Row::new(vec![
                Span::styled(m.pair.clone(), Style::default().fg(Color::Cyan)),
                Span::raw(m.name.clone()),
                Span::raw(m.price.to_string()),
                Span::styled(format!("{:+.2}", m.change_24h), pnl_style(m.change_24h)),
                Span::raw(m.high_24h.to_string()),
                Span::raw(m.low_24h.to_string()),
                Span::raw(format!("{:.0}", m.volume_24h)),
            ])
        })
        .collect();

    let mut title = vec![Span::raw(format!(" 📈 Markets ({}) ", data.markets.len()))];
    if app.markets_stale() {
        title.push(Span::styled(" STALE ", Style::default().bg(Color::Yellow).fg(Color::Black).bold()));
    }
    if app.is_loading_markets {
        title.push(Span::styled(" refreshing… ", Style::default().fg(Color::Gray)));
    }

    let table = Table::new(
        rows,
        [
            Constraint::Length(11),
            Constraint::Length(10),
            Constraint::Length(12),
            Constraint::Length(8),
            Constraint::Length(12),
            Constraint::Length(12),
            Constraint::Min(10),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(Line::from(title))
            .border_style(Style::default().fg(Color::Yellow)),
    );

    frame.render_widget(table, area);
}

fn side_style(side: OrderSide) -> Style {
    match side {
        OrderSide::Buy => Style::default().fg(Color::Green),
        OrderSide::Sell => Style::default().fg(Color::Red),
    }
}

fn draw_executions(frame: &mut Frame, area: Rect, data: &MarketsResponse) {
    let items: Vec<ListItem> = data
        .executions
        .iter()
        .map(|e| {
            let time = chrono::DateTime::from_timestamp_millis(e.time)
                .map(|t| t.format("%H:%M:%S").to_string())
                .unwrap_or_default();
            ListItem::new(Line::from(vec![
                Span::styled(format!("  [{}] ", time), Style::default().fg(Color::Gray)),
                Span::styled(format!("{:<4}", e.side), side_style(e.side)),
                Span::raw(format!(" {} {} @ {}", e.amount, e.pair, e.price)),
            ]))
        })
        .collect();

    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" ⚡ Recent Executions ")
            .border_style(Style::default().fg(Color::Blue)),
    );

    frame.render_widget(list, area);
}

fn book_items(levels: &[OrderBookLevel], style: Style) -> Vec<ListItem<'static>> {
    levels
        .iter()
        .map(|l| {
            ListItem::new(Line::from(vec![
                Span::styled(format!(" {:>10.2}", l.price), style),
                Span::raw(format!(" {:>8.4}", l.amount)),
                Span::styled(format!(" {:>12.2}", l.total), Style::default().fg(Color::Gray)),
            ]))
        })
        .collect()
}

fn draw_spot(frame: &mut Frame, area: Rect, app: &App) {
    let Some(ref state) = app.trading else {
        let loading = Paragraph::new(Line::styled("  Connecting...", Style::default().fg(Color::Yellow)))
            .block(Block::default().borders(Borders::ALL).title(" 💱 Spot "));
        frame.render_widget(loading, area);
        return;
    };

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(area);

    // Left column: ticker + order book
    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(6), Constraint::Min(6)])
        .split(columns[0]);

    let ticker = &state.current_price;
    let ticker_text = vec![
        Line::from(vec![
            Span::raw("  Last: "),
            Span::styled(format!("{:.2}", ticker.price), Style::default().fg(Color::White).bold()),
            Span::raw("  "),
            Span::styled(format!("{:+.2}%", ticker.change_24h), pnl_style(ticker.change_24h)),
        ]),
        Line::raw(format!("  High: {:.2}  Low: {:.2}", ticker.high_24h, ticker.low_24h)),
        Line::raw(format!("  Volume: {:.0}", ticker.volume_24h)),
        Line::from(vec![
            Span::raw("  Timeframe: "),
            Span::styled(state.timeframe.as_str(), Style::default().fg(Color::Yellow).bold()),
        ]),
    ];
    let ticker_widget = Paragraph::new(ticker_text).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!(" 💱 {} ", ticker.symbol))
            .border_style(Style::default().fg(Color::Cyan)),
    );
    frame.render_widget(ticker_widget, left[0]);

    let book_area = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(left[1]);

    // Asks are listed best-first; show them worst-first so the spread sits in the middle
    let mut asks = state.order_book.asks.clone();
    asks.reverse();
    let spread = state
        .order_book
        .spread()
        .map(|s| format!(" spread {:.2} ", s))
        .unwrap_or_default();

    frame.render_widget(
        List::new(book_items(&asks, Style::default().fg(Color::Red))).block(
            Block::default()
                .borders(Borders::ALL)
                .title(" 📕 Asks ")
                .border_style(Style::default().fg(Color::Red)),
        ),
        book_area[0],
    );
    frame.render_widget(
        List::new(book_items(&state.order_book.bids, Style::default().fg(Color::Green))).block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" 📗 Bids{}", spread))
                .border_style(Style::default().fg(Color::Green)),
        ),
        book_area[1],
    );

    // Right column: open orders, order history, trade tape
    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(40),
            Constraint::Percentage(30),
            Constraint::Percentage(30),
        ])
        .split(columns[1]);

    let open_items: Vec<ListItem> = if state.open_orders.is_empty() {
        vec![ListItem::new(Line::styled(
            "  No open orders. Press B or S to place one",
            Style::default().fg(Color::Yellow),
        ))]
    } else {
        state
            .open_orders
            .iter()
            .enumerate()
            .map(|(i, order)| {
                let prefix = if i == app.selected_order_index { "▶ " } else { "  " };
                ListItem::new(Line::from(vec![
                    Span::raw(prefix),
                    Span::styled(format!("{:2}. ", i + 1), Style::default().fg(Color::Gray)),
                    Span::styled(format!("{:<4}", order.side), side_style(order.side)),
                    Span::raw(format!(" {:?} {} @ {:.2}", order.order_type, order.amount, order.price)),
                ]))
            })
            .collect()
    };
    frame.render_widget(
        List::new(open_items).block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" 📋 Open Orders ({}) ", state.open_orders.len()))
                .border_style(Style::default().fg(Color::Blue)),
        ),
        right[0],
    );

    let history_items: Vec<ListItem> = state
        .order_history
        .iter()
        .rev()
        .map(|order| {
            ListItem::new(Line::from(vec![
                Span::raw("  "),
                Span::styled(format!("{:<4}", order.side), side_style(order.side)),
                Span::raw(format!(" {} @ {:.2} ", order.amount, order.price)),
                Span::styled(format!("{:?}", order.status), Style::default().fg(Color::Gray)),
            ]))
        })
        .collect();
    frame.render_widget(
        List::new(history_items).block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" 🗂 Order History ({}) ", state.order_history.len()))
                .border_style(Style::default().fg(Color::Gray)),
        ),
        right[1],
    );

    let tape_items: Vec<ListItem> = state
        .transactions
        .iter()
        .map(|tx| {
            ListItem::new(Line::from(vec![
                Span::raw("  "),
                Span::styled(format!("{:<4}", tx.side), side_style(tx.side)),
                Span::raw(format!(" {} @ {:.2}", tx.amount, tx.price)),
                Span::styled(format!("  fee {}", tx.fee), Style::default().fg(Color::Gray)),
            ]))
        })
        .collect();
    frame.render_widget(
        List::new(tape_items).block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" ✅ Fills ({}) ", state.transactions.len()))
                .border_style(Style::default().fg(Color::Green)),
        ),
        right[2],
    );
}

fn draw_logs(frame: &mut Frame, area: Rect, app: &App) {
    let items: Vec<ListItem> = app
        .logs
        .iter()
        .rev() // Show newest first
        .take(50)
        .map(|log| {
            let (prefix, style) = match log.level {
                LogLevel::Info => ("ℹ️ ", Style::default().fg(Color::Cyan)),
                LogLevel::Warning => ("⚠️ ", Style::default().fg(Color::Yellow)),
                LogLevel::Error => ("❌", Style::default().fg(Color::Red)),
                LogLevel::Success => ("✅", Style::default().fg(Color::Green)),
            };

            ListItem::new(Line::from(vec![
                Span::styled(format!("[{}] ", log.timestamp), Style::default().fg(Color::Gray)),
                Span::raw(prefix),
                Span::styled(&log.message, style),
            ]))
        })
        .collect();

    let logs_list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!(" 📝 Logs ({}) ", app.logs.len()))
            .border_style(Style::default().fg(Color::Gray)),
    );

    frame.render_widget(logs_list, area);
}

fn draw_footer(frame: &mut Frame, area: Rect, app: &App) {
    let mut shortcuts = vec![
        Span::styled(" [:]", Style::default().fg(Color::Magenta).bold()),
        Span::raw("Cmd  "),
        Span::styled("[B]", Style::default().fg(Color::Green).bold()),
        Span::raw("uy  "),
        Span::styled("[S]", Style::default().fg(Color::Red).bold()),
        Span::raw("ell  "),
    ];
    match app.current_tab {
        Tab::Assets => {
            shortcuts.push(Span::styled("[A]", Style::default().fg(Color::Yellow).bold()));
            shortcuts.push(Span::raw("ccount  "));
        }
        Tab::Spot => {
            shortcuts.push(Span::styled("[↑↓]", Style::default().fg(Color::Blue).bold()));
            shortcuts.push(Span::raw("Select  "));
            shortcuts.push(Span::styled("[X]", Style::default().fg(Color::Yellow).bold()));
            shortcuts.push(Span::raw("Cancel  "));
            shortcuts.push(Span::styled("[F]", Style::default().fg(Color::Cyan).bold()));
            shortcuts.push(Span::raw("rame  "));
        }
        Tab::Markets => {
            shortcuts.push(Span::styled("[R]", Style::default().fg(Color::Green).bold()));
            shortcuts.push(Span::raw("efresh  "));
        }
        Tab::Logs => {}
    }
    shortcuts.push(Span::styled("[H]", Style::default().fg(Color::Blue).bold()));
    shortcuts.push(Span::raw("elp  "));
    shortcuts.push(Span::styled("[Q]", Style::default().fg(Color::Red).bold()));
    shortcuts.push(Span::raw("uit"));

    let footer = Paragraph::new(Line::from(shortcuts))
        .block(Block::default().borders(Borders::ALL).title(" Shortcuts "))
        .alignment(Alignment::Center);

    frame.render_widget(footer, area);
}

fn draw_quit_confirmation(frame: &mut Frame, app: &App) {
    let area = frame.area();
    if area.width < 24 || area.height < 7 {
        return;
    }
    let width = area.width.saturating_sub(20).clamp(28, 44);
    let height = 7;
    let popup = Rect::new(
        area.x + area.width.saturating_sub(width) / 2,
        area.y + area.height.saturating_sub(height) / 2,
        width,
        height,
    );

    let button = |label: &'static str, active: bool| {
        if active {
            Span::styled(label, Style::default().bg(Color::Yellow).fg(Color::Black).bold())
        } else {
            Span::styled(label, Style::default().fg(Color::Gray))
        }
    };

    let lines = vec![
        Line::raw(""),
        Line::styled("Quit the dashboard?", Style::default().fg(Color::White).bold()),
        Line::raw(""),
        Line::from(vec![
            button(" No ", app.quit_selection == QuitSelection::No),
            Span::raw("    "),
            button(" Yes ", app.quit_selection == QuitSelection::Yes),
        ]),
    ];

    let dialog = Paragraph::new(lines).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Red))
            .title(" Confirm "),
    );

    frame.render_widget(Clear, popup);
    frame.render_widget(dialog, popup);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balance::BalanceManager;
    use crate::markets::MarketService;
    use crate::repository::MemoryBalanceStore;
    use crate::simulator::MarketSimulator;
    use crate::trading::TradingEngine;
    use ratatui::backend::TestBackend;
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use std::time::Duration;

    fn buffer_text(terminal: &Terminal<TestBackend>) -> String {
        terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[tokio::test]
    async fn test_every_tab_renders() {
        let store = Arc::new(MemoryBalanceStore::new());
        let balances = BalanceManager::load(store, dec!(5000), dec!(4000)).await.unwrap();
        let engine = Arc::new(TradingEngine::new(MarketSimulator::seeded(1)));
        engine.tick_order_book().await;
        let mut app = App::new(
            Arc::new(balances),
            engine,
            Arc::new(MarketService::new("http://127.0.0.1:9")),
            Duration::from_secs(90),
        );
        app.refresh_data().await;
        app.markets = Some(crate::markets::fallback_markets(chrono::Utc::now().timestamp_millis()));

        let mut terminal = Terminal::new(TestBackend::new(140, 40)).unwrap();
        for tab in Tab::all() {
            app.current_tab = tab;
            terminal.draw(|frame| draw(frame, &app)).unwrap();
        }

        app.current_tab = Tab::Markets;
        terminal.draw(|frame| draw(frame, &app)).unwrap();
        assert!(buffer_text(&terminal).contains("BTC/USDT"));

        app.input_mode = InputMode::QuitConfirmation;
        terminal.draw(|frame| draw(frame, &app)).unwrap();
        assert!(buffer_text(&terminal).contains("Quit the dashboard?"));
    }
}
