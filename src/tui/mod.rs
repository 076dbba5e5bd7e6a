mod app;
mod events;
mod ui;

pub use app::{parse_command, App, Command};
pub use events::{EventHandler, TerminalEvent};

use crate::balance::BalanceManager;
use crate::markets::MarketService;
use crate::trading::TradingEngine;
use anyhow::Result;
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;
use std::io::stdout;
use std::sync::Arc;
use std::time::Duration;

/// Initialize and run the dashboard until the user quits
pub async fn run_tui(
    balances: Arc<BalanceManager>,
    trading: Arc<TradingEngine>,
    markets: Arc<MarketService>,
    stale_after: Duration,
) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(balances, trading, markets, stale_after);
    let mut event_handler = EventHandler::new(100); // 100ms tick rate

    let result = run_app(&mut terminal, &mut app, &mut event_handler).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

async fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    event_handler: &mut EventHandler,
) -> Result<()> {
    loop {
        app.refresh_data().await;
        terminal.draw(|frame| ui::draw(frame, app))?;

        match event_handler.next()? {
            Some(TerminalEvent::Key(key)) => app.handle_event(key).await?,
            Some(TerminalEvent::Resize) => terminal.autoresize()?,
            None => {}
        }

        if app.should_quit {
            tracing::info!("Dashboard closed by user");
            break;
        }
    }

    Ok(())
}
