use crossterm::event::{self, Event, KeyEvent, KeyEventKind};
use std::time::Duration;

/// Terminal input the dashboard reacts to
#[derive(Debug, Clone, Copy)]
pub enum TerminalEvent {
    Key(KeyEvent),
    Resize,
}

/// Polls crossterm with a fixed tick so the UI redraws even without input
pub struct EventHandler {
    tick_rate: Duration,
}

impl EventHandler {
    pub fn new(tick_rate_ms: u64) -> Self {
        Self {
            tick_rate: Duration::from_millis(tick_rate_ms),
        }
    }

    /// Wait up to one tick for input. Key release/repeat events are dropped.
    pub fn next(&mut self) -> std::io::Result<Option<TerminalEvent>> {
        if !event::poll(self.tick_rate)? {
            return Ok(None);
        }
        Ok(match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => Some(TerminalEvent::Key(key)),
            Event::Resize(_, _) => Some(TerminalEvent::Resize),
            _ => None,
        })
    }
}
