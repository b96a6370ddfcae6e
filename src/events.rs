//! Event types and the main event loop driver.
//!
//! This module defines the [`Event`] enum (terminal input, ticks and the
//! results of background work) and the [`EventHandler`], which runs a
//! background task that polls crossterm for input and emits periodic
//! [`Event::Tick`]s. The main loop in `main.rs` receives events via
//! [`EventHandler::next`]; background tasks (placeholder fetches, the
//! geolocation lookup) post their results via [`EventHandler::tx`].

use crate::controller::Pane;
use crate::models::{GeoShape, Position, PositionError};
use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, KeyEventKind, MouseEvent};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::error;

/// Events processed by the application event loop.
///
/// Results of background work carry the page generation they were started
/// for, so that results arriving after a page reload can be dropped.
#[derive(Debug)]
pub enum Event {
    /// Periodic tick used for UI refresh.
    Tick,
    /// User key press from the terminal.
    Input(KeyEvent),
    /// Mouse press, drag, release or scroll.
    Mouse(MouseEvent),
    /// Terminal resized to the given columns and rows.
    Resize(u16, u16),
    /// A placeholder resource finished loading (or failed to).
    PlaceholderLoaded {
        generation: u64,
        pane: Pane,
        result: Result<GeoShape, String>,
    },
    /// The geolocation lookup finished.
    Geolocated {
        generation: u64,
        result: Result<Position, PositionError>,
    },
}

/// Multiplexes terminal input and ticks into a single event stream.
///
/// Holds an unbounded channel: the sender ([`tx`](EventHandler::tx)) can be
/// cloned and given to other tasks, while the receiver is consumed by
/// [`next`](EventHandler::next) in the main loop.
pub struct EventHandler {
    /// Sender for posting events from background tasks.
    pub tx: mpsc::UnboundedSender<Event>,
    rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
    /// Creates a new event handler and spawns the input/tick task.
    ///
    /// The spawned task polls crossterm with a timeout of `tick_rate_ms`.
    /// It stops if the terminal can no longer be read, after logging why.
    pub fn new(tick_rate_ms: u64) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let event_tx = tx.clone();

        tokio::spawn(async move {
            let tick_rate = Duration::from_millis(tick_rate_ms);
            let mut last_tick = Instant::now();
            loop {
                let timeout = tick_rate
                    .checked_sub(last_tick.elapsed())
                    .unwrap_or(Duration::from_secs(0));
                match event::poll(timeout) {
                    Ok(true) => match event::read() {
                        Ok(CrosstermEvent::Key(key)) if key.kind == KeyEventKind::Press => {
                            event_tx.send(Event::Input(key)).ok();
                        }
                        Ok(CrosstermEvent::Mouse(mouse)) => {
                            event_tx.send(Event::Mouse(mouse)).ok();
                        }
                        Ok(CrosstermEvent::Resize(cols, rows)) => {
                            event_tx.send(Event::Resize(cols, rows)).ok();
                        }
                        Ok(_) => {}
                        Err(e) => {
                            error!("Terminal read failed: {}", e);
                            break;
                        }
                    },
                    Ok(false) => {}
                    Err(e) => {
                        error!("Terminal poll failed: {}", e);
                        break;
                    }
                }
                if last_tick.elapsed() >= tick_rate {
                    if event_tx.send(Event::Tick).is_err() {
                        break;
                    }
                    last_tick = Instant::now();
                }
            }
        });

        Self { tx, rx }
    }

    /// Receives the next event from the channel.
    pub async fn next(&mut self) -> Option<Event> {
        self.rx.recv().await
    }
}
