use std::io::{self, Stderr};
use std::time::Duration;
use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyEvent, KeyEventKind, MouseEvent},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use futures_util::StreamExt;
use kelvin_core::{ChatMessage, RevealEvent, Ticket, TransportError};
use tokio::sync::mpsc;

pub type Tui = Terminal<CrosstermBackend<Stderr>>;

/// Ellipsis animation while a reply is pending
const TICK_RATE: Duration = Duration::from_millis(300);

#[derive(Debug)]
#[allow(dead_code)]
pub enum AppEvent {
    Key(KeyEvent),
    Mouse(MouseEvent),
    Resize(u16, u16),
    Tick,
    /// Time to rotate the background pattern
    Pattern,
    /// A reveal timer advanced (or finished)
    Reveal { id: u64, event: RevealEvent },
    /// A chat request came back
    Reply {
        ticket: Ticket,
        result: Result<ChatMessage, TransportError>,
    },
}

pub struct EventHandler {
    rx: mpsc::UnboundedReceiver<AppEvent>,
    tx: mpsc::UnboundedSender<AppEvent>,
}

impl EventHandler {
    pub fn new(pattern_period: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        // Spawn event reader task
        let tx_events = tx.clone();
        tokio::spawn(async move {
            let mut reader = event::EventStream::new();
            while let Some(evt) = reader.next().await {
                let Ok(evt) = evt else { continue };
                let app_event = match evt {
                    Event::Key(key) => {
                        // Only handle key press events, not release
                        if key.kind == KeyEventKind::Press {
                            Some(AppEvent::Key(key))
                        } else {
                            None
                        }
                    }
                    Event::Mouse(mouse) => Some(AppEvent::Mouse(mouse)),
                    Event::Resize(w, h) => Some(AppEvent::Resize(w, h)),
                    _ => None,
                };

                if let Some(event) = app_event {
                    if tx_events.send(event).is_err() {
                        break;
                    }
                }
            }
        });

        let tx_tick = tx.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(TICK_RATE);
            loop {
                interval.tick().await;
                if tx_tick.send(AppEvent::Tick).is_err() {
                    break;
                }
            }
        });

        spawn_pattern_timer(tx.clone(), pattern_period);

        Self { rx, tx }
    }

    /// Handle for tasks that report back into the event loop
    pub fn sender(&self) -> mpsc::UnboundedSender<AppEvent> {
        self.tx.clone()
    }

    pub async fn next(&mut self) -> Option<AppEvent> {
        self.rx.recv().await
    }
}

/// Background pattern rotation, one `AppEvent::Pattern` per period. The first
/// interval tick is immediate so it is skipped.
fn spawn_pattern_timer(
    tx: mpsc::UnboundedSender<AppEvent>,
    period: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.tick().await;
        loop {
            interval.tick().await;
            if tx.send(AppEvent::Pattern).is_err() {
                break;
            }
        }
    })
}

pub fn init() -> Result<Tui> {
    enable_raw_mode()?;
    execute!(io::stderr(), EnterAlternateScreen)?;

    // Enable mouse capture
    execute!(io::stderr(), crossterm::event::EnableMouseCapture)?;

    let backend = CrosstermBackend::new(io::stderr());
    let terminal = Terminal::new(backend)?;

    Ok(terminal)
}

pub fn restore() -> Result<()> {
    execute!(io::stderr(), crossterm::event::DisableMouseCapture)?;
    execute!(io::stderr(), LeaveAlternateScreen)?;
    disable_raw_mode()?;
    Ok(())
}

/// Install panic hook to restore terminal on panic
pub fn install_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = restore();
        original_hook(panic_info);
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_pattern_event_once_per_period() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let period = Duration::from_secs(5);
        let timer = spawn_pattern_timer(tx, period);

        // Nothing before the first full period
        tokio::time::sleep(period - Duration::from_millis(1)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert!(matches!(rx.try_recv(), Ok(AppEvent::Pattern)));
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(period).await;
        assert!(matches!(rx.try_recv(), Ok(AppEvent::Pattern)));
        assert!(rx.try_recv().is_err());

        timer.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_pattern_timer_stops_when_receiver_dropped() {
        let (tx, rx) = mpsc::unbounded_channel();
        let timer = spawn_pattern_timer(tx, Duration::from_secs(5));
        drop(rx);

        tokio::time::sleep(Duration::from_secs(6)).await;
        tokio::task::yield_now().await;
        assert!(timer.is_finished());
    }
}
