//! Typewriter reveal for assistant replies.
//!
//! `Reveal` is the bare state machine (idle, revealing a prefix, done) and is
//! advanced one character per `tick()`. `RevealTimer` drives a `Reveal` from a
//! tokio interval and reports progress through a callback until the text is
//! fully shown, or until it is cancelled or dropped.

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

/// One character every 16ms, about 60 characters per second
pub const DEFAULT_TICK: Duration = Duration::from_millis(16);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealState {
    Idle,
    Revealing { shown: usize },
    Done,
}

/// What a single tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// `n` characters are now visible
    Progress(usize),
    /// The whole text is visible. Returned exactly once per run.
    Completed,
    /// Nothing to do (idle, or already done)
    Inert,
}

#[derive(Debug, Clone)]
pub struct Reveal {
    text: String,
    total: usize,
    state: RevealState,
}

impl Reveal {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let total = text.chars().count();
        Self {
            text,
            total,
            state: RevealState::Idle,
        }
    }

    pub fn state(&self) -> RevealState {
        self.state
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Begin from an empty prefix. Only valid from `Idle`; a run in flight or a
    /// finished run is left alone.
    pub fn start(&mut self) -> bool {
        if self.state != RevealState::Idle {
            return false;
        }
        self.state = RevealState::Revealing { shown: 0 };
        true
    }

    pub fn tick(&mut self) -> Step {
        match self.state {
            RevealState::Revealing { shown } => {
                let shown = (shown + 1).min(self.total);
                if shown >= self.total {
                    self.state = RevealState::Done;
                    Step::Completed
                } else {
                    self.state = RevealState::Revealing { shown };
                    Step::Progress(shown)
                }
            }
            RevealState::Idle | RevealState::Done => Step::Inert,
        }
    }

    /// Stop without completing.
    pub fn cancel(&mut self) {
        if matches!(self.state, RevealState::Revealing { .. }) {
            self.state = RevealState::Idle;
        }
    }

    pub fn shown(&self) -> usize {
        match self.state {
            RevealState::Idle => 0,
            RevealState::Revealing { shown } => shown,
            RevealState::Done => self.total,
        }
    }

    pub fn prefix(&self) -> &str {
        prefix_chars(&self.text, self.shown())
    }

    pub fn is_done(&self) -> bool {
        self.state == RevealState::Done
    }
}

/// The first `n` characters of `text` (by `char`, never splitting a code point)
pub fn prefix_chars(text: &str, n: usize) -> &str {
    match text.char_indices().nth(n) {
        Some((byte, _)) => &text[..byte],
        None => text,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealEvent {
    Progress { shown: usize },
    Completed,
}

/// Handle to a running reveal. Dropping it cancels the animation.
#[derive(Debug)]
pub struct RevealTimer {
    handle: JoinHandle<()>,
}

impl RevealTimer {
    /// Spawn the timer. `on_event` returns `false` once nobody is listening,
    /// which stops the timer early.
    pub fn spawn<F>(text: impl Into<String>, period: Duration, mut on_event: F) -> Self
    where
        F: FnMut(RevealEvent) -> bool + Send + 'static,
    {
        let mut reveal = Reveal::new(text);
        let handle = tokio::spawn(async move {
            reveal.start();
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick of a tokio interval is immediate; the first
            // character should appear one period after start.
            interval.tick().await;
            loop {
                interval.tick().await;
                match reveal.tick() {
                    Step::Progress(shown) => {
                        if !on_event(RevealEvent::Progress { shown }) {
                            break;
                        }
                    }
                    Step::Completed => {
                        on_event(RevealEvent::Completed);
                        break;
                    }
                    Step::Inert => break,
                }
            }
        });
        Self { handle }
    }

    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for RevealTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
