//! The application-state object every front-end drives.
//!
//! `ChatSession` owns the conversation, the pending input, the error banner,
//! the animation marker and the theme. Event handlers call into it; nothing
//! here touches a terminal or a network socket directly.

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::ai::{ChatTransport, TransportError};
use crate::conversation::{ConversationStore, LoadOutcome};
use crate::export;
use crate::ingest;
use crate::markdown::{render_markdown, strip_tags};
use crate::presentation::PresentationEffects;
use crate::state::{ChatMessage, ChatRole, Theme};
use crate::storage::{KeyValueStore, THEME_KEY};

pub const SAVE_FAILED: &str = "Could not save conversation.";
pub const RECOVERED: &str = "Saved conversation could not be read; starting fresh.";
pub const EXPORT_FAILED: &str = "Could not export conversation.";
pub const THEME_SAVE_FAILED: &str = "Could not save theme.";

/// Identifies one send. Only the pending ticket's reply is ever applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    epoch: u64,
    request: u64,
}

/// Everything a transport needs to carry out a send
#[derive(Debug, Clone)]
pub struct OutgoingRequest {
    pub ticket: Ticket,
    pub history: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The reply was appended at `index` and should be animated
    Appended { index: usize },
    /// The send failed; the error banner says why
    Failed,
    /// The reply belonged to a send that is no longer current
    Discarded,
}

pub struct ChatSession<S> {
    conversation: ConversationStore<S>,
    input: String,
    error: Option<String>,
    pending: Option<Ticket>,
    animating: Option<usize>,
    theme: Theme,
    epoch: u64,
    next_request: u64,
}

impl<S: KeyValueStore> ChatSession<S> {
    pub fn load(storage: S) -> (Self, LoadOutcome) {
        let theme = match storage.get(THEME_KEY) {
            Ok(Some(raw)) => raw.parse().unwrap_or_default(),
            Ok(None) => Theme::default(),
            Err(e) => {
                warn!(error = %e, "could not read theme, using default");
                Theme::default()
            }
        };
        let (conversation, outcome) = ConversationStore::load(storage);
        let error = match outcome {
            LoadOutcome::Recovered { .. } => Some(RECOVERED.to_string()),
            _ => None,
        };

        let session = Self {
            conversation,
            input: String::new(),
            error,
            pending: None,
            animating: None,
            theme,
            epoch: 0,
            next_request: 0,
        };
        (session, outcome)
    }

    pub fn messages(&self) -> &[ChatMessage] {
        self.conversation.messages()
    }

    pub fn storage(&self) -> &S {
        self.conversation.storage()
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, input: impl Into<String>) {
        self.input = input.into();
    }

    pub fn input_mut(&mut self) -> &mut String {
        &mut self.input
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    pub fn can_send(&self) -> bool {
        !self.is_loading() && !self.input.trim().is_empty()
    }

    pub fn animating(&self) -> Option<usize> {
        self.animating
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    /// Append the pending input as a user message and hand back what to send.
    ///
    /// Does nothing while a send is outstanding or when the input is blank.
    pub fn begin_send(&mut self) -> Option<OutgoingRequest> {
        if !self.can_send() {
            return None;
        }
        self.error = None;

        let message = ChatMessage::user(self.input.clone());
        if let Err(e) = self.conversation.append(message) {
            warn!(error = %e, "could not persist user message");
            self.error = Some(SAVE_FAILED.to_string());
            return None;
        }
        self.input.clear();

        let ticket = Ticket {
            epoch: self.epoch,
            request: self.next_request,
        };
        self.next_request += 1;
        self.pending = Some(ticket);
        debug!(?ticket, messages = self.conversation.len(), "send started");

        Some(OutgoingRequest {
            ticket,
            history: self.conversation.messages().to_vec(),
        })
    }

    /// Apply the result of a send. Replies for anything but the pending
    /// ticket (for example one issued before a clear) are dropped.
    pub fn complete_send(
        &mut self,
        ticket: Ticket,
        result: Result<ChatMessage, TransportError>,
    ) -> SendOutcome {
        if self.pending != Some(ticket) {
            debug!(?ticket, "discarding stale reply");
            return SendOutcome::Discarded;
        }
        self.pending = None;

        match result {
            Ok(reply) => {
                let reply = ChatMessage::assistant(reply.content);
                match self.conversation.append(reply) {
                    Ok(index) => {
                        self.animating = Some(index);
                        SendOutcome::Appended { index }
                    }
                    Err(e) => {
                        warn!(error = %e, "could not persist assistant reply");
                        self.error = Some(SAVE_FAILED.to_string());
                        SendOutcome::Failed
                    }
                }
            }
            Err(e) => {
                self.error = Some(e.to_string());
                SendOutcome::Failed
            }
        }
    }

    /// `begin_send`, the round trip, and `complete_send` in one go.
    pub async fn send<T: ChatTransport + ?Sized>(&mut self, transport: &T) -> Option<SendOutcome> {
        let request = self.begin_send()?;
        let result = transport.send(&request.history).await;
        Some(self.complete_send(request.ticket, result))
    }

    /// Clear the marker once the reveal of `index` has finished.
    pub fn finish_animation(&mut self, index: usize) -> bool {
        if self.animating == Some(index) {
            self.animating = None;
            true
        } else {
            false
        }
    }

    /// Back to the greeting. Any send still in flight will be discarded.
    pub fn clear(&mut self) {
        if let Err(e) = self.conversation.reset() {
            warn!(error = %e, "could not persist cleared conversation");
            self.error = Some(SAVE_FAILED.to_string());
        } else {
            self.error = None;
        }
        self.input.clear();
        self.animating = None;
        self.pending = None;
        self.epoch += 1;
    }

    pub fn toggle_theme(&mut self, effects: &mut dyn PresentationEffects) -> Theme {
        self.theme = self.theme.toggled();
        if let Err(e) = self.storage().set(THEME_KEY, self.theme.as_str()) {
            warn!(error = %e, "could not persist theme");
            self.error = Some(THEME_SAVE_FAILED.to_string());
        }
        effects.apply_theme(self.theme);
        self.theme
    }

    pub fn apply_theme(&self, effects: &mut dyn PresentationEffects) {
        effects.apply_theme(self.theme);
    }

    /// Load a text file into the input. Ignored while a send is outstanding.
    pub async fn ingest_file(&mut self, path: &Path) -> bool {
        if self.is_loading() {
            return false;
        }
        match ingest::ingest_path(path).await {
            Ok(prompt) => {
                self.input = prompt;
                self.error = None;
                true
            }
            Err(e) => {
                warn!(path = %path.display(), error = ?e, "file rejected");
                self.error = Some(e.to_string());
                false
            }
        }
    }

    pub fn export_to(&mut self, dir: &Path) -> Result<PathBuf> {
        match export::write_transcript(self.conversation.messages(), dir) {
            Ok(path) => Ok(path),
            Err(e) => {
                warn!(error = %e, "export failed");
                self.error = Some(EXPORT_FAILED.to_string());
                Err(e)
            }
        }
    }

    /// Plain text of the newest assistant message, for the clipboard. The
    /// text is rendered first so markdown markers go along with the tags.
    pub fn last_reply_plain(&self) -> Option<String> {
        self.conversation
            .messages()
            .iter()
            .rev()
            .find(|m| m.role == ChatRole::Assistant)
            .map(|m| strip_tags(&render_markdown(&m.content)))
    }
}
