use std::borrow::Cow;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use kelvin_core::animator::prefix_chars;
use kelvin_core::markdown::render_markdown;
use kelvin_core::{
    ChatMessage, ChatSession, ChatTransport, KeyValueStore, PatternRotator, RevealEvent,
    RevealTimer, SendOutcome, Settings, Ticket, TransportError,
};

use crate::theme::Palette;
use crate::tui::AppEvent;

pub type Session = ChatSession<Box<dyn KeyValueStore>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    /// Typing into the chat input
    Editing,
    /// Typing a file path to attach
    Attach,
}

/// The assistant message currently being typed out
pub struct ActiveReveal {
    pub id: u64,
    pub index: usize,
    pub shown: usize,
    pub markup: String,
    _timer: RevealTimer,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub session: Session,
    pub settings: Settings,
    client: Arc<dyn ChatTransport>,
    events: UnboundedSender<AppEvent>,

    // Chat input
    pub cursor: usize, // cursor position in the session input, in chars

    // Attach prompt
    pub attach_input: String,
    pub attach_cursor: usize,

    // Message list scrolling
    pub chat_scroll: u16,
    pub chat_height: u16, // Height of chat area for scroll calculations
    pub chat_width: u16,  // Width of chat area for wrap calculations
    pub follow_bottom: bool,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation
    pub reveal: Option<ActiveReveal>,
    next_reveal_id: u64,

    // Presentation
    pub palette: Palette,
    pub patterns: PatternRotator,

    /// Transient informational line (export path, copy confirmation)
    pub notice: Option<String>,
}

impl App {
    pub fn new(
        session: Session,
        client: Arc<dyn ChatTransport>,
        settings: Settings,
        events: UnboundedSender<AppEvent>,
    ) -> Self {
        let patterns = PatternRotator::random();
        let mut palette = Palette::new(session.theme(), patterns.current());
        session.apply_theme(&mut palette);
        patterns.apply(&mut palette);

        Self {
            should_quit: false,
            input_mode: InputMode::Editing,
            session,
            settings,
            client,
            events,

            cursor: 0,

            attach_input: String::new(),
            attach_cursor: 0,

            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            follow_bottom: true,

            animation_frame: 0,
            reveal: None,
            next_reveal_id: 0,

            palette,
            patterns,

            notice: None,
        }
    }

    /// Send the pending input in the background. The reply comes back as
    /// `AppEvent::Reply`.
    pub fn submit(&mut self) {
        let Some(request) = self.session.begin_send() else {
            return;
        };
        self.cursor = 0;
        self.notice = None;
        self.follow_bottom = true;

        let client = self.client.clone();
        let tx = self.events.clone();
        tokio::spawn(async move {
            let result = client.send(&request.history).await;
            let _ = tx.send(AppEvent::Reply {
                ticket: request.ticket,
                result,
            });
        });
    }

    pub fn on_reply(&mut self, ticket: Ticket, result: Result<ChatMessage, TransportError>) {
        match self.session.complete_send(ticket, result) {
            SendOutcome::Appended { index } => {
                self.follow_bottom = true;
                self.start_reveal(index);
            }
            SendOutcome::Failed => {}
            SendOutcome::Discarded => debug!("ignored reply for a cleared conversation"),
        }
    }

    fn start_reveal(&mut self, index: usize) {
        let Some(message) = self.session.messages().get(index) else {
            return;
        };
        let markup = render_markdown(&message.content);

        let id = self.next_reveal_id;
        self.next_reveal_id += 1;
        let tx = self.events.clone();
        let timer = RevealTimer::spawn(markup.clone(), self.settings.reveal_interval, move |event| {
            tx.send(AppEvent::Reveal { id, event }).is_ok()
        });

        // Replacing the previous reveal drops (and so cancels) its timer
        self.reveal = Some(ActiveReveal {
            id,
            index,
            shown: 0,
            markup,
            _timer: timer,
        });
    }

    pub fn on_reveal(&mut self, id: u64, event: RevealEvent) {
        let Some(reveal) = self.reveal.as_mut() else {
            return;
        };
        if reveal.id != id {
            return;
        }
        match event {
            RevealEvent::Progress { shown } => reveal.shown = shown,
            RevealEvent::Completed => {
                let index = reveal.index;
                self.reveal = None;
                self.session.finish_animation(index);
            }
        }
    }

    /// What to draw for message `index`: the typed-out prefix while it is being
    /// revealed, the full rendered markup otherwise. The flag is true only for
    /// a prefix still being typed out.
    pub fn display_markup(&self, index: usize, message: &ChatMessage) -> (Cow<'_, str>, bool) {
        match &self.reveal {
            Some(reveal) if reveal.index == index => (
                Cow::Borrowed(prefix_chars(&reveal.markup, reveal.shown)),
                true,
            ),
            _ => (Cow::Owned(render_markdown(&message.content)), false),
        }
    }

    pub fn clear_chat(&mut self) {
        self.reveal = None;
        self.session.clear();
        self.cursor = 0;
        self.chat_scroll = 0;
        self.follow_bottom = true;
        self.notice = None;
    }

    pub fn toggle_theme(&mut self) {
        let theme = self.session.toggle_theme(&mut self.palette);
        debug!(theme = theme.as_str(), "theme toggled");
    }

    pub fn rotate_pattern(&mut self) {
        self.patterns.advance();
        self.patterns.apply(&mut self.palette);
    }

    pub fn open_attach_prompt(&mut self) {
        if self.session.is_loading() {
            return;
        }
        self.input_mode = InputMode::Attach;
        self.attach_input.clear();
        self.attach_cursor = 0;
    }

    pub fn cancel_attach_prompt(&mut self) {
        self.input_mode = InputMode::Editing;
    }

    pub async fn attach_file(&mut self) {
        let path = expand_home(self.attach_input.trim());
        self.input_mode = InputMode::Editing;
        if path.as_os_str().is_empty() {
            return;
        }
        if self.session.ingest_file(&path).await {
            self.cursor = self.session.input().chars().count();
        }
    }

    pub fn export(&mut self) {
        let dir = self.settings.export_dir.clone();
        if let Ok(path) = self.session.export_to(&dir) {
            self.notice = Some(format!("Exported to {}", path.display()));
        }
    }

    pub fn copy_last_reply(&mut self) {
        if let Some(text) = self.session.last_reply_plain() {
            if copy_to_clipboard(&text) {
                self.notice = Some("Copied last reply".to_string());
            } else {
                self.notice = Some("No clipboard command available".to_string());
            }
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.session.is_loading() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    // Input editing (cursor is a char index, never a byte index)
    pub fn insert_char(&mut self, c: char) {
        if self.session.is_loading() {
            return;
        }
        let input = self.session.input_mut();
        let byte_pos = char_to_byte_index(input, self.cursor);
        input.insert(byte_pos, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.session.is_loading() || self.cursor == 0 {
            return;
        }
        self.cursor -= 1;
        let input = self.session.input_mut();
        let byte_pos = char_to_byte_index(input, self.cursor);
        input.remove(byte_pos);
    }

    pub fn delete(&mut self) {
        if self.session.is_loading() {
            return;
        }
        let input = self.session.input_mut();
        if self.cursor < input.chars().count() {
            let byte_pos = char_to_byte_index(input, self.cursor);
            input.remove(byte_pos);
        }
    }

    pub fn cursor_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        let char_count = self.session.input().chars().count();
        self.cursor = (self.cursor + 1).min(char_count);
    }

    pub fn cursor_home(&mut self) {
        self.cursor = 0;
    }

    pub fn cursor_end(&mut self) {
        self.cursor = self.session.input().chars().count();
    }

    // Attach prompt editing
    pub fn attach_insert(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.attach_input, self.attach_cursor);
        self.attach_input.insert(byte_pos, c);
        self.attach_cursor += 1;
    }

    pub fn attach_backspace(&mut self) {
        if self.attach_cursor > 0 {
            self.attach_cursor -= 1;
            let byte_pos = char_to_byte_index(&self.attach_input, self.attach_cursor);
            self.attach_input.remove(byte_pos);
        }
    }

    // Message list scrolling
    pub fn scroll_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
        self.follow_bottom = false;
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines);
    }

    pub fn page_up(&mut self) {
        self.scroll_up((self.chat_height / 2).max(1));
    }

    pub fn page_down(&mut self) {
        self.scroll_down((self.chat_height / 2).max(1));
    }

    /// Clamp the scroll offset once the rendered height is known. Sticks to
    /// the bottom while following, and resumes following when scrolled there.
    pub fn settle_scroll(&mut self, total_lines: u16) {
        let max_scroll = total_lines.saturating_sub(self.chat_height);
        if self.follow_bottom || self.chat_scroll >= max_scroll {
            self.chat_scroll = max_scroll;
            self.follow_bottom = true;
        }
    }
}

/// Convert a character index to a byte index for UTF-8 safe string operations
pub fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Hand text to the first clipboard command that accepts it.
fn copy_to_clipboard(text: &str) -> bool {
    use std::io::Write;
    use std::process::{Command, Stdio};

    let candidates: [(&str, &[&str]); 4] = [
        ("pbcopy", &[]),
        ("wl-copy", &[]),
        ("xclip", &["-selection", "clipboard"]),
        ("xsel", &["--clipboard", "--input"]),
    ];

    for (program, args) in candidates {
        if let Ok(mut child) = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            if let Some(mut stdin) = child.stdin.take() {
                let _ = stdin.write_all(text.as_bytes());
            }
            if child.wait().map(|s| s.success()).unwrap_or(false) {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kelvin_core::{MemoryStore, Theme};
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct EchoTransport;

    #[async_trait]
    impl ChatTransport for EchoTransport {
        async fn send(&self, conversation: &[ChatMessage]) -> Result<ChatMessage, TransportError> {
            let last = conversation.last().map(|m| m.content.clone()).unwrap_or_default();
            Ok(ChatMessage::assistant(format!("echo: {}", last)))
        }
    }

    fn settings() -> Settings {
        Settings {
            endpoint: "http://localhost".to_string(),
            model: "test".to_string(),
            data_dir: PathBuf::from("/tmp"),
            export_dir: PathBuf::from("/tmp"),
            reveal_interval: Duration::from_millis(16),
            pattern_period: Duration::from_secs(5),
        }
    }

    fn test_app() -> (App, mpsc::UnboundedReceiver<AppEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let store: Box<dyn KeyValueStore> = Box::new(MemoryStore::new());
        let (session, _) = Session::load(store);
        (App::new(session, Arc::new(EchoTransport), settings(), tx), rx)
    }

    /// Feed every queued event back in until the reveal is over.
    async fn pump(app: &mut App, rx: &mut mpsc::UnboundedReceiver<AppEvent>) {
        while let Some(event) = rx.recv().await {
            match event {
                AppEvent::Reply { ticket, result } => app.on_reply(ticket, result),
                AppEvent::Reveal { id, event } => app.on_reveal(id, event),
                _ => {}
            }
            if !app.session.is_loading() && app.reveal.is_none() {
                break;
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_reveal_and_finish() {
        let (mut app, mut rx) = test_app();
        for c in "Hi".chars() {
            app.insert_char(c);
        }
        app.submit();
        assert!(app.session.is_loading());

        pump(&mut app, &mut rx).await;

        let messages = app.session.messages();
        assert_eq!(messages.last().unwrap().content, "echo: Hi");
        assert_eq!(app.session.animating(), None);
        assert!(app.reveal.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_display_shows_prefix_mid_reveal() {
        let (mut app, mut rx) = test_app();
        app.session.set_input("Hello");
        app.submit();

        // Reply first, then a couple of reveal steps
        let mut progress = 0;
        while let Some(event) = rx.recv().await {
            match event {
                AppEvent::Reply { ticket, result } => app.on_reply(ticket, result),
                AppEvent::Reveal { id, event } => {
                    app.on_reveal(id, event);
                    progress += 1;
                    if progress == 3 {
                        break;
                    }
                }
                _ => {}
            }
        }

        let index = app.session.messages().len() - 1;
        let message = app.session.messages()[index].clone();
        let (markup, truncated) = app.display_markup(index, &message);
        assert_eq!(markup, "ech");
        assert!(truncated);

        let greeting = app.session.messages()[0].clone();
        let (markup, truncated) = app.display_markup(0, &greeting);
        assert_eq!(markup, render_markdown(&greeting.content));
        assert!(!truncated);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_cancels_reveal_and_drops_stale_events() {
        let (mut app, mut rx) = test_app();
        app.session.set_input("Hello");
        app.submit();

        while let Some(event) = rx.recv().await {
            if let AppEvent::Reply { ticket, result } = event {
                app.on_reply(ticket, result);
                break;
            }
        }
        let stale_id = app.reveal.as_ref().unwrap().id;
        app.clear_chat();
        assert!(app.reveal.is_none());

        app.on_reveal(stale_id, RevealEvent::Completed);
        assert_eq!(app.session.messages(), &[ChatMessage::greeting()]);
        assert_eq!(app.session.animating(), None);
    }

    #[test]
    fn test_utf8_cursor_editing() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let store: Box<dyn KeyValueStore> = Box::new(MemoryStore::new());
        let (session, _) = Session::load(store);
        let mut app = App::new(session, Arc::new(EchoTransport), settings(), tx);

        for c in "héllo".chars() {
            app.insert_char(c);
        }
        app.cursor_left();
        app.cursor_left();
        app.backspace();
        assert_eq!(app.session.input(), "hélo");
        app.cursor_home();
        app.delete();
        assert_eq!(app.session.input(), "élo");
        app.cursor_end();
        assert_eq!(app.cursor, 3);
    }

    #[test]
    fn test_theme_toggle_updates_palette() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let store: Box<dyn KeyValueStore> = Box::new(MemoryStore::new());
        let (session, _) = Session::load(store);
        let mut app = App::new(session, Arc::new(EchoTransport), settings(), tx);

        app.toggle_theme();
        assert_eq!(app.palette.theme, Theme::Dark);
        assert_eq!(app.session.theme(), Theme::Dark);
    }

    #[test]
    fn test_settle_scroll_follows_bottom() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let store: Box<dyn KeyValueStore> = Box::new(MemoryStore::new());
        let (session, _) = Session::load(store);
        let mut app = App::new(session, Arc::new(EchoTransport), settings(), tx);
        app.chat_height = 10;

        app.settle_scroll(30);
        assert_eq!(app.chat_scroll, 20);

        app.scroll_up(5);
        app.settle_scroll(40);
        assert_eq!(app.chat_scroll, 15);
        assert!(!app.follow_bottom);
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home("/tmp/x.txt"), PathBuf::from("/tmp/x.txt"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~/notes.txt"), home.join("notes.txt"));
        }
    }
}
