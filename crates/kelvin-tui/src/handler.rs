use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};

use crate::app::{App, InputMode};
use crate::tui::AppEvent;

/// Lines moved per mouse wheel notch
const WHEEL_STEP: u16 = 3;

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key).await?,
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick_animation(),
        AppEvent::Pattern => app.rotate_pattern(),
        AppEvent::Reveal { id, event } => app.on_reveal(id, event),
        AppEvent::Reply { ticket, result } => app.on_reply(ticket, result),
    }
    Ok(())
}

async fn handle_key(app: &mut App, key: KeyEvent) -> Result<()> {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return Ok(());
    }

    match app.input_mode {
        InputMode::Editing => handle_editing_mode(app, key),
        InputMode::Attach => handle_attach_mode(app, key).await,
    }

    Ok(())
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    match key.code {
        // Esc closes the banner first, then quits
        KeyCode::Esc => {
            if app.session.error().is_some() {
                app.session.dismiss_error();
            } else if app.notice.is_some() {
                app.notice = None;
            } else {
                app.should_quit = true;
            }
        }

        // Alt+Enter (or Shift+Enter where the terminal reports it) inserts a newline
        KeyCode::Enter
            if key.modifiers.intersects(KeyModifiers::ALT | KeyModifiers::SHIFT) =>
        {
            app.insert_char('\n');
        }
        KeyCode::Enter => app.submit(),

        // Actions
        KeyCode::Char('o') if ctrl => app.open_attach_prompt(),
        KeyCode::Char('e') if ctrl => app.export(),
        KeyCode::Char('l') if ctrl => app.clear_chat(),
        KeyCode::Char('t') if ctrl => app.toggle_theme(),
        KeyCode::Char('y') if ctrl => app.copy_last_reply(),

        // Scrolling
        KeyCode::PageUp => app.page_up(),
        KeyCode::PageDown => app.page_down(),

        // Text input
        KeyCode::Char(c) if !ctrl => app.insert_char(c),
        KeyCode::Backspace => app.backspace(),
        KeyCode::Delete => app.delete(),
        KeyCode::Left => app.cursor_left(),
        KeyCode::Right => app.cursor_right(),
        KeyCode::Home => app.cursor_home(),
        KeyCode::End => app.cursor_end(),

        _ => {}
    }
}

async fn handle_attach_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.cancel_attach_prompt(),
        KeyCode::Enter => app.attach_file().await,
        KeyCode::Backspace => app.attach_backspace(),
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.attach_insert(c)
        }
        _ => {}
    }
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::ScrollDown => app.scroll_down(WHEEL_STEP),
        MouseEventKind::ScrollUp => app.scroll_up(WHEEL_STEP),
        _ => {}
    }
}
