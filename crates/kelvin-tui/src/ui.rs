use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, InputMode};
use crate::markup::markup_to_lines;
use kelvin_core::{ChatRole, Theme};

/// Most rows the input box grows to before it scrolls
const MAX_INPUT_ROWS: u16 = 6;

/// Rows a set of lines occupies once wrapped to `width`.
/// Counts chars, so wide glyphs are under-counted.
fn wrapped_height(lines: &[Line], width: u16) -> u16 {
    if width == 0 {
        return lines.len() as u16;
    }
    let width = width as usize;
    lines
        .iter()
        .map(|line| {
            let len: usize = line.spans.iter().map(|s| s.content.chars().count()).sum();
            len.div_ceil(width).max(1)
        })
        .sum::<usize>()
        .min(u16::MAX as usize) as u16
}

/// Row and column of a char-index cursor inside multi-line input
fn cursor_row_col(input: &str, cursor: usize) -> (usize, usize) {
    let before: String = input.chars().take(cursor).collect();
    let row = before.matches('\n').count();
    let col = before
        .rsplit('\n')
        .next()
        .map(|s| s.chars().count())
        .unwrap_or(0);
    (row, col)
}

/// Fill `area` with the current background pattern.
fn pattern_text(app: &App, area: Rect) -> Text<'static> {
    let tile = app.palette.pattern.tile();
    let style = Style::default().fg(app.palette.pattern_color);
    let lines = (0..area.height as usize)
        .map(|row| {
            let cells: String = tile[row % tile.len()]
                .chars()
                .cycle()
                .take(area.width as usize)
                .collect();
            Line::styled(cells, style)
        })
        .collect::<Vec<_>>();
    Text::from(lines)
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();
    frame.render_widget(
        Block::default().style(
            Style::default()
                .bg(app.palette.background)
                .fg(app.palette.text),
        ),
        area,
    );

    let input_rows = (app.session.input().matches('\n').count() as u16 + 1).min(MAX_INPUT_ROWS);
    let status_rows = if app.session.error().is_some() || app.notice.is_some() {
        1
    } else {
        0
    };

    // Main layout: header, chat, status, input, footer
    let [header_area, chat_area, status_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(status_rows),
        Constraint::Length(input_rows + 2),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_chat(app, frame, chat_area);
    render_status(app, frame, status_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);

    if app.input_mode == InputMode::Attach {
        render_attach_prompt(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let theme = app.session.theme();
    let icon = match theme {
        Theme::Light => "☀",
        Theme::Dark => "☾",
    };
    let theme_indicator = format!("{} {}", icon, theme.display_name());

    let title = Line::from(vec![
        Span::styled(" 🤖 Kelvin ", Style::default().fg(app.palette.bar_fg).bold()),
        Span::styled(
            format!(" {} ", app.settings.model),
            Style::default().fg(app.palette.muted),
        ),
        Span::raw(" "),
        Span::styled(theme_indicator, Style::default().fg(app.palette.bar_fg)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(app.palette.muted),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(app.palette.bar_bg));
    frame.render_widget(header, area);
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(app.palette.border))
        .title(format!(" {} ", app.palette.pattern.name()));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    // Store chat area dimensions for scroll calculations
    app.chat_height = inner.height;
    app.chat_width = inner.width;

    frame.render_widget(Paragraph::new(pattern_text(app, inner)), inner);

    let base = Style::default().fg(app.palette.text);
    let mut lines: Vec<Line> = Vec::new();

    for (index, msg) in app.session.messages().iter().enumerate() {
        let (label, color) = match msg.role {
            ChatRole::User => ("You:", app.palette.user),
            ChatRole::Assistant => ("Kelvin:", app.palette.assistant),
        };
        lines.push(Line::from(Span::styled(
            label,
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        )));
        let (markup, truncated) = app.display_markup(index, msg);
        lines.extend(markup_to_lines(&markup, truncated, base, app.palette.code));
        lines.push(Line::default());
    }

    if app.session.is_loading() {
        lines.push(Line::from(Span::styled(
            "Kelvin:",
            Style::default()
                .fg(app.palette.assistant)
                .add_modifier(Modifier::BOLD),
        )));
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(
            format!("Thinking{}", dots),
            Style::default()
                .fg(app.palette.muted)
                .add_modifier(Modifier::ITALIC),
        )));
    }

    let total = wrapped_height(&lines, inner.width);
    app.settle_scroll(total);

    let chat = Paragraph::new(Text::from(lines))
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));
    frame.render_widget(chat, inner);
}

fn render_status(app: &App, frame: &mut Frame, area: Rect) {
    if area.height == 0 {
        return;
    }
    let line = if let Some(error) = app.session.error() {
        Paragraph::new(Line::from(vec![
            Span::styled(format!(" ⚠ {} ", error), Style::default().bold()),
            Span::raw(" Esc to dismiss"),
        ]))
        .style(
            Style::default()
                .bg(app.palette.error_bg)
                .fg(app.palette.error_fg),
        )
    } else if let Some(notice) = &app.notice {
        Paragraph::new(format!(" {}", notice)).style(Style::default().fg(app.palette.muted))
    } else {
        return;
    };
    frame.render_widget(line, area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let editing = app.input_mode == InputMode::Editing && !app.session.is_loading();
    let border_color = if editing {
        app.palette.border_active
    } else {
        app.palette.border
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Message ");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let input = app.session.input();
    if input.is_empty() {
        let placeholder = if app.session.is_loading() {
            "Waiting for Kelvin..."
        } else {
            "Type your message..."
        };
        frame.render_widget(
            Paragraph::new(placeholder).style(Style::default().fg(app.palette.muted)),
            inner,
        );
    }

    // Keep the cursor row and column in view
    let (row, col) = cursor_row_col(input, app.cursor);
    let height = inner.height.max(1) as usize;
    let width = inner.width.max(1) as usize;
    let row_offset = (row + 1).saturating_sub(height);
    let col_offset = (col + 1).saturating_sub(width);

    if !input.is_empty() {
        let text = Paragraph::new(input)
            .style(Style::default().fg(app.palette.user))
            .scroll((row_offset as u16, col_offset as u16));
        frame.render_widget(text, inner);
    }

    if editing {
        frame.set_cursor_position((
            inner.x + (col - col_offset) as u16,
            inner.y + (row - row_offset) as u16,
        ));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = Style::default()
        .bg(app.palette.border_active)
        .fg(app.palette.background)
        .bold();
    let mode_text = match app.input_mode {
        InputMode::Editing if app.session.is_loading() => " WAIT ",
        InputMode::Editing => " CHAT ",
        InputMode::Attach => " ATTACH ",
    };

    // Key style: dark background with bright text for visibility on both themes
    let key_style = Style::default().bg(app.palette.bar_bg).fg(app.palette.bar_fg);
    let label_style = Style::default().fg(app.palette.muted);

    let hints: &[(&str, &str)] = match app.input_mode {
        InputMode::Editing => &[
            ("Enter", "send"),
            ("Alt+Enter", "newline"),
            ("^O", "attach"),
            ("^E", "export"),
            ("^L", "clear"),
            ("^T", "theme"),
            ("^Y", "copy"),
            ("Esc", "quit"),
        ],
        InputMode::Attach => &[("Enter", "load"), ("Esc", "cancel")],
    };

    let mut spans = vec![Span::styled(mode_text, mode_style), Span::raw(" ")];
    for (key, label) in hints {
        spans.push(Span::styled(format!(" {} ", key), key_style));
        spans.push(Span::styled(format!(" {} ", label), label_style));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_attach_prompt(app: &App, frame: &mut Frame, area: Rect) {
    // Calculate popup size and position (centered)
    let popup_width = 60.min(area.width.saturating_sub(4));
    let popup_height = 6;

    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;

    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(app.palette.border_active))
        .style(Style::default().bg(app.palette.background))
        .title(" Attach a text file ");

    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let instructions = Paragraph::new("Path to the file. Enter to load, Esc to cancel.")
        .style(Style::default().fg(app.palette.muted));
    frame.render_widget(instructions, Rect::new(inner.x, inner.y, inner.width, 1));

    // Input field, scrolled so the cursor stays visible
    let input_area = Rect::new(inner.x, inner.y + 2, inner.width, 1);
    let width = input_area.width.max(1) as usize;
    let offset = (app.attach_cursor + 1).saturating_sub(width);
    let visible: String = app.attach_input.chars().skip(offset).take(width).collect();

    frame.render_widget(
        Paragraph::new(visible).style(Style::default().fg(app.palette.user)),
        input_area,
    );
    frame.set_cursor_position((
        input_area.x + (app.attach_cursor - offset) as u16,
        input_area.y,
    ));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapped_height_counts_wrapping() {
        let lines = vec![
            Line::from("abcdefghij"),
            Line::default(),
            Line::from(vec![Span::raw("abc"), Span::raw("de")]),
        ];
        assert_eq!(wrapped_height(&lines, 4), 3 + 1 + 2);
        assert_eq!(wrapped_height(&lines, 0), 3);
    }

    #[test]
    fn test_cursor_row_col() {
        assert_eq!(cursor_row_col("", 0), (0, 0));
        assert_eq!(cursor_row_col("héllo", 3), (0, 3));
        assert_eq!(cursor_row_col("ab\ncd\ne", 5), (1, 2));
        assert_eq!(cursor_row_col("ab\n", 3), (1, 0));
    }
}
