use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};

const KNOWN_TAGS: [&str; 9] = ["b", "/b", "i", "/i", "code", "/code", "br", "br/", "br /"];

#[derive(Clone, Copy, Default)]
struct Active {
    bold: bool,
    italic: bool,
    code: bool,
}

impl Active {
    fn style(&self, base: Style, code_color: Color) -> Style {
        let mut style = base;
        if self.bold {
            style = style.add_modifier(Modifier::BOLD);
        }
        if self.italic {
            style = style.add_modifier(Modifier::ITALIC);
        }
        if self.code {
            style = style.fg(code_color);
        }
        style
    }
}

/// Is `rest` (starting at '<') the beginning of a tag we understand?
fn partial_known_tag(rest: &str) -> bool {
    let inner = &rest[1..];
    KNOWN_TAGS.iter().any(|tag| tag.starts_with(inner))
}

/// Convert rendered markup (`<b>`, `<i>`, `<code>`, `<br/>`) into styled
/// lines. Unknown tags are shown literally. When `truncated` is set (a prefix
/// mid-reveal), a known tag cut off at the end of the text is hidden;
/// complete text keeps a trailing `<` as written.
pub fn markup_to_lines(
    markup: &str,
    truncated: bool,
    base: Style,
    code_color: Color,
) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut current = String::new();
    let mut active = Active::default();
    let mut rest = markup;

    fn flush(current: &mut String, spans: &mut Vec<Span<'static>>, style: Style) {
        if !current.is_empty() {
            spans.push(Span::styled(std::mem::take(current), style));
        }
    }

    while let Some(pos) = rest.find('<') {
        current.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        let Some(end) = tail.find('>') else {
            if !(truncated && partial_known_tag(tail)) {
                current.push_str(tail);
            }
            rest = "";
            break;
        };

        let name = tail[1..end].trim().to_ascii_lowercase();
        let style = active.style(base, code_color);
        match name.as_str() {
            "b" | "/b" | "i" | "/i" | "code" | "/code" => {
                flush(&mut current, &mut spans, style);
                match name.as_str() {
                    "b" => active.bold = true,
                    "/b" => active.bold = false,
                    "i" => active.italic = true,
                    "/i" => active.italic = false,
                    "code" => active.code = true,
                    _ => active.code = false,
                }
            }
            "br" | "br/" | "br /" => {
                flush(&mut current, &mut spans, style);
                lines.push(Line::from(std::mem::take(&mut spans)));
            }
            _ => current.push_str(&tail[..=end]),
        }
        rest = &tail[end + 1..];
    }
    current.push_str(rest);
    flush(&mut current, &mut spans, active.style(base, code_color));
    lines.push(Line::from(spans));
    lines
}
