//! Minimal markdown: four ordered substitutions, nothing more.
//!
//! Order matters. Line breaks go first so the inline patterns never span a
//! break, code spans go before emphasis so asterisks inside backticks are
//! already wrapped, and bold runs before italic so `**x**` is not read as two
//! italic markers.

use regex::Regex;
use std::sync::OnceLock;

struct Rules {
    code: Regex,
    bold: Regex,
    italic: Regex,
    tag: Regex,
}

fn rules() -> &'static Rules {
    static RULES: OnceLock<Rules> = OnceLock::new();
    RULES.get_or_init(|| Rules {
        code: Regex::new(r"`([^`]+)`").expect("valid code regex"),
        bold: Regex::new(r"\*\*([^*]+)\*\*").expect("valid bold regex"),
        italic: Regex::new(r"\*([^*]+)\*").expect("valid italic regex"),
        tag: Regex::new(r"<[^>]+>").expect("valid tag regex"),
    })
}

/// Render message text into inline markup (`<br/>`, `<code>`, `<b>`, `<i>`).
pub fn render_markdown(text: &str) -> String {
    let rules = rules();
    let text = text.replace('\n', "<br/>");
    let text = rules.code.replace_all(&text, "<code>$1</code>");
    let text = rules.bold.replace_all(&text, "<b>$1</b>");
    let text = rules.italic.replace_all(&text, "<i>$1</i>");
    text.into_owned()
}

/// Remove markup tags, for copying a message as plain text.
pub fn strip_tags(markup: &str) -> String {
    rules().tag.replace_all(markup, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_breaks() {
        assert_eq!(render_markdown("a\nb"), "a<br/>b");
    }

    #[test]
    fn test_code_bold_italic() {
        assert_eq!(
            render_markdown("use `x` with **care** and *style*"),
            "use <code>x</code> with <b>care</b> and <i>style</i>"
        );
    }

    #[test]
    fn test_bold_is_not_read_as_italic() {
        assert_eq!(render_markdown("**bold**"), "<b>bold</b>");
    }

    #[test]
    fn test_unbalanced_markers_stay_literal() {
        assert_eq!(render_markdown("2 * 3 = 6"), "2 * 3 = 6");
        assert_eq!(render_markdown("a `b"), "a `b");
    }

    #[test]
    fn test_existing_markup_passes_through() {
        assert_eq!(
            render_markdown("I'm <b>Kelvin</b>"),
            "I'm <b>Kelvin</b>"
        );
    }

    #[test]
    fn test_strip_tags() {
        assert_eq!(
            strip_tags("Hello <b>there</b><br/>and <code>x</code>"),
            "Hello thereand x"
        );
    }
}
