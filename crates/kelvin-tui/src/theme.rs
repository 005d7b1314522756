use kelvin_core::{Pattern, PresentationEffects, Theme};
use ratatui::style::Color;

/// Colors and background pattern currently in effect. The core only ever
/// reaches this through `PresentationEffects`.
#[derive(Debug, Clone)]
pub struct Palette {
    pub theme: Theme,
    pub pattern: Pattern,
    pub background: Color,
    pub text: Color,
    pub muted: Color,
    pub pattern_color: Color,
    pub user: Color,
    pub assistant: Color,
    pub code: Color,
    pub border: Color,
    pub border_active: Color,
    pub error_bg: Color,
    pub error_fg: Color,
    pub bar_bg: Color,
    pub bar_fg: Color,
}

impl Palette {
    pub fn new(theme: Theme, pattern: Pattern) -> Self {
        let mut palette = Self::colors(theme);
        palette.pattern = pattern;
        palette
    }

    fn colors(theme: Theme) -> Self {
        match theme {
            Theme::Light => Self {
                theme,
                pattern: Pattern::Wave,
                background: Color::Rgb(250, 250, 252),
                text: Color::Rgb(30, 30, 40),
                muted: Color::Rgb(120, 120, 135),
                pattern_color: Color::Rgb(215, 225, 235),
                user: Color::Rgb(20, 110, 190),
                assistant: Color::Rgb(30, 150, 130),
                code: Color::Rgb(170, 60, 120),
                border: Color::Rgb(190, 190, 205),
                border_active: Color::Rgb(85, 214, 190),
                error_bg: Color::Rgb(255, 225, 225),
                error_fg: Color::Rgb(160, 20, 30),
                bar_bg: Color::Rgb(224, 195, 252),
                bar_fg: Color::Rgb(30, 30, 40),
            },
            Theme::Dark => Self {
                theme,
                pattern: Pattern::Wave,
                background: Color::Rgb(22, 24, 30),
                text: Color::Rgb(225, 225, 235),
                muted: Color::Rgb(130, 130, 150),
                pattern_color: Color::Rgb(40, 46, 58),
                user: Color::Rgb(110, 180, 255),
                assistant: Color::Rgb(85, 214, 190),
                code: Color::Rgb(240, 150, 200),
                border: Color::Rgb(70, 72, 90),
                border_active: Color::Rgb(85, 214, 190),
                error_bg: Color::Rgb(90, 20, 30),
                error_fg: Color::Rgb(255, 200, 200),
                bar_bg: Color::Rgb(60, 50, 90),
                bar_fg: Color::Rgb(225, 225, 235),
            },
        }
    }
}

impl PresentationEffects for Palette {
    fn apply_theme(&mut self, theme: Theme) {
        let pattern = self.pattern;
        *self = Self::colors(theme);
        self.pattern = pattern;
    }

    fn apply_pattern(&mut self, pattern: Pattern) {
        self.pattern = pattern;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_theme_switch_keeps_pattern() {
        let mut palette = Palette::new(Theme::Light, Pattern::Grid);
        palette.apply_theme(Theme::Dark);
        assert_eq!(palette.theme, Theme::Dark);
        assert_eq!(palette.pattern, Pattern::Grid);
        assert_ne!(palette.background, Palette::new(Theme::Light, Pattern::Grid).background);
    }
}
