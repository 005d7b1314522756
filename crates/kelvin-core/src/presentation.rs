//! Presentation shell: theme and background pattern.
//!
//! The core decides *what* the look is; a front-end decides how it is drawn
//! by implementing `PresentationEffects`.

use rand::Rng;
use std::time::Duration;

use crate::state::Theme;

pub const DEFAULT_PATTERN_PERIOD: Duration = Duration::from_secs(5);

pub trait PresentationEffects {
    fn apply_theme(&mut self, theme: Theme);
    fn apply_pattern(&mut self, pattern: Pattern);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    Wave,
    Dots,
    Diagonal,
    Grid,
    Blobs,
}

impl Pattern {
    pub const ALL: [Pattern; 5] = [
        Pattern::Wave,
        Pattern::Dots,
        Pattern::Diagonal,
        Pattern::Grid,
        Pattern::Blobs,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Pattern::Wave => "wave",
            Pattern::Dots => "dots",
            Pattern::Diagonal => "diagonal",
            Pattern::Grid => "grid",
            Pattern::Blobs => "blobs",
        }
    }

    /// Repeating tile for the pattern, one string per row.
    pub fn tile(&self) -> &'static [&'static str] {
        match self {
            Pattern::Wave => &["  ~~    ~~  ", "~~  ~~~~  ~~"],
            Pattern::Dots => &["·   ", "  · "],
            Pattern::Diagonal => &["╱  ", " ╱ ", "  ╱"],
            Pattern::Grid => &["   ┼   ", "       "],
            Pattern::Blobs => &["  ◌    ", "    ◌  ", "       "],
        }
    }
}

/// Cycles through `Pattern::ALL`, starting from a random entry.
#[derive(Debug, Clone)]
pub struct PatternRotator {
    index: usize,
}

impl PatternRotator {
    pub fn new(start: usize) -> Self {
        Self {
            index: start % Pattern::ALL.len(),
        }
    }

    pub fn random() -> Self {
        Self::random_with(&mut rand::thread_rng())
    }

    pub fn random_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::new(rng.gen_range(0..Pattern::ALL.len()))
    }

    pub fn current(&self) -> Pattern {
        Pattern::ALL[self.index]
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn advance(&mut self) -> Pattern {
        self.index = (self.index + 1) % Pattern::ALL.len();
        self.current()
    }

    pub fn apply(&self, effects: &mut dyn PresentationEffects) {
        effects.apply_pattern(self.current());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[derive(Default)]
    struct Recorder {
        patterns: Vec<Pattern>,
    }

    impl PresentationEffects for Recorder {
        fn apply_theme(&mut self, _theme: Theme) {}

        fn apply_pattern(&mut self, pattern: Pattern) {
            self.patterns.push(pattern);
        }
    }

    #[test]
    fn test_rotation_wraps_around() {
        let mut rotator = PatternRotator::new(3);
        assert_eq!(rotator.current(), Pattern::Grid);
        assert_eq!(rotator.advance(), Pattern::Blobs);
        assert_eq!(rotator.advance(), Pattern::Wave);
    }

    #[test]
    fn test_full_cycle_visits_every_pattern_once() {
        let mut rotator = PatternRotator::new(2);
        let mut seen: Vec<Pattern> = (0..5).map(|_| rotator.advance()).collect();
        seen.sort_by_key(|p| p.name());
        let mut all = Pattern::ALL.to_vec();
        all.sort_by_key(|p| p.name());
        assert_eq!(seen, all);
    }

    #[test]
    fn test_random_start_is_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            assert!(PatternRotator::random_with(&mut rng).index() < Pattern::ALL.len());
        }
    }

    #[test]
    fn test_apply_goes_through_effects() {
        let mut recorder = Recorder::default();
        let mut rotator = PatternRotator::new(0);
        rotator.apply(&mut recorder);
        rotator.advance();
        rotator.apply(&mut recorder);
        assert_eq!(recorder.patterns, vec![Pattern::Wave, Pattern::Dots]);
    }

    #[test]
    fn test_tiles_are_rectangular() {
        for pattern in Pattern::ALL {
            let widths: Vec<usize> = pattern.tile().iter().map(|r| r.chars().count()).collect();
            assert!(widths.windows(2).all(|w| w[0] == w[1]), "{}", pattern.name());
        }
    }
}
