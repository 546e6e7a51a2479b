use std::{
    fmt::Display,
    sync::{LazyLock, PoisonError, RwLock},
};

use nu_ansi_term::Color;

pub struct Icons;

impl Icons {
    pub const ARROW: &str = "→";
    pub const CHECK: &str = "✓";
    pub const CROSS: &str = "✗";
    pub const PACKAGE: &str = "📦";
    pub const WARNING: &str = "⚠";
}

pub fn term_width() -> usize {
    terminal_size::terminal_size()
        .map(|(w, _)| w.0 as usize)
        .unwrap_or(80)
}

pub static COLOR: LazyLock<RwLock<bool>> = LazyLock::new(|| RwLock::new(true));
pub static PROGRESS: LazyLock<RwLock<bool>> = LazyLock::new(|| RwLock::new(true));

pub fn set_color(enabled: bool) {
    *COLOR.write().unwrap_or_else(PoisonError::into_inner) = enabled;
}

pub fn set_progress(enabled: bool) {
    *PROGRESS.write().unwrap_or_else(PoisonError::into_inner) = enabled;
}

pub fn progress_enabled() -> bool {
    *PROGRESS.read().unwrap_or_else(PoisonError::into_inner)
}

pub struct Colored<T: Display>(pub Color, pub T);

impl<T: Display> Display for Colored<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let color = *COLOR.read().unwrap_or_else(PoisonError::into_inner);
        if color {
            write!(f, "{}", self.0.prefix())?;
            self.1.fmt(f)?;
            write!(f, "{}", self.0.suffix())
        } else {
            self.1.fmt(f)
        }
    }
}

/// Shortens a digest for display.
pub fn short_digest(digest: &str) -> &str {
    if digest.is_empty() {
        return "-";
    }
    digest.get(..12).unwrap_or(digest)
}

#[cfg(test)]
mod tests {
    use nu_ansi_term::Color::Green;

    use super::*;

    #[test]
    fn test_short_digest() {
        assert_eq!(short_digest(""), "-");
        assert_eq!(short_digest("abcd"), "abcd");
        assert_eq!(
            short_digest("6f5902ac237024bdd0c176cb93063dc4"),
            "6f5902ac2370"
        );
    }

    #[test]
    fn test_colored_plain_when_disabled() {
        set_color(false);
        assert_eq!(Colored(Green, "ok").to_string(), "ok");
        set_color(true);
    }
}
