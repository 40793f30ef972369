//! ANSI color helpers for diagnostic rendering.
//!
//! Color is a process-wide switch rather than a per-call argument so every
//! diagnostic produced during a run (tokenizer, parser, resolver, evaluator)
//! honors a single `--no-color` flag without threading it through every
//! function signature.

use std::sync::atomic::{AtomicBool, Ordering};

static COLOR_ENABLED: AtomicBool = AtomicBool::new(true);

pub struct Style;

impl Style {
    pub fn set_enabled(enabled: bool) {
        COLOR_ENABLED.store(enabled, Ordering::Relaxed);
    }

    fn wrap(code: &str, text: &str) -> String {
        if COLOR_ENABLED.load(Ordering::Relaxed) {
            format!("\x1b[{}m{}\x1b[0m", code, text)
        } else {
            text.to_string()
        }
    }

    pub fn bold_red(text: &str) -> String {
        Self::wrap("1;31", text)
    }

    pub fn red(text: &str) -> String {
        Self::wrap("31", text)
    }

    pub fn blue(text: &str) -> String {
        Self::wrap("34", text)
    }

    pub fn cyan(text: &str) -> String {
        Self::wrap("36", text)
    }

    pub fn green(text: &str) -> String {
        Self::wrap("32", text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_with_ansi_codes_when_enabled() {
        Style::set_enabled(true);
        assert!(Style::bold_red("x").contains("\x1b["));
    }

    #[test]
    fn passes_through_plain_text_when_disabled() {
        Style::set_enabled(false);
        assert_eq!(Style::bold_red("x"), "x");
        Style::set_enabled(true);
    }
}
