//! ANSI styling helpers. Colors are disabled wholesale when `NO_COLOR` is
//! set so piped output stays clean.

use std::sync::OnceLock;

pub const RESET: &str = "\x1b[0m";
pub const BOLD: &str = "\x1b[1m";
pub const DIM: &str = "\x1b[2m";
pub const REVERSE: &str = "\x1b[7m";
pub const RED: &str = "\x1b[31m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";
pub const MAGENTA: &str = "\x1b[35m";
pub const CYAN: &str = "\x1b[36m";
pub const GRAY: &str = "\x1b[90m";
pub const TEAL: &str = "\x1b[38;5;30m";

pub fn colors_enabled() -> bool {
    static ENABLED: OnceLock<bool> = OnceLock::new();
    *ENABLED.get_or_init(|| std::env::var_os("NO_COLOR").is_none())
}

fn wrap(code: &str, text: &str) -> String {
    if colors_enabled() {
        format!("{code}{text}{RESET}")
    } else {
        text.to_string()
    }
}

pub fn bold(text: &str) -> String {
    wrap(BOLD, text)
}

pub fn dim(text: &str) -> String {
    wrap(DIM, text)
}

pub fn red(text: &str) -> String {
    wrap(RED, text)
}

pub fn green(text: &str) -> String {
    wrap(GREEN, text)
}

pub fn yellow(text: &str) -> String {
    wrap(YELLOW, text)
}

pub fn magenta(text: &str) -> String {
    wrap(MAGENTA, text)
}

pub fn cyan(text: &str) -> String {
    wrap(CYAN, text)
}

pub fn gray(text: &str) -> String {
    wrap(GRAY, text)
}

pub fn teal(text: &str) -> String {
    wrap(TEAL, text)
}

/// Inverted styling for the selected dropdown row.
pub fn inverted(text: &str) -> String {
    wrap(REVERSE, text)
}

/// `✓` success marker.
pub fn ok_mark() -> String {
    green("✓")
}

/// `✗` failure marker.
pub fn err_mark() -> String {
    red("✗")
}

/// `⚠` warning marker.
pub fn warn_mark() -> String {
    yellow("⚠")
}
