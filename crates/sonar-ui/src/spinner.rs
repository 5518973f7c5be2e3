//! Single-line progress indicator for the blocking request path.
//!
//! The session is single-threaded by design, so there is no animation
//! thread: the spinner draws one frame before the blocking call and erases
//! it afterwards.

use crate::theme;
use std::io::{self, Write};

pub struct Spinner {
    width: usize,
}

impl Spinner {
    pub fn start(label: &str) -> Self {
        let line = format!("⠋ {label}...");
        let width = line.chars().count();
        print!("{}", theme::cyan(&line));
        let _ = io::stdout().flush();
        Self { width }
    }

    /// Erase the spinner line so normal output can take its place.
    pub fn finish(self) {
        print!("\r{}\r", " ".repeat(self.width));
        let _ = io::stdout().flush();
    }
}
