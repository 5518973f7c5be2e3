//! Prefix autocomplete over the command registry.
//!
//! Matching is case-insensitive and preserves registry order; there is no
//! relevance ranking beyond the prefix test. Rendering is done by the input
//! loop, which draws at most [`MENU_WINDOW`] rows below the prompt box.

/// Fixed dropdown height.
pub const MENU_WINDOW: usize = 5;

/// Registry view the autocomplete engine needs: name plus description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuEntry {
    pub name: String,
    pub description: String,
}

impl MenuEntry {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// All registry entries whose name starts with the buffer content after the
/// `/` prefix, case-insensitively, in registry order.
pub fn compute_matches<'a>(buffer: &str, registry: &'a [MenuEntry]) -> Vec<&'a MenuEntry> {
    let Some(prefix) = buffer.strip_prefix('/') else {
        return Vec::new();
    };
    let prefix = prefix.to_lowercase();
    registry
        .iter()
        .filter(|entry| entry.name.to_lowercase().starts_with(&prefix))
        .collect()
}

/// Selection cursor plus scroll offset over the current match list.
///
/// The selection is clamped whenever the match set shrinks so it never
/// references a nonexistent entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MenuState {
    pub selected: usize,
    pub scroll: usize,
}

impl MenuState {
    pub fn clamp(&mut self, len: usize) {
        if len == 0 {
            self.selected = 0;
            self.scroll = 0;
            return;
        }
        if self.selected >= len {
            self.selected = len - 1;
        }
        self.scroll_into_view(len);
    }

    pub fn move_up(&mut self, len: usize) {
        self.clamp(len);
        self.selected = self.selected.saturating_sub(1);
        self.scroll_into_view(len);
    }

    pub fn move_down(&mut self, len: usize) {
        if len == 0 {
            return;
        }
        self.clamp(len);
        if self.selected + 1 < len {
            self.selected += 1;
        }
        self.scroll_into_view(len);
    }

    fn scroll_into_view(&mut self, len: usize) {
        if self.selected < self.scroll {
            self.scroll = self.selected;
        } else if self.selected >= self.scroll + MENU_WINDOW {
            self.scroll = self.selected + 1 - MENU_WINDOW;
        }
        let max_scroll = len.saturating_sub(MENU_WINDOW);
        if self.scroll > max_scroll {
            self.scroll = max_scroll;
        }
    }

    /// The `(a-b of n)` overflow indicator, when the window cannot show
    /// every match.
    pub fn window_indicator(&self, len: usize) -> Option<String> {
        if len <= MENU_WINDOW {
            return None;
        }
        let first = self.scroll + 1;
        let last = (self.scroll + MENU_WINDOW).min(len);
        Some(format!("({first}-{last} of {len})"))
    }
}
