//! Terminal rendering for the interactive session: ANSI theme, bordered
//! prompt box with status block, autocomplete dropdown, spinner, and
//! markdown/diff formatting.

pub mod autocomplete;
pub mod format;
pub mod input;
pub mod spinner;
pub mod theme;

pub use autocomplete::{MENU_WINDOW, MenuEntry, MenuState, compute_matches};
pub use format::{banner, render_diff, render_markdown};
pub use input::{BoxChrome, LineOutcome, ReplState, read_line};
pub use spinner::Spinner;
