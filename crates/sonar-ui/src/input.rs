//! The bordered prompt editor.
//!
//! One call to [`read_line`] is one loop iteration of the input session:
//! draw the box and status block, own the line buffer while raw-mode key
//! events arrive, keep the autocomplete dropdown in sync with the buffer,
//! and guarantee that everything drawn below the input line is erased
//! before control returns to the caller.
//!
//! The terminal has a single writer: this module. Redraws are defensive —
//! save cursor, clear region, restore cursor — so an interleaved repaint
//! can never leave stale chrome behind.

use crate::autocomplete::{MENU_WINDOW, MenuEntry, MenuState, compute_matches};
use crate::theme;
use anyhow::Result;
use crossterm::cursor::{MoveDown, MoveToColumn, MoveUp, RestorePosition, SavePosition};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::style::Print;
use crossterm::terminal::{self, Clear, ClearType};
use crossterm::QueueableCommand;
use std::io::{self, IsTerminal, Write};
use std::time::{Duration, Instant};
use unicode_width::UnicodeWidthStr;

/// Rows drawn below the input line: bottom border, two status lines, and
/// the reserved dropdown area.
const DROPDOWN_ROWS: usize = MENU_WINDOW + 1;
const ROWS_BELOW_INPUT: usize = 3 + DROPDOWN_ROWS;

/// Window for double-press force-exit detection.
const DOUBLE_PRESS_WINDOW: Duration = Duration::from_millis(500);

const EVENT_POLL_MS: u64 = 100;

/// Static chrome for one draw of the box: prompt glyph plus the two status
/// lines under the bottom border.
#[derive(Debug, Clone)]
pub struct BoxChrome {
    pub cwd_line: String,
    pub status_line: String,
}

/// What one await-line iteration produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    Submitted(String),
    /// BackTab flipped the auto-run flag; the caller redraws the box.
    ToggleAutoRun,
    /// Ctrl+X asked for the external editor.
    OpenEditor,
    /// Ctrl+D on an empty buffer / stdin EOF.
    Eof,
    /// Double interrupt or double cancel inside the press window.
    ForceExit,
}

#[derive(Debug, Clone, Default)]
struct Draft {
    buffer: String,
    cursor: usize,
}

/// Line history plus the draft preserved across box redraws (auto-run
/// toggle, editor stub). Draw state itself is rebuilt fresh per iteration.
#[derive(Debug, Default)]
pub struct ReplState {
    history: Vec<String>,
    draft: Option<Draft>,
}

impl ReplState {
    pub fn push_history(&mut self, line: &str) {
        if line.is_empty() || self.history.last().map(String::as_str) == Some(line) {
            return;
        }
        self.history.push(line.to_string());
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}

/// Transient per-iteration draw state; discarded once the line resolves.
#[derive(Debug, Default)]
struct InputDrawState {
    menu: MenuState,
    dropdown_visible: bool,
    notice: Option<String>,
    last_interrupt: Option<Instant>,
    last_cancel: Option<Instant>,
}

struct RawModeGuard;

impl RawModeGuard {
    fn acquire() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

/// Draw the box, await one line, clear the chrome. See module docs.
pub fn read_line(
    chrome: &BoxChrome,
    registry: &[MenuEntry],
    state: &mut ReplState,
) -> Result<LineOutcome> {
    if !io::stdin().is_terminal() || !io::stdout().is_terminal() {
        return read_line_fallback();
    }
    read_line_interactive(chrome, registry, state)
}

fn read_line_fallback() -> Result<LineOutcome> {
    print!("λ ");
    io::stdout().flush()?;
    let mut line = String::new();
    if io::stdin().read_line(&mut line)? == 0 {
        return Ok(LineOutcome::Eof);
    }
    Ok(LineOutcome::Submitted(
        line.trim_end_matches(['\n', '\r']).to_string(),
    ))
}

fn read_line_interactive(
    chrome: &BoxChrome,
    registry: &[MenuEntry],
    state: &mut ReplState,
) -> Result<LineOutcome> {
    let mut stdout = io::stdout();
    let cols = terminal::size().map(|(c, _)| c as usize).unwrap_or(80);

    let draft = state.draft.take().unwrap_or_default();
    let mut buffer = draft.buffer;
    let mut cursor = draft.cursor.min(buffer.chars().count());
    let mut draw = InputDrawState::default();
    let mut history_index: Option<usize> = None;
    let mut history_draft = String::new();

    draw_box(&mut stdout, chrome, cols)?;
    let _guard = RawModeGuard::acquire()?;
    redraw_input_line(&mut stdout, &buffer, cursor, cols)?;
    sync_dropdown(&mut stdout, registry, &buffer, &mut draw)?;

    loop {
        if !event::poll(Duration::from_millis(EVENT_POLL_MS))? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press && key.kind != KeyEventKind::Repeat {
            continue;
        }

        // The buffer, not the keypress, decides whether menu mode is on.
        let matches = compute_matches(&buffer, registry);
        let menu_mode = buffer.starts_with('/') && !matches.is_empty();

        match key.code {
            KeyCode::Enter => {
                finalize(&mut stdout, &buffer, cursor, cols)?;
                state.push_history(&buffer);
                return Ok(LineOutcome::Submitted(buffer));
            }
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                if within_window(&mut draw.last_interrupt) {
                    finalize(&mut stdout, &buffer, cursor, cols)?;
                    return Ok(LineOutcome::ForceExit);
                }
                draw.notice = Some("(press Ctrl+C again to quit)".to_string());
            }
            KeyCode::Esc => {
                if within_window(&mut draw.last_cancel) {
                    finalize(&mut stdout, &buffer, cursor, cols)?;
                    return Ok(LineOutcome::ForceExit);
                }
                draw.notice = Some("(press Esc again to quit)".to_string());
            }
            KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                if buffer.is_empty() {
                    finalize(&mut stdout, &buffer, cursor, cols)?;
                    return Ok(LineOutcome::Eof);
                }
            }
            KeyCode::BackTab => {
                state.draft = Some(Draft { buffer, cursor });
                retract_box(&mut stdout)?;
                return Ok(LineOutcome::ToggleAutoRun);
            }
            KeyCode::Char('x') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                state.draft = Some(Draft { buffer, cursor });
                retract_box(&mut stdout)?;
                return Ok(LineOutcome::OpenEditor);
            }
            KeyCode::Tab => {
                if menu_mode {
                    if let Some(entry) = matches.get(draw.menu.selected) {
                        splice_completion(&mut buffer, &mut cursor, &entry.name);
                        draw.menu = MenuState::default();
                    }
                }
            }
            KeyCode::Right => {
                let len = buffer.chars().count();
                if cursor < len {
                    cursor += 1;
                } else if menu_mode {
                    // Right at end of line accepts the selection, like Tab.
                    if let Some(entry) = matches.get(draw.menu.selected) {
                        splice_completion(&mut buffer, &mut cursor, &entry.name);
                        draw.menu = MenuState::default();
                    }
                }
            }
            KeyCode::Up => {
                if menu_mode {
                    draw.menu.move_up(matches.len());
                } else {
                    history_up(state, &mut history_index, &mut history_draft, &mut buffer);
                    cursor = buffer.chars().count();
                }
            }
            KeyCode::Down => {
                if menu_mode {
                    draw.menu.move_down(matches.len());
                } else {
                    history_down(state, &mut history_index, &history_draft, &mut buffer);
                    cursor = buffer.chars().count();
                }
            }
            KeyCode::Left => {
                cursor = cursor.saturating_sub(1);
            }
            KeyCode::Home => {
                cursor = 0;
            }
            KeyCode::End => {
                cursor = buffer.chars().count();
            }
            KeyCode::Backspace => {
                if cursor > 0 {
                    remove_char(&mut buffer, cursor - 1);
                    cursor -= 1;
                    history_index = None;
                }
            }
            KeyCode::Delete => {
                if cursor < buffer.chars().count() {
                    remove_char(&mut buffer, cursor);
                    history_index = None;
                }
            }
            KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                let tail: String = buffer.chars().skip(cursor).collect();
                buffer = tail;
                cursor = 0;
                history_index = None;
            }
            KeyCode::Char(ch) => {
                if key.modifiers.contains(KeyModifiers::CONTROL)
                    || key.modifiers.contains(KeyModifiers::ALT)
                {
                    continue;
                }
                insert_char(&mut buffer, cursor, ch);
                cursor += 1;
                history_index = None;
            }
            _ => {}
        }

        redraw_input_line(&mut stdout, &buffer, cursor, cols)?;
        sync_dropdown(&mut stdout, registry, &buffer, &mut draw)?;
    }
}

fn within_window(last: &mut Option<Instant>) -> bool {
    let now = Instant::now();
    let hit = last.is_some_and(|prev| now.duration_since(prev) < DOUBLE_PRESS_WINDOW);
    *last = Some(now);
    hit
}

fn splice_completion(buffer: &mut String, cursor: &mut usize, name: &str) {
    // A trailing space leaves the full name in place while emptying the
    // match set, which is what exits menu mode.
    *buffer = format!("/{name} ");
    *cursor = buffer.chars().count();
}

fn insert_char(buffer: &mut String, at: usize, ch: char) {
    let byte = buffer
        .char_indices()
        .nth(at)
        .map(|(i, _)| i)
        .unwrap_or(buffer.len());
    buffer.insert(byte, ch);
}

fn remove_char(buffer: &mut String, at: usize) {
    if let Some((byte, _)) = buffer.char_indices().nth(at) {
        buffer.remove(byte);
    }
}

fn history_up(
    state: &ReplState,
    index: &mut Option<usize>,
    draft: &mut String,
    buffer: &mut String,
) {
    if state.history.is_empty() {
        return;
    }
    let next = match *index {
        None => {
            *draft = buffer.clone();
            state.history.len() - 1
        }
        Some(0) => 0,
        Some(i) => i - 1,
    };
    *index = Some(next);
    *buffer = state.history[next].clone();
}

fn history_down(state: &ReplState, index: &mut Option<usize>, draft: &str, buffer: &mut String) {
    let Some(i) = *index else {
        return;
    };
    if i + 1 < state.history.len() {
        *index = Some(i + 1);
        *buffer = state.history[i + 1].clone();
    } else {
        *index = None;
        *buffer = draft.to_string();
    }
}

// ── Drawing ─────────────────────────────────────────────────────────────

const PROMPT: &str = "λ ";

fn box_width(cols: usize) -> usize {
    cols.saturating_sub(2).max(20)
}

fn borders(cols: usize) -> (String, String) {
    let width = box_width(cols);
    (
        format!("╭{}╮", "─".repeat(width.saturating_sub(2))),
        format!("╰{}╯", "─".repeat(width.saturating_sub(2))),
    )
}

fn input_prefix() -> String {
    format!("{} {}", theme::teal("│"), theme::bold(PROMPT))
}

fn input_prefix_width() -> usize {
    // "│ λ " — the styled prefix always occupies four columns.
    2 + UnicodeWidthStr::width(PROMPT)
}

/// Print spacer, borders, status block and the reserved dropdown area,
/// then park the cursor on the input line.
fn draw_box(out: &mut impl Write, chrome: &BoxChrome, cols: usize) -> Result<()> {
    let (top, bottom) = borders(cols);
    out.queue(Print("\r\n"))?;
    out.queue(Print(format!("{}\r\n", theme::teal(&top))))?;
    out.queue(Print(format!("{}\r\n", input_prefix())))?;
    out.queue(Print(format!("{}\r\n", theme::teal(&bottom))))?;
    out.queue(Print(format!("{}\r\n", theme::dim(&chrome.cwd_line))))?;
    out.queue(Print(format!("{}\r\n", theme::dim(&chrome.status_line))))?;
    // Reserve the dropdown area so later relative moves never scroll.
    for _ in 0..DROPDOWN_ROWS.saturating_sub(1) {
        out.queue(Print("\r\n"))?;
    }
    out.queue(MoveUp(ROWS_BELOW_INPUT as u16))?;
    out.queue(MoveToColumn(input_prefix_width() as u16))?;
    out.flush()?;
    Ok(())
}

/// Repaint the input line in place and park the cursor after `cursor`.
fn redraw_input_line(
    out: &mut impl Write,
    buffer: &str,
    cursor: usize,
    cols: usize,
) -> Result<()> {
    out.queue(MoveToColumn(0))?;
    out.queue(Clear(ClearType::UntilNewLine))?;
    let visible_cols = box_width(cols).saturating_sub(input_prefix_width() + 1);
    let shown: String = buffer.chars().take(visible_cols).collect();
    out.queue(Print(input_prefix()))?;
    out.queue(Print(&shown))?;
    let prefix: String = buffer.chars().take(cursor.min(visible_cols)).collect();
    let col = input_prefix_width() + UnicodeWidthStr::width(prefix.as_str());
    out.queue(MoveToColumn(col as u16))?;
    out.flush()?;
    Ok(())
}

/// Pure rendering of the dropdown rows (matches window + indicator row).
fn dropdown_lines(
    matches: &[&MenuEntry],
    menu: &MenuState,
    notice: Option<&str>,
) -> Vec<String> {
    let mut lines = Vec::with_capacity(DROPDOWN_ROWS);
    for offset in 0..MENU_WINDOW {
        let idx = menu.scroll + offset;
        match matches.get(idx) {
            Some(entry) => {
                let label = format!("/{}", entry.name);
                let row = if idx == menu.selected {
                    format!("  {}  {}", theme::inverted(&label), theme::dim(&entry.description))
                } else {
                    format!("  {}  {}", theme::cyan(&label), theme::dim(&entry.description))
                };
                lines.push(row);
            }
            None => lines.push(String::new()),
        }
    }
    let tail = match (notice, menu.window_indicator(matches.len())) {
        (Some(text), _) => theme::yellow(text),
        (None, Some(indicator)) => theme::dim(&format!("  {indicator}")),
        (None, None) => String::new(),
    };
    lines.push(tail);
    lines
}

/// Redraw (or clear) the dropdown area under the status block without
/// disturbing the in-progress line: save cursor, paint rows, restore.
fn sync_dropdown(
    out: &mut impl Write,
    registry: &[MenuEntry],
    buffer: &str,
    draw: &mut InputDrawState,
) -> Result<()> {
    let matches = compute_matches(buffer, registry);
    let menu_mode = buffer.starts_with('/') && !matches.is_empty();
    let drew_notice = draw.notice.is_some();
    draw.menu.clamp(matches.len());

    if !menu_mode && !draw.dropdown_visible && !drew_notice {
        return Ok(());
    }

    let lines = if menu_mode {
        dropdown_lines(&matches, &draw.menu, draw.notice.as_deref())
    } else {
        let mut blank = vec![String::new(); DROPDOWN_ROWS];
        if let Some(notice) = draw.notice.as_deref() {
            blank[MENU_WINDOW] = theme::yellow(notice);
        }
        blank
    };

    out.queue(SavePosition)?;
    // Input line → first dropdown row: bottom border plus two status lines.
    out.queue(MoveDown(4))?;
    for line in &lines {
        out.queue(MoveToColumn(0))?;
        out.queue(Clear(ClearType::CurrentLine))?;
        out.queue(Print(line))?;
        out.queue(MoveDown(1))?;
    }
    out.queue(RestorePosition)?;
    out.flush()?;

    // A painted notice counts as visible chrome so the next sync clears it.
    draw.dropdown_visible = menu_mode || drew_notice;
    draw.notice = None;
    Ok(())
}

/// Close the box: repaint the final line, then erase everything below the
/// input line so scroll-back output resumes cleanly. Idempotent — clearing
/// an already-clean region changes nothing.
fn finalize(out: &mut impl Write, buffer: &str, cursor: usize, cols: usize) -> Result<()> {
    redraw_input_line(out, buffer, cursor, cols)?;
    out.queue(MoveDown(1))?;
    out.queue(MoveToColumn(0))?;
    out.queue(Clear(ClearType::FromCursorDown))?;
    out.flush()?;
    Ok(())
}

/// Remove the whole box (including spacer and top border) ahead of a full
/// redraw by the caller.
fn retract_box(out: &mut impl Write) -> Result<()> {
    out.queue(MoveUp(2))?;
    out.queue(MoveToColumn(0))?;
    out.queue(Clear(ClearType::FromCursorDown))?;
    out.flush()?;
    Ok(())
}
