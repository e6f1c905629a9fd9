//! One editing slot: cursor, viewport, selection, key dispatch and the
//! main loop.
//!
//! An [`Editor`] owns a [`TextBuffer`] and its undo history. Everything a
//! keystroke can do to the buffer happens here; rendering lives in
//! `render`, find/replace in `search`, and state shared between slots
//! (yank buffer, toggles, place ring) is passed in from the session.
//!
//! Columns are character offsets. The cursor column is allowed to run past
//! the end of the line ("sticky"); `vcol` is the clamped column actually
//! displayed, recomputed on every frame, and editing operations snap the
//! cursor back with `col = vcol` before they mutate.

use std::env;
use std::io;
use std::path::Path;
use std::time::{Duration, Instant};

use ped_term::ansi::{self, Hilite};
use ped_term::{Console, Event, Key, read_event};

use crate::buffer::TextBuffer;
use crate::highlight::Highlighter;
use crate::render::Row;
use crate::session::Shared;
use crate::text;
use crate::undo::{ActionKey, EditSpan, Restore, UndoStack};

/// Characters that belong to a word besides alphanumerics.
pub const WORD_CHARS: &str = "_\\";
/// Characters that belong to a file name besides alphanumerics.
pub const FILE_CHARS: &str = "_.-";

/// A mark set by keyboard never auto-clears.
const MARK_STICKY: u32 = 999_999_999;
/// Bracket matching scans at most this many lines each way.
const MATCH_SPAN: usize = 50;
/// The characters bracket matching understands, mirrored around the middle.
const BRACKETS: &str = "<{[()]}>";
/// Two clicks on the same cell within this window count as a double click.
const DOUBLE_CLICK: Duration = Duration::from_secs(2);
/// Shown in the status line after a full redraw.
const VERSION_MSG: &str = concat!("ped ", env!("CARGO_PKG_VERSION"));

/// What the dispatcher wants the edit loop to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
    Next,
    Prev,
    Get,
    /// Activate another slot, placing its cursor on `line`.
    Switch { slot: usize, line: usize },
}

/// Why the edit loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    Quit,
    ForceQuit,
    Next,
    Prev,
    Get,
    Switch { slot: usize, line: usize },
}

// ─── Editor ──────────────────────────────────────────────────────────────────

pub struct Editor {
    pub buf: TextBuffer,
    pub undo: UndoStack,
    /// Identifies this slot in the session's place ring.
    pub id: usize,
    pub cur_line: usize,
    /// Requested column; may exceed the current line length.
    pub col: usize,
    /// Clamped display column, valid since the last frame.
    pub(crate) vcol: usize,
    pub(crate) top_line: usize,
    pub(crate) row: usize,
    pub(crate) margin: usize,
    /// Selection anchor as `(line, col)`.
    pub mark: Option<(usize, usize)>,
    mark_flag: u32,
    mouse_last: Option<(usize, usize, Instant)>,
    pub message: String,
    pub tab_size: usize,
    pub(crate) height: usize,
    pub(crate) width: usize,
    pub(crate) rows: Vec<Row>,
}

impl Editor {
    #[must_use]
    pub fn new(tab_size: usize, undo_limit: usize, id: usize) -> Self {
        Self {
            buf: TextBuffer::new(),
            undo: UndoStack::new(undo_limit),
            id,
            cur_line: 0,
            col: 0,
            vcol: 0,
            top_line: 0,
            row: 0,
            margin: 0,
            mark: None,
            mark_flag: 0,
            mouse_last: None,
            message: String::new(),
            tab_size: tab_size.max(1),
            height: 0,
            width: 0,
            rows: Vec::new(),
        }
    }

    /// An editor over given content rather than a file (the buffer's name
    /// stays empty, so quitting the session returns the lines).
    #[must_use]
    pub fn from_lines(lines: Vec<String>, tab_size: usize, undo_limit: usize, id: usize) -> Self {
        let mut ed = Self::new(tab_size, undo_limit, id);
        ed.buf = TextBuffer::from_lines(lines);
        ed
    }

    /// Load a file or directory listing; a failed load becomes a status
    /// message, not an error.
    pub fn open(&mut self, path: &str) {
        if self.buf.load(path).is_err() {
            self.message = format!("Error: file '{path}' may not exist");
        }
    }

    // ─── Selection ───────────────────────────────────────────────────

    pub(crate) fn set_mark(&mut self) {
        if self.mark.is_none() {
            self.mark = Some((self.cur_line, self.col));
        }
        if self.mark_flag < MARK_STICKY {
            self.mark_flag = MARK_STICKY;
        }
    }

    /// Count down a transient mark and clear it when it expires.
    pub(crate) fn check_mark(&mut self) {
        if self.mark.is_some() {
            self.mark_flag = self.mark_flag.saturating_sub(1);
            if self.mark_flag == 0 {
                self.clear_mark();
            }
        }
    }

    pub(crate) fn clear_mark(&mut self) {
        self.mark = None;
        self.mark_flag = 0;
        self.mouse_last = None;
    }

    /// Where `(line, col)` falls relative to the mark: negative before,
    /// positive after, zero on it. Zero when no mark is set.
    fn mark_order(&self, line: usize, col: usize) -> isize {
        let Some((ml, mc)) = self.mark else { return 0 };
        if ml == line {
            col as isize - mc as isize
        } else {
            line as isize - ml as isize
        }
    }

    /// The selection as `(start_line, start_col, end_line, end_col)` with
    /// the end line exclusive, always forward-ordered. Meaningful only
    /// while a mark is set.
    pub(crate) fn mark_range(&self) -> (usize, usize, usize, usize) {
        let (ml, mc) = self.mark.unwrap_or((self.cur_line, self.col));
        if self.mark_order(self.cur_line, self.col) >= 0 {
            (ml, mc, self.cur_line + 1, self.col)
        } else {
            (self.cur_line, self.col, ml + 1, mc)
        }
    }

    /// The selection as whole lines. An end column of 0 leaves the final
    /// line out.
    pub(crate) fn line_range(&self) -> (usize, usize) {
        let (sl, _, el, ec) = self.mark_range();
        if ec > 0 { (sl, el) } else { (sl, el - 1) }
    }

    // ─── Clipboard ───────────────────────────────────────────────────

    /// Copy the selection into the shared yank buffer.
    pub(crate) fn yank_mark(&self, shared: &mut Shared) {
        let (sl, sc, el, ec) = self.mark_range();
        let mut y = self.buf.slice(sl, el).to_vec();
        if let Some(last) = y.last_mut() {
            *last = text::cols(last, 0, ec);
        }
        if let Some(first) = y.first_mut() {
            *first = text::cols_from(first, sc);
        }
        shared.yank = y;
    }

    /// Delete the selection (optionally yanking it first) by folding the
    /// partial first and last lines into one.
    pub(crate) fn delete_mark(&mut self, yank: bool, shared: &mut Shared) {
        if yank {
            self.yank_mark(shared);
        }
        let (sl, sc, el, ec) = self.mark_range();
        self.undo.push(
            sl,
            EditSpan::Replace {
                count: 1,
                lines: self.buf.slice(sl, el).to_vec(),
            },
            ActionKey::None,
            self.col,
            false,
        );
        let head = text::cols(self.buf.line(sl), 0, sc);
        let tail = text::cols_from(self.buf.line(el - 1), ec);
        self.buf.set_line(sl, head + &tail);
        if sl + 1 < el {
            self.buf.remove_lines(sl + 1, el - sl - 1);
        }
        self.col = sc;
        self.cur_line = sl;
        self.clear_mark();
    }

    // ─── Movement ────────────────────────────────────────────────────

    fn move_up(&mut self, con: &mut dyn Console) -> io::Result<()> {
        if self.cur_line > 0 {
            self.cur_line -= 1;
            if self.cur_line < self.top_line {
                self.scroll_screen_up(con, 1)?;
            }
        }
        Ok(())
    }

    /// At column 0, hop to the end of the previous line.
    fn skip_up(&mut self, con: &mut dyn Console) -> io::Result<bool> {
        if self.col == 0 && self.cur_line > 0 {
            self.col = text::width(self.buf.line(self.cur_line - 1));
            self.move_up(con)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn move_left(&mut self, con: &mut dyn Console) -> io::Result<()> {
        self.col = self.vcol;
        if !self.skip_up(con)? {
            self.col = self.col.saturating_sub(1);
        }
        Ok(())
    }

    fn move_down(&mut self, con: &mut dyn Console) -> io::Result<()> {
        if self.cur_line + 1 < self.buf.len() {
            self.cur_line += 1;
            if self.cur_line == self.top_line + self.height {
                self.scroll_screen_down(con, 1)?;
            }
        }
        Ok(())
    }

    /// Past the end of the line, hop to the start of the next one.
    fn skip_down(&mut self, l: &str, con: &mut dyn Console) -> io::Result<bool> {
        if self.col >= text::width(l) && self.cur_line + 1 < self.buf.len() {
            self.col = 0;
            self.move_down(con)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn move_right(&mut self, l: &str, con: &mut dyn Console) -> io::Result<()> {
        if !self.skip_down(l, con)? {
            self.col += 1;
        }
        Ok(())
    }

    // ─── Editing primitives ──────────────────────────────────────────

    fn insert_char(&mut self, c: char, shared: &mut Shared) {
        self.col = self.vcol;
        let chain = if self.mark.is_some() {
            self.delete_mark(false, shared);
            true
        } else {
            false
        };
        let l = self.buf.line(self.cur_line).to_string();
        let action = if c == ' ' {
            ActionKey::InsertSpace
        } else {
            ActionKey::InsertChar
        };
        self.undo.push(
            self.cur_line,
            EditSpan::Replace {
                count: 1,
                lines: vec![l.clone()],
            },
            action,
            self.col,
            chain,
        );
        self.buf
            .set_line(self.cur_line, text::insert_at(&l, self.col, &c.to_string()));
        self.col += 1;
    }

    fn apply_restore(&mut self, r: Restore) {
        if let Some(line) = r.line {
            self.cur_line = line;
        }
        self.col = r.col;
        self.buf.ensure_nonempty();
        self.clear_mark();
    }

    // ─── Mouse ───────────────────────────────────────────────────────

    /// Resolve a click into a follow-up key, or handle it entirely.
    fn resolve_mouse(&mut self, x: usize, y: usize, button: u8) -> Option<Key> {
        if button == 0x22 {
            // Right click: open in a directory listing, find otherwise.
            return Some(if self.buf.is_dir { Key::Get } else { Key::Find });
        }
        if y >= self.height {
            return None;
        }
        let col = x + self.margin;
        let line = y + self.top_line;
        let double = self
            .mouse_last
            .is_some_and(|(lc, ll, t)| (lc, ll) == (col, line) && t.elapsed() < DOUBLE_CLICK);
        if double {
            self.mouse_last = None;
            let chars: Vec<char> = self.buf.line(self.cur_line).chars().collect();
            if self.mark.is_none()
                && col < chars.len()
                && is_symbol(chars[col], WORD_CHARS)
            {
                // Select the word under the cursor.
                self.col = (skip_while(&chars, col as isize, WORD_CHARS, -1) + 1) as usize;
                self.set_mark();
                self.col = skip_while(&chars, self.col as isize, WORD_CHARS, 1) as usize;
                None
            } else {
                Some(Key::Mark)
            }
        } else {
            if self.mark.is_some()
                && self.mark_order(self.cur_line, self.col) * self.mark_order(line, col) < 0
            {
                // The click crossed the anchor: re-anchor at the cursor.
                self.mark = Some((self.cur_line, self.col));
            }
            self.cur_line = line;
            self.col = col;
            self.mouse_last = Some((col, line, Instant::now()));
            None
        }
    }

    // ─── Dispatch ────────────────────────────────────────────────────

    /// Apply one input event to the buffer.
    ///
    /// # Errors
    ///
    /// Propagates device I/O errors and file save errors.
    pub fn dispatch(
        &mut self,
        ev: Event,
        con: &mut dyn Console,
        hl: &dyn Highlighter,
        shared: &mut Shared,
    ) -> io::Result<Flow> {
        self.cur_line = self.cur_line.min(self.buf.len() - 1);
        let key = match ev {
            Event::Char(c) => {
                self.insert_char(c, shared);
                return Ok(Flow::Continue);
            }
            Event::Scroll { up, lines } => {
                if up {
                    self.scroll_lines_up(con, lines)?;
                } else {
                    self.scroll_lines_down(con, lines)?;
                }
                return Ok(Flow::Continue);
            }
            Event::Mouse { x, y, button } => match self.resolve_mouse(x, y, button) {
                Some(k) => k,
                None => return Ok(Flow::Continue),
            },
            Event::Key(k) => k,
        };
        self.handle_key(key, con, hl, shared)
    }

    #[allow(clippy::too_many_lines)]
    fn handle_key(
        &mut self,
        key: Key,
        con: &mut dyn Console,
        hl: &dyn Highlighter,
        shared: &mut Shared,
    ) -> io::Result<Flow> {
        let key = match key {
            Key::CtrlShiftLeft => {
                self.set_mark();
                Key::WordLeft
            }
            Key::CtrlShiftRight => {
                self.set_mark();
                Key::WordRight
            }
            k => k,
        };
        let l = self.buf.line(self.cur_line).to_string();
        match key {
            Key::Quit => return Ok(Flow::Quit),
            Key::Next => return Ok(Flow::Next),
            Key::Prev => return Ok(Flow::Prev),
            Key::Get => return Ok(Flow::Get),
            Key::Down => self.move_down(con)?,
            Key::Up => self.move_up(con)?,
            Key::Left => self.move_left(con)?,
            Key::Right => self.move_right(&l, con)?,
            Key::WordLeft => {
                self.col = self.vcol;
                self.skip_up(con)?;
                let chars: Vec<char> = self.buf.line(self.cur_line).chars().collect();
                let pos = skip_until(&chars, self.col as isize - 1, WORD_CHARS, -1);
                self.col = (skip_while(&chars, pos, WORD_CHARS, -1) + 1) as usize;
            }
            Key::WordRight => {
                self.skip_down(&l, con)?;
                let chars: Vec<char> = self.buf.line(self.cur_line).chars().collect();
                let pos = skip_until(&chars, self.col as isize, WORD_CHARS, 1);
                self.col = skip_while(&chars, pos, WORD_CHARS, 1).max(0) as usize;
            }
            Key::Delete => {
                self.col = self.vcol;
                if self.mark.is_some() {
                    self.delete_mark(false, shared);
                } else if self.col < text::width(&l) {
                    self.undo
                        .record(self.cur_line, vec![l.clone()], ActionKey::Delete, self.col);
                    self.buf
                        .set_line(self.cur_line, text::remove_cols(&l, self.col, self.col + 1));
                } else if self.cur_line + 1 < self.buf.len() {
                    // Join with the next line; strip its indent when
                    // auto-indent is on and the join is mid-line.
                    let next = self.buf.line(self.cur_line + 1).to_string();
                    self.undo.record(
                        self.cur_line,
                        vec![l.clone(), next.clone()],
                        ActionKey::None,
                        self.col,
                    );
                    let joined = if shared.autoindent && self.col > 0 {
                        next.trim_start().to_string()
                    } else {
                        next
                    };
                    self.buf.remove_lines(self.cur_line + 1, 1);
                    self.buf.set_line(self.cur_line, l + &joined);
                }
            }
            Key::Backspace => {
                self.col = self.vcol;
                if self.mark.is_some() {
                    self.delete_mark(false, shared);
                } else if self.col > 0 {
                    self.undo.record(
                        self.cur_line,
                        vec![l.clone()],
                        ActionKey::Backspace,
                        self.col,
                    );
                    self.buf
                        .set_line(self.cur_line, text::remove_cols(&l, self.col - 1, self.col));
                    self.col -= 1;
                } else if self.cur_line > 0 {
                    let prev = self.buf.line(self.cur_line - 1).to_string();
                    self.undo.record(
                        self.cur_line - 1,
                        vec![prev.clone(), l.clone()],
                        ActionKey::None,
                        self.col,
                    );
                    self.col = text::width(&prev);
                    self.buf.set_line(self.cur_line - 1, prev + &l);
                    self.buf.remove_lines(self.cur_line, 1);
                    self.cur_line -= 1;
                }
            }
            Key::DelWord => {
                if self.col < text::width(&l) {
                    let chars: Vec<char> = l.chars().collect();
                    let mut pos = skip_while(&chars, self.col as isize, WORD_CHARS, 1).max(0) as usize;
                    pos += text::leading_spaces(&text::cols_from(&l, pos));
                    if self.col < pos {
                        self.undo
                            .record(self.cur_line, vec![l.clone()], ActionKey::DelWord, self.col);
                        self.buf
                            .set_line(self.cur_line, text::remove_cols(&l, self.col, pos));
                    }
                }
            }
            Key::DelLine => {
                if self.cur_line + 1 < self.buf.len() {
                    let next = self.buf.line(self.cur_line + 1).to_string();
                    self.undo
                        .record(self.cur_line, vec![l, next], ActionKey::None, self.col);
                } else {
                    self.undo
                        .record(self.cur_line, vec![l], ActionKey::None, self.col);
                }
                self.buf.remove_lines(self.cur_line, 1);
                self.buf.ensure_nonempty();
            }
            Key::Home => {
                // Toggle between column 0 and the first non-blank.
                self.col = if self.col == 0 {
                    text::leading_spaces(&l)
                } else {
                    0
                };
            }
            Key::End => {
                // Toggle between end of line and end of code.
                let cc = shared.comment_char.trim();
                let code = if cc.is_empty() {
                    l.as_str()
                } else {
                    l.split(cc).next().unwrap_or("")
                };
                let ni = text::width(code.trim_end());
                let ns = text::leading_spaces(&l);
                self.col = if self.col >= text::width(&l) && ni > ns {
                    ni
                } else {
                    text::width(&l)
                };
            }
            Key::PageUp => self.cur_line = self.cur_line.saturating_sub(self.height),
            Key::PageDown => self.cur_line += self.height,
            Key::Find => {
                let default = shared.find_pattern.clone();
                if let Some(pat) = self.line_edit(con, "Find: ", &default, Some("_"))? {
                    if !pat.is_empty() {
                        self.clear_mark();
                        self.find_in_file(&pat, self.col + 1, self.buf.len(), shared);
                        self.row = self.height >> 1;
                    }
                }
            }
            Key::FindAgain => {
                if !shared.find_pattern.is_empty() {
                    let pat = shared.find_pattern.clone();
                    self.find_in_file(&pat, self.col + 1, self.buf.len(), shared);
                    self.row = self.height >> 1;
                }
            }
            Key::Goto => {
                if let Some(s) = self.line_edit(con, "Goto Line: ", "", None)? {
                    if let Ok(n) = s.trim().parse::<usize>() {
                        self.cur_line = n.saturating_sub(1);
                        self.row = self.height >> 1;
                    } else if !s.is_empty() {
                        self.message = format!("Invalid line number: {s}");
                    }
                }
            }
            Key::First => {
                self.check_mark();
                self.cur_line = 0;
            }
            Key::Last => {
                self.check_mark();
                self.cur_line = self.buf.len() - 1;
                self.row = self.height.saturating_sub(1);
            }
            Key::Toggle => self.toggle_settings(con, shared)?,
            Key::ScrollUp => self.scroll_lines_up(con, 1)?,
            Key::ScrollDown => self.scroll_lines_down(con, 1)?,
            Key::Match => self.match_bracket(&l),
            Key::Mark => {
                if self.mark.is_none() {
                    self.set_mark();
                    self.move_right(&l, con)?;
                } else {
                    self.clear_mark();
                }
            }
            Key::ShiftUp => {
                self.set_mark();
                self.move_up(con)?;
            }
            Key::ShiftDown => {
                self.set_mark();
                self.move_down(con)?;
            }
            Key::ShiftLeft => {
                self.set_mark();
                self.move_left(con)?;
            }
            Key::ShiftRight => {
                self.set_mark();
                self.move_right(&l, con)?;
            }
            Key::AltLeft => {
                // Swap the characters around the cursor, moving left.
                if self.col > 0 && self.col < text::width(&l) {
                    self.undo
                        .record(self.cur_line, vec![l.clone()], ActionKey::SwapLeft, self.col);
                    let mut chars: Vec<char> = l.chars().collect();
                    chars.swap(self.col - 1, self.col);
                    self.buf.set_line(self.cur_line, chars.into_iter().collect());
                    self.move_left(con)?;
                }
            }
            Key::AltRight => {
                if self.col + 1 < text::width(&l) {
                    self.undo
                        .record(self.cur_line, vec![l.clone()], ActionKey::SwapRight, self.col);
                    let mut chars: Vec<char> = l.chars().collect();
                    chars.swap(self.col, self.col + 1);
                    self.buf.set_line(self.cur_line, chars.into_iter().collect());
                    self.move_right(&l, con)?;
                }
            }
            Key::AltUp => self.move_lines_up(con)?,
            Key::AltDown => self.move_lines_down(con)?,
            Key::Enter => {
                self.col = self.vcol;
                self.clear_mark();
                self.undo.push(
                    self.cur_line,
                    EditSpan::Replace {
                        count: 2,
                        lines: vec![l.clone()],
                    },
                    ActionKey::None,
                    self.col,
                    false,
                );
                let head = text::cols(&l, 0, self.col);
                let tail = text::cols_from(&l, self.col);
                let ni = if shared.autoindent {
                    text::leading_spaces(&l).min(self.col)
                } else {
                    0
                };
                self.buf.set_line(self.cur_line, head);
                self.cur_line += 1;
                self.buf
                    .insert_lines(self.cur_line, vec![format!("{}{tail}", " ".repeat(ni))]);
                self.col = ni;
            }
            Key::Tab => {
                if self.mark.is_none() {
                    self.col = self.vcol;
                    self.undo
                        .record(self.cur_line, vec![l.clone()], ActionKey::Tab, self.col);
                    let ni = self.tab_size - self.col % self.tab_size;
                    self.buf
                        .set_line(self.cur_line, text::insert_at(&l, self.col, &" ".repeat(ni)));
                    self.col += ni;
                } else {
                    let (start, end) = self.line_range();
                    self.undo.push(
                        start,
                        EditSpan::Replace {
                            count: end - start,
                            lines: self.buf.slice(start, end).to_vec(),
                        },
                        ActionKey::Indent,
                        self.col,
                        false,
                    );
                    for i in start..end {
                        let li = self.buf.line(i).to_string();
                        if !li.is_empty() {
                            let pad = self.tab_size - text::leading_spaces(&li) % self.tab_size;
                            self.buf.set_line(i, format!("{}{li}", " ".repeat(pad)));
                        }
                    }
                }
            }
            Key::Backtab => {
                if self.mark.is_none() {
                    self.col = self.vcol;
                    if self.col > 0 {
                        let ni = ((self.col - 1) % self.tab_size + 1)
                            .min(text::spaces_before(&l, self.col));
                        if ni > 0 {
                            self.undo
                                .record(self.cur_line, vec![l.clone()], ActionKey::Backtab, self.col);
                            self.buf
                                .set_line(self.cur_line, text::remove_cols(&l, self.col - ni, self.col));
                            self.col -= ni;
                        }
                    }
                } else {
                    let (start, end) = self.line_range();
                    self.undo.push(
                        start,
                        EditSpan::Replace {
                            count: end - start,
                            lines: self.buf.slice(start, end).to_vec(),
                        },
                        ActionKey::Dedent,
                        self.col,
                        false,
                    );
                    for i in start..end {
                        let li = self.buf.line(i).to_string();
                        let ns = text::leading_spaces(&li);
                        if ns > 0 {
                            let cut = (ns - 1) % self.tab_size + 1;
                            self.buf.set_line(i, text::cols_from(&li, cut));
                        }
                    }
                }
            }
            Key::Replace => self.replace_dialog(con, hl, shared)?,
            Key::Cut => {
                if self.mark.is_some() {
                    self.delete_mark(true, shared);
                }
            }
            Key::Copy => {
                if self.mark.is_some() {
                    self.yank_mark(shared);
                    self.clear_mark();
                }
            }
            Key::Paste => {
                if !shared.yank.is_empty() {
                    self.col = self.vcol;
                    let chain = if self.mark.is_some() {
                        self.delete_mark(false, shared);
                        true
                    } else {
                        false
                    };
                    let cur = self.buf.line(self.cur_line).to_string();
                    let mut ins = shared.yank.clone();
                    if let Some(first) = ins.first_mut() {
                        *first = format!("{}{first}", text::cols(&cur, 0, self.col));
                    }
                    if let Some(last) = ins.last_mut() {
                        last.push_str(&text::cols_from(&cur, self.col));
                    }
                    let span = if ins.len() <= 1 {
                        EditSpan::Replace {
                            count: 1,
                            lines: vec![cur],
                        }
                    } else {
                        EditSpan::Delete {
                            count: ins.len() - 1,
                            line: cur,
                        }
                    };
                    self.undo
                        .push(self.cur_line, span, ActionKey::None, self.col, chain);
                    self.buf.splice(self.cur_line, 1, ins);
                }
            }
            Key::Save => self.save_prompt(con)?,
            Key::Undo => {
                if let Some(r) = self.undo.undo(&mut self.buf) {
                    self.apply_restore(r);
                }
            }
            Key::Redo => {
                if let Some(r) = self.undo.redo(&mut self.buf) {
                    self.apply_restore(r);
                }
            }
            Key::Comment => {
                let (start, end) = if self.mark.is_none() {
                    (self.cur_line, self.cur_line + 1)
                } else {
                    self.line_range()
                };
                self.undo.push(
                    start,
                    EditSpan::Replace {
                        count: end - start,
                        lines: self.buf.slice(start, end).to_vec(),
                    },
                    ActionKey::Comment,
                    self.col,
                    false,
                );
                let cc = shared.comment_char.clone();
                let ni = text::width(&cc);
                for i in start..end {
                    let li = self.buf.line(i).to_string();
                    if li.trim().is_empty() {
                        continue;
                    }
                    let ns = text::leading_spaces(&li);
                    if text::cols(&li, ns, ns + ni) == cc {
                        self.buf
                            .set_line(i, format!("{}{}", " ".repeat(ns), text::cols_from(&li, ns + ni)));
                    } else {
                        self.buf
                            .set_line(i, format!("{}{cc}{}", " ".repeat(ns), text::cols_from(&li, ns)));
                    }
                }
            }
            Key::Redraw => self.redraw(con, true)?,
            Key::Place => shared.places.remember(self.cur_line, self.id),
            Key::NextPlace | Key::PrevPlace => {
                if let Some(p) = shared.places.step(key == Key::NextPlace) {
                    if p.slot == self.id {
                        self.cur_line = p.line;
                        self.row = self.height >> 1;
                    } else {
                        return Ok(Flow::Switch {
                            slot: p.slot,
                            line: p.line,
                        });
                    }
                }
            }
            Key::UndoPrev | Key::UndoNext => {
                if let Some((line, col)) = self.undo.step_index(key == Key::UndoNext) {
                    self.cur_line = line;
                    self.col = col;
                }
            }
            Key::UndoYank => {
                if let Some(lines) = self.undo.indexed_lines() {
                    shared.yank = lines;
                }
            }
            Key::CtrlShiftLeft | Key::CtrlShiftRight | Key::Mouse => {}
        }
        Ok(Flow::Continue)
    }

    /// Move the current line (or the selected block) up by one.
    fn move_lines_up(&mut self, con: &mut dyn Console) -> io::Result<()> {
        let (start, end) = if self.mark.is_none() {
            (self.cur_line, self.cur_line + 1)
        } else {
            let r = self.line_range();
            if r.0 > 0 {
                if let Some((ml, mc)) = self.mark {
                    self.mark = Some((ml - 1, mc));
                }
            }
            r
        };
        if start > 0 {
            self.undo.push(
                start - 1,
                EditSpan::Replace {
                    count: end - start + 1,
                    lines: self.buf.slice(start - 1, end).to_vec(),
                },
                ActionKey::None,
                self.col,
                false,
            );
            if let Some(moved) = self.buf.remove_lines(start - 1, 1).pop() {
                self.buf.insert_lines(end - 1, vec![moved]);
            }
            self.move_up(con)?;
        }
        Ok(())
    }

    /// Move the current line (or the selected block) down by one.
    fn move_lines_down(&mut self, con: &mut dyn Console) -> io::Result<()> {
        let (start, end) = if self.mark.is_none() {
            (self.cur_line, self.cur_line + 1)
        } else {
            let r = self.line_range();
            if r.1 < self.buf.len() {
                if let Some((ml, mc)) = self.mark {
                    self.mark = Some((ml + 1, mc));
                }
                // Cursor at the start of the last line: the block cannot
                // grow past the end, so shrink the selection instead.
                if self.cur_line == r.1 && r.1 == self.buf.len() - 1 {
                    self.move_left(con)?;
                }
            }
            r
        };
        if end < self.buf.len() {
            self.undo.push(
                start,
                EditSpan::Replace {
                    count: end - start + 1,
                    lines: self.buf.slice(start, end + 1).to_vec(),
                },
                ActionKey::None,
                self.col,
                false,
            );
            if let Some(moved) = self.buf.remove_lines(end, 1).pop() {
                self.buf.insert_lines(start, vec![moved]);
            }
            self.move_down(con)?;
        }
        Ok(())
    }

    /// Jump to the bracket matching the one under the cursor, scanning a
    /// bounded number of lines in the bracket's direction.
    fn match_bracket(&mut self, l: &str) {
        if self.col >= text::width(l) {
            return;
        }
        let chars: Vec<char> = l.chars().collect();
        let srch = chars[self.col];
        let Some(i) = BRACKETS.find(srch) else { return };
        let mtch = BRACKETS.as_bytes()[7 - i] as char;
        let way: isize = if i < 4 { 1 } else { -1 };
        let mut level = 0usize;
        let mut line = self.cur_line as isize;
        let mut c = self.col as isize + way;
        let lstop: isize = if way > 0 {
            (self.buf.len() as isize).min(line + MATCH_SPAN as isize)
        } else {
            (-1).max(line - MATCH_SPAN as isize)
        };
        while line != lstop {
            let cur: Vec<char> = self.buf.line(line as usize).chars().collect();
            let cstop: isize = if way > 0 { cur.len() as isize } else { -1 };
            if cur.contains(&srch) || cur.contains(&mtch) {
                while c != cstop {
                    let ch = cur[c as usize];
                    if ch == mtch {
                        if level == 0 {
                            self.cur_line = line as usize;
                            self.col = c as usize;
                            return;
                        }
                        level -= 1;
                    } else if ch == srch {
                        level += 1;
                    }
                    c += way;
                }
            }
            line += way;
            if line == lstop {
                break;
            }
            c = if way > 0 {
                0
            } else {
                self.buf.line(line as usize).chars().count() as isize - 1
            };
        }
        self.message = format!("No match in {} lines", (lstop - self.cur_line as isize).abs());
    }

    /// The settings prompt: a comma-separated list of new values, each
    /// optional, applied in order.
    fn toggle_settings(&mut self, con: &mut dyn Console, shared: &mut Shared) -> io::Result<()> {
        let prompt = format!(
            "Autoindent {}, Search Case {}, Tabsize {}, Comment {}, Tabwrite {}: ",
            yn(shared.autoindent),
            yn(shared.case_sensitive),
            self.tab_size,
            shared.comment_char,
            yn(self.buf.write_tabs),
        );
        let Some(pat) = self.line_edit(con, &prompt, "", None)? else {
            return Ok(());
        };
        for (i, field) in pat.split(',').enumerate() {
            let f = field.trim_start().to_lowercase();
            if f.is_empty() {
                continue;
            }
            match i {
                0 => shared.autoindent = f.starts_with('y'),
                1 => shared.case_sensitive = f.starts_with('y'),
                2 => {
                    if let Ok(n) = f.parse::<usize>() {
                        if n > 0 {
                            self.tab_size = n;
                        }
                    }
                }
                3 => shared.comment_char = f,
                4 => self.buf.write_tabs = f.starts_with('y'),
                _ => {}
            }
        }
        Ok(())
    }

    /// Prompt for a file name and save, confirming before overwriting a
    /// different existing file.
    fn save_prompt(&mut self, con: &mut dyn Console) -> io::Result<()> {
        let default = if self.buf.is_dir {
            String::new()
        } else {
            self.buf.fname.clone()
        };
        let Some(fname) = self.line_edit(con, "Save File: ", &default, Some(FILE_CHARS))? else {
            return Ok(());
        };
        if fname.is_empty() {
            return Ok(());
        }
        if fname != self.buf.fname && Path::new(&fname).exists() {
            let res = self.line_edit(con, "The file exists! Overwrite (y/N)? ", "N", None)?;
            let ok = res.is_some_and(|r| {
                r.chars().next().is_some_and(|c| c.eq_ignore_ascii_case(&'y'))
            });
            if !ok {
                return Ok(());
            }
        }
        con.stop_refresh();
        let saved = self.buf.save(&fname);
        con.resume_refresh();
        saved?;
        self.buf.fname = fname;
        self.buf.mark_saved();
        self.buf.is_dir = false;
        Ok(())
    }

    // ─── Prompt line ─────────────────────────────────────────────────

    /// A blocking single-line editor on the status row. Returns `None` on
    /// abort. `allowed` extends the symbol characters used when picking a
    /// word from the buffer by mouse or paste key.
    pub fn line_edit(
        &mut self,
        con: &mut dyn Console,
        prompt: &str,
        default: &str,
        allowed: Option<&str>,
    ) -> io::Result<Option<String>> {
        ansi::goto(con, self.height, 0)?;
        ansi::hilite(con, Hilite::Status)?;
        con.write_str(prompt)?;
        con.write_str(default)?;
        ansi::clear_to_eol(con)?;
        let mut res = default.to_string();
        let mut pos = text::width(&res);
        let mut del_all = true;
        let mut mouse_last: Option<(usize, usize)> = None;
        loop {
            match read_event(con)? {
                Event::Char(c) => {
                    if text::width(prompt) + text::width(&res) + 2 < self.width {
                        res = text::insert_at(&res, pos, &c.to_string());
                        con.write_str(&text::cols(&res, pos, pos + 1))?;
                        pos += 1;
                        push_msg(con, &text::cols_from(&res, pos))?;
                    }
                }
                Event::Key(Key::Enter | Key::Tab) => {
                    ansi::hilite(con, Hilite::Off)?;
                    return Ok(Some(res));
                }
                Event::Key(Key::Quit | Key::Copy) => {
                    ansi::hilite(con, Hilite::Off)?;
                    return Ok(None);
                }
                Event::Key(Key::Left) => {
                    if pos > 0 {
                        con.write_str(ansi::BACKSPACE)?;
                        pos -= 1;
                    }
                }
                Event::Key(Key::Right) => {
                    if pos < text::width(&res) {
                        con.write_str(&text::cols(&res, pos, pos + 1))?;
                        pos += 1;
                    }
                }
                Event::Key(Key::Home) => {
                    con.write_str(&ansi::BACKSPACE.repeat(pos))?;
                    pos = 0;
                }
                Event::Key(Key::End) => {
                    con.write_str(&text::cols_from(&res, pos))?;
                    pos = text::width(&res);
                }
                Event::Key(Key::Delete) => {
                    if del_all {
                        // First key pressed: wipe the default.
                        con.write_str(&ansi::BACKSPACE.repeat(pos))?;
                        con.write_str(&" ".repeat(text::width(&res)))?;
                        con.write_str(&ansi::BACKSPACE.repeat(text::width(&res)))?;
                        pos = 0;
                        res.clear();
                    } else if pos < text::width(&res) {
                        res = text::remove_cols(&res, pos, pos + 1);
                        push_msg(con, &format!("{} ", text::cols_from(&res, pos)))?;
                    }
                }
                Event::Key(Key::Backspace) => {
                    if pos > 0 {
                        res = text::remove_cols(&res, pos - 1, pos);
                        con.write_str(ansi::BACKSPACE)?;
                        pos -= 1;
                        push_msg(con, &format!("{} ", text::cols_from(&res, pos)))?;
                    }
                }
                Event::Key(Key::Paste) => {
                    // Pull the symbol under the buffer cursor into the prompt.
                    let sym = self.getsymbol(self.cur_line, self.col, allowed);
                    let room = self
                        .width
                        .saturating_sub(pos + text::width(prompt) + 1);
                    res.push_str(&text::cols(&sym, 0, room));
                    push_msg(con, &text::cols_from(&res, pos))?;
                }
                Event::Mouse { x, y, .. } => {
                    if y < self.height && y + self.top_line < self.buf.len() {
                        self.col = x + self.margin;
                        self.cur_line = y + self.top_line;
                        if mouse_last == Some((self.col, self.cur_line)) {
                            // Second click on the same cell confirms.
                            ansi::hilite(con, Hilite::Off)?;
                            return Ok(Some(res));
                        }
                        mouse_last = Some((self.col, self.cur_line));
                        con.write_str(&ansi::BACKSPACE.repeat(pos))?;
                        con.write_str(&" ".repeat(text::width(&res)))?;
                        con.write_str(&ansi::BACKSPACE.repeat(text::width(&res)))?;
                        pos = 0;
                        res = self.getsymbol(self.cur_line, self.col, allowed);
                        push_msg(con, &res)?;
                    }
                }
                _ => {}
            }
            del_all = false;
        }
    }

    /// The symbol (word, file name, ...) around `pos` on `line`.
    fn getsymbol(&self, line: usize, pos: usize, zap: Option<&str>) -> String {
        let Some(zap) = zap else { return String::new() };
        let chars: Vec<char> = self.buf.line(line).chars().collect();
        if pos >= chars.len() {
            return String::new();
        }
        let start = skip_while(&chars, pos as isize, zap, -1);
        let stop = skip_while(&chars, pos as isize, zap, 1);
        chars[(start + 1) as usize..stop.max(0) as usize]
            .iter()
            .collect()
    }

    // ─── Main loop ───────────────────────────────────────────────────

    /// Run this slot until it quits or hands control back to the session.
    ///
    /// # Errors
    ///
    /// Propagates device I/O errors; the session decides whether they are
    /// fatal.
    pub fn edit_loop(
        &mut self,
        con: &mut dyn Console,
        hl: &dyn Highlighter,
        shared: &mut Shared,
    ) -> io::Result<Exit> {
        self.buf.ensure_nonempty();
        let _ = env::set_current_dir(&self.buf.work_dir);
        let announce = self.message.is_empty();
        self.redraw(con, announce)?;
        loop {
            self.display_window(con, hl)?;
            let ev = read_event(con)?;
            self.message.clear();
            match self.dispatch(ev, con, hl, shared)? {
                Flow::Continue => {}
                Flow::Quit => {
                    let mut force = false;
                    if self.buf.modified() {
                        let res = self.line_edit(con, "File changed! Quit (y/N/f)? ", "N", None)?;
                        match res.as_deref().and_then(|r| r.chars().next()) {
                            None => continue,
                            Some(c) if c.eq_ignore_ascii_case(&'n') => continue,
                            Some(c) if c.eq_ignore_ascii_case(&'f') => force = true,
                            Some(_) => {}
                        }
                    }
                    shared.places.forget_slot(self.id);
                    ansi::scroll_region(con, 0)?;
                    ansi::mouse_reporting(con, false)?;
                    ansi::goto(con, self.height, 0)?;
                    ansi::clear_to_eol(con)?;
                    con.flush()?;
                    self.undo.clear();
                    return Ok(if force { Exit::ForceQuit } else { Exit::Quit });
                }
                Flow::Next => return Ok(Exit::Next),
                Flow::Prev => return Ok(Exit::Prev),
                Flow::Get => {
                    if self.mark.is_some() {
                        self.clear_mark();
                        self.display_window(con, hl)?;
                    }
                    return Ok(Exit::Get);
                }
                Flow::Switch { slot, line } => return Ok(Exit::Switch { slot, line }),
            }
        }
    }

    /// Re-query the screen and force a full repaint. With `announce`, show
    /// the version in the status line.
    pub(crate) fn redraw(&mut self, con: &mut dyn Console, announce: bool) -> io::Result<()> {
        ansi::cursor(con, false)?;
        let (rows, cols) = con.size();
        self.height = rows.saturating_sub(1).max(1);
        self.width = cols.max(2);
        self.rows = vec![Row::forced(); self.height];
        self.row = self.row.min(self.height - 1);
        ansi::scroll_region(con, self.height)?;
        ansi::mouse_reporting(con, true)?;
        if announce {
            self.message = VERSION_MSG.to_string();
        }
        Ok(())
    }
}

// ─── Word scanning ───────────────────────────────────────────────────────────

fn is_symbol(c: char, zap: &str) -> bool {
    c.is_alphanumeric() || zap.contains(c)
}

/// Advance `pos` by `way` while it sits on a symbol character. Returns a
/// position in `-1..=len`; out-of-range start positions are returned as-is.
fn skip_while(s: &[char], mut pos: isize, zap: &str, way: isize) -> isize {
    let stop = if way < 0 { -1 } else { s.len() as isize };
    while pos != stop
        && pos >= 0
        && (pos as usize) < s.len()
        && is_symbol(s[pos as usize], zap)
    {
        pos += way;
    }
    pos
}

/// Advance `pos` by `way` until it sits on a symbol character.
fn skip_until(s: &[char], mut pos: isize, zap: &str, way: isize) -> isize {
    let stop = if way < 0 { -1 } else { s.len() as isize };
    while pos != stop
        && pos >= 0
        && (pos as usize) < s.len()
        && !is_symbol(s[pos as usize], zap)
    {
        pos += way;
    }
    pos
}

fn yn(b: bool) -> char {
    if b { 'y' } else { 'n' }
}

/// Write a tail behind the cursor and move the cursor back over it.
fn push_msg(con: &mut dyn Console, msg: &str) -> io::Result<()> {
    con.write_str(msg)?;
    con.write_str(&ansi::BACKSPACE.repeat(text::width(msg)))
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use ped_term::console::Script;

    use super::*;
    use crate::highlight::Plain;

    fn ed(lines: &[&str]) -> (Editor, Script) {
        let mut con = Script::new(b"", 24, 80);
        let mut e = Editor::from_lines(
            lines.iter().map(ToString::to_string).collect(),
            4,
            50,
            0,
        );
        e.redraw(&mut con, false).unwrap();
        (e, con)
    }

    /// One frame of the edit loop: render, then apply the event.
    fn step(e: &mut Editor, con: &mut Script, sh: &mut Shared, ev: Event) -> Flow {
        e.display_window(con, &Plain).unwrap();
        e.dispatch(ev, con, &Plain, sh).unwrap()
    }

    fn keys(e: &mut Editor, con: &mut Script, sh: &mut Shared, ks: &[Key]) {
        for &k in ks {
            step(e, con, sh, Event::Key(k));
        }
    }

    fn type_str(e: &mut Editor, con: &mut Script, sh: &mut Shared, s: &str) {
        for c in s.chars() {
            step(e, con, sh, Event::Char(c));
        }
    }

    // ── Typing ───────────────────────────────────────────────────────

    #[test]
    fn typing_and_enter_split_lines() {
        let (mut e, mut con) = ed(&[""]);
        let mut sh = Shared::default();
        type_str(&mut e, &mut con, &mut sh, "hi");
        step(&mut e, &mut con, &mut sh, Event::Key(Key::Enter));
        assert_eq!(e.buf.lines(), &["hi", ""]);
        assert_eq!((e.cur_line, e.col), (1, 0));
    }

    #[test]
    fn typed_burst_undoes_in_one_step() {
        let (mut e, mut con) = ed(&["base"]);
        let mut sh = Shared::default();
        type_str(&mut e, &mut con, &mut sh, "ab");
        assert_eq!(e.buf.line(0), "abbase");
        keys(&mut e, &mut con, &mut sh, &[Key::Undo]);
        assert_eq!(e.buf.line(0), "base");
        assert!(!e.buf.modified());
    }

    #[test]
    fn enter_autoindents_from_current_line() {
        let (mut e, mut con) = ed(&["  code"]);
        let mut sh = Shared::default();
        keys(&mut e, &mut con, &mut sh, &[Key::End, Key::Enter]);
        assert_eq!(e.buf.lines(), &["  code", "  "]);
        assert_eq!(e.col, 2);
    }

    // ── Deletion and joins ───────────────────────────────────────────

    #[test]
    fn backspace_at_line_start_joins() {
        let (mut e, mut con) = ed(&["ab", "cd"]);
        let mut sh = Shared::default();
        e.cur_line = 1;
        keys(&mut e, &mut con, &mut sh, &[Key::Backspace]);
        assert_eq!(e.buf.lines(), &["abcd"]);
        assert_eq!((e.cur_line, e.col), (0, 2));
        keys(&mut e, &mut con, &mut sh, &[Key::Undo]);
        assert_eq!(e.buf.lines(), &["ab", "cd"]);
    }

    #[test]
    fn delete_at_eol_joins_stripping_indent() {
        let (mut e, mut con) = ed(&["ab", "   cd"]);
        let mut sh = Shared::default();
        keys(&mut e, &mut con, &mut sh, &[Key::End, Key::Delete]);
        assert_eq!(e.buf.lines(), &["abcd"]);
    }

    #[test]
    fn delete_at_eol_keeps_indent_without_autoindent() {
        let (mut e, mut con) = ed(&["ab", "   cd"]);
        let mut sh = Shared { autoindent: false, ..Shared::default() };
        keys(&mut e, &mut con, &mut sh, &[Key::End, Key::Delete]);
        assert_eq!(e.buf.lines(), &["ab   cd"]);
    }

    #[test]
    fn del_word_eats_word_and_spaces() {
        let (mut e, mut con) = ed(&["one  two"]);
        let mut sh = Shared::default();
        keys(&mut e, &mut con, &mut sh, &[Key::DelWord]);
        assert_eq!(e.buf.line(0), "two");
    }

    #[test]
    fn del_line_removes_whole_line() {
        let (mut e, mut con) = ed(&["a", "b", "c"]);
        let mut sh = Shared::default();
        e.cur_line = 1;
        keys(&mut e, &mut con, &mut sh, &[Key::DelLine]);
        assert_eq!(e.buf.lines(), &["a", "c"]);
        keys(&mut e, &mut con, &mut sh, &[Key::Undo]);
        assert_eq!(e.buf.lines(), &["a", "b", "c"]);
    }

    #[test]
    fn del_line_on_only_line_leaves_empty_buffer_floor() {
        let (mut e, mut con) = ed(&["solo"]);
        let mut sh = Shared::default();
        keys(&mut e, &mut con, &mut sh, &[Key::DelLine]);
        assert_eq!(e.buf.lines(), &[""]);
    }

    // ── Home / End toggles ───────────────────────────────────────────

    #[test]
    fn home_toggles_indent_and_start() {
        let (mut e, mut con) = ed(&["   x"]);
        let mut sh = Shared::default();
        keys(&mut e, &mut con, &mut sh, &[Key::Home]);
        assert_eq!(e.col, 3);
        keys(&mut e, &mut con, &mut sh, &[Key::Home]);
        assert_eq!(e.col, 0);
    }

    #[test]
    fn end_toggles_eol_and_end_of_code() {
        let (mut e, mut con) = ed(&["code  # note"]);
        let mut sh = Shared::default();
        keys(&mut e, &mut con, &mut sh, &[Key::End]);
        assert_eq!(e.col, 12);
        keys(&mut e, &mut con, &mut sh, &[Key::End]);
        assert_eq!(e.col, 4); // "code" without trailing spaces
    }

    // ── Word motion ──────────────────────────────────────────────────

    #[test]
    fn word_right_then_left_round_trips() {
        let (mut e, mut con) = ed(&["foo bar_baz qux"]);
        let mut sh = Shared::default();
        keys(&mut e, &mut con, &mut sh, &[Key::WordRight]);
        assert_eq!(e.col, 3);
        keys(&mut e, &mut con, &mut sh, &[Key::WordRight]);
        assert_eq!(e.col, 11);
        keys(&mut e, &mut con, &mut sh, &[Key::WordLeft]);
        assert_eq!(e.col, 4);
    }

    // ── Selection and clipboard ──────────────────────────────────────

    #[test]
    fn yank_and_paste_round_trip() {
        let (mut e, mut con) = ed(&["hello world"]);
        let mut sh = Shared::default();
        // Select "hello" and copy it.
        keys(&mut e, &mut con, &mut sh, &[
            Key::ShiftRight, Key::ShiftRight, Key::ShiftRight, Key::ShiftRight, Key::ShiftRight,
            Key::Copy,
        ]);
        assert_eq!(sh.yank, vec!["hello".to_string()]);
        // Paste at the end of the line.
        keys(&mut e, &mut con, &mut sh, &[Key::End, Key::Paste]);
        assert_eq!(e.buf.line(0), "hello worldhello");
    }

    #[test]
    fn cut_deletes_and_yanks() {
        let (mut e, mut con) = ed(&["one", "two", "three"]);
        let mut sh = Shared::default();
        keys(&mut e, &mut con, &mut sh, &[Key::ShiftDown, Key::ShiftDown, Key::Cut]);
        assert_eq!(sh.yank, vec!["one".to_string(), "two".to_string(), "".to_string()]);
        assert_eq!(e.buf.lines(), &["three"]);
        keys(&mut e, &mut con, &mut sh, &[Key::Undo]);
        assert_eq!(e.buf.lines(), &["one", "two", "three"]);
    }

    #[test]
    fn multiline_paste_over_selection_undoes_as_one() {
        let (mut e, mut con) = ed(&["alpha", "beta"]);
        let mut sh = Shared {
            yank: vec!["X".to_string(), "Y".to_string()],
            ..Shared::default()
        };
        keys(&mut e, &mut con, &mut sh, &[
            Key::ShiftRight, Key::ShiftRight, Key::Paste,
        ]);
        assert_eq!(e.buf.lines(), &["X", "Ypha", "beta"]);
        keys(&mut e, &mut con, &mut sh, &[Key::Undo]);
        assert_eq!(e.buf.lines(), &["alpha", "beta"]);
        keys(&mut e, &mut con, &mut sh, &[Key::Redo]);
        assert_eq!(e.buf.lines(), &["X", "Ypha", "beta"]);
    }

    #[test]
    fn typing_over_selection_replaces_it() {
        let (mut e, mut con) = ed(&["abcd"]);
        let mut sh = Shared::default();
        keys(&mut e, &mut con, &mut sh, &[Key::ShiftRight, Key::ShiftRight]);
        type_str(&mut e, &mut con, &mut sh, "Z");
        assert_eq!(e.buf.line(0), "Zcd");
        keys(&mut e, &mut con, &mut sh, &[Key::Undo]);
        assert_eq!(e.buf.line(0), "abcd");
    }

    // ── Block operations ─────────────────────────────────────────────

    #[test]
    fn indent_and_dedent_selection() {
        let (mut e, mut con) = ed(&["a", "b", ""]);
        let mut sh = Shared::default();
        keys(&mut e, &mut con, &mut sh, &[Key::ShiftDown, Key::ShiftDown, Key::Tab]);
        assert_eq!(e.buf.lines(), &["    a", "    b", ""]);
        keys(&mut e, &mut con, &mut sh, &[Key::Backtab]);
        assert_eq!(e.buf.lines(), &["a", "b", ""]);
    }

    #[test]
    fn indent_keeps_cursor_line_on_undo() {
        let (mut e, mut con) = ed(&["a", "b"]);
        let mut sh = Shared::default();
        keys(&mut e, &mut con, &mut sh, &[Key::ShiftDown, Key::Tab]);
        e.cur_line = 1;
        keys(&mut e, &mut con, &mut sh, &[Key::Undo]);
        assert_eq!(e.buf.lines(), &["a", "b"]);
        assert_eq!(e.cur_line, 1);
    }

    #[test]
    fn comment_toggle_round_trips() {
        let (mut e, mut con) = ed(&["  code", "", "more"]);
        let mut sh = Shared::default();
        // The selection has to reach into the last line for it to count.
        keys(&mut e, &mut con, &mut sh, &[
            Key::ShiftDown, Key::ShiftDown, Key::ShiftRight, Key::Comment,
        ]);
        assert_eq!(e.buf.lines(), &["  #code", "", "#more"]);
        keys(&mut e, &mut con, &mut sh, &[Key::Comment]);
        assert_eq!(e.buf.lines(), &["  code", "", "more"]);
    }

    #[test]
    fn tab_inserts_to_next_stop() {
        let (mut e, mut con) = ed(&["ab"]);
        let mut sh = Shared::default();
        keys(&mut e, &mut con, &mut sh, &[Key::Right, Key::Tab]);
        assert_eq!(e.buf.line(0), "a   b");
        assert_eq!(e.col, 4);
    }

    // ── Line moves and swaps ─────────────────────────────────────────

    #[test]
    fn alt_up_moves_line_and_undoes() {
        let (mut e, mut con) = ed(&["one", "two", "three"]);
        let mut sh = Shared::default();
        e.cur_line = 1;
        keys(&mut e, &mut con, &mut sh, &[Key::AltUp]);
        assert_eq!(e.buf.lines(), &["two", "one", "three"]);
        assert_eq!(e.cur_line, 0);
        keys(&mut e, &mut con, &mut sh, &[Key::Undo]);
        assert_eq!(e.buf.lines(), &["one", "two", "three"]);
    }

    #[test]
    fn alt_down_moves_line() {
        let (mut e, mut con) = ed(&["one", "two"]);
        let mut sh = Shared::default();
        keys(&mut e, &mut con, &mut sh, &[Key::AltDown]);
        assert_eq!(e.buf.lines(), &["two", "one"]);
        assert_eq!(e.cur_line, 1);
    }

    #[test]
    fn char_swap_left() {
        let (mut e, mut con) = ed(&["ab"]);
        let mut sh = Shared::default();
        keys(&mut e, &mut con, &mut sh, &[Key::Right, Key::AltLeft]);
        assert_eq!(e.buf.line(0), "ba");
        assert_eq!(e.col, 0);
    }

    // ── Bracket matching ─────────────────────────────────────────────

    #[test]
    fn bracket_match_forward_nested() {
        let (mut e, mut con) = ed(&["f(a(b), c)"]);
        let mut sh = Shared::default();
        e.col = 1;
        keys(&mut e, &mut con, &mut sh, &[Key::Match]);
        assert_eq!((e.cur_line, e.col), (0, 9));
    }

    #[test]
    fn bracket_match_backward_across_lines() {
        let (mut e, mut con) = ed(&["{", "  x", "}"]);
        let mut sh = Shared::default();
        e.cur_line = 2;
        keys(&mut e, &mut con, &mut sh, &[Key::Match]);
        assert_eq!((e.cur_line, e.col), (0, 0));
    }

    #[test]
    fn bracket_match_reports_failure() {
        let (mut e, mut con) = ed(&["("]);
        let mut sh = Shared::default();
        keys(&mut e, &mut con, &mut sh, &[Key::Match]);
        assert!(e.message.starts_with("No match in"));
    }

    // ── History browsing ─────────────────────────────────────────────

    #[test]
    fn undo_yank_copies_saved_lines() {
        let (mut e, mut con) = ed(&["original"]);
        let mut sh = Shared::default();
        type_str(&mut e, &mut con, &mut sh, "x");
        keys(&mut e, &mut con, &mut sh, &[Key::UndoYank]);
        assert_eq!(sh.yank, vec!["original".to_string()]);
    }

    // ── Prompt line ──────────────────────────────────────────────────

    #[test]
    fn line_edit_types_and_accepts() {
        let (mut e, mut con) = ed(&[""]);
        con.feed(b"abc\r");
        let res = e.line_edit(&mut con, "P: ", "", None).unwrap();
        assert_eq!(res, Some("abc".to_string()));
    }

    #[test]
    fn line_edit_first_delete_clears_default() {
        let (mut e, mut con) = ed(&[""]);
        con.feed(b"\x1b[3~ok\r");
        let res = e.line_edit(&mut con, "P: ", "stale", None).unwrap();
        assert_eq!(res, Some("ok".to_string()));
    }

    #[test]
    fn line_edit_backspace_edits_default() {
        let (mut e, mut con) = ed(&[""]);
        con.feed(b"\x7f\x7fw\r");
        let res = e.line_edit(&mut con, "P: ", "raw", None).unwrap();
        assert_eq!(res, Some("rw".to_string()));
    }

    #[test]
    fn line_edit_abort_returns_none() {
        let (mut e, mut con) = ed(&[""]);
        con.feed(b"half\x11");
        assert_eq!(e.line_edit(&mut con, "P: ", "", None).unwrap(), None);
    }

    #[test]
    fn line_edit_paste_pulls_symbol_under_cursor() {
        let (mut e, mut con) = ed(&["my_name here"]);
        e.col = 2;
        con.feed(b"\x16\r"); // Ctrl-V then Enter
        let res = e.line_edit(&mut con, "Find: ", "", Some("_")).unwrap();
        assert_eq!(res, Some("my_name".to_string()));
    }

    // ── Mouse ────────────────────────────────────────────────────────

    #[test]
    fn click_moves_cursor() {
        let (mut e, mut con) = ed(&["hello", "world"]);
        let mut sh = Shared::default();
        step(&mut e, &mut con, &mut sh, Event::Mouse { x: 3, y: 1, button: 0x20 });
        assert_eq!((e.cur_line, e.col), (1, 3));
    }

    #[test]
    fn double_click_selects_word() {
        let (mut e, mut con) = ed(&["foo bar"]);
        let mut sh = Shared::default();
        step(&mut e, &mut con, &mut sh, Event::Mouse { x: 5, y: 0, button: 0x20 });
        step(&mut e, &mut con, &mut sh, Event::Mouse { x: 5, y: 0, button: 0x20 });
        assert_eq!(e.mark, Some((0, 4)));
        assert_eq!(e.col, 7);
    }

    #[test]
    fn right_click_requests_find() {
        let (mut e, mut con) = ed(&["x"]);
        let mut sh = Shared::default();
        // Right-click opens the find prompt; abort it right away.
        con.feed(b"\x11");
        let flow = step(&mut e, &mut con, &mut sh, Event::Mouse { x: 0, y: 0, button: 0x22 });
        assert_eq!(flow, Flow::Continue);
        assert!(con.output().contains("Find: "));
    }

    // ── Edit loop ────────────────────────────────────────────────────

    #[test]
    fn quit_unchanged_exits_directly() {
        let (mut e, mut con) = ed(&["text"]);
        let mut sh = Shared::default();
        con.feed(b"\x11");
        assert_eq!(e.edit_loop(&mut con, &Plain, &mut sh).unwrap(), Exit::Quit);
    }

    #[test]
    fn quit_changed_default_answer_stays() {
        let (mut e, mut con) = ed(&["text"]);
        let mut sh = Shared::default();
        // Type, try to quit, accept the default "N", then force-quit.
        con.feed(b"x\x11\r\x11\x1b[3~f\r");
        assert_eq!(
            e.edit_loop(&mut con, &Plain, &mut sh).unwrap(),
            Exit::ForceQuit
        );
        assert_eq!(e.buf.line(0), "xtext");
    }

    #[test]
    fn quit_restores_terminal_modes() {
        let (mut e, mut con) = ed(&["text"]);
        let mut sh = Shared::default();
        con.feed(b"\x11");
        e.edit_loop(&mut con, &Plain, &mut sh).unwrap();
        let out = con.output();
        assert!(out.contains(ansi::SCROLL_REGION_OFF));
        assert!(out.contains(ansi::MOUSE_OFF));
    }

    #[test]
    fn next_and_prev_hand_back_to_session() {
        let (mut e, mut con) = ed(&["text"]);
        let mut sh = Shared::default();
        con.feed(b"\x17"); // Ctrl-W
        assert_eq!(e.edit_loop(&mut con, &Plain, &mut sh).unwrap(), Exit::Next);
        con.feed(b"\x1b[5;5~"); // Ctrl-PgUp
        assert_eq!(e.edit_loop(&mut con, &Plain, &mut sh).unwrap(), Exit::Prev);
    }

    #[test]
    fn eof_surfaces_as_error() {
        let (mut e, mut con) = ed(&["text"]);
        let mut sh = Shared::default();
        let err = e.edit_loop(&mut con, &Plain, &mut sh).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
