//! Screen painting for [`Editor`]: a diff against a per-row cache so only
//! rows that changed since the last frame are rewritten, plus hardware
//! scrolling that shifts the cache instead of invalidating it.

use std::io;

use bitflags::bitflags;

use ped_term::Console;
use ped_term::ansi::{self, Hilite};

use crate::editor::Editor;
use crate::highlight::Highlighter;
use crate::text;

/// Upper bound passed to the highlighter per line.
const TOKEN_BUDGET: usize = 300;

bitflags! {
    /// How the selection crosses a display row.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) struct RowFlags: u8 {
        /// The selection touches this row.
        const SPANS = 1;
        /// The selection starts on this row.
        const FIRST = 2;
        /// The selection ends on this row.
        const LAST = 4;
    }
}

/// What the screen row currently shows. A cached text of `"\x00"` never
/// matches a buffer line, forcing a repaint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Row {
    pub(crate) flags: RowFlags,
    pub(crate) text: String,
}

impl Row {
    pub(crate) fn forced() -> Self {
        Self {
            flags: RowFlags::empty(),
            text: "\x00".to_string(),
        }
    }

    fn blank() -> Self {
        Self {
            flags: RowFlags::empty(),
            text: String::new(),
        }
    }
}

impl Editor {
    /// Paint the frame: clamp the cursor into the buffer, adjust margin and
    /// viewport, rewrite changed rows and the status line, park the cursor.
    pub fn display_window(&mut self, con: &mut dyn Console, hl: &dyn Highlighter) -> io::Result<()> {
        ansi::cursor(con, false)?;
        self.cur_line = self.cur_line.min(self.buf.len() - 1);
        self.vcol = self.col.min(text::width(self.buf.line(self.cur_line)));
        // Horizontal scroll jumps by a quarter screen.
        if self.vcol >= self.width + self.margin {
            self.margin = self.vcol - self.width + (self.width >> 2);
        } else if self.vcol < self.margin {
            self.margin = self.vcol.saturating_sub(self.width >> 2);
        }
        if !(self.top_line <= self.cur_line && self.cur_line < self.top_line + self.height) {
            self.top_line = self.cur_line.saturating_sub(self.row);
        }
        self.row = self.cur_line - self.top_line;

        // Selection bounds in screen columns.
        let sel = self.mark.map(|_| {
            let (sl, sc, el, ec) = self.mark_range();
            (
                sl,
                sc.saturating_sub(self.margin),
                el,
                ec.saturating_sub(self.margin),
            )
        });

        let mut i = self.top_line;
        for c in 0..self.height {
            if i == self.buf.len() {
                // Past the end of the buffer: blank the row once.
                if self.rows[c] != Row::blank() {
                    ansi::goto(con, c, 0)?;
                    ansi::clear_to_eol(con)?;
                    self.rows[c] = Row::blank();
                }
                continue;
            }
            let mut flags = RowFlags::empty();
            if let Some((sl, _, el, _)) = sel {
                if sl <= i && i < el {
                    flags |= RowFlags::SPANS;
                    if i == sl {
                        flags |= RowFlags::FIRST;
                    }
                    if i + 1 == el {
                        flags |= RowFlags::LAST;
                    }
                }
            }
            // The last row keeps one cell free so the terminal never wraps.
            let avail = self.width - usize::from(c + 1 == self.height);
            let row = Row {
                flags,
                text: text::cols(self.buf.line(i), self.margin, self.margin + avail),
            };
            if row != self.rows[c] || (!flags.is_empty() && i == self.cur_line) {
                ansi::goto(con, c, 0)?;
                self.paint_row(con, hl, &row, sel)?;
                if text::width(&row.text) < self.width {
                    ansi::clear_to_eol(con)?;
                }
                self.rows[c] = row;
            }
            i += 1;
        }

        self.status_line(con)?;
        ansi::goto(con, self.row, self.vcol - self.margin)?;
        ansi::cursor(con, true)?;
        con.flush()
    }

    fn paint_row(
        &self,
        con: &mut dyn Console,
        hl: &dyn Highlighter,
        row: &Row,
        sel: Option<(usize, usize, usize, usize)>,
    ) -> io::Result<()> {
        let l = &row.text;
        if row.flags.is_empty() {
            return match hl.highlight(l, TOKEN_BUDGET) {
                Some(colored) => con.write_str(&colored),
                None => con.write_str(l),
            };
        }
        let (_, sc, _, ec) = sel.unwrap_or((0, 0, 0, 0));
        if row.flags.contains(RowFlags::FIRST | RowFlags::LAST) {
            con.write_str(&text::cols(l, 0, sc))?;
            ansi::hilite(con, Hilite::Mark)?;
            con.write_str(&text::cols(l, sc, ec))?;
            ansi::hilite(con, Hilite::Off)?;
            con.write_str(&text::cols_from(l, ec))?;
        } else if row.flags.contains(RowFlags::FIRST) {
            con.write_str(&text::cols(l, 0, sc))?;
            ansi::hilite(con, Hilite::Mark)?;
            con.write_str(&text::cols_from(l, sc))?;
            con.write_str(" ")?;
            ansi::hilite(con, Hilite::Off)?;
        } else if row.flags.contains(RowFlags::LAST) {
            ansi::hilite(con, Hilite::Mark)?;
            con.write_str(&text::cols(l, 0, ec))?;
            ansi::hilite(con, Hilite::Off)?;
            con.write_str(&text::cols_from(l, ec))?;
        } else {
            ansi::hilite(con, Hilite::Mark)?;
            con.write_str(l)?;
            con.write_str(" ")?;
            ansi::hilite(con, Hilite::Off)?;
        }
        Ok(())
    }

    fn status_line(&self, con: &mut dyn Console) -> io::Result<()> {
        ansi::goto(con, self.height, 0)?;
        ansi::hilite(con, Hilite::Status)?;
        let chd = if self.buf.modified() { "*" } else { "" };
        let status = if self.width >= ansi::STATUS_WIDE_MIN {
            ansi::status_wide(
                chd,
                &self.buf.fname,
                self.cur_line + 1,
                self.buf.len(),
                self.vcol + 1,
                &self.message,
            )
        } else {
            ansi::status_narrow(
                chd,
                &self.buf.fname,
                self.cur_line + 1,
                self.vcol + 1,
                &self.message,
            )
        };
        con.write_str(&text::cols(&status, 0, self.width - 1))?;
        ansi::hilite(con, Hilite::Off)?;
        ansi::clear_to_eol(con)
    }

    /// Scroll key: shift the viewport up, dragging the cursor along.
    pub(crate) fn scroll_lines_up(&mut self, con: &mut dyn Console, n: usize) -> io::Result<()> {
        if self.top_line > 0 {
            self.top_line = self.top_line.saturating_sub(n);
            self.cur_line = self.cur_line.min(self.top_line + self.height - 1);
            self.scroll_screen_up(con, n)?;
        }
        Ok(())
    }

    pub(crate) fn scroll_lines_down(&mut self, con: &mut dyn Console, n: usize) -> io::Result<()> {
        if self.top_line + self.height < self.buf.len() {
            self.top_line = (self.top_line + n).min(self.buf.len() - 1);
            self.cur_line = self.cur_line.max(self.top_line);
            self.scroll_screen_down(con, n)?;
        }
        Ok(())
    }

    /// Reverse-scroll the terminal and shift the cache down to match. The
    /// rows entering at the top are forced; the last content row keeps its
    /// now-stale entry (the text pushed into it on screen was rendered one
    /// cell short, so its cache cannot be trusted) and the next frame's
    /// diff repaints it.
    pub(crate) fn scroll_screen_up(&mut self, con: &mut dyn Console, n: usize) -> io::Result<()> {
        let n = n.min(self.height);
        if self.height > 1 {
            for i in (n..self.height - 1).rev() {
                self.rows[i] = self.rows[i - n].clone();
            }
        }
        for r in self.rows.iter_mut().take(n) {
            *r = Row::forced();
        }
        ansi::goto(con, 0, 0)?;
        con.write_str(&ansi::SCROLL_UP_ONE.repeat(n))
    }

    /// Scroll the terminal forward and shift the cache up to match.
    pub(crate) fn scroll_screen_down(&mut self, con: &mut dyn Console, n: usize) -> io::Result<()> {
        let n = n.min(self.height);
        for i in 0..self.height - n {
            self.rows[i] = self.rows[i + n].clone();
        }
        for r in self.rows.iter_mut().skip(self.height - n) {
            *r = Row::forced();
        }
        ansi::goto(con, self.height - 1, 0)?;
        con.write_str(&ansi::SCROLL_DOWN_ONE.repeat(n))
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
