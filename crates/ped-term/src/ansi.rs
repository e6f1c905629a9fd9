// SPDX-License-Identifier: MIT
//
// VT100 control sequences.
//
// Pure functions that write escape sequences through the device. No state,
// no decisions about when to emit — that's the renderer's job. This module
// just knows the byte-level encoding of every terminal command we need.
//
// The sequence inventory is deliberately small and fixed: cursor motion,
// clear-to-EOL, cursor visibility, three highlight modes, mouse reporting,
// one-line scrolling with a settable scroll region, and the two status
// line templates selected by terminal width. Terminal compatibility relies
// on these exact bytes, so the fixed sequences are `pub const` and covered
// by tests.

use std::io;

use crate::console::Console;

// ─── Fixed sequences ─────────────────────────────────────────────────────────

/// Clear from the cursor to the end of the line.
pub const CLEAR_EOL: &str = "\x1b[0K";
/// Make the cursor visible (DECTCEM set).
pub const CURSOR_ON: &str = "\x1b[?25h";
/// Hide the cursor (DECTCEM reset).
pub const CURSOR_OFF: &str = "\x1b[?25l";
/// Plain text — all attributes off.
pub const HILITE_OFF: &str = "\x1b[0m";
/// Status line colors: bold white on blue.
pub const HILITE_STATUS: &str = "\x1b[1;37;44m";
/// Selected text: yellow background.
pub const HILITE_MARK: &str = "\x1b[43m";
/// Enable X10 mouse reporting.
pub const MOUSE_ON: &str = "\x1b[?9h";
/// Disable X10 mouse reporting.
pub const MOUSE_OFF: &str = "\x1b[?9l";
/// Scroll the region up by one line (reverse index).
pub const SCROLL_UP_ONE: &str = "\x1bM";
/// Scroll the region down by one line.
pub const SCROLL_DOWN_ONE: &str = "\n";
/// Reset the scroll region to the full screen.
pub const SCROLL_REGION_OFF: &str = "\x1b[r";
/// Move the cursor back one column (used by the prompt line editor).
pub const BACKSPACE: &str = "\x08";

// ─── Cursor and screen ───────────────────────────────────────────────────────

/// Move the cursor to `(row, col)` using the CUP (Cursor Position) sequence.
///
/// Our coordinates are 0-indexed; ANSI CUP is 1-indexed.
pub fn goto(con: &mut dyn Console, row: usize, col: usize) -> io::Result<()> {
    con.write_str(&format!("\x1b[{};{}H", row + 1, col + 1))
}

/// Clear from the cursor to the end of the current line.
pub fn clear_to_eol(con: &mut dyn Console) -> io::Result<()> {
    con.write_str(CLEAR_EOL)
}

/// Show or hide the cursor.
pub fn cursor(con: &mut dyn Console, on: bool) -> io::Result<()> {
    con.write_str(if on { CURSOR_ON } else { CURSOR_OFF })
}

/// Highlight mode for subsequent text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hilite {
    /// Plain text.
    Off,
    /// The status / prompt line.
    Status,
    /// Selected (marked) text.
    Mark,
}

/// Switch the text highlight mode.
pub fn hilite(con: &mut dyn Console, mode: Hilite) -> io::Result<()> {
    con.write_str(match mode {
        Hilite::Off => HILITE_OFF,
        Hilite::Status => HILITE_STATUS,
        Hilite::Mark => HILITE_MARK,
    })
}

/// Enable or disable mouse reporting.
pub fn mouse_reporting(con: &mut dyn Console, on: bool) -> io::Result<()> {
    con.write_str(if on { MOUSE_ON } else { MOUSE_OFF })
}

/// Set the scroll region to rows `1..=stop` (1-indexed), or reset it to the
/// full screen when `stop` is 0.
pub fn scroll_region(con: &mut dyn Console, stop: usize) -> io::Result<()> {
    if stop == 0 {
        con.write_str(SCROLL_REGION_OFF)
    } else {
        con.write_str(&format!("\x1b[1;{stop}r"))
    }
}

// ─── Status line templates ───────────────────────────────────────────────────

/// Width threshold between the wide and narrow status templates.
pub const STATUS_WIDE_MIN: usize = 41;

/// The long status line, used when the terminal is wider than 40 columns.
#[must_use]
pub fn status_wide(
    chd: &str,
    file: &str,
    row: usize,
    total: usize,
    col: usize,
    msg: &str,
) -> String {
    format!("{chd}{file} Row: {row}/{total} Col: {col}  {msg}")
}

/// The short status line for narrow screens.
#[must_use]
pub fn status_narrow(chd: &str, file: &str, row: usize, col: usize, msg: &str) -> String {
    format!("{chd}{file} {row}:{col}  {msg}")
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::console::Script;

    fn run(f: impl FnOnce(&mut Script) -> io::Result<()>) -> String {
        let mut con = Script::new(b"", 24, 80);
        f(&mut con).unwrap();
        con.take_output()
    }

    #[test]
    fn goto_is_one_indexed() {
        assert_eq!(run(|c| goto(c, 0, 0)), "\x1b[1;1H");
        assert_eq!(run(|c| goto(c, 5, 11)), "\x1b[6;12H");
    }

    #[test]
    fn cursor_on_off() {
        assert_eq!(run(|c| cursor(c, true)), "\x1b[?25h");
        assert_eq!(run(|c| cursor(c, false)), "\x1b[?25l");
    }

    #[test]
    fn hilite_modes() {
        assert_eq!(run(|c| hilite(c, Hilite::Off)), "\x1b[0m");
        assert_eq!(run(|c| hilite(c, Hilite::Status)), "\x1b[1;37;44m");
        assert_eq!(run(|c| hilite(c, Hilite::Mark)), "\x1b[43m");
    }

    #[test]
    fn mouse_sequences() {
        assert_eq!(run(|c| mouse_reporting(c, true)), "\x1b[?9h");
        assert_eq!(run(|c| mouse_reporting(c, false)), "\x1b[?9l");
    }

    #[test]
    fn scroll_region_set_and_reset() {
        assert_eq!(run(|c| scroll_region(c, 23)), "\x1b[1;23r");
        assert_eq!(run(|c| scroll_region(c, 0)), "\x1b[r");
    }

    #[test]
    fn scroll_one_line_sequences() {
        assert_eq!(SCROLL_UP_ONE, "\x1bM");
        assert_eq!(SCROLL_DOWN_ONE, "\n");
    }

    #[test]
    fn status_templates() {
        assert_eq!(
            status_wide("*", "a.txt", 3, 10, 7, "hi"),
            "*a.txt Row: 3/10 Col: 7  hi"
        );
        assert_eq!(status_narrow("", "a.txt", 3, 7, ""), "a.txt 3:7  ");
    }
}
