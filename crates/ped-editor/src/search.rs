//! Regex find and the interactive replace dialog.
//!
//! Searching never wraps: it runs from the cursor to the end of the buffer
//! (or the end of the selection) and reports failure there.

use std::io;

use regex::Regex;

use ped_term::Console;

use crate::editor::Editor;
use crate::highlight::Highlighter;
use crate::session::Shared;
use crate::text;
use crate::undo::{ActionKey, EditSpan};
use ped_term::{Event, Key, read_event};

impl Editor {
    /// Search for `pattern` from `(cur_line, col)` up to line `end`. On a
    /// hit the cursor moves onto the match and the match length in
    /// characters is returned; otherwise the cursor stays and the status
    /// message says so.
    ///
    /// The pattern is remembered for find-again across all slots. Unless
    /// case sensitivity is toggled on, pattern and text are both lowercased
    /// before matching.
    pub fn find_in_file(
        &mut self,
        pattern: &str,
        col: usize,
        end: usize,
        shared: &mut Shared,
    ) -> Option<usize> {
        shared.find_pattern = pattern.to_string();
        let pat = if shared.case_sensitive {
            pattern.to_string()
        } else {
            pattern.to_lowercase()
        };
        let Ok(rex) = Regex::new(&pat) else {
            self.message = format!("Invalid pattern: {pat}");
            return None;
        };
        let mut start = self.cur_line;
        let mut col = col;
        // Starting past the end of the line, or mid-line with an anchored
        // pattern, nothing on this line can match.
        if col > text::width(self.buf.line(start)) || (pat.starts_with('^') && col != 0) {
            start += 1;
            col = 0;
        }
        for line in start..end.min(self.buf.len()) {
            let tail = text::cols_from(self.buf.line(line), col);
            let tail = if shared.case_sensitive {
                tail
            } else {
                tail.to_lowercase()
            };
            if let Some(m) = rex.find(&tail) {
                self.col = col + tail[..m.start()].chars().count();
                self.cur_line = line;
                return Some(m.as_str().chars().count());
            }
            col = 0;
        }
        self.message = format!("{pat} not found (again)");
        None
    }

    /// Prompt for a pattern and replacement, then walk the matches asking
    /// `yes/No/all/quit` for each. With a selection, only matches inside it
    /// are offered. The whole run undoes as a single step.
    pub(crate) fn replace_dialog(
        &mut self,
        con: &mut dyn Console,
        hl: &dyn Highlighter,
        shared: &mut Shared,
    ) -> io::Result<()> {
        let default = shared.find_pattern.clone();
        let Some(pat) = self.line_edit(con, "Replace: ", &default, Some("_"))? else {
            return Ok(());
        };
        if pat.is_empty() {
            return Ok(());
        }
        let with_default = if shared.replc_pattern.is_empty() {
            pat.clone()
        } else {
            shared.replc_pattern.clone()
        };
        let Some(rpat) = self.line_edit(con, "With: ", &with_default, Some("_"))? else {
            return Ok(());
        };
        shared.replc_pattern = rpat.clone();
        let mut q = 'n';
        let (save_line, save_col) = (self.cur_line, self.col);
        let (end_line, end_col) = if self.mark.is_some() {
            let (sl, sc, el, ec) = self.mark_range();
            self.cur_line = sl;
            self.col = sc;
            (el, ec)
        } else {
            (self.buf.len(), usize::MAX)
        };
        let mut count = 0usize;
        self.message = "Replace (yes/No/all/quit) ? ".to_string();
        loop {
            let Some(ni) = self.find_in_file(&pat, self.col, end_line, shared) else {
                break;
            };
            if self.cur_line == end_line - 1 && self.col >= end_col {
                break;
            }
            if q != 'a' {
                self.display_window(con, hl)?;
                q = match read_event(con)? {
                    Event::Char(c) => c.to_ascii_lowercase(),
                    Event::Key(Key::Quit) => 'q',
                    _ => 'n',
                };
            }
            match q {
                'q' => break,
                'a' | 'y' => {
                    let l = self.buf.line(self.cur_line).to_string();
                    self.undo.push(
                        self.cur_line,
                        EditSpan::Replace {
                            count: 1,
                            lines: vec![l.clone()],
                        },
                        ActionKey::None,
                        self.col,
                        count > 0,
                    );
                    let head = text::cols(&l, 0, self.col);
                    let tail = text::cols_from(&l, self.col + ni);
                    self.buf.set_line(self.cur_line, format!("{head}{rpat}{tail}"));
                    // An empty-width match still has to advance the cursor.
                    self.col += text::width(&rpat) + usize::from(ni == 0);
                    count += 1;
                }
                _ => self.col += 1,
            }
        }
        self.cur_line = save_line;
        self.col = save_col;
        self.message = format!("'{pat}' replaced {count} times");
        Ok(())
    }
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

    #[test]
    fn find_moves_cursor_onto_match() {
        let (mut e, _) = ed(&["abc", "xxney"]);
        let mut sh = Shared::default();
        let n = e.find_in_file("ne", 0, e.buf.len(), &mut sh);
        assert_eq!(n, Some(2));
        assert_eq!((e.cur_line, e.col), (1, 2));
        assert_eq!(sh.find_pattern, "ne");
    }

    #[test]
    fn find_is_case_insensitive_by_default() {
        let (mut e, _) = ed(&["Needle"]);
        let mut sh = Shared::default();
        assert_eq!(e.find_in_file("NEEDLE", 0, 1, &mut sh), Some(6));
        sh.case_sensitive = true;
        e.col = 0;
        assert_eq!(e.find_in_file("NEEDLE", 0, 1, &mut sh), None);
    }

    #[test]
    fn find_does_not_wrap_around() {
        let (mut e, _) = ed(&["target", "rest"]);
        let mut sh = Shared::default();
        e.cur_line = 1;
        assert_eq!(e.find_in_file("target", 0, e.buf.len(), &mut sh), None);
        assert_eq!(e.message, "target not found (again)");
        assert_eq!(e.cur_line, 1);
    }

    #[test]
    fn anchored_pattern_skips_partial_line() {
        let (mut e, _) = ed(&["abab", "abx"]);
        let mut sh = Shared::default();
        e.col = 1;
        // ^ cannot match mid-line, so the search starts on the next line.
        assert_eq!(e.find_in_file("^ab", e.col, e.buf.len(), &mut sh), Some(2));
        assert_eq!((e.cur_line, e.col), (1, 0));
    }

    #[test]
    fn invalid_pattern_reports_and_stays() {
        let (mut e, _) = ed(&["x"]);
        let mut sh = Shared::default();
        assert_eq!(e.find_in_file("[", 0, 1, &mut sh), None);
        assert!(e.message.starts_with("Invalid pattern:"));
        assert_eq!((e.cur_line, e.col), (0, 0));
    }

    #[test]
    fn find_again_continues_past_cursor() {
        let (mut e, _) = ed(&["aXa", "aYa"]);
        let mut sh = Shared::default();
        assert!(e.find_in_file("a", e.col + 1, e.buf.len(), &mut sh).is_some());
        assert_eq!((e.cur_line, e.col), (0, 2));
        assert!(e.find_in_file("a", e.col + 1, e.buf.len(), &mut sh).is_some());
        assert_eq!((e.cur_line, e.col), (1, 0));
    }

    #[test]
    fn replace_all_walks_the_buffer() {
        let (mut e, mut con) = ed(&["banana"]);
        let mut sh = Shared::default();
        // Pattern "a", wipe the "With:" default and type "b", then answer
        // "a" for all.
        con.feed(b"a\r\x1b[3~b\ra");
        e.dispatch(Event::Key(Key::Replace), &mut con, &Plain, &mut sh)
            .unwrap();
        assert_eq!(e.buf.line(0), "bbnbnb");
        assert_eq!(e.message, "'a' replaced 3 times");
        assert_eq!((e.cur_line, e.col), (0, 0));
    }

    #[test]
    fn replace_run_undoes_as_one_step() {
        let (mut e, mut con) = ed(&["banana"]);
        let mut sh = Shared::default();
        con.feed(b"a\r\x1b[3~b\ra");
        e.dispatch(Event::Key(Key::Replace), &mut con, &Plain, &mut sh)
            .unwrap();
        e.dispatch(Event::Key(Key::Undo), &mut con, &Plain, &mut sh)
            .unwrap();
        assert_eq!(e.buf.line(0), "banana");
    }

    #[test]
    fn replace_asks_per_match() {
        let (mut e, mut con) = ed(&["one one one"]);
        let mut sh = Shared::default();
        // yes, no, yes.
        con.feed(b"one\r\x1b[3~two\ryny");
        e.dispatch(Event::Key(Key::Replace), &mut con, &Plain, &mut sh)
            .unwrap();
        assert_eq!(e.buf.line(0), "two one two");
        assert_eq!(e.message, "'one' replaced 2 times");
    }

    #[test]
    fn replace_respects_selection_bounds() {
        let (mut e, mut con) = ed(&["aaaa"]);
        let mut sh = Shared::default();
        e.mark = Some((0, 1));
        e.cur_line = 0;
        e.col = 3;
        con.feed(b"a\r\x1b[3~X\ra");
        e.dispatch(Event::Key(Key::Replace), &mut con, &Plain, &mut sh)
            .unwrap();
        assert_eq!(e.buf.line(0), "aXXa");
    }

    #[test]
    fn empty_width_match_still_terminates() {
        let (mut e, mut con) = ed(&["ab"]);
        let mut sh = Shared::default();
        con.feed(b"x*\r\x1b[3~-\ra");
        e.dispatch(Event::Key(Key::Replace), &mut con, &Plain, &mut sh)
            .unwrap();
        // One insertion per position, including the end of the line.
        assert_eq!(e.buf.line(0), "-a-b-");
    }
}
