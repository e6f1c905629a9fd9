//! Multi-buffer session: a list of editor slots cycled with next/prev,
//! plus the state they share (yank buffer, search patterns, toggles and
//! the place ring).

use std::env;
use std::io;
use std::path::PathBuf;

use ped_term::Console;

use crate::editor::{Editor, Exit, FILE_CHARS};
use crate::highlight::Highlighter;

/// The place ring holds at most this many bookmarks.
const MAX_PLACES: usize = 20;

/// A bookmarked line in one of the session's slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Place {
    pub line: usize,
    pub slot: usize,
}

/// A bounded ring of bookmarks, shared by all slots.
#[derive(Debug, Default)]
pub struct Places {
    list: Vec<Place>,
    index: usize,
}

impl Places {
    /// Bookmark a line, dropping the oldest entry when full. Remembering a
    /// known place is a no-op.
    pub fn remember(&mut self, line: usize, slot: usize) {
        let p = Place { line, slot };
        if !self.list.contains(&p) {
            if self.list.len() >= MAX_PLACES {
                self.list.remove(0);
            }
            self.list.push(p);
            self.index = self.list.len() - 1;
        }
    }

    /// Step to the next or previous bookmark, cyclically.
    pub fn step(&mut self, forward: bool) -> Option<Place> {
        if self.list.is_empty() {
            return None;
        }
        self.index = if forward {
            (self.index + 1) % self.list.len()
        } else {
            (self.index + self.list.len() - 1) % self.list.len()
        };
        Some(self.list[self.index])
    }

    /// Drop every bookmark pointing into a closed slot.
    pub fn forget_slot(&mut self, slot: usize) {
        self.list.retain(|p| p.slot != slot);
        self.index = 0;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.list.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }
}

/// State common to all slots of a session.
#[derive(Debug)]
pub struct Shared {
    pub yank: Vec<String>,
    pub find_pattern: String,
    pub replc_pattern: String,
    pub case_sensitive: bool,
    pub autoindent: bool,
    pub comment_char: String,
    pub places: Places,
}

impl Default for Shared {
    fn default() -> Self {
        Self {
            yank: Vec::new(),
            find_pattern: String::new(),
            replc_pattern: String::new(),
            case_sensitive: false,
            autoindent: true,
            comment_char: "#".to_string(),
            places: Places::default(),
        }
    }
}

/// What a finished session hands back to its caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionResult {
    /// The first slot edited in-memory content; these are its final lines.
    Lines(Vec<String>),
    /// The first slot edited this file.
    File(String),
}

pub struct Session {
    slots: Vec<Editor>,
    shared: Shared,
    tab_size: usize,
    undo_limit: usize,
    next_id: usize,
    start_dir: Option<PathBuf>,
}

impl Session {
    /// A session over files; with none given, a single slot browsing the
    /// current directory.
    #[must_use]
    pub fn new(files: &[String], tab_size: usize, undo_limit: usize) -> Self {
        let mut s = Self::empty(tab_size, undo_limit);
        if files.is_empty() {
            s.add_slot(Some("."));
        } else {
            for f in files {
                s.add_slot(Some(f));
            }
        }
        s
    }

    /// A session editing content directly; quitting returns the lines.
    #[must_use]
    pub fn from_lines(lines: Vec<String>, tab_size: usize, undo_limit: usize) -> Self {
        let mut s = Self::empty(tab_size, undo_limit);
        s.slots
            .push(Editor::from_lines(lines, tab_size, undo_limit, 0));
        s.next_id = 1;
        s
    }

    fn empty(tab_size: usize, undo_limit: usize) -> Self {
        Self {
            slots: Vec::new(),
            shared: Shared::default(),
            tab_size,
            undo_limit,
            next_id: 0,
            start_dir: env::current_dir().ok(),
        }
    }

    /// Append a slot; `path` of `None` (or empty) makes a scratch buffer.
    fn add_slot(&mut self, path: Option<&str>) {
        let mut ed = Editor::new(self.tab_size, self.undo_limit, self.next_id);
        self.next_id += 1;
        if let Some(p) = path {
            if !p.is_empty() {
                ed.open(p);
            }
        }
        self.slots.push(ed);
    }

    /// Run the session until the last slot quits or a force-quit.
    ///
    /// # Errors
    ///
    /// Device I/O errors abort the session. End of input on a scripted
    /// console ends it cleanly.
    pub fn run(
        &mut self,
        con: &mut dyn Console,
        hl: &dyn Highlighter,
    ) -> io::Result<SessionResult> {
        let mut index = 0usize;
        loop {
            index %= self.slots.len();
            let exit = match self.slots[index].edit_loop(con, hl, &mut self.shared) {
                Ok(exit) => exit,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => {
                    self.slots[index].message = e.to_string();
                    continue;
                }
            };
            match exit {
                Exit::Quit => {
                    if self.slots.len() == 1 {
                        break;
                    }
                    self.slots.remove(index);
                }
                Exit::ForceQuit => break,
                Exit::Next => index += 1,
                Exit::Prev => index += self.slots.len() - 1,
                Exit::Get => {
                    let res = self.slots[index].line_edit(con, "Open file: ", "", Some(FILE_CHARS));
                    match res {
                        Ok(Some(f)) => {
                            self.add_slot(Some(&f));
                            index = self.slots.len() - 1;
                        }
                        Ok(None) => {}
                        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                        Err(e) => self.slots[index].message = e.to_string(),
                    }
                }
                Exit::Switch { slot, line } => {
                    if let Some(i) = self.slots.iter().position(|s| s.id == slot) {
                        self.slots[i].cur_line = line;
                        index = i;
                    }
                }
            }
        }
        self.shared.yank.clear();
        if let Some(dir) = &self.start_dir {
            let _ = env::set_current_dir(dir);
        }
        let first = &self.slots[0];
        Ok(if first.buf.fname.is_empty() {
            SessionResult::Lines(first.buf.lines().to_vec())
        } else {
            SessionResult::File(first.buf.fname.clone())
        })
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
