//! The content buffer — ordered line storage with file persistence.
//!
//! A [`TextBuffer`] is a plain `Vec<String>` of lines that is never empty,
//! plus the metadata that belongs to the file behind it: name, working
//! directory, directory-mode flag, whether the file carried tabs, and a
//! checksum of the content as last loaded or saved.
//!
//! # Design choices
//!
//! - **Lines, not a rope.** Every edit in this editor is a line-range
//!   splice, and the undo engine records pre-mutation line ranges. A flat
//!   vector of lines keeps those records trivial and cheap at the file
//!   sizes this editor targets.
//!
//! - **The checksum is a change detector, not the source of truth.** It is
//!   recomputed only at load/save boundaries; the "modified" indicator is
//!   derived by comparing the saved checksum against a fresh fold over the
//!   lines.
//!
//! - **Tabs never live in memory.** Tabs are expanded to 8-column stops on
//!   read (remembering that they were present) and, when tab writing is
//!   enabled, runs of trailing spaces filling an 8-column section are
//!   packed back to a tab on write.

use std::env;
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// On-disk tab stops are every 8 columns, independent of the editing
/// tab size.
pub const TAB_STOP: usize = 8;

/// Suffix of the temporary file written before the rename into place.
const TMP_SUFFIX: &str = ".pedtmp";

// ---------------------------------------------------------------------------
// TextBuffer
// ---------------------------------------------------------------------------

/// An ordered, 0-indexed sequence of text lines, always at least one.
#[derive(Debug, Clone)]
pub struct TextBuffer {
    lines: Vec<String>,
    /// Cached line count, kept equal to `lines.len()` after every mutation.
    total: usize,
    /// File name backing this buffer ("" for a scratch buffer).
    pub fname: String,
    /// True when the buffer holds a synthesized directory listing.
    pub is_dir: bool,
    /// Working directory this buffer belongs to.
    pub work_dir: PathBuf,
    /// Whether the loaded file contained tabs (re-packed on save).
    pub write_tabs: bool,
    /// Checksum of the content as last loaded or saved.
    hash: u32,
}

impl TextBuffer {
    /// A scratch buffer holding one empty line.
    #[must_use]
    pub fn new() -> Self {
        let mut buf = Self {
            lines: vec![String::new()],
            total: 1,
            fname: String::new(),
            is_dir: false,
            work_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            write_tabs: false,
            hash: 0,
        };
        buf.mark_saved();
        buf
    }

    /// A buffer holding the given lines (used for scratch content).
    #[must_use]
    pub fn from_lines(lines: Vec<String>) -> Self {
        let mut buf = Self::new();
        buf.lines = lines;
        buf.ensure_nonempty();
        buf.total = buf.lines.len();
        buf.mark_saved();
        buf
    }

    // ── Access ──────────────────────────────────────────────────────

    /// Number of lines. Never 0.
    #[must_use]
    pub fn len(&self) -> usize {
        self.total
    }

    /// Always false — the buffer keeps at least one (possibly empty) line.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// The line at `idx`.
    ///
    /// # Panics
    ///
    /// Panics if `idx` is out of range.
    #[must_use]
    pub fn line(&self, idx: usize) -> &str {
        &self.lines[idx]
    }

    /// All lines.
    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// The lines in `[start, end)`, both ends clamped.
    #[must_use]
    pub fn slice(&self, start: usize, end: usize) -> &[String] {
        let end = end.min(self.total);
        let start = start.min(end);
        &self.lines[start..end]
    }

    // ── Mutation ────────────────────────────────────────────────────

    /// Overwrite the line at `idx`.
    pub fn set_line(&mut self, idx: usize, line: String) {
        self.lines[idx] = line;
    }

    /// Insert lines before index `at` (clamped to the end).
    pub fn insert_lines(&mut self, at: usize, lines: Vec<String>) {
        let at = at.min(self.total);
        self.lines.splice(at..at, lines);
        self.total = self.lines.len();
    }

    /// Remove and return `count` lines starting at `start` (clamped).
    pub fn remove_lines(&mut self, start: usize, count: usize) -> Vec<String> {
        let end = (start + count).min(self.total);
        let start = start.min(end);
        let removed = self.lines.drain(start..end).collect();
        self.total = self.lines.len();
        removed
    }

    /// Replace `count` lines at `start` with `lines`.
    ///
    /// When `start` is past the end the lines are appended instead — the
    /// shape undo replay relies on when restoring a deleted final line.
    pub fn splice(&mut self, start: usize, count: usize, lines: Vec<String>) {
        if start < self.total {
            let end = (start + count).min(self.total);
            self.lines.splice(start..end, lines);
        } else {
            self.lines.extend(lines);
        }
        self.total = self.lines.len();
    }

    /// Restore the one-empty-line floor after a wholesale deletion.
    pub fn ensure_nonempty(&mut self) {
        if self.lines.is_empty() {
            self.lines.push(String::new());
        }
        self.total = self.lines.len();
    }

    // ── Checksum ────────────────────────────────────────────────────

    /// Fold all lines into one 30-bit checksum.
    #[must_use]
    pub fn hash_buffer(&self) -> u32 {
        let mut res: u32 = 0;
        for line in &self.lines {
            let h = (fnv1a(line) & 0x3FFF_FFFF) as u32;
            res = (res.wrapping_mul(227).wrapping_add(1) ^ h) & 0x3FFF_FFFF;
        }
        res
    }

    /// Record the current content as the saved state.
    pub fn mark_saved(&mut self) {
        self.hash = self.hash_buffer();
    }

    /// Whether the content differs from the last loaded/saved state.
    #[must_use]
    pub fn modified(&self) -> bool {
        self.hash != self.hash_buffer()
    }

    // ── Persistence ─────────────────────────────────────────────────

    /// Replace the content with the file at `path`, or with a synthesized
    /// listing when `path` names a directory.
    ///
    /// `fname` is set before the read is attempted, so a failed load still
    /// leaves the buffer associated with the requested name. The saved
    /// checksum is always recomputed, whatever happens.
    ///
    /// # Errors
    ///
    /// Returns an error if the path can neither be read as a file nor
    /// listed as a directory; the line content is left untouched.
    pub fn load(&mut self, path: &str) -> io::Result<()> {
        self.fname = path.to_string();
        let result = self.load_inner(path);
        self.mark_saved();
        result
    }

    fn load_inner(&mut self, path: &str) -> io::Result<()> {
        if path == "." || path == ".." || fs::metadata(path).is_ok_and(|m| m.is_dir()) {
            return self.load_dir(path);
        }

        let raw = fs::read(path)?;
        let text = String::from_utf8_lossy(&raw);
        self.write_tabs = false;
        let mut lines = Vec::new();
        for l in text.lines() {
            lines.push(expand_tabs(l.trim_end(), &mut self.write_tabs));
        }
        self.lines = lines;
        self.ensure_nonempty();
        self.is_dir = false;
        Ok(())
    }

    /// Synthesize a directory listing: a header line, a blank line, then
    /// the sorted entries. The buffer becomes the new working directory.
    fn load_dir(&mut self, path: &str) -> io::Result<()> {
        env::set_current_dir(path)?;
        self.work_dir = env::current_dir()?;
        self.fname = if self.work_dir == Path::new("/") {
            "/".to_string()
        } else {
            self.work_dir
                .file_name()
                .map_or_else(|| "/".to_string(), |n| n.to_string_lossy().into_owned())
        };

        let mut names: Vec<String> = fs::read_dir(".")?
            .filter_map(Result::ok)
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();

        let mut lines = vec![format!("Directory '{}'", self.work_dir.display()), String::new()];
        lines.extend(names);
        self.lines = lines;
        self.total = self.lines.len();
        self.is_dir = true;
        Ok(())
    }

    /// Write the content to `path`: temporary file first, best-effort
    /// removal of the old file, then rename into place. Durability over
    /// atomicity-on-power-loss.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary file cannot be written or the
    /// rename fails. The removal of the prior file is best-effort.
    pub fn save(&self, path: &str) -> io::Result<()> {
        let tmp = format!("{path}{TMP_SUFFIX}");
        let mut out = String::new();
        for l in &self.lines {
            if self.write_tabs {
                let _ = write!(out, "{}", pack_tabs(l));
            } else {
                out.push_str(l);
            }
            out.push('\n');
        }
        fs::write(&tmp, out)?;
        let _ = fs::remove_file(path);
        fs::rename(&tmp, path)
    }
}

impl Default for TextBuffer {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tab expansion / compaction
// ---------------------------------------------------------------------------

/// Expand tabs to spaces at [`TAB_STOP`] columns. Sets `had_tabs` when at
/// least one tab was seen.
#[must_use]
pub fn expand_tabs(s: &str, had_tabs: &mut bool) -> String {
    if !s.contains('\t') {
        return s.to_string();
    }
    *had_tabs = true;
    let mut out = String::with_capacity(s.len());
    let mut pos = 0;
    for c in s.chars() {
        if c == '\t' {
            let fill = TAB_STOP - pos % TAB_STOP;
            out.extend(std::iter::repeat_n(' ', fill));
            pos += fill;
        } else {
            out.push(c);
            pos += 1;
        }
    }
    out
}

/// Pack runs of trailing spaces that fill an 8-column section back into a
/// tab. A single trailing space in a section is kept as-is.
#[must_use]
pub fn pack_tabs(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    for chunk in chars.chunks(TAB_STOP) {
        let trailing = chunk.iter().rev().take_while(|&&c| c == ' ').count();
        if trailing > 1 {
            out.extend(chunk[..chunk.len() - trailing].iter());
            out.push('\t');
        } else {
            out.extend(chunk.iter());
        }
    }
    out
}

/// FNV-1a over the line's bytes.
fn fnv1a(s: &str) -> u64 {
    let mut h: u64 = 0xcbf2_9ce4_8422_2325;
    for b in s.bytes() {
        h ^= u64::from(b);
        h = h.wrapping_mul(0x0000_0100_0000_01b3);
    }
    h
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn buf(lines: &[&str]) -> TextBuffer {
        TextBuffer::from_lines(lines.iter().map(ToString::to_string).collect())
    }

    // -- Construction -------------------------------------------------------

    #[test]
    fn new_has_one_empty_line() {
        let b = TextBuffer::new();
        assert_eq!(b.len(), 1);
        assert_eq!(b.line(0), "");
        assert!(!b.modified());
    }

    #[test]
    fn from_empty_lines_gets_floor() {
        let b = TextBuffer::from_lines(vec![]);
        assert_eq!(b.len(), 1);
    }

    // -- Splicing -----------------------------------------------------------

    #[test]
    fn splice_replaces_range() {
        let mut b = buf(&["a", "b", "c"]);
        b.splice(1, 1, vec!["x".into(), "y".into()]);
        assert_eq!(b.lines(), &["a", "x", "y", "c"]);
        assert_eq!(b.len(), 4);
    }

    #[test]
    fn splice_past_end_appends() {
        let mut b = buf(&["a"]);
        b.splice(5, 1, vec!["z".into()]);
        assert_eq!(b.lines(), &["a", "z"]);
    }

    #[test]
    fn splice_clamps_overlong_count() {
        let mut b = buf(&["a", "b"]);
        b.splice(1, 99, vec!["x".into()]);
        assert_eq!(b.lines(), &["a", "x"]);
    }

    #[test]
    fn remove_and_insert_track_total() {
        let mut b = buf(&["a", "b", "c"]);
        let removed = b.remove_lines(0, 2);
        assert_eq!(removed, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(b.len(), 1);
        b.insert_lines(1, vec!["d".into()]);
        assert_eq!(b.len(), 2);
        assert_eq!(b.lines(), &["c", "d"]);
    }

    // -- Checksum -----------------------------------------------------------

    #[test]
    fn hash_detects_changes() {
        let mut b = buf(&["hello", "world"]);
        assert!(!b.modified());
        b.set_line(0, "hellp".into());
        assert!(b.modified());
        b.set_line(0, "hello".into());
        assert!(!b.modified());
    }

    #[test]
    fn hash_is_order_sensitive() {
        let a = buf(&["x", "y"]);
        let b = buf(&["y", "x"]);
        assert_ne!(a.hash_buffer(), b.hash_buffer());
    }

    #[test]
    fn hash_stays_in_30_bits() {
        let b = buf(&["some fairly long line of text to fold", "another"]);
        assert!(b.hash_buffer() <= 0x3FFF_FFFF);
    }

    // -- Tabs ---------------------------------------------------------------

    #[test]
    fn expand_tabs_to_8_col_stops() {
        let mut had = false;
        assert_eq!(expand_tabs("\tx", &mut had), "        x");
        assert!(had);
        let mut had = false;
        assert_eq!(expand_tabs("ab\tx", &mut had), "ab      x");
        assert_eq!(expand_tabs("12345678\tx", &mut had), "12345678        x");
    }

    #[test]
    fn expand_tabs_no_tab_is_identity() {
        let mut had = false;
        assert_eq!(expand_tabs("plain", &mut had), "plain");
        assert!(!had);
    }

    #[test]
    fn pack_tabs_round_trips_expansion() {
        let mut had = false;
        let expanded = expand_tabs("a\tb\tc", &mut had);
        assert_eq!(pack_tabs(&expanded), "a\tb\tc");
    }

    #[test]
    fn pack_tabs_keeps_single_trailing_space() {
        assert_eq!(pack_tabs("abcdefg "), "abcdefg ");
        assert_eq!(pack_tabs("abcdef  "), "abcdef\t");
    }

    // -- Persistence --------------------------------------------------------

    #[test]
    fn save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.txt").to_string_lossy().into_owned();

        let b = buf(&["one", "two", "  indented", ""]);
        b.save(&path).unwrap();

        let mut loaded = TextBuffer::new();
        loaded.load(&path).unwrap();
        assert_eq!(loaded.lines(), b.lines());
        assert!(!loaded.modified());
    }

    #[test]
    fn save_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.txt").to_string_lossy().into_owned();
        std::fs::write(&path, "old stuff\n").unwrap();

        let b = buf(&["new"]);
        b.save(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new\n");
    }

    #[test]
    fn load_expands_tabs_and_records_them() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.txt").to_string_lossy().into_owned();
        std::fs::write(&path, "a\tb\n").unwrap();

        let mut b = TextBuffer::new();
        b.load(&path).unwrap();
        assert_eq!(b.line(0), "a       b");
        assert!(b.write_tabs);
    }

    #[test]
    fn save_with_write_tabs_packs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.txt").to_string_lossy().into_owned();

        let mut b = buf(&["a       b"]);
        b.write_tabs = true;
        b.save(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a\tb\n");
    }

    #[test]
    fn load_missing_file_keeps_state() {
        let mut b = buf(&["keep me"]);
        let err = b.load("/nonexistent/nowhere.txt");
        assert!(err.is_err());
        assert_eq!(b.line(0), "keep me");
        assert_eq!(b.fname, "/nonexistent/nowhere.txt");
        assert!(!b.modified()); // checksum re-anchored to current content
    }

    #[test]
    fn load_strips_trailing_whitespace() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("w.txt").to_string_lossy().into_owned();
        std::fs::write(&path, "line   \r\nnext\t\n").unwrap();

        let mut b = TextBuffer::new();
        b.load(&path).unwrap();
        assert_eq!(b.lines(), &["line", "next"]);
    }

    #[test]
    fn load_directory_synthesizes_listing() {
        let orig = env::current_dir().unwrap();
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bb.txt"), "x").unwrap();
        std::fs::write(dir.path().join("aa.txt"), "x").unwrap();

        let mut b = TextBuffer::new();
        b.load(&dir.path().to_string_lossy()).unwrap();
        assert!(b.is_dir);
        assert!(b.line(0).starts_with("Directory '"));
        assert_eq!(b.line(1), "");
        assert_eq!(b.line(2), "aa.txt");
        assert_eq!(b.line(3), "bb.txt");

        env::set_current_dir(orig).unwrap();
    }
}
