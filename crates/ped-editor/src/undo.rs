//! Line-range undo/redo.
//!
//! Every mutation records, *before* it runs, the line range it is about to
//! change together with the pre-mutation lines. Undoing a record splices
//! those lines back and pushes the inverse (captured from the buffer just
//! before the splice) onto the redo stack. Records carry a `chain` flag so
//! that compound edits (paste over a selection, interactive replace runs)
//! undo as one step.
//!
//! Two record shapes exist. `Replace` puts `count` current lines back to
//! the saved ones; `Delete` removes `count` lines and then restores the
//! line at the start of the range — the shape a multi-line paste leaves
//! behind, where undoing must shrink the buffer rather than splice 1:1.

use crate::buffer::TextBuffer;

// ─── Records ─────────────────────────────────────────────────────────────────

/// What applying a record does to the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditSpan {
    /// Replace `count` lines at the record's start with the saved lines
    /// (appending when the start is past the end of the buffer).
    Replace { count: usize, lines: Vec<String> },
    /// Remove `count` lines at the record's start, then overwrite the line
    /// now at the start with the saved one.
    Delete { count: usize, line: String },
}

impl EditSpan {
    /// The lines a record saved, whatever its shape.
    #[must_use]
    pub fn saved_lines(&self) -> Vec<String> {
        match self {
            Self::Replace { lines, .. } => lines.clone(),
            Self::Delete { line, .. } => vec![line.clone()],
        }
    }
}

/// Classifies the edit for coalescing and cursor restore.
///
/// `None` never coalesces; all other keys merge consecutive records with
/// the same action on the same start line into the first one, so a typing
/// burst on one line undoes in a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKey {
    None,
    InsertSpace,
    InsertChar,
    Delete,
    Backspace,
    Tab,
    Backtab,
    DelWord,
    SwapLeft,
    SwapRight,
    Indent,
    Dedent,
    Comment,
}

impl ActionKey {
    /// Block operations keep the cursor where it is when replayed; all
    /// other records restore the recorded line.
    const fn keeps_line(self) -> bool {
        matches!(self, Self::Indent | Self::Dedent | Self::Comment)
    }
}

/// One undoable step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// First line of the affected range.
    pub start: usize,
    pub span: EditSpan,
    pub action: ActionKey,
    /// Cursor column at the time of the edit.
    pub col: usize,
    /// When set, replaying continues with the next record on the stack.
    pub chain: bool,
}

/// Cursor position to restore after replaying a chain. `line` is `None`
/// when every replayed record was a block operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Restore {
    pub line: Option<usize>,
    pub col: usize,
}

// ─── Stack ───────────────────────────────────────────────────────────────────

/// Bounded undo/redo stacks. The oldest record is evicted when a stack is
/// full; any fresh edit clears the redo stack.
#[derive(Debug)]
pub struct UndoStack {
    undo: Vec<Record>,
    redo: Vec<Record>,
    limit: usize,
    /// Cursor for the record browser (history navigation keys).
    index: usize,
}

impl UndoStack {
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            undo: Vec::new(),
            redo: Vec::new(),
            limit: limit.max(4),
            index: 0,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.undo.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.undo.is_empty()
    }

    /// Drop all history (slot teardown).
    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
        self.index = 0;
    }

    /// Push a record, coalescing with the top one when both carry the same
    /// non-`None` action on the same start line. Any push clears the redo
    /// stack.
    pub fn push(&mut self, start: usize, span: EditSpan, action: ActionKey, col: usize, chain: bool) {
        let coalesce = action != ActionKey::None
            && self
                .undo
                .last()
                .is_some_and(|top| top.action == action && top.start == start);
        if coalesce {
            return;
        }
        if self.undo.len() >= self.limit {
            self.undo.remove(0);
        }
        self.undo.push(Record {
            start,
            span,
            action,
            col,
            chain,
        });
        self.redo.clear();
    }

    /// The common record shape: one line range replaced back to the saved
    /// lines, unchained.
    pub fn record(&mut self, start: usize, lines: Vec<String>, action: ActionKey, col: usize) {
        self.push(start, EditSpan::Replace { count: 1, lines }, action, col, false);
    }

    /// Undo the most recent chain of records, pushing inverses onto the
    /// redo stack. Returns the cursor to restore, or `None` when there was
    /// nothing to undo.
    pub fn undo(&mut self, buf: &mut TextBuffer) -> Option<Restore> {
        Self::apply(&mut self.undo, &mut self.redo, self.limit, buf)
    }

    /// Redo the most recently undone chain.
    pub fn redo(&mut self, buf: &mut TextBuffer) -> Option<Restore> {
        Self::apply(&mut self.redo, &mut self.undo, self.limit, buf)
    }

    /// Replay records from `src` while they are chained, pushing the
    /// pre-mutation inverse of each onto `dst`. The chain flags of the
    /// pushed run are reversed afterwards, because the run will replay in
    /// the opposite order.
    fn apply(
        src: &mut Vec<Record>,
        dst: &mut Vec<Record>,
        limit: usize,
        buf: &mut TextBuffer,
    ) -> Option<Restore> {
        let mut dst_start = dst.len();
        let mut restore: Option<Restore> = None;
        let mut chain = true;
        while chain {
            let Some(rec) = src.pop() else { break };
            let line = if rec.action.keeps_line() {
                restore.and_then(|r| r.line)
            } else {
                Some(rec.start)
            };
            restore = Some(Restore { line, col: rec.col });
            if dst.len() >= limit {
                dst.remove(0);
                dst_start = dst_start.saturating_sub(1);
            }
            match rec.span {
                EditSpan::Replace { count, lines } => {
                    let end = (rec.start + count).min(buf.len());
                    let replaced = buf.slice(rec.start, end).to_vec();
                    dst.push(Record {
                        start: rec.start,
                        span: EditSpan::Replace {
                            count: lines.len(),
                            lines: replaced,
                        },
                        action: rec.action,
                        col: rec.col,
                        chain: rec.chain,
                    });
                    buf.splice(rec.start, count, lines);
                }
                EditSpan::Delete { count, line } => {
                    let end = (rec.start + count + 1).min(buf.len());
                    let saved = buf.slice(rec.start, end).to_vec();
                    dst.push(Record {
                        start: rec.start,
                        span: EditSpan::Replace {
                            count: 1,
                            lines: saved,
                        },
                        action: rec.action,
                        col: rec.col,
                        chain: rec.chain,
                    });
                    buf.remove_lines(rec.start, count);
                    buf.set_line(rec.start, line);
                }
            }
            chain = rec.chain;
        }
        if dst.len() > dst_start {
            // The run replays back-to-front, so the chain markers swap ends.
            if let Some(last) = dst.last_mut() {
                last.chain = true;
            }
            dst[dst_start].chain = false;
        }
        restore
    }

    // ─── History browsing ────────────────────────────────────────────

    /// Step the history cursor forward or backward (cyclic) and return the
    /// position of the record it lands on.
    pub fn step_index(&mut self, forward: bool) -> Option<(usize, usize)> {
        let len = self.undo.len();
        if len == 0 {
            return None;
        }
        self.index = if forward {
            (self.index + 1) % len
        } else {
            (self.index + len - 1) % len
        };
        let rec = &self.undo[self.index];
        Some((rec.start, rec.col))
    }

    /// The saved lines of the record under the history cursor, for yanking.
    #[must_use]
    pub fn indexed_lines(&self) -> Option<Vec<String>> {
        let len = self.undo.len();
        if len == 0 {
            return None;
        }
        Some(self.undo[self.index % len].span.saved_lines())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn buf(lines: &[&str]) -> TextBuffer {
        TextBuffer::from_lines(lines.iter().map(ToString::to_string).collect())
    }

    #[test]
    fn undo_restores_replaced_line() {
        let mut b = buf(&["hello"]);
        let mut st = UndoStack::new(10);
        st.record(0, vec!["hello".into()], ActionKey::InsertChar, 5);
        b.set_line(0, "hellox".into());

        let r = st.undo(&mut b).unwrap();
        assert_eq!(b.lines(), &["hello"]);
        assert_eq!(r, Restore { line: Some(0), col: 5 });
    }

    #[test]
    fn redo_reapplies_and_round_trips() {
        let mut b = buf(&["one"]);
        let mut st = UndoStack::new(10);
        st.record(0, vec!["one".into()], ActionKey::Delete, 0);
        b.set_line(0, "ne".into());

        st.undo(&mut b);
        assert_eq!(b.lines(), &["one"]);
        st.redo(&mut b);
        assert_eq!(b.lines(), &["ne"]);
        st.undo(&mut b);
        assert_eq!(b.lines(), &["one"]);
    }

    #[test]
    fn coalesces_same_action_on_same_line() {
        let mut b = buf(&["ab"]);
        let mut st = UndoStack::new(10);
        st.record(0, vec!["ab".into()], ActionKey::InsertChar, 2);
        b.set_line(0, "abc".into());
        st.record(0, vec!["abc".into()], ActionKey::InsertChar, 3);
        b.set_line(0, "abcd".into());
        assert_eq!(st.len(), 1);

        st.undo(&mut b);
        assert_eq!(b.lines(), &["ab"]);
    }

    #[test]
    fn action_none_never_coalesces() {
        let mut st = UndoStack::new(10);
        st.record(0, vec!["a".into()], ActionKey::None, 0);
        st.record(0, vec!["a".into()], ActionKey::None, 0);
        assert_eq!(st.len(), 2);
    }

    #[test]
    fn push_clears_redo() {
        let mut b = buf(&["x"]);
        let mut st = UndoStack::new(10);
        st.record(0, vec!["x".into()], ActionKey::None, 0);
        b.set_line(0, "y".into());
        st.undo(&mut b);
        st.record(0, vec!["x".into()], ActionKey::None, 0);
        assert!(st.redo(&mut b).is_none());
    }

    #[test]
    fn limit_evicts_oldest() {
        let mut b = buf(&["v0"]);
        let mut st = UndoStack::new(4);
        for i in 0..6 {
            st.record(0, vec![format!("v{i}")], ActionKey::None, 0);
            b.set_line(0, format!("v{}", i + 1));
        }
        assert_eq!(st.len(), 4);
        while st.undo(&mut b).is_some() {}
        // Only the four newest edits can be walked back.
        assert_eq!(b.line(0), "v2");
    }

    #[test]
    fn enter_span_round_trip() {
        // A line split replaces two lines with the saved one on undo.
        let mut b = buf(&["split here", "tail"]);
        let mut st = UndoStack::new(10);
        st.push(
            0,
            EditSpan::Replace {
                count: 2,
                lines: vec!["split here".into()],
            },
            ActionKey::None,
            5,
            false,
        );
        b.splice(0, 1, vec!["split".into(), " here".into()]);
        assert_eq!(b.len(), 3);

        st.undo(&mut b);
        assert_eq!(b.lines(), &["split here", "tail"]);
        st.redo(&mut b);
        assert_eq!(b.lines(), &["split", " here", "tail"]);
    }

    #[test]
    fn delete_span_shrinks_buffer() {
        // A 3-line paste over one line undoes by deleting 2 lines and
        // restoring the original first line.
        let mut b = buf(&["orig"]);
        let mut st = UndoStack::new(10);
        st.push(
            0,
            EditSpan::Delete {
                count: 2,
                line: "orig".into(),
            },
            ActionKey::None,
            0,
            false,
        );
        b.splice(0, 1, vec!["p1".into(), "p2".into(), "p3".into()]);

        st.undo(&mut b);
        assert_eq!(b.lines(), &["orig"]);
        st.redo(&mut b);
        assert_eq!(b.lines(), &["p1", "p2", "p3"]);
    }

    #[test]
    fn chained_records_replay_as_one_step() {
        let mut b = buf(&["first"]);
        let mut st = UndoStack::new(10);
        // Selection delete, then the insert that replaced it.
        st.push(
            0,
            EditSpan::Replace {
                count: 1,
                lines: vec!["first".into()],
            },
            ActionKey::None,
            0,
            false,
        );
        b.set_line(0, String::new());
        st.push(
            0,
            EditSpan::Replace {
                count: 1,
                lines: vec![String::new()],
            },
            ActionKey::None,
            0,
            true,
        );
        b.set_line(0, "x".into());

        st.undo(&mut b);
        assert_eq!(b.lines(), &["first"]);
        st.redo(&mut b);
        assert_eq!(b.lines(), &["x"]);
        st.undo(&mut b);
        assert_eq!(b.lines(), &["first"]);
    }

    #[test]
    fn block_actions_keep_cursor_line() {
        let mut b = buf(&["  a", "  b"]);
        let mut st = UndoStack::new(10);
        st.push(
            0,
            EditSpan::Replace {
                count: 2,
                lines: vec!["  a".into(), "  b".into()],
            },
            ActionKey::Indent,
            3,
            false,
        );
        b.splice(0, 2, vec!["    a".into(), "    b".into()]);

        let r = st.undo(&mut b).unwrap();
        assert_eq!(r.line, None);
        assert_eq!(r.col, 3);
    }

    #[test]
    fn history_cursor_cycles_and_yanks() {
        let mut st = UndoStack::new(10);
        st.record(3, vec!["aaa".into()], ActionKey::None, 1);
        st.record(7, vec!["bbb".into()], ActionKey::None, 2);

        assert_eq!(st.step_index(false), Some((7, 2)));
        assert_eq!(st.indexed_lines(), Some(vec!["bbb".to_string()]));
        assert_eq!(st.step_index(false), Some((3, 1)));
        assert_eq!(st.step_index(true), Some((7, 2)));
    }

    #[test]
    fn empty_stack_is_inert() {
        let mut b = buf(&["x"]);
        let mut st = UndoStack::new(10);
        assert!(st.undo(&mut b).is_none());
        assert!(st.step_index(true).is_none());
        assert!(st.indexed_lines().is_none());
    }
}
