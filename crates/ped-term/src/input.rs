// SPDX-License-Identifier: MIT
//
// Terminal input decoding.
//
// Turns the device's raw character stream into logical editing events.
// The decoder is a byte-oriented state machine with exactly one blocking
// read at a time — it never reads ahead past what is needed to resolve
// the current event:
//
// - A lead ESC starts accumulating a sequence, which ends when it matches
//   the mapping table, when a letter arrives after exactly two bytes
//   (Alt+letter, remapped to the corresponding control character), when
//   the longest known sequence length is reached, or when ESC arrives
//   twice in a row (collapses to the quit key).
// - A matched sequence yields its logical key; one reserved key (the
//   mouse lead-in `ESC [ M`) consumes exactly three more raw bytes for
//   the button function and position.
// - An unmatched sequence whose lead byte is printable is a literal
//   character event. Unmatched control bytes are swallowed and the read
//   starts over — input anomalies are never errors.

use std::io;

use crate::console::Console;

// ─── Events ──────────────────────────────────────────────────────────────────

/// A logical function key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Up,
    Down,
    Left,
    Right,
    ShiftUp,
    ShiftDown,
    ShiftLeft,
    ShiftRight,
    AltUp,
    AltDown,
    AltLeft,
    AltRight,
    CtrlShiftLeft,
    CtrlShiftRight,
    WordLeft,
    WordRight,
    Home,
    End,
    PageUp,
    PageDown,
    Quit,
    Enter,
    Backspace,
    Delete,
    DelWord,
    DelLine,
    Save,
    Tab,
    Backtab,
    Find,
    FindAgain,
    Goto,
    Redraw,
    Undo,
    Redo,
    UndoPrev,
    UndoNext,
    UndoYank,
    Cut,
    Copy,
    Paste,
    First,
    Last,
    Replace,
    Toggle,
    Get,
    Mark,
    Next,
    Prev,
    Comment,
    Match,
    Place,
    NextPlace,
    PrevPlace,
    ScrollUp,
    ScrollDown,
    /// Mouse report lead-in; resolved further by the decoder, never
    /// delivered to the dispatcher.
    Mouse,
}

/// One decoded input event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// A logical function key.
    Key(Key),
    /// A literal printable character.
    Char(char),
    /// A mouse click/release with 0-indexed screen position and the raw
    /// button function code from the report.
    Mouse { x: usize, y: usize, button: u8 },
    /// A scroll-wheel event.
    Scroll { up: bool, lines: usize },
}

// ─── Mapping table ───────────────────────────────────────────────────────────

/// Byte sequence → logical key.
///
/// Covers the escape sequences of the common terminals (Linux console,
/// xterm, Picocom/Minicom `ESC O` encodings, Putty `~` encodings) plus the
/// single control bytes bound to editor functions. The decoder matches an
/// accumulated sequence against this table exactly.
pub const KEYMAP: &[(&str, Key)] = &[
    ("\x1b[A", Key::Up),
    ("\x1b[1;2A", Key::ShiftUp),
    ("\x1b[1;3A", Key::AltUp),
    ("\x1b[B", Key::Down),
    ("\x1b[1;2B", Key::ShiftDown),
    ("\x1b[1;3B", Key::AltDown),
    ("\x1b[D", Key::Left),
    ("\x1b[1;2D", Key::ShiftLeft),
    ("\x1b[1;6D", Key::CtrlShiftLeft),
    ("\x1b[1;3D", Key::AltLeft),
    ("\x1b[C", Key::Right),
    ("\x1b[1;2C", Key::ShiftRight),
    ("\x1b[1;6C", Key::CtrlShiftRight),
    ("\x1b[1;3C", Key::AltRight),
    ("\x1b[H", Key::Home), // Linux terminal
    ("\x1bOH", Key::Home), // Picocom, Minicom
    ("\x1b[1~", Key::Home), // Putty
    ("\x1b[F", Key::End),  // Linux terminal
    ("\x1bOF", Key::End),  // Picocom, Minicom
    ("\x1b[4~", Key::End), // Putty
    ("\x1b[5~", Key::PageUp),
    ("\x1b[6~", Key::PageDown),
    ("\x1b[5;5~", Key::Prev), // Ctrl-PgUp
    ("\x1b[6;5~", Key::Next), // Ctrl-PgDn
    ("\x1b[1;5D", Key::WordLeft),
    ("\x1b[1;5C", Key::WordRight),
    ("\x03", Key::Copy), // Ctrl-C
    ("\r", Key::Enter),
    ("\x7f", Key::Backspace),
    ("\x1b[3~", Key::Delete),
    ("\x1b[Z", Key::Backtab), // Shift-Tab
    ("\x19", Key::Redo),      // Ctrl-Y
    ("\x08", Key::Replace),   // Ctrl-H
    ("\x12", Key::Replace),   // Ctrl-R
    ("\x11", Key::Quit),      // Ctrl-Q
    ("\x1b", Key::Quit),      // Escape twice
    ("\n", Key::Enter),
    ("\x13", Key::Save), // Ctrl-S
    ("\x06", Key::Find), // Ctrl-F
    ("\x0e", Key::FindAgain), // Ctrl-N
    ("\x07", Key::Goto), // Ctrl-G
    ("\x05", Key::Redraw), // Ctrl-E
    ("\x1a", Key::Undo), // Ctrl-Z
    ("\x09", Key::Tab),
    ("\x15", Key::Backtab), // Ctrl-U
    ("\x18", Key::Cut),     // Ctrl-X
    ("\x16", Key::Paste),   // Ctrl-V
    ("\x04", Key::UndoYank), // Ctrl-D
    ("\x0c", Key::Mark),    // Ctrl-L
    ("\x00", Key::Mark),    // Ctrl-Space
    ("\x14", Key::First),   // Ctrl-T
    ("\x02", Key::Last),    // Ctrl-B
    ("\x01", Key::Toggle),  // Ctrl-A
    ("\x17", Key::Next),    // Ctrl-W
    ("\x0f", Key::Get),     // Ctrl-O
    ("\x10", Key::Comment), // Ctrl-P
    ("\x1f", Key::Comment), // Ctrl-P
    ("\x1b[1;5A", Key::ScrollUp),   // Ctrl-Up
    ("\x1b[1;5B", Key::ScrollDown), // Ctrl-Down
    ("\x1b[1;5H", Key::First),      // Ctrl-Home
    ("\x1b[1;5F", Key::Last),       // Ctrl-End
    ("\x1b[3;5~", Key::DelWord),    // Ctrl-Del
    ("\x1b[3;2~", Key::DelLine),    // Shift-Del
    ("\x0b", Key::Match),           // Ctrl-K
    ("\x1b[M", Key::Mouse),
    ("\x1b[2;3~", Key::Place),     // Alt-Ins
    ("\x1b[5;3~", Key::PrevPlace), // Alt-PgUp
    ("\x1b[6;3~", Key::NextPlace), // Alt-PgDn
    ("\x1b[1;3H", Key::UndoPrev),  // Alt-Home
    ("\x1b[1;3F", Key::UndoNext),  // Alt-End
];

/// X10 mouse reports encode position as `byte - 33` for 0-indexed cells.
const MOUSE_POS_OFFSET: u8 = 33;
/// Button function codes for the scroll wheel.
const MOUSE_WHEEL_UP: u8 = 0x60;
const MOUSE_WHEEL_DOWN: u8 = 0x61;
/// Wheel events scroll this many lines at once.
const WHEEL_LINES: usize = 3;

fn lookup(seq: &str) -> Option<Key> {
    KEYMAP.iter().find(|(s, _)| *s == seq).map(|&(_, k)| k)
}

/// Length in bytes of the longest sequence in [`KEYMAP`].
fn max_seq_len() -> usize {
    KEYMAP.iter().map(|(s, _)| s.len()).max().unwrap_or(1)
}

// ─── Decoder ─────────────────────────────────────────────────────────────────

/// Read and decode the next input event from the device.
///
/// Blocks until a whole event is available. Unknown control input is
/// discarded and the read restarts, so every returned event is meaningful.
///
/// # Errors
///
/// Propagates read errors from the device (including end-of-input).
pub fn read_event(con: &mut dyn Console) -> io::Result<Event> {
    let key_max = max_seq_len();
    loop {
        let lead = con.read_char()?;
        let mut seq = String::new();
        seq.push(lead);
        if lead == '\x1b' {
            loop {
                let c = con.read_char()?;
                seq.push(c);
                if c == '~' || (c.is_alphabetic() && seq.chars().count() > 2) {
                    break;
                }
                // Map Alt+letter aka ESC+letter onto the matching control
                // character, except for ESC-O (SS3 prefix).
                if seq.chars().count() == 2 && c.is_alphabetic() && c != 'O' {
                    seq = String::from(((c as u32 & 0x1F) as u8) as char);
                    break;
                }
                // Stop if the sequence cannot be found.
                if seq.len() >= key_max {
                    break;
                }
                // Escape entered twice: escape!
                if seq == "\x1b\x1b" {
                    seq = String::from('\x1b');
                    break;
                }
            }
        }
        if let Some(key) = lookup(&seq) {
            if key != Key::Mouse {
                return Ok(Event::Key(key));
            }
            // Mouse report: exactly three payload bytes follow.
            let button = con.read_byte()?;
            let x = usize::from(con.read_byte()?.saturating_sub(MOUSE_POS_OFFSET));
            let y = usize::from(con.read_byte()?.saturating_sub(MOUSE_POS_OFFSET));
            return Ok(match button {
                MOUSE_WHEEL_UP => Event::Scroll {
                    up: true,
                    lines: WHEEL_LINES,
                },
                MOUSE_WHEEL_DOWN => Event::Scroll {
                    up: false,
                    lines: WHEEL_LINES,
                },
                _ => Event::Mouse { x, y, button },
            });
        }
        let first = seq.chars().next().unwrap_or('\0');
        if first >= ' ' {
            return Ok(Event::Char(first));
        }
        // Unmatched control input: ignore and read on.
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
