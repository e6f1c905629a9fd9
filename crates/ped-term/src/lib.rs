// SPDX-License-Identifier: MIT
//
// ped-term — Terminal layer for ped.
//
// Everything the editor needs from the terminal, with no TUI framework
// in between: a small device contract ([`console::Console`]), the exact
// VT100 control sequences the editor emits ([`ansi`]), and the byte-level
// input decoder that turns a raw character stream into logical key and
// mouse events ([`input`]).
//
// This crate intentionally avoids crossterm and friends. The editor's
// terminal compatibility depends on emitting these sequences bit-exactly
// and on reading input one blocking unit at a time, and both are easier
// to guarantee when every byte is written by hand.

pub mod ansi;
pub mod console;
pub mod input;

pub use console::Console;
pub use input::{Event, Key, read_event};
