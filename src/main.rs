// SPDX-License-Identifier: MIT
//
// ped — a compact VT100 terminal text editor.
//
// This is the main binary that wires together the two crates:
//
//   ped-term   → raw terminal mode, VT100 sequences, input decoding
//   ped-editor → text buffer, undo, key dispatch, rendering, sessions
//
// Every file named on the command line gets its own buffer (a listing of
// the current directory when none are given); the session runs them on
// the controlling terminal until the last one quits.

use std::env;
use std::io;
use std::process::ExitCode;

use ped_editor::{Plain, Session};
use ped_term::console::Tty;

const TAB_SIZE: usize = 4;
const UNDO_DEPTH: usize = 50;

fn run() -> io::Result<()> {
    let files: Vec<String> = env::args().skip(1).collect();
    let mut con = Tty::new();
    con.enter()?;
    let mut session = Session::new(&files, TAB_SIZE, UNDO_DEPTH);
    let result = session.run(&mut con, &Plain);
    con.leave()?;
    result.map(|_| ())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ped: {e}");
            ExitCode::FAILURE
        }
    }
}
