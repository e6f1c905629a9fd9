// SPDX-License-Identifier: MIT
//
// The I/O device contract and its two implementations.
//
// The editor is single-threaded and blocking-read driven: the only
// suspension point is "read the next input unit", and all output produced
// between reads is buffered and flushed right before the next read blocks.
// The [`Console`] trait captures exactly that surface — one decoded unit
// or one raw byte in, strings out, a size query, and a best-effort pause
// of any background refresh the device performs on its own.
//
// Safety: the TTY implementation necessarily uses `unsafe` for termios
// (tcgetattr, tcsetattr), ioctl (TIOCGWINSZ), and raw fd writes in the
// panic hook. These are the standard POSIX interfaces for terminal
// control — there is no safe alternative. Each unsafe block is minimal.
#![allow(unsafe_code)]

use std::collections::VecDeque;
use std::io::{self, Read, Write};
#[cfg(unix)]
use std::sync::{Mutex, Once};

// ─── Contract ────────────────────────────────────────────────────────────────

/// The terminal-like input/output device the editor runs against.
///
/// `read_char` blocks until one decoded unit (a full UTF-8 scalar) is
/// available; `read_byte` blocks for one raw byte and exists only for the
/// fixed-size mouse report payload. Neither ever reads ahead past what the
/// caller asked for.
pub trait Console {
    /// Blocking read of one decoded input unit.
    fn read_char(&mut self) -> io::Result<char>;

    /// Blocking read of one raw byte (mouse payload only).
    fn read_byte(&mut self) -> io::Result<u8>;

    /// Queue a string for output.
    fn write_str(&mut self, s: &str) -> io::Result<()>;

    /// Push all queued output to the device.
    fn flush(&mut self) -> io::Result<()>;

    /// Current screen size as `(rows, cols)`.
    fn size(&mut self) -> (usize, usize);

    /// Ask the device to pause any ambient background redrawing it does.
    /// Best-effort; the default implementation is a no-op.
    fn stop_refresh(&mut self) {}

    /// Resume background redrawing after [`stop_refresh`](Self::stop_refresh).
    fn resume_refresh(&mut self) {}
}

// ─── TTY implementation ──────────────────────────────────────────────────────

/// Fallback size when the terminal cannot be queried (tests, pipes).
const FALLBACK_ROWS: usize = 24;
const FALLBACK_COLS: usize = 80;

/// Query the terminal size via `ioctl(TIOCGWINSZ)`.
#[cfg(unix)]
#[must_use]
fn query_size() -> Option<(usize, usize)> {
    let mut ws: libc::winsize = unsafe { std::mem::zeroed() };
    let result = unsafe { libc::ioctl(libc::STDOUT_FILENO, libc::TIOCGWINSZ, &mut ws) };

    if result == 0 && ws.ws_col > 0 && ws.ws_row > 0 {
        Some((ws.ws_row as usize, ws.ws_col as usize))
    } else {
        None
    }
}

#[cfg(not(unix))]
#[must_use]
fn query_size() -> Option<(usize, usize)> {
    None
}

/// Global backup of the original termios for panic recovery.
///
/// The [`Tty`] struct owns its own copy, but the panic hook can't access
/// it. This backup — behind a [`Mutex`], not `static mut` — lets the hook
/// restore cooked mode without the struct.
#[cfg(unix)]
static TERMIOS_BACKUP: Mutex<Option<libc::termios>> = Mutex::new(None);

/// Minimal restore sequence for emergency use: mouse reporting off, scroll
/// region reset, attributes reset, cursor shown.
#[cfg(unix)]
const EMERGENCY_RESTORE: &[u8] = b"\x1b[?9l\x1b[r\x1b[0m\x1b[?25h";

#[cfg(unix)]
static PANIC_HOOK_INSTALLED: Once = Once::new();

/// Install a panic hook that restores the terminal before the error prints.
///
/// Without this, a panic in raw mode leaves the user's terminal broken: no
/// echo, no line editing, no way to read the message. The hook writes the
/// restore sequence directly to fd 1 (bypassing Rust's stdout lock to avoid
/// deadlock if the panic happened mid-flush), restores termios, then
/// delegates to the original panic handler.
#[cfg(unix)]
fn install_panic_hook() {
    PANIC_HOOK_INSTALLED.call_once(|| {
        let original = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            unsafe {
                let _ = libc::write(
                    libc::STDOUT_FILENO,
                    EMERGENCY_RESTORE.as_ptr().cast::<libc::c_void>(),
                    EMERGENCY_RESTORE.len(),
                );
            }
            if let Ok(guard) = TERMIOS_BACKUP.lock() {
                if let Some(ref orig) = *guard {
                    unsafe {
                        let _ = libc::tcsetattr(libc::STDIN_FILENO, libc::TCSANOW, orig);
                    }
                }
            }
            original(info);
        }));
    });
}

/// The real terminal on stdin/stdout.
///
/// [`enter`](Self::enter) switches stdin to raw mode (VMIN=1, VTIME=0, so
/// every read blocks for exactly one byte); the original termios is
/// restored on [`leave`](Self::leave) or drop — even on panic. Output is
/// accumulated in an internal buffer and pushed out by [`flush`], which the
/// read methods call before blocking.
pub struct Tty {
    #[cfg(unix)]
    original_termios: Option<libc::termios>,
    out: String,
}

impl Tty {
    /// Create a handle. Does **not** enter raw mode — call
    /// [`enter`](Self::enter) for that.
    #[must_use]
    pub fn new() -> Self {
        Self {
            #[cfg(unix)]
            original_termios: None,
            out: String::new(),
        }
    }

    /// Enter raw mode and install the panic-restore hook.
    ///
    /// Idempotent; a no-op when stdin is not a TTY.
    ///
    /// # Errors
    ///
    /// Returns an error if the termios calls fail.
    #[cfg(unix)]
    pub fn enter(&mut self) -> io::Result<()> {
        use std::os::unix::io::AsRawFd;

        if self.original_termios.is_some() {
            return Ok(());
        }
        if unsafe { libc::isatty(libc::STDIN_FILENO) } == 0 {
            return Ok(());
        }

        install_panic_hook();

        let fd = io::stdin().as_raw_fd();
        unsafe {
            let mut termios: libc::termios = std::mem::zeroed();
            if libc::tcgetattr(fd, &raw mut termios) != 0 {
                return Err(io::Error::last_os_error());
            }

            self.original_termios = Some(termios);
            if let Ok(mut guard) = TERMIOS_BACKUP.lock() {
                *guard = Some(termios);
            }

            // cfmakeraw equivalent: no line processing, no echo, no signals.
            termios.c_iflag &= !(libc::IGNBRK
                | libc::BRKINT
                | libc::PARMRK
                | libc::ISTRIP
                | libc::INLCR
                | libc::IGNCR
                | libc::ICRNL
                | libc::IXON);
            termios.c_oflag &= !libc::OPOST;
            termios.c_lflag &=
                !(libc::ECHO | libc::ECHONL | libc::ICANON | libc::ISIG | libc::IEXTEN);
            termios.c_cflag &= !(libc::CSIZE | libc::PARENB);
            termios.c_cflag |= libc::CS8;

            // VMIN=1, VTIME=0: read() blocks until exactly one byte arrives.
            termios.c_cc[libc::VMIN] = 1;
            termios.c_cc[libc::VTIME] = 0;

            if libc::tcsetattr(fd, libc::TCSAFLUSH, &raw const termios) != 0 {
                return Err(io::Error::last_os_error());
            }
        }

        Ok(())
    }

    #[cfg(not(unix))]
    pub fn enter(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Restore the original terminal mode. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the termios restore fails.
    #[cfg(unix)]
    pub fn leave(&mut self) -> io::Result<()> {
        use std::os::unix::io::AsRawFd;

        let _ = self.flush();
        if let Some(ref original) = self.original_termios {
            let fd = io::stdin().as_raw_fd();
            unsafe {
                if libc::tcsetattr(fd, libc::TCSAFLUSH, original) != 0 {
                    return Err(io::Error::last_os_error());
                }
            }
            if let Ok(mut guard) = TERMIOS_BACKUP.lock() {
                *guard = None;
            }
            self.original_termios = None;
        }
        Ok(())
    }

    #[cfg(not(unix))]
    pub fn leave(&mut self) -> io::Result<()> {
        self.flush()
    }

    fn read_raw_byte() -> io::Result<u8> {
        let mut b = [0u8; 1];
        io::stdin().read_exact(&mut b)?;
        Ok(b[0])
    }
}

impl Default for Tty {
    fn default() -> Self {
        Self::new()
    }
}

impl Console for Tty {
    fn read_char(&mut self) -> io::Result<char> {
        self.flush()?;
        let first = Self::read_raw_byte()?;
        decode_utf8(first, Self::read_raw_byte)
    }

    fn read_byte(&mut self) -> io::Result<u8> {
        self.flush()?;
        Self::read_raw_byte()
    }

    fn write_str(&mut self, s: &str) -> io::Result<()> {
        self.out.push_str(s);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.out.is_empty() {
            let stdout = io::stdout();
            let mut lock = stdout.lock();
            lock.write_all(self.out.as_bytes())?;
            lock.flush()?;
            self.out.clear();
        }
        Ok(())
    }

    fn size(&mut self) -> (usize, usize) {
        query_size().unwrap_or((FALLBACK_ROWS, FALLBACK_COLS))
    }
}

impl Drop for Tty {
    fn drop(&mut self) {
        let _ = self.leave();
    }
}

// ─── UTF-8 decoding ──────────────────────────────────────────────────────────

/// Decode one UTF-8 scalar given its lead byte and a source of continuation
/// bytes. Malformed input decodes to U+FFFD rather than failing — input
/// anomalies are never errors.
fn decode_utf8(first: u8, mut next: impl FnMut() -> io::Result<u8>) -> io::Result<char> {
    if first < 0x80 {
        return Ok(first as char);
    }
    let extra = match first {
        0xC0..=0xDF => 1,
        0xE0..=0xEF => 2,
        0xF0..=0xF7 => 3,
        // Bare continuation byte or invalid lead.
        _ => return Ok('\u{FFFD}'),
    };
    let mut bytes = vec![first];
    for _ in 0..extra {
        bytes.push(next()?);
    }
    Ok(String::from_utf8_lossy(&bytes)
        .chars()
        .next()
        .unwrap_or('\u{FFFD}'))
}

// ─── Scripted implementation ─────────────────────────────────────────────────

/// A replayable console for tests and headless runs.
///
/// Input comes from a fixed byte script; output is captured in a string.
/// Reading past the end of the script yields `UnexpectedEof`, which the
/// session manager treats as end-of-input.
pub struct Script {
    input: VecDeque<u8>,
    output: String,
    rows: usize,
    cols: usize,
    /// Number of `stop_refresh` calls minus `resume_refresh` calls.
    pub refresh_holds: i32,
}

impl Script {
    /// Create a scripted console with the given input bytes and fixed size.
    #[must_use]
    pub fn new(input: &[u8], rows: usize, cols: usize) -> Self {
        Self {
            input: input.iter().copied().collect(),
            output: String::new(),
            rows,
            cols,
            refresh_holds: 0,
        }
    }

    /// Append more input to the script.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.input.extend(bytes.iter().copied());
    }

    /// Everything written so far.
    #[must_use]
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Take and clear the captured output.
    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }

    fn pop(&mut self) -> io::Result<u8> {
        self.input
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "input script exhausted"))
    }
}

impl Console for Script {
    fn read_char(&mut self) -> io::Result<char> {
        let first = self.pop()?;
        decode_utf8(first, || self.pop())
    }

    fn read_byte(&mut self) -> io::Result<u8> {
        self.pop()
    }

    fn write_str(&mut self, s: &str) -> io::Result<()> {
        self.output.push_str(s);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn size(&mut self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    fn stop_refresh(&mut self) {
        self.refresh_holds += 1;
    }

    fn resume_refresh(&mut self) {
        self.refresh_holds -= 1;
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn script_reads_chars_in_order() {
        let mut con = Script::new(b"ab", 24, 80);
        assert_eq!(con.read_char().unwrap(), 'a');
        assert_eq!(con.read_char().unwrap(), 'b');
        assert!(con.read_char().is_err());
    }

    #[test]
    fn script_eof_kind() {
        let mut con = Script::new(b"", 24, 80);
        let err = con.read_char().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn script_decodes_multibyte_utf8() {
        let mut con = Script::new("é€".as_bytes(), 24, 80);
        assert_eq!(con.read_char().unwrap(), 'é');
        assert_eq!(con.read_char().unwrap(), '€');
    }

    #[test]
    fn script_replaces_bare_continuation_byte() {
        let mut con = Script::new(&[0x80, b'x'], 24, 80);
        assert_eq!(con.read_char().unwrap(), '\u{FFFD}');
        assert_eq!(con.read_char().unwrap(), 'x');
    }

    #[test]
    fn script_captures_output() {
        let mut con = Script::new(b"", 24, 80);
        con.write_str("one").unwrap();
        con.write_str("two").unwrap();
        assert_eq!(con.output(), "onetwo");
        assert_eq!(con.take_output(), "onetwo");
        assert_eq!(con.output(), "");
    }

    #[test]
    fn script_reports_size() {
        let mut con = Script::new(b"", 30, 100);
        assert_eq!(con.size(), (30, 100));
    }

    #[test]
    fn script_counts_refresh_holds() {
        let mut con = Script::new(b"", 24, 80);
        con.stop_refresh();
        assert_eq!(con.refresh_holds, 1);
        con.resume_refresh();
        assert_eq!(con.refresh_holds, 0);
    }

    #[test]
    fn raw_byte_read_is_exact() {
        let mut con = Script::new(&[0x20, 0xFF], 24, 80);
        assert_eq!(con.read_byte().unwrap(), 0x20);
        assert_eq!(con.read_byte().unwrap(), 0xFF);
    }

    #[test]
    fn decode_utf8_ascii_passthrough() {
        let c = decode_utf8(b'z', || unreachable!()).unwrap();
        assert_eq!(c, 'z');
    }

    #[test]
    fn tty_buffers_output_until_flush() {
        let mut tty = Tty::new();
        tty.write_str("queued").unwrap();
        assert_eq!(tty.out, "queued");
    }
}
