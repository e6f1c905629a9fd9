//! Character-column string helpers.
//!
//! The editor addresses text by *char column*, never by byte offset: column
//! 3 of `"café"` is `'é'`, and byte indices never leak into the rest of the
//! crate. These helpers do the byte/char conversion in one place.

/// Number of chars in `s`.
#[must_use]
pub fn width(s: &str) -> usize {
    s.chars().count()
}

/// Byte index of char column `col`, clamped to the end of the string.
#[must_use]
pub fn byte_at(s: &str, col: usize) -> usize {
    s.char_indices().nth(col).map_or(s.len(), |(i, _)| i)
}

/// The chars of `s` in columns `[start, end)`, as an owned string.
///
/// Out-of-range bounds clamp; an inverted range yields the empty string.
#[must_use]
pub fn cols(s: &str, start: usize, end: usize) -> String {
    if end <= start {
        return String::new();
    }
    s.chars().skip(start).take(end - start).collect()
}

/// The chars of `s` from column `start` to the end.
#[must_use]
pub fn cols_from(s: &str, start: usize) -> String {
    s.chars().skip(start).collect()
}

/// Number of leading spaces in `s`.
#[must_use]
pub fn leading_spaces(s: &str) -> usize {
    s.chars().take_while(|&c| c == ' ').count()
}

/// Number of spaces immediately before column `pos`.
#[must_use]
pub fn spaces_before(s: &str, pos: usize) -> usize {
    let head = cols(s, 0, pos);
    head.len() - head.trim_end_matches(' ').len()
}

/// Insert `ins` at char column `col` (clamped to the end).
#[must_use]
pub fn insert_at(s: &str, col: usize, ins: &str) -> String {
    let b = byte_at(s, col);
    let mut out = String::with_capacity(s.len() + ins.len());
    out.push_str(&s[..b]);
    out.push_str(ins);
    out.push_str(&s[b..]);
    out
}

/// Remove the chars in columns `[start, end)`.
#[must_use]
pub fn remove_cols(s: &str, start: usize, end: usize) -> String {
    let a = byte_at(s, start);
    let b = byte_at(s, end.max(start));
    let mut out = String::with_capacity(s.len());
    out.push_str(&s[..a]);
    out.push_str(&s[b..]);
    out
}

/// The char at column `col`, if any.
#[must_use]
pub fn char_at(s: &str, col: usize) -> Option<char> {
    s.chars().nth(col)
}
