//! Syntax highlighting seam.
//!
//! The renderer asks an implementation for an ANSI-decorated rendition of
//! each unselected row. Returning `None` means "print the raw line" — the
//! renderer never retries and never depends on an implementation for
//! correctness, so a highlighter can bail out for any reason (line too
//! long, token budget exceeded, unknown file type) without further
//! protocol.

/// Produces an ANSI-colored rendition of a single line, or `None` to fall
/// back to the plain text.
pub trait Highlighter {
    /// `max_tokens` bounds the work an implementation may spend on one
    /// line; past the budget it should give up rather than truncate.
    fn highlight(&self, line: &str, max_tokens: usize) -> Option<String>;
}

/// The no-color highlighter.
#[derive(Debug, Clone, Copy, Default)]
pub struct Plain;

impl Highlighter for Plain {
    fn highlight(&self, _line: &str, _max_tokens: usize) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_always_falls_back() {
        assert_eq!(Plain.highlight("fn main() {}", 300), None);
        assert_eq!(Plain.highlight("", 0), None);
    }
}
