//! The editing engine behind `ped`: line buffer, undo history, key
//! dispatch, diff-based screen painting, search and multi-buffer
//! sessions. Terminal access goes through the [`ped_term`] console
//! abstraction, so everything here is testable against a scripted
//! console.

pub mod buffer;
pub mod editor;
pub mod highlight;
mod render;
mod search;
pub mod session;
pub mod text;
pub mod undo;

pub use buffer::TextBuffer;
pub use editor::{Editor, Exit, Flow};
pub use highlight::{Highlighter, Plain};
pub use session::{Place, Places, Session, SessionResult, Shared};
pub use undo::{ActionKey, EditSpan, UndoStack};
