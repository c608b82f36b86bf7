//! Byte-level input.
//!
//! - `cursor` - seekable, peekable view over the document bytes

pub mod cursor;

pub use cursor::{ByteCursor, PdfBytes};
